//! Search runtime: lazy shard loading, matching, sessions, and rendering.

pub mod loader;
pub mod matcher;
pub mod render;
pub mod session;

pub use loader::{FsShardSource, MemoryShardSource, ShardLoader, ShardSource};
pub use matcher::{MatchTier, Matcher, ResultGroup, ResultItem, SearchResults, Target};
pub use render::{format_terminal, NavigationTarget, Navigator, RenderedGroup, RenderedItem, ResultView};
pub use session::{SearchOutcome, SearchSession};
