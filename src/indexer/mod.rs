//! Symbol sources: C/C++ extraction and navigation-tree ingestion.
//!
//! Both produce [`RawSymbol`](crate::types::RawSymbol)s for the index
//! builder. Locations follow the generated site's page naming in
//! [`naming`].

pub mod extractor;
pub mod naming;
pub mod navtree;
pub mod parser;

pub use extractor::{discover_sources, Extractor};
pub use navtree::parse_navtree;
pub use parser::CodeParser;
