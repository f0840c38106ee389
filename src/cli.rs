//! Command-line interface.
//!
//! ```text
//! symshard build --source src/ --navtree Documents/ --out Documents/search/index
//! symshard search Documents/search/index chessengine
//! symshard extract src/chess_engine.h
//! symshard export-js Documents/search/index
//! symshard inspect Documents/search/index
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{self, SymshardConfig};
use crate::error::{Result, SymshardError};
use crate::index::export::export_js;
use crate::index::{BuildOutput, IndexBuilder, IndexManifest};
use crate::indexer::{discover_sources, parse_navtree, Extractor};
use crate::observability::Metrics;
use crate::search::{format_terminal, FsShardSource, MemoryShardSource, SearchOutcome, SearchSession, ShardSource};
use crate::types::RawSymbol;

#[derive(Parser, Debug)]
#[command(
    name = "symshard",
    version,
    about = "Sharded symbol-search index for generated API documentation"
)]
pub struct Cli {
    /// Config file (default: ./symshard.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an index from C/C++ sources, navtree scripts, or symbol JSON
    Build(BuildArgs),
    /// Query an index
    Search(SearchArgs),
    /// Extract raw symbols from C/C++ sources and print them as JSON
    Extract(ExtractArgs),
    /// Write Doxygen `searchdata` scripts for an existing index
    ExportJs(ExportJsArgs),
    /// Summarize an index manifest
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Output index directory
    #[arg(long, short)]
    pub out: PathBuf,

    /// C/C++ source file or directory to extract declarations from
    #[arg(long = "source", value_name = "PATH")]
    pub sources: Vec<PathBuf>,

    /// Navtree script, or a directory of them
    #[arg(long = "navtree", value_name = "PATH")]
    pub navtrees: Vec<PathBuf>,

    /// JSON array of raw symbols
    #[arg(long = "symbols", value_name = "FILE")]
    pub symbols: Vec<PathBuf>,

    /// Generated site directory; locations must name one of its pages
    #[arg(long, value_name = "DIR")]
    pub site: Option<PathBuf>,

    /// Override `builder.prefix_len`
    #[arg(long)]
    pub prefix_len: Option<usize>,

    /// Override `builder.max_shard_entries`
    #[arg(long)]
    pub max_shard_entries: Option<usize>,

    /// Also write `searchdata/*.js`
    #[arg(long)]
    pub export_js: bool,

    /// Exit successfully even if some symbols were rejected
    #[arg(long)]
    pub allow_malformed: bool,

    /// Print build metrics as JSON
    #[arg(long)]
    pub stats: bool,

    /// Hide the progress bar
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Index directory
    pub index: PathBuf,

    /// One or more queries, run in order against one session
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Read every shard into memory before searching
    #[arg(long)]
    pub in_memory: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Print session metrics as JSON
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Source files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportJsArgs {
    /// Index directory
    pub index: PathBuf,

    /// Directory to write `searchdata/` into (default: the index directory)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Index directory
    pub index: PathBuf,

    /// Print the manifest as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Build(args) => build(args, config),
        Command::Search(args) => search(args, config).await,
        Command::Extract(args) => extract(args),
        Command::ExportJs(args) => export(args, config),
        Command::Inspect(args) => inspect(args),
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

fn build(args: BuildArgs, mut config: SymshardConfig) -> Result<ExitCode> {
    if args.sources.is_empty() && args.navtrees.is_empty() && args.symbols.is_empty() {
        return Err(SymshardError::Config(
            "nothing to index: pass --source, --navtree, or --symbols".into(),
        ));
    }
    if let Some(n) = args.prefix_len {
        config.builder.prefix_len = n;
    }
    if let Some(n) = args.max_shard_entries {
        config.builder.max_shard_entries = n;
    }
    let export = args.export_js || config.builder.export_js;

    let started = Instant::now();
    let mut metrics = Metrics::new();
    let mut builder = IndexBuilder::new(config.builder.clone());
    if let Some(site) = &args.site {
        builder = builder.with_known_pages(site_pages(site)?);
    }

    for path in &args.symbols {
        let json = std::fs::read_to_string(path)?;
        let symbols: Vec<RawSymbol> = serde_json::from_str(&json)?;
        tracing::info!(file = %path.display(), symbols = symbols.len(), "read symbol file");
        builder.extend(symbols);
    }
    for path in &args.navtrees {
        builder.extend(read_navtrees(path)?);
    }
    if !args.sources.is_empty() {
        let (symbols, files) = extract_sources(&args.sources, !args.quiet)?;
        metrics.files_extracted = files;
        builder.extend(symbols);
    }

    let output = builder.build()?;
    output.write_to(&args.out)?;
    if export {
        export_js(&output, &args.out, &config.search.site_base)?;
    }

    metrics.build_duration_ms = Some(started.elapsed().as_millis() as u64);
    metrics.symbols_indexed = output.entry_count();
    metrics.shards_written = output.shards.len();
    metrics.malformed_symbols = output.diagnostics.len();

    println!(
        "{} {} symbols in {} shards ({}), build {}",
        style("Indexed").green().bold(),
        metrics.symbols_indexed,
        metrics.shards_written,
        args.out.display(),
        output.manifest.build_id
    );
    for diag in &output.diagnostics {
        eprintln!("{} {diag}", style("rejected:").yellow());
    }
    if args.stats {
        println!("{}", serde_json::to_string_pretty(&metrics.to_json())?);
    }

    if !output.is_clean() && !args.allow_malformed {
        eprintln!(
            "{} {} malformed symbols (use --allow-malformed to accept)",
            style("error:").red().bold(),
            output.diagnostics.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Page file names of a generated site.
fn site_pages(site: &Path) -> Result<HashSet<String>> {
    let mut pages = HashSet::new();
    for entry in std::fs::read_dir(site)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "html") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                pages.insert(name.to_string());
            }
        }
    }
    Ok(pages)
}

/// Symbols from one navtree script, or from every script in a directory.
///
/// Inside a directory, scripts that are not navtree data (search scripts,
/// the navtree loader) are skipped with a warning.
fn read_navtrees(path: &Path) -> Result<Vec<RawSymbol>> {
    if path.is_file() {
        return parse_navtree(&std::fs::read_to_string(path)?);
    }
    let mut scripts: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "js"))
        .collect();
    scripts.sort();

    let mut symbols = Vec::new();
    for script in scripts {
        match parse_navtree(&std::fs::read_to_string(&script)?) {
            Ok(found) => symbols.extend(found),
            Err(e) => tracing::warn!(file = %script.display(), "skipping script: {e}"),
        }
    }
    tracing::info!(dir = %path.display(), symbols = symbols.len(), "read navtree scripts");
    Ok(symbols)
}

/// Extract every supported source under `paths`. Returns the symbols and the
/// number of files parsed.
fn extract_sources(paths: &[PathBuf], progress: bool) -> Result<(Vec<RawSymbol>, usize)> {
    let extractor = Extractor::new()?;
    let mut symbols = Vec::new();
    let mut files = 0;
    for root in paths {
        let (root, sources) = if root.is_file() {
            let parent = root.parent().map(Path::to_path_buf).unwrap_or_default();
            (parent, vec![root.clone()])
        } else {
            (root.clone(), discover_sources(root))
        };

        let bar = if progress {
            let bar = ProgressBar::new(sources.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
                    .map_err(|e| SymshardError::Other(e.to_string()))?
                    .progress_chars("=> "),
            );
            bar.set_message(root.display().to_string());
            bar
        } else {
            ProgressBar::hidden()
        };

        let (found, failures) = extractor.extract_paths(&root, &sources, Some(&bar));
        bar.finish_and_clear();
        for (path, e) in &failures {
            eprintln!("{} {}: {e}", style("skipped:").yellow(), path.display());
        }
        files += sources.len() - failures.len();
        symbols.extend(found);
    }
    Ok((symbols, files))
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

async fn search(args: SearchArgs, config: SymshardConfig) -> Result<ExitCode> {
    if args.in_memory {
        let output = BuildOutput::read_from(&args.index)?;
        let source = MemoryShardSource::from_build(&output);
        run_queries(Arc::new(output.manifest), source, &args, config).await
    } else {
        let manifest = IndexManifest::load(&args.index)?;
        let source = FsShardSource::new(&args.index);
        run_queries(Arc::new(manifest), source, &args, config).await
    }
}

async fn run_queries<S: ShardSource>(
    manifest: Arc<IndexManifest>,
    source: S,
    args: &SearchArgs,
    config: SymshardConfig,
) -> Result<ExitCode> {
    let site_base = config.search.site_base.clone();
    let session = SearchSession::new(manifest, source, config.search);
    let mut degraded = false;

    for query in &args.queries {
        let SearchOutcome::Results(results) = session.search(query).await else {
            continue;
        };
        degraded |= results.is_degraded();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            print!("{}", format_terminal(&results, &site_base, console::colors_enabled()));
        }
    }

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&session.metrics().to_json())?);
    }
    Ok(if degraded { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

// ---------------------------------------------------------------------------
// extract / export-js / inspect
// ---------------------------------------------------------------------------

fn extract(args: ExtractArgs) -> Result<ExitCode> {
    let (symbols, _) = extract_sources(&args.paths, false)?;
    let json = serde_json::to_string_pretty(&symbols)?;
    match &args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn export(args: ExportJsArgs, config: SymshardConfig) -> Result<ExitCode> {
    let output = BuildOutput::read_from(&args.index)?;
    let dir = args.out.as_deref().unwrap_or(&args.index);
    let written = export_js(&output, dir, &config.search.site_base)?;
    println!(
        "{} {written} searchdata scripts to {}",
        style("Wrote").green().bold(),
        dir.join("searchdata").display()
    );
    Ok(ExitCode::SUCCESS)
}

fn inspect(args: InspectArgs) -> Result<ExitCode> {
    let manifest = IndexManifest::load(&args.index)?;
    if args.json {
        println!("{}", manifest.to_json_pretty()?);
        return Ok(ExitCode::SUCCESS);
    }
    println!("{} {}", style("build").bold(), manifest.build_id);
    println!("{} {}", style("built at").bold(), manifest.built_at);
    println!(
        "{} prefix_len={} max_shard_entries={}",
        style("rule").bold(),
        manifest.prefix_len,
        manifest.max_shard_entries
    );
    println!(
        "{} {} entries in {} shards",
        style("total").bold(),
        manifest.total_entries(),
        manifest.partitions.len()
    );
    for entry in &manifest.partitions {
        println!(
            "  {:<16} {:>6}  {}",
            entry.partition.to_string(),
            entry.entries,
            style(entry.resource_path()).dim()
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_with_repeated_sources() {
        let cli = Cli::try_parse_from([
            "symshard", "build", "--out", "idx", "--source", "src", "--source", "include",
            "--allow-malformed",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.sources.len(), 2);
        assert!(args.allow_malformed);
        assert!(!args.export_js);
    }

    #[test]
    fn search_requires_a_query() {
        assert!(Cli::try_parse_from(["symshard", "search", "idx"]).is_err());
        let cli = Cli::try_parse_from(["symshard", "search", "idx", "ca", "can", "--json"]).unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.queries, vec!["ca", "can"]);
        assert!(args.json);
    }

    #[test]
    fn read_navtrees_skips_foreign_scripts_in_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("namespaceSayuri.js"),
            "var namespaceSayuri =\n[\n  [ \"Fen\", \"classSayuri_1_1Fen.html\", null ]\n];\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("navtree.js"), "function initNavTree() {}\n").unwrap();

        let symbols = read_navtrees(dir.path()).unwrap();
        assert_eq!(symbols.len(), 1);
        assert!(read_navtrees(&dir.path().join("navtree.js")).is_err());
    }
}
