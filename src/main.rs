use std::process::ExitCode;

use clap::Parser;
use console::style;

use symshard::cli::{run, Cli};
use symshard::observability::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
