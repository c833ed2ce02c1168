//! gitward CLI binary entry point.
//! Parses arguments, installs logging, and delegates to `commands`.

use clap::Parser;
use gitward::cli::Cli;

fn main() {
    let cli = Cli::parse();
    gitward::utils::init_tracing(cli.log_level.as_deref());
    std::process::exit(gitward::commands::run(&cli));
}
