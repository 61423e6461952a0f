//! ssr CLI entrypoint

use clap::Parser;

use ssr::cli::Cli;
use ssr::output;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
