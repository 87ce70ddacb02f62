use std::process::ExitCode;

use clap::Parser;
use webweaver::ui::cli::Cli;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.init_logging();
    cli.run()
}
