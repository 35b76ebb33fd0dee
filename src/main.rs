use clap::Parser;
use sentiquant::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
