use clap::Parser;
use ewindex::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
