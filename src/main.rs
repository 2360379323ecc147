mod cli;
mod clu;
mod prompt;

use clap::Parser;
use cli::Arguments;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CLU_VERSION"), " ", env!("CLU_BUILD_HASH"));

/// Log filter directives, e.g. `CLU_LOG=hosts=debug`.
const LOG_VAR: &str = "CLU_LOG";

fn main() -> ExitCode {
    let args = Arguments::parse();
    init_logging(args.verbose);

    match clu::run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("clu: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
