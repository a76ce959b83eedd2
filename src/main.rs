//! nbreport-assets: stylesheet and report build driver
//!
//! Runs named build tasks: SCSS compilation with vendor prefixing and
//! minification, the report HTML generator, a file watcher and a live
//! reloading dev server for the test site.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nbreport_assets::Cli;

/// Initialize the logging/tracing system.
///
/// Logs go to stderr; stdout carries task output only.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("nbreport_assets=debug,tower_http=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nbreport_assets=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err.report());
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
