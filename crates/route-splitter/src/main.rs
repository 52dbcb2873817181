//! route-splitter: cut a route into named segments at the waypoints along it
//!
//! Reads the route (first line) and the markers (all points) from KMZ, KML or GPX
//! files, splits the route at the markers and writes one named line per segment.

mod run;
mod settings;

use clap::Parser;
use route_splitter_lib::SplitError;
use settings::Settings;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Errors surfaced by the command-line program
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("{context}: {source}")]
    Split {
        context: String,
        #[source]
        source: SplitError,
    },
}

impl CliError {
    fn split(context: impl Into<String>) -> impl FnOnce(SplitError) -> Self {
        let context = context.into();
        move |source| CliError::Split { context, source }
    }
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();
}

fn main() -> ExitCode {
    setup_logging();
    tracing::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let settings = Settings::parse();
    match run::run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
