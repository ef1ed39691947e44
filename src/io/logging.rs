use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{info_span, Span};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use super::JsonlRunLogger;

/// Diagnostics for one run.
///
/// Construct once, call [`LoggingContext::init`] before the first stage,
/// then hand it to every component that records or emits diagnostics.
#[derive(Debug, Clone)]
pub struct LoggingContext {
    run_dir: PathBuf,
    run_id: Uuid,
    verbose: bool,
}

impl LoggingContext {
    pub const LOG_FILE_NAME: &'static str = "run.log";

    pub fn new(run_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            run_dir: run_dir.into(),
            run_id: Uuid::new_v4(),
            verbose,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Create the run directory and install the stderr + `run.log` subscriber.
    ///
    /// Installing twice is a no-op; the first subscriber stays in place.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.run_dir)
            .with_context(|| format!("Failed to create run directory: {:?}", self.run_dir))?;

        let log_path = self.run_dir.join(Self::LOG_FILE_NAME);
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(self.verbose))
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)));
        tracing::subscriber::set_global_default(subscriber).ok();

        Ok(())
    }

    /// Install a stderr-only subscriber for commands that have no run directory
    pub fn init_console(verbose: bool) {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber).ok();
    }

    /// Span that tags every event of this run
    pub fn span(&self) -> Span {
        info_span!("run", run_id = %self.run_id)
    }

    /// Artifact logger writing into this run's directory
    pub fn run_logger(&self) -> JsonlRunLogger {
        JsonlRunLogger::new(&self.run_dir, self.run_id)
    }
}

/// `RUST_LOG` when set, otherwise debug or info by verbosity
fn env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
