use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Provider settings (from environment variables)
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key (`API_KEY`, falling back to `OPENAI_API_KEY`)
    pub api_key: String,
    /// OpenAI-compatible endpoint root
    pub base_url: String,
    /// Model used when the CLI does not name one
    pub model: String,
    /// Per-request timeout enforced by the HTTP client
    pub timeout: Duration,
}

impl Settings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env_var("API_KEY")
            .or_else(|| env_var("OPENAI_API_KEY"))
            .context("API_KEY (or OPENAI_API_KEY) environment variable not set")?;

        let base_url = env_var("BASE_URL")
            .or_else(|| env_var("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = env_var("MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match env_var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create with custom settings
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// How stage outputs are requested and interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Free text, parsed locally
    #[default]
    Permissive,
    /// Schema-validated objects from the provider
    Structured,
}

/// Per-run configuration
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub model: String,
    /// Caller-supplied constraint; may be absent
    pub input: Option<String>,
    /// Number of angles and drafts
    pub k: usize,
    pub mode: OutputMode,
    /// Thread the template output into the context prompt
    pub ground_context: bool,
    pub run_dir: PathBuf,
}

impl RunConfig {
    pub fn constraint(&self) -> &str {
        self.input.as_deref().unwrap_or("")
    }
}
