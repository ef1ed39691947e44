use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// End-to-end artifacts captured for a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Writing instruction derived from the constraint
    pub template: String,
    /// Exploratory context text
    pub context: String,
    /// Brainstormed angles, at most `k`
    pub angles: Vec<String>,
    /// Drafted jokes, at most `k`, positionally matched to angles
    pub drafts: Vec<String>,
    /// The winning joke text
    pub selection: String,
}

impl RunSummary {
    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}
