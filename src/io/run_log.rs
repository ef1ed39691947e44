use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Append-only record of every pipeline step
pub trait RunLog: Send + Sync {
    /// Append one record. A failure here aborts the run.
    fn log_step(&self, step: &str, payload: Value, meta: Option<Value>) -> std::io::Result<()>;
}

impl<T: RunLog + ?Sized> RunLog for std::sync::Arc<T> {
    fn log_step(&self, step: &str, payload: Value, meta: Option<Value>) -> std::io::Result<()> {
        (**self).log_step(step, payload, meta)
    }
}

/// Serialize a payload best-effort; a schema mismatch never fails the log call
pub fn to_payload<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload)
        .unwrap_or_else(|e| json!({ "serialization_error": e.to_string() }))
}

/// One line of `artifacts.jsonl`
#[derive(Debug, Serialize)]
struct StepRecord<'a> {
    timestamp: String,
    run_id: Uuid,
    step: &'a str,
    payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<Value>,
}

/// Writes one JSON object per line to `<run_dir>/artifacts.jsonl`.
///
/// The file is opened and closed for each record, so no handle is held
/// between stages.
#[derive(Debug, Clone)]
pub struct JsonlRunLogger {
    path: PathBuf,
    run_id: Uuid,
}

impl JsonlRunLogger {
    pub const FILE_NAME: &'static str = "artifacts.jsonl";

    pub fn new(run_dir: &Path, run_id: Uuid) -> Self {
        Self {
            path: run_dir.join(Self::FILE_NAME),
            run_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLog for JsonlRunLogger {
    fn log_step(&self, step: &str, payload: Value, meta: Option<Value>) -> std::io::Result<()> {
        let record = StepRecord {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id,
            step,
            payload,
            meta,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        info!("logged step={}", step);
        Ok(())
    }
}
