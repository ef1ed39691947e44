//! In-memory collaborators for tests.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::io::RunLog;
use crate::llm::{Generation, GenerationRequest, Generator, LlmError};

/// Replays canned responses in order and records every request
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<Generation, LlmError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<Generation, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One plain-text response per call
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(Generation::text(*t))).collect())
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// A recorded `log_step` call
#[derive(Debug, Clone)]
pub struct LoggedStep {
    pub step: String,
    pub payload: Value,
    pub meta: Option<Value>,
}

/// Keeps log records in memory; can be told to fail on a given step
#[derive(Default)]
pub struct MemoryRunLog {
    steps: Mutex<Vec<LoggedStep>>,
    fail_on: Option<String>,
}

impl MemoryRunLog {
    pub fn failing_on(step: &str) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            fail_on: Some(step.to_string()),
        }
    }

    pub fn steps(&self) -> Vec<LoggedStep> {
        self.steps.lock().unwrap().clone()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps().into_iter().map(|s| s.step).collect()
    }
}

impl RunLog for MemoryRunLog {
    fn log_step(&self, step: &str, payload: Value, meta: Option<Value>) -> io::Result<()> {
        if self.fail_on.as_deref() == Some(step) {
            return Err(io::Error::other("disk full"));
        }
        self.steps.lock().unwrap().push(LoggedStep {
            step: step.to_string(),
            payload,
            meta,
        });
        Ok(())
    }
}

/// Collects formatted tracing output written while a closure runs
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Run `f` under a scoped WARN-level subscriber and return what it logged
    pub fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (result, output)
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
