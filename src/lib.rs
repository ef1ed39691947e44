pub mod config;
pub mod error;
pub mod extract;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{OutputMode, RunConfig, Settings};
pub use error::PipelineError;
pub use extract::{coerce_list, extract_list, normalize_input, ListOutcome};
pub use io::{JsonlRunLogger, LoggingContext, RunLog};
pub use llm::{Generation, GenerationRequest, Generator, LlmError, OpenAiClient, OutputShape};
pub use models::{RunSummary, Stage, StageResult, StageValue};
pub use stages::{run_stage, Pipeline, PipelineConfig};
