use serde_json::Value;
use tracing::debug;

use crate::llm::{adapt, GenerationRequest, Generator, LlmError, OutputSource};

/// Primary value and reasoning recovered from one generation call
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Primary value, not yet coerced to the stage's text or list form
    pub value: Value,
    /// Where the primary value was found in the raw result
    pub source: OutputSource,
    pub reasoning: Option<String>,
}

/// Run one generation call and normalize its shape.
///
/// No retries: a failed call is returned as-is.
pub async fn run_stage<G: Generator + ?Sized>(
    generator: &G,
    request: &GenerationRequest,
) -> Result<StageOutput, LlmError> {
    let generation = generator.generate(request).await?;
    let (value, source, reasoning) = adapt(generation, request.shape);

    debug!(
        "output source={:?}, reasoning={}",
        source,
        reasoning.is_some()
    );

    Ok(StageOutput {
        value,
        source,
        reasoning,
    })
}
