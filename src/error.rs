use thiserror::Error;

use crate::llm::{LlmError, RenderError};
use crate::models::Stage;

/// Fatal pipeline failures. None of these are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generation call failed (transport, provider, timeout, refusal)
    #[error("{stage} stage generation failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    /// The output could not be read as the stage's declared schema
    #[error("{stage} stage returned output that does not match {schema}: {reason}")]
    MalformedOutput {
        stage: Stage,
        schema: &'static str,
        reason: String,
    },

    #[error("failed to render {stage} prompt: {source}")]
    Render {
        stage: Stage,
        #[source]
        source: RenderError,
    },

    /// The run log could not be written; every stage must be auditable
    #[error("failed to record {stage} stage in the run log: {source}")]
    RunLog {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Generation { stage, .. }
            | PipelineError::MalformedOutput { stage, .. }
            | PipelineError::Render { stage, .. }
            | PipelineError::RunLog { stage, .. } => *stage,
        }
    }

    /// The model refused or mis-formatted its output
    pub fn is_malformed_output(&self) -> bool {
        match self {
            PipelineError::MalformedOutput { .. } => true,
            PipelineError::Generation { source, .. } => source.is_malformed_output(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_output_classification() {
        let transport = PipelineError::Generation {
            stage: Stage::Angles,
            source: LlmError::Transport("connection reset".to_string()),
        };
        assert!(!transport.is_malformed_output());
        assert_eq!(transport.stage(), Stage::Angles);

        let refused = PipelineError::Generation {
            stage: Stage::Selection,
            source: LlmError::MalformedOutput("refused".to_string()),
        };
        assert!(refused.is_malformed_output());

        let schema = PipelineError::MalformedOutput {
            stage: Stage::Drafts,
            schema: "JokeDraftSet",
            reason: "missing field `jokes`".to_string(),
        };
        assert!(schema.is_malformed_output());
        assert!(schema.to_string().starts_with("drafts stage returned output"));
    }
}
