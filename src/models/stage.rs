use std::fmt;

use serde::{Deserialize, Serialize};

/// The five pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Turn the constraint into a writing instruction
    Template,
    /// Exploratory pre-writing about the constraint
    Context,
    /// Brainstorm `k` angles
    Angles,
    /// Draft one joke per angle
    Drafts,
    /// Pick the winning draft
    Selection,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Template,
        Stage::Context,
        Stage::Angles,
        Stage::Drafts,
        Stage::Selection,
    ];

    /// Step name used in run artifacts
    pub fn name(self) -> &'static str {
        match self {
            Stage::Template => "template",
            Stage::Context => "context",
            Stage::Angles => "angles",
            Stage::Drafts => "drafts",
            Stage::Selection => "selection",
        }
    }

    /// Whether the stage produces a list of `k` items
    pub fn is_list(self) -> bool {
        matches!(self, Stage::Angles | Stage::Drafts)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary value of a stage after coercion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageValue {
    Text(String),
    List(Vec<String>),
}

/// Output of one stage, as recorded in the run log
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    /// Primary value (text or list)
    pub content: StageValue,
    /// Reasoning text the provider attached, if any
    pub reasoning_content: Option<String>,
    /// Validated structured object, when running in structured mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl StageResult {
    /// Payload persisted for this stage
    pub fn log_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "content": self.content,
            "reasoning_content": self.reasoning_content,
        });
        if let Some(structured) = &self.structured {
            payload["structured"] = structured.clone();
        }
        payload
    }
}
