use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::canonical_json;
use crate::models::{Stage, StageValue};

/// Template-level analysis of the constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateAnalysis {
    pub input_summary: String,
    /// Normalized, explicit constraint
    pub constraint: String,
    /// Short description of the joke format
    pub template: String,
    #[serde(default)]
    pub humor_mechanics: Vec<String>,
    #[serde(default)]
    pub tone: Vec<String>,
    #[serde(default)]
    pub avoidances: Vec<String>,
}

/// Context analysis grounding the brainstorm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextAnalysis {
    pub topic_summary: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub cultural_context: Vec<String>,
    #[serde(default)]
    pub comedic_angles: Vec<String>,
    #[serde(default)]
    pub risk_notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub association_id: String,
    pub title: String,
    pub premise: String,
    /// How the premise ties back to the context
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub twist: String,
}

impl Association {
    /// One-line rendering used as an angle
    pub fn to_angle(&self) -> String {
        let mut angle = format!("{}: {}", self.title.trim(), self.premise.trim());
        if !self.twist.trim().is_empty() {
            angle.push_str(" Twist: ");
            angle.push_str(self.twist.trim());
        }
        angle
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationSet {
    pub associations: Vec<Association>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeDraft {
    pub joke_id: String,
    pub text: String,
    /// `association_id` of the association this joke expands
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeDraftSet {
    pub jokes: Vec<JokeDraft>,
}

/// Judge output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeSelection {
    /// Must match a `joke_id`
    pub best_id: String,
    /// Verbatim from the drafts
    pub best_text: String,
    #[serde(default)]
    pub rubric_summary: String,
    /// One entry per `joke_id`
    #[serde(default)]
    pub scores: Vec<JokeScore>,
}

/// Rubric scores for one draft, each 1-5
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeScore {
    pub joke_id: String,
    pub readability: u8,
    pub novelty: u8,
    pub relevance: u8,
    pub funniness: u8,
    #[serde(default)]
    pub notes: String,
}

/// Schema a stage declares when running in structured mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    TemplateAnalysis,
    ContextAnalysis,
    AssociationSet,
    JokeDraftSet,
    JokeSelection,
}

impl StructuredKind {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Template => StructuredKind::TemplateAnalysis,
            Stage::Context => StructuredKind::ContextAnalysis,
            Stage::Angles => StructuredKind::AssociationSet,
            Stage::Drafts => StructuredKind::JokeDraftSet,
            Stage::Selection => StructuredKind::JokeSelection,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StructuredKind::TemplateAnalysis => "TemplateAnalysis",
            StructuredKind::ContextAnalysis => "ContextAnalysis",
            StructuredKind::AssociationSet => "AssociationSet",
            StructuredKind::JokeDraftSet => "JokeDraftSet",
            StructuredKind::JokeSelection => "JokeSelection",
        }
    }

    /// Whether a value deserializes into this schema's model
    pub fn conforms(self, value: &Value) -> bool {
        self.to_stage_value(value).is_ok()
    }

    /// Round-trip a value through the model, dropping unknown fields
    pub fn normalize(self, value: &Value) -> Result<Value, serde_json::Error> {
        match self {
            StructuredKind::TemplateAnalysis => round_trip::<TemplateAnalysis>(value),
            StructuredKind::ContextAnalysis => round_trip::<ContextAnalysis>(value),
            StructuredKind::AssociationSet => round_trip::<AssociationSet>(value),
            StructuredKind::JokeDraftSet => round_trip::<JokeDraftSet>(value),
            StructuredKind::JokeSelection => round_trip::<JokeSelection>(value),
        }
    }

    /// Array field holding the items of a list-shaped schema
    pub fn list_field(self) -> Option<&'static str> {
        match self {
            StructuredKind::AssociationSet => Some("associations"),
            StructuredKind::JokeDraftSet => Some("jokes"),
            _ => None,
        }
    }

    /// Validate a value against the model and coerce it to a stage value.
    ///
    /// Analyses become canonical JSON text, associations become one angle
    /// line each, drafts become their joke texts and the selection becomes
    /// the winning text.
    pub fn to_stage_value(self, value: &Value) -> Result<StageValue, serde_json::Error> {
        Ok(match self {
            StructuredKind::TemplateAnalysis => {
                let parsed: TemplateAnalysis = serde_json::from_value(value.clone())?;
                StageValue::Text(canonical_json(&serde_json::to_value(parsed)?))
            }
            StructuredKind::ContextAnalysis => {
                let parsed: ContextAnalysis = serde_json::from_value(value.clone())?;
                StageValue::Text(canonical_json(&serde_json::to_value(parsed)?))
            }
            StructuredKind::AssociationSet => {
                let parsed: AssociationSet = serde_json::from_value(value.clone())?;
                StageValue::List(parsed.associations.iter().map(Association::to_angle).collect())
            }
            StructuredKind::JokeDraftSet => {
                let parsed: JokeDraftSet = serde_json::from_value(value.clone())?;
                StageValue::List(
                    parsed
                        .jokes
                        .into_iter()
                        .map(|joke| joke.text.trim().to_string())
                        .collect(),
                )
            }
            StructuredKind::JokeSelection => {
                let parsed: JokeSelection = serde_json::from_value(value.clone())?;
                StageValue::Text(parsed.best_text.trim().to_string())
            }
        })
    }

    /// JSON Schema sent to the provider
    pub fn schema(self) -> Value {
        match self {
            StructuredKind::TemplateAnalysis => object_schema(json!({
                "input_summary": {"type": "string"},
                "constraint": {"type": "string", "description": "Normalized, explicit constraint"},
                "template": {"type": "string", "description": "Short description of the joke format"},
                "humor_mechanics": string_array(),
                "tone": string_array(),
                "avoidances": string_array()
            })),
            StructuredKind::ContextAnalysis => object_schema(json!({
                "topic_summary": {"type": "string"},
                "key_facts": string_array(),
                "cultural_context": string_array(),
                "comedic_angles": string_array(),
                "risk_notes": string_array()
            })),
            StructuredKind::AssociationSet => object_schema(json!({
                "associations": {
                    "type": "array",
                    "items": object_schema(json!({
                        "association_id": {"type": "string"},
                        "title": {"type": "string"},
                        "premise": {"type": "string"},
                        "connection": {"type": "string"},
                        "twist": {"type": "string"}
                    }))
                }
            })),
            StructuredKind::JokeDraftSet => object_schema(json!({
                "jokes": {
                    "type": "array",
                    "items": object_schema(json!({
                        "joke_id": {"type": "string"},
                        "text": {"type": "string"},
                        "angle": {"type": "string", "description": "association_id the joke expands"},
                        "rationale": {"type": "string"}
                    }))
                }
            })),
            StructuredKind::JokeSelection => object_schema(json!({
                "best_id": {"type": "string", "description": "Must match a joke_id"},
                "best_text": {"type": "string", "description": "Verbatim from drafts"},
                "rubric_summary": {"type": "string"},
                "scores": {
                    "type": "array",
                    "items": object_schema(json!({
                        "joke_id": {"type": "string"},
                        "readability": {"type": "integer", "description": "1-5"},
                        "novelty": {"type": "integer", "description": "1-5"},
                        "relevance": {"type": "integer", "description": "1-5"},
                        "funniness": {"type": "integer", "description": "1-5"},
                        "notes": {"type": "string"}
                    }))
                }
            })),
        }
    }
}

fn round_trip<T: serde::de::DeserializeOwned + Serialize>(
    value: &Value,
) -> Result<Value, serde_json::Error> {
    let parsed: T = serde_json::from_value(value.clone())?;
    serde_json::to_value(parsed)
}

fn string_array() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

/// Strict object schema: every property required, nothing extra
fn object_schema(properties: Value) -> Value {
    let required: Vec<Value> = properties
        .as_object()
        .map(|props| props.keys().map(|k| Value::String(k.clone())).collect())
        .unwrap_or_default();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_association_set_to_angles() {
        let value = json!({
            "associations": [
                {"association_id": "A1", "title": "Naps", "premise": "Cats sleep all day", "twist": "They call it work"},
                {"association_id": "A2", "title": "Boxes", "premise": "Any box is a throne", "twist": ""}
            ]
        });
        let angles = StructuredKind::AssociationSet.to_stage_value(&value).unwrap();
        assert_eq!(
            angles,
            StageValue::List(vec![
                "Naps: Cats sleep all day Twist: They call it work".to_string(),
                "Boxes: Any box is a throne".to_string(),
            ])
        );
    }

    #[test]
    fn test_selection_to_text() {
        let value = json!({"best_id": "J2", "best_text": " The joke. ", "rubric_summary": "fine"});
        let text = StructuredKind::JokeSelection.to_stage_value(&value).unwrap();
        assert_eq!(text, StageValue::Text("The joke.".to_string()));
    }

    #[test]
    fn test_non_conforming_value() {
        assert!(!StructuredKind::JokeSelection.conforms(&json!("just text")));
        assert!(!StructuredKind::JokeDraftSet.conforms(&json!({"drafts": []})));
        assert!(StructuredKind::JokeDraftSet.conforms(&json!({"jokes": []})));
    }

    #[test]
    fn test_schema_is_strict() {
        let schema = StructuredKind::JokeSelection.schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
        assert_eq!(
            schema["properties"]["scores"]["items"]["additionalProperties"],
            json!(false)
        );
        assert_eq!(StructuredKind::for_stage(Stage::Drafts), StructuredKind::JokeDraftSet);
    }

    #[test]
    fn test_normalize_drops_unknown_fields() {
        let value = json!({
            "jokes": [{"joke_id": "J1", "text": "t", "angle": "A1", "mood": "smug"}],
            "extra": true
        });
        let normalized = StructuredKind::JokeDraftSet.normalize(&value).unwrap();
        assert_eq!(
            normalized,
            json!({"jokes": [{"joke_id": "J1", "text": "t", "angle": "A1", "rationale": ""}]})
        );
        assert_eq!(StructuredKind::JokeDraftSet.list_field(), Some("jokes"));
        assert_eq!(StructuredKind::JokeSelection.list_field(), None);
    }
}
