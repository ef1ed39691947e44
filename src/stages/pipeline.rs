use serde_json::{json, Value};
use tracing::info;

use super::run_stage;
use crate::config::{OutputMode, RunConfig};
use crate::error::PipelineError;
use crate::extract::{
    canonical_json, coerce_list, coerce_text, enforce_count, format_numbered_list,
};
use crate::io::RunLog;
use crate::llm::{
    system_prompt, GenerationRequest, Generator, OutputShape, PromptRenderer, RenderError,
};
use crate::models::{RunSummary, Stage, StageResult, StageValue, StructuredKind};

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of angles and drafts requested
    pub k: usize,
    pub mode: OutputMode,
    /// Feed the template output into the context prompt
    pub ground_context: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: 4,
            mode: OutputMode::Permissive,
            ground_context: false,
        }
    }
}

impl From<&RunConfig> for PipelineConfig {
    fn from(config: &RunConfig) -> Self {
        Self {
            k: config.k,
            mode: config.mode,
            ground_context: config.ground_context,
        }
    }
}

/// Five-stage joke pipeline:
/// template -> context -> angles -> drafts -> selection.
///
/// Stages run strictly in order. Each stage's result is written to the run
/// log before the next prompt is rendered.
pub struct Pipeline<G, L> {
    generator: G,
    run_log: L,
    renderer: PromptRenderer,
    config: PipelineConfig,
}

impl<G: Generator, L: RunLog> Pipeline<G, L> {
    pub fn new(generator: G, run_log: L, config: PipelineConfig) -> Self {
        Self {
            generator,
            run_log,
            renderer: PromptRenderer::new(),
            config,
        }
    }

    /// Run all five stages for a constraint
    pub async fn run(&self, constraint: &str) -> Result<RunSummary, PipelineError> {
        let k = self.config.k;
        info!(
            "starting pipeline with k={} mode={:?} ground_context={}",
            k, self.config.mode, self.config.ground_context
        );

        let prompt = rendered(Stage::Template, self.renderer.template_prompt(constraint))?;
        let template = text_value(self.execute(Stage::Template, prompt).await?.content);

        let grounding = self.config.ground_context.then_some(template.as_str());
        let prompt = rendered(
            Stage::Context,
            self.renderer.context_prompt(constraint, grounding),
        )?;
        let context = text_value(self.execute(Stage::Context, prompt).await?.content);

        let prompt = match self.config.mode {
            OutputMode::Permissive => self.renderer.angles_prompt(k, &context),
            OutputMode::Structured => self.renderer.structured_angles_prompt(k, &template, &context),
        };
        let StageResult {
            content,
            structured: associations,
            ..
        } = self.execute(Stage::Angles, rendered(Stage::Angles, prompt)?).await?;
        let angles = list_value(content);

        let prompt = match &associations {
            Some(associations) => self.renderer.structured_drafts_prompt(
                k,
                &template,
                &context,
                &canonical_json(associations),
            ),
            None => self
                .renderer
                .drafts_prompt(k, &template, &format_numbered_list(&angles)),
        };
        let StageResult {
            content,
            structured: jokes,
            ..
        } = self.execute(Stage::Drafts, rendered(Stage::Drafts, prompt)?).await?;
        let drafts = list_value(content);

        let prompt = match &jokes {
            Some(jokes) => self.renderer.structured_selection_prompt(
                constraint,
                &template,
                &context,
                &canonical_json(jokes),
            ),
            None => self
                .renderer
                .selection_prompt(constraint, &format_numbered_list(&drafts)),
        };
        let selection = text_value(
            self.execute(Stage::Selection, rendered(Stage::Selection, prompt)?)
                .await?
                .content,
        );

        info!("pipeline complete: {} angles, {} drafts", angles.len(), drafts.len());

        Ok(RunSummary {
            template,
            context,
            angles,
            drafts,
            selection,
        })
    }

    fn shape(&self, stage: Stage) -> OutputShape {
        match self.config.mode {
            OutputMode::Structured => OutputShape::Structured(StructuredKind::for_stage(stage)),
            OutputMode::Permissive if stage.is_list() => OutputShape::List,
            OutputMode::Permissive => OutputShape::Text,
        }
    }

    /// Generate, coerce and log one stage
    async fn execute(&self, stage: Stage, prompt: String) -> Result<StageResult, PipelineError> {
        info!("Stage {}: generating", stage);

        let request = GenerationRequest {
            system: system_prompt(stage, self.config.mode),
            prompt,
            shape: self.shape(stage),
        };

        let output = run_stage(&self.generator, &request)
            .await
            .map_err(|source| PipelineError::Generation { stage, source })?;

        let result = match self.config.mode {
            OutputMode::Permissive => {
                let content = if stage.is_list() {
                    StageValue::List(coerce_list(stage.name(), &output.value, self.config.k).items)
                } else {
                    StageValue::Text(coerce_text(&output.value))
                };
                StageResult {
                    stage,
                    content,
                    reasoning_content: output.reasoning,
                    structured: None,
                }
            }
            OutputMode::Structured => {
                let kind = StructuredKind::for_stage(stage);
                let malformed = |e: serde_json::Error| PipelineError::MalformedOutput {
                    stage,
                    schema: kind.name(),
                    reason: e.to_string(),
                };
                let mut structured = kind.normalize(&output.value).map_err(malformed)?;
                let content = match kind.to_stage_value(&structured).map_err(malformed)? {
                    StageValue::List(items) => {
                        let outcome = enforce_count(stage.name(), items, self.config.k);
                        // Keep the structured items aligned with the truncated list
                        if let Some(Value::Array(entries)) =
                            kind.list_field().and_then(|field| structured.get_mut(field))
                        {
                            entries.truncate(outcome.items.len());
                        }
                        StageValue::List(outcome.items)
                    }
                    text => text,
                };
                StageResult {
                    stage,
                    content,
                    reasoning_content: output.reasoning,
                    structured: Some(structured),
                }
            }
        };

        self.run_log
            .log_step(
                stage.name(),
                result.log_payload(),
                Some(json!({ "prompt": request.prompt })),
            )
            .map_err(|source| PipelineError::RunLog { stage, source })?;

        Ok(result)
    }
}

fn rendered(stage: Stage, prompt: Result<String, RenderError>) -> Result<String, PipelineError> {
    prompt.map_err(|source| PipelineError::Render { stage, source })
}

fn text_value(content: StageValue) -> String {
    match content {
        StageValue::Text(text) => text,
        StageValue::List(items) => format_numbered_list(&items),
    }
}

fn list_value(content: StageValue) -> Vec<String> {
    match content {
        StageValue::List(items) => items,
        StageValue::Text(text) => vec![text],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::{Generation, LlmError};
    use crate::testing::{MemoryRunLog, ScriptedGenerator};
    use serde_json::json;

    const TEMPLATE: &str = "Write a one-liner about cats.";
    const CONTEXT: &str = "Cats: aloof, nap-heavy, knock things off tables.";

    fn cats_generator() -> Arc<ScriptedGenerator> {
        Arc::new(ScriptedGenerator::new(vec![
            Ok(Generation::text(TEMPLATE)),
            Ok(Generation::text(CONTEXT).with_thinking("considering cats")),
            Ok(Generation::text("1. Cats as landlords\n2. Gravity experiments")),
            Ok(Generation::text(
                "```\n1. My cat charges rent in dead mice.\n2. My cat tests gravity daily; results pending.\n```",
            )),
            Ok(Generation::text("My cat charges rent in dead mice.")),
        ]))
    }

    fn pipeline(
        generator: &Arc<ScriptedGenerator>,
        log: &Arc<MemoryRunLog>,
        config: PipelineConfig,
    ) -> Pipeline<Arc<ScriptedGenerator>, Arc<MemoryRunLog>> {
        Pipeline::new(Arc::clone(generator), Arc::clone(log), config)
    }

    fn config(k: usize) -> PipelineConfig {
        PipelineConfig {
            k,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_permissive() {
        let generator = cats_generator();
        let log = Arc::new(MemoryRunLog::default());

        let summary = pipeline(&generator, &log, config(2)).run("cats").await.unwrap();

        assert_eq!(summary.template, TEMPLATE);
        assert_eq!(summary.context, CONTEXT);
        assert_eq!(summary.angles, vec!["Cats as landlords", "Gravity experiments"]);
        assert_eq!(summary.drafts.len(), 2);
        assert_eq!(summary.drafts[0], "My cat charges rent in dead mice.");
        assert_eq!(summary.selection, "My cat charges rent in dead mice.");

        assert_eq!(
            log.step_names(),
            vec!["template", "context", "angles", "drafts", "selection"]
        );
    }

    #[tokio::test]
    async fn test_prompts_thread_outputs_forward() {
        let generator = cats_generator();
        let log = Arc::new(MemoryRunLog::default());

        pipeline(&generator, &log, config(2)).run("cats").await.unwrap();

        let requests = generator.requests();
        assert_eq!(requests.len(), 5);
        assert!(!requests[1].prompt.contains(TEMPLATE));
        assert!(requests[2].prompt.contains(CONTEXT));
        assert!(requests[2].prompt.contains("Generate exactly 2 ANGLES"));
        assert!(requests[3].prompt.contains(TEMPLATE));
        assert!(requests[3]
            .prompt
            .contains("1. Cats as landlords\n2. Gravity experiments"));
        assert!(requests[4]
            .prompt
            .contains("1. My cat charges rent in dead mice.\n2. My cat tests gravity daily"));
        assert_eq!(requests[2].shape, OutputShape::List);
        assert_eq!(requests[4].shape, OutputShape::Text);

        let steps = log.steps();
        assert_eq!(steps[1].payload["reasoning_content"], json!("considering cats"));
        assert_eq!(
            steps[3].meta.as_ref().unwrap()["prompt"],
            json!(requests[3].prompt)
        );
    }

    #[tokio::test]
    async fn test_grounded_context_receives_template() {
        let generator = cats_generator();
        let log = Arc::new(MemoryRunLog::default());
        let config = PipelineConfig {
            k: 2,
            ground_context: true,
            ..Default::default()
        };

        pipeline(&generator, &log, config).run("cats").await.unwrap();

        let requests = generator.requests();
        assert!(requests[1].prompt.contains(TEMPLATE));
    }

    #[tokio::test]
    async fn test_list_count_mismatch_degrades() {
        let generator = Arc::new(ScriptedGenerator::texts(&[
            "template",
            "context",
            "1. a\n2. b\n3. c\n4. d\n5. e",
            "- only one",
            "only one",
        ]));
        let log = Arc::new(MemoryRunLog::default());

        let summary = pipeline(&generator, &log, config(3)).run("").await.unwrap();

        assert_eq!(summary.angles, vec!["a", "b", "c"]);
        assert_eq!(summary.drafts, vec!["only one"]);
        assert!(generator.requests()[0].prompt.contains("[NO INPUT PROVIDED]"));
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_run() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(Generation::text("template")),
            Ok(Generation::text("context")),
            Ok(Generation::text("1. a\n2. b")),
            Err(LlmError::Provider {
                status: 429,
                body: "rate limited".to_string(),
            }),
        ]));
        let log = Arc::new(MemoryRunLog::default());

        let err = pipeline(&generator, &log, config(2)).run("cats").await.unwrap_err();

        assert_eq!(err.stage(), Stage::Drafts);
        assert!(!err.is_malformed_output());
        assert_eq!(log.step_names(), vec!["template", "context", "angles"]);
        assert_eq!(generator.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_log_failure_aborts_run() {
        let generator = cats_generator();
        let log = Arc::new(MemoryRunLog::failing_on("context"));

        let err = pipeline(&generator, &log, config(2)).run("cats").await.unwrap_err();

        assert!(matches!(err, PipelineError::RunLog { stage: Stage::Context, .. }));
        assert_eq!(generator.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_structured() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(Generation {
                output: json!({
                    "input_summary": "cats",
                    "constraint": "a joke about cats",
                    "template": "one-liner",
                    "humor_mechanics": ["irony"],
                    "tone": ["dry"],
                    "avoidances": []
                }),
                metadata: Default::default(),
            }),
            Ok(Generation {
                output: json!({"output": {
                    "topic_summary": "cats",
                    "key_facts": [],
                    "cultural_context": [],
                    "comedic_angles": [],
                    "risk_notes": []
                }}),
                metadata: Default::default(),
            }),
            Ok(Generation {
                output: json!({"associations": [
                    {"association_id": "A1", "title": "Rent", "premise": "Cats as landlords", "twist": ""},
                    {"association_id": "A2", "title": "Physics", "premise": "Gravity tests", "twist": ""},
                    {"association_id": "A3", "title": "Extra", "premise": "Dropped", "twist": ""}
                ]}),
                metadata: Default::default(),
            }),
            Ok(Generation {
                output: json!({"jokes": [
                    {"joke_id": "J1", "text": "Rent is due in mice.", "angle": "A1"},
                    {"joke_id": "J2", "text": "The vase had it coming.", "angle": "A2"}
                ]}),
                metadata: Default::default(),
            }),
            Ok(Generation {
                output: json!({"best_id": "J2", "best_text": "The vase had it coming.", "rubric_summary": "crisp"}),
                metadata: Default::default(),
            }),
        ]));
        let log = Arc::new(MemoryRunLog::default());
        let config = PipelineConfig {
            k: 2,
            mode: OutputMode::Structured,
            ground_context: false,
        };

        let summary = pipeline(&generator, &log, config).run("cats").await.unwrap();

        assert!(summary.template.contains(r#""template":"one-liner""#));
        assert!(summary.context.contains(r#""topic_summary":"cats""#));
        assert_eq!(summary.angles, vec!["Rent: Cats as landlords", "Physics: Gravity tests"]);
        assert_eq!(summary.drafts, vec!["Rent is due in mice.", "The vase had it coming."]);
        assert_eq!(summary.selection, "The vase had it coming.");

        let requests = generator.requests();
        assert_eq!(
            requests[4].shape,
            OutputShape::Structured(StructuredKind::JokeSelection)
        );
        assert!(requests[2].prompt.contains("Use association_id A1..A2."));
        assert!(requests[2].prompt.contains(r#""template":"one-liner""#));
        assert!(requests[3].prompt.contains("Use joke_id J1..J2."));
        assert!(requests[3].prompt.contains(r#""association_id":"A1""#));
        assert!(requests[3].prompt.contains(r#""association_id":"A2""#));
        assert!(!requests[3].prompt.contains(r#""association_id":"A3""#));
        assert!(requests[4].prompt.contains(r#""joke_id":"J1""#));
        assert!(requests[4].prompt.contains(r#""angle":"A2""#));
        assert!(!requests[4].system.contains("Output ONLY the winning joke text"));

        let steps = log.steps();
        assert_eq!(
            steps[2].payload["structured"]["associations"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert!(steps[4].payload["structured"]["best_id"] == json!("J2"));
    }

    #[tokio::test]
    async fn test_structured_schema_mismatch_is_malformed() {
        let generator = Arc::new(ScriptedGenerator::texts(&["not an object"]));
        let log = Arc::new(MemoryRunLog::default());
        let config = PipelineConfig {
            k: 2,
            mode: OutputMode::Structured,
            ground_context: false,
        };

        let err = pipeline(&generator, &log, config).run("cats").await.unwrap_err();

        assert!(err.is_malformed_output());
        assert_eq!(err.stage(), Stage::Template);
        assert!(log.steps().is_empty());
    }
}
