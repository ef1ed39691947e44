use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::config::OutputMode;
use crate::extract::normalize_input;
use crate::models::{Stage, StructuredKind};

/// `{{ name }}` placeholders
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("PLACEHOLDER_RE regex should compile")
});

pub const TEMPLATE_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
Your job is to turn a user constraint into a single, clear, imperative writing instruction a comedian could follow.
Do NOT write jokes yet. Be specific, operational, and short."#;

pub const CONTEXT_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
You explore meanings, cultural links, wordplay opportunities, stereotypes, and surprising connections.
Be expansive and exploratory. It's okay to think step-by-step. Do NOT draft jokes yet."#;

pub const ANGLES_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
Your task is brainstorming angles.
Generate diverse, non-overlapping angles that could plausibly yield a strong punchline.
You MUST output a list of texts only."#;

pub const DRAFTS_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
You write finished jokes with punchlines, not premises.
Follow the given template strictly.
You MUST output a list of texts only."#;

pub const SELECTION_SYSTEM_PROMPT: &str = r#"You are a strict annotator.
Your task is to evaluate jokes.
You will be given:
- the original constraint
- a list of drafted jokes
Rate the jokes according to given criteria, think step by step.
Output ONLY the winning joke text."#;

pub const STRUCTURED_ANGLES_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
Your task is brainstorming narrative associations.
Each association must be distinct and tightly linked to the context analysis.
Keep outputs compact and focused."#;

pub const STRUCTURED_DRAFTS_SYSTEM_PROMPT: &str = r#"You are a comedy writer.
You write finished jokes with punchlines, not premises.
Each joke must be traceable to exactly one association."#;

pub const STRUCTURED_SELECTION_SYSTEM_PROMPT: &str = r#"You are a strict annotator.
Your task is to evaluate jokes.
Score each joke on readability, novelty, relevance and funniness (1-5), then select the best one.
Copy the winning joke's text verbatim."#;

const TEMPLATE_USER_PROMPT: &str = r#"<constraint>
{{ constraint }}
</constraint>

Write ONE imperative template instruction (1-4 sentences). It must specify:
- the joke format (one-liner / two-liner / news headline parody / etc.)
- hard constraints (exact words to include, taboo level, POV, length limit)

Output only the template instruction, nothing else.
"#;

const CONTEXT_USER_PROMPT: &str = r#"<constraint>
{{ constraint }}
</constraint>

Write a prewriting exploration with headings (plain text):
- Literal decoding (what is being asked, what must be included)
- Word / phrase analysis (meanings, double meanings, nearby phrases, collocations, homophones)
- Cultural hooks (memes, current / historical context, stereotypes, common tropes)
- Tension points (what could be incongruous, benign violation, status reversals, anxieties)

No jokes. No lists of final outputs yet -- just exploration.
"#;

const CONTEXT_GROUNDED_USER_PROMPT: &str = r#"<constraint>
{{ constraint }}
</constraint>

<template>
{{ template }}
</template>

Write a prewriting exploration with headings (plain text), grounded in the constraint and the template above:
- Literal decoding (what is being asked, what must be included)
- Word / phrase analysis (meanings, double meanings, nearby phrases, collocations, homophones)
- Cultural hooks (memes, current / historical context, stereotypes, common tropes)
- Tension points (what could be incongruous, benign violation, status reversals, anxieties)

No jokes. No lists of final outputs yet -- just exploration.
"#;

const ANGLES_USER_PROMPT: &str = r#"<context>
{{ context }}
</context>

Generate exactly {{ k }} ANGLES as a numbered list.
Rules:
- Each item is 1-2 lines max.
- Each item must be an angle / narrative / relationship / association, not a joke.
- Each item can use a comedic mechanism like misdirection, irony, analogy, benign violation, wordplay, etc.
- Avoid duplicates; force different contexts.
"#;

const DRAFTS_USER_PROMPT: &str = r#"<template>
{{ template }}
</template>

<angles>
{{ angles }}
</angles>

Write {{ k }} drafts, one per angle, as a numbered list 1..{{ k }}.
Rules:
- Must have a clear punchline, expanding the respective angle.
- Must adhere to the given template.
- Each draft must be 1-2 sentences max, unless the template demands otherwise.
- No explanations, no labels, no commentary -- just the joke text per line.
"#;

const SELECTION_USER_PROMPT: &str = r#"<constraint>
{{ constraint }}
</constraint>

<drafts>
{{ drafts }}
</drafts>

Rate the jokes according to this rubric (in this order):
1) Adheres perfectly to the constraint (especially exact words/themes/format).
2) Feels human-written (not "template-y", not generic, not vibe-y, not obviously LLM).
3) Novelty / originality (not a common stock joke).
4) Funny to a general audience (at least one clear humor mechanism: incongruity, irony, reversal, benign violation, wordplay, etc.)

Output ONLY the winning joke text. Nothing else.
"#;

const STRUCTURED_ANGLES_USER_PROMPT: &str = r#"Template analysis JSON:
{{ template }}

Context analysis JSON:
{{ context }}

Generate exactly {{ k }} associations. Use association_id A1..A{{ k }}.
Each association needs a title, a premise, its connection to the context and a twist.
Avoid duplicates; force different contexts.
"#;

const STRUCTURED_DRAFTS_USER_PROMPT: &str = r#"Template analysis JSON:
{{ template }}

Context analysis JSON:
{{ context }}

Associations JSON:
{{ associations }}

Draft exactly {{ k }} jokes. Use joke_id J1..J{{ k }}.
Each joke must expand one association: set angle to that association_id.
Each joke needs a clear punchline and must adhere to the template.
Give a one-line rationale per joke.
"#;

const STRUCTURED_SELECTION_USER_PROMPT: &str = r#"<constraint>
{{ constraint }}
</constraint>

Template analysis JSON:
{{ template }}

Context analysis JSON:
{{ context }}

Drafts JSON:
{{ drafts }}

Rubric:
- readability: clear and easy to parse
- novelty: unexpected or fresh angle
- relevance: fits the constraint
- funniness: comedic impact

Score every joke_id. best_id must match a joke_id from the drafts and best_text must be that joke's text, verbatim.
"#;

/// Prompt rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown prompt template: {0}")]
    UnknownTemplate(String),
    #[error("prompt template {template} references undefined variable {variable}")]
    MissingVariable { template: String, variable: String },
}

/// Renders named user-prompt templates with strict variable substitution
pub struct PromptRenderer {
    templates: HashMap<&'static str, &'static str>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let templates = HashMap::from([
            ("template", TEMPLATE_USER_PROMPT),
            ("context", CONTEXT_USER_PROMPT),
            ("context_grounded", CONTEXT_GROUNDED_USER_PROMPT),
            ("angles", ANGLES_USER_PROMPT),
            ("drafts", DRAFTS_USER_PROMPT),
            ("selection", SELECTION_USER_PROMPT),
            ("angles_structured", STRUCTURED_ANGLES_USER_PROMPT),
            ("drafts_structured", STRUCTURED_DRAFTS_USER_PROMPT),
            ("selection_structured", STRUCTURED_SELECTION_USER_PROMPT),
        ]);
        Self { templates }
    }

    /// Render a named template. Every placeholder must have a value.
    pub fn render(&self, name: &str, vars: &HashMap<&str, String>) -> Result<String, RenderError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| RenderError::UnknownTemplate(name.to_string()))?;

        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(template) {
            let (Some(whole), Some(var)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = vars.get(var.as_str()).ok_or_else(|| RenderError::MissingVariable {
                template: name.to_string(),
                variable: var.as_str().to_string(),
            })?;
            rendered.push_str(&template[last..whole.start()]);
            rendered.push_str(value);
            last = whole.end();
        }
        rendered.push_str(&template[last..]);

        Ok(rendered)
    }

    pub fn template_prompt(&self, constraint: &str) -> Result<String, RenderError> {
        self.render(
            "template",
            &HashMap::from([("constraint", normalize_input(constraint))]),
        )
    }

    /// Context prompt, optionally grounded in the template stage output
    pub fn context_prompt(
        &self,
        constraint: &str,
        template: Option<&str>,
    ) -> Result<String, RenderError> {
        match template {
            Some(template) => self.render(
                "context_grounded",
                &HashMap::from([
                    ("constraint", normalize_input(constraint)),
                    ("template", normalize_input(template)),
                ]),
            ),
            None => self.render(
                "context",
                &HashMap::from([("constraint", normalize_input(constraint))]),
            ),
        }
    }

    pub fn angles_prompt(&self, k: usize, context: &str) -> Result<String, RenderError> {
        self.render(
            "angles",
            &HashMap::from([("k", k.to_string()), ("context", normalize_input(context))]),
        )
    }

    /// `angles` is the numbered rendering of the angle list
    pub fn drafts_prompt(&self, k: usize, template: &str, angles: &str) -> Result<String, RenderError> {
        self.render(
            "drafts",
            &HashMap::from([
                ("k", k.to_string()),
                ("template", normalize_input(template)),
                ("angles", normalize_input(angles)),
            ]),
        )
    }

    /// Angles prompt for structured mode; analyses are passed as JSON
    pub fn structured_angles_prompt(
        &self,
        k: usize,
        template: &str,
        context: &str,
    ) -> Result<String, RenderError> {
        self.render(
            "angles_structured",
            &HashMap::from([
                ("k", k.to_string()),
                ("template", normalize_input(template)),
                ("context", normalize_input(context)),
            ]),
        )
    }

    /// Drafts prompt for structured mode; `associations` is the association set JSON
    pub fn structured_drafts_prompt(
        &self,
        k: usize,
        template: &str,
        context: &str,
        associations: &str,
    ) -> Result<String, RenderError> {
        self.render(
            "drafts_structured",
            &HashMap::from([
                ("k", k.to_string()),
                ("template", normalize_input(template)),
                ("context", normalize_input(context)),
                ("associations", normalize_input(associations)),
            ]),
        )
    }

    /// Selection prompt for structured mode; `drafts` is the draft set JSON
    pub fn structured_selection_prompt(
        &self,
        constraint: &str,
        template: &str,
        context: &str,
        drafts: &str,
    ) -> Result<String, RenderError> {
        self.render(
            "selection_structured",
            &HashMap::from([
                ("constraint", normalize_input(constraint)),
                ("template", normalize_input(template)),
                ("context", normalize_input(context)),
                ("drafts", normalize_input(drafts)),
            ]),
        )
    }

    /// `drafts` is the numbered rendering of the draft list
    pub fn selection_prompt(&self, constraint: &str, drafts: &str) -> Result<String, RenderError> {
        self.render(
            "selection",
            &HashMap::from([
                ("constraint", normalize_input(constraint)),
                ("drafts", normalize_input(drafts)),
            ]),
        )
    }
}

/// System instruction for a stage
pub fn system_prompt(stage: Stage, mode: OutputMode) -> String {
    match (mode, stage) {
        (OutputMode::Permissive, Stage::Template) => TEMPLATE_SYSTEM_PROMPT.to_string(),
        (OutputMode::Permissive, Stage::Context) => CONTEXT_SYSTEM_PROMPT.to_string(),
        (OutputMode::Permissive, Stage::Angles) => ANGLES_SYSTEM_PROMPT.to_string(),
        (OutputMode::Permissive, Stage::Drafts) => DRAFTS_SYSTEM_PROMPT.to_string(),
        (OutputMode::Permissive, Stage::Selection) => SELECTION_SYSTEM_PROMPT.to_string(),
        (OutputMode::Structured, stage) => {
            let base = match stage {
                Stage::Template => TEMPLATE_SYSTEM_PROMPT,
                Stage::Context => CONTEXT_SYSTEM_PROMPT,
                Stage::Angles => STRUCTURED_ANGLES_SYSTEM_PROMPT,
                Stage::Drafts => STRUCTURED_DRAFTS_SYSTEM_PROMPT,
                Stage::Selection => STRUCTURED_SELECTION_SYSTEM_PROMPT,
            };
            format!(
                "{}\n\nRespond with a single JSON object matching the {} schema.",
                base,
                StructuredKind::for_stage(stage).name()
            )
        }
    }
}
