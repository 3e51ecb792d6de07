//! Variation generators.
//!
//! Pure functions that expand one task into a list of variations, either
//! along a single axis (model, thinking level, prompt framing) or across all
//! of them at once.

use super::plan::TaskSpec;
use super::variation::{ThinkingLevel, Variation};
use serde::{Deserialize, Serialize};

/// A named prompt framing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptVariant {
    pub id: String,
    pub label: Option<String>,
    pub additional_context: Option<String>,
    pub constraints: Vec<String>,
}

impl PromptVariant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    fn apply(&self, mut variation: Variation) -> Variation {
        if let Some(context) = &self.additional_context {
            variation = variation.with_additional_context(context.clone());
        }
        if !self.constraints.is_empty() {
            variation = variation.with_constraints(self.constraints.clone());
        }
        variation
    }
}

/// Axes for [`VariationFactory::hybrid`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub models: Vec<String>,
    pub thinking_levels: Vec<ThinkingLevel>,
    pub prompt_variants: Vec<PromptVariant>,
    pub max_combinations: Option<usize>,
}

/// Stateless variation generators
pub struct VariationFactory;

impl VariationFactory {
    /// One variation per model; label is the model name without its
    /// provider prefix, priority is the input position.
    pub fn by_model(task: &TaskSpec, models: &[String]) -> Vec<Variation> {
        models
            .iter()
            .enumerate()
            .map(|(i, model)| {
                Variation::new(format!("model-{i}"), model_label(model), priority(i))
                    .with_task(task.description.clone())
                    .with_model(model.clone())
            })
            .collect()
    }

    /// One variation per thinking level.
    pub fn by_thinking_level(task: &TaskSpec, levels: &[ThinkingLevel]) -> Vec<Variation> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                Variation::new(format!("thinking-{i}"), level.as_str(), priority(i))
                    .with_task(task.description.clone())
                    .with_thinking_level(*level)
            })
            .collect()
    }

    /// One variation per prompt framing, keeping the variant's own id.
    pub fn by_prompt_variant(task: &TaskSpec, variants: &[PromptVariant]) -> Vec<Variation> {
        variants
            .iter()
            .enumerate()
            .map(|(i, variant)| {
                let variation = Variation::new(variant.id.clone(), variant.display_label(), priority(i))
                    .with_task(task.description.clone());
                variant.apply(variation)
            })
            .collect()
    }

    /// Cartesian product of every configured axis: model outermost, then
    /// thinking level, then prompt variant. Empty axes are left out; a fully
    /// empty configuration yields a single `"default"` variation.
    ///
    /// # Example
    ///
    /// ```
    /// use fanout_domain::{HybridConfig, TaskSpec, ThinkingLevel, VariationFactory};
    ///
    /// let config = HybridConfig {
    ///     models: vec!["anthropic/claude-sonnet-4.5".into(), "openai/gpt-5".into()],
    ///     thinking_levels: vec![ThinkingLevel::Low, ThinkingLevel::High],
    ///     ..Default::default()
    /// };
    /// let variations = VariationFactory::hybrid(&TaskSpec::new("t", "Fix bug"), &config);
    /// assert_eq!(variations.len(), 4);
    /// assert_eq!(variations[1].label, "claude-sonnet-4.5 + high");
    /// ```
    pub fn hybrid(task: &TaskSpec, config: &HybridConfig) -> Vec<Variation> {
        let models: Vec<Option<&String>> = axis(&config.models);
        let levels: Vec<Option<&ThinkingLevel>> = axis(&config.thinking_levels);
        let prompts: Vec<Option<&PromptVariant>> = axis(&config.prompt_variants);

        let limit = config.max_combinations.unwrap_or(usize::MAX);
        let mut variations = Vec::new();

        'outer: for model in &models {
            for level in &levels {
                for prompt in &prompts {
                    if variations.len() >= limit {
                        break 'outer;
                    }
                    variations.push(combine(task, variations.len(), *model, *level, *prompt));
                }
            }
        }

        variations
    }
}

/// An empty axis contributes a single "unset" slot so the product still
/// iterates the other axes.
fn axis<T>(values: &[T]) -> Vec<Option<&T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().map(Some).collect()
    }
}

fn combine(
    task: &TaskSpec,
    index: usize,
    model: Option<&String>,
    level: Option<&ThinkingLevel>,
    prompt: Option<&PromptVariant>,
) -> Variation {
    let parts: Vec<&str> = [
        model.map(|m| model_label(m)),
        level.map(|l| l.as_str()),
        prompt.map(|p| p.display_label()),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();

    let (id, label) = if parts.is_empty() {
        ("default".to_string(), "default".to_string())
    } else {
        (format!("hybrid-{index}"), parts.join(" + "))
    };

    let mut variation =
        Variation::new(id, label, priority(index)).with_task(task.description.clone());
    if let Some(model) = model {
        variation = variation.with_model(model.clone());
    }
    if let Some(level) = level {
        variation = variation.with_thinking_level(*level);
    }
    if let Some(prompt) = prompt {
        variation = prompt.apply(variation);
    }
    variation
}

/// "anthropic/claude-sonnet-4.5" -> "claude-sonnet-4.5"
fn model_label(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

fn priority(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
