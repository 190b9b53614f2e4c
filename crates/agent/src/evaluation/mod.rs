//! Evaluation stage: scores a draft and decides whether it passes.
//!
//! Two patterns, picked per brand:
//! - **Reflection**: critique over the existing generation conversation,
//!   which already carries the brand guidance.
//! - **Rubric** (`evaluator_optimizer`): critique against an
//!   [`EvaluationRubric`] built from the brand for the content type.

pub mod critique;
pub mod rubric;

pub use critique::{Critique, CritiqueScores};
pub use rubric::{EvaluationRubric, RubricDimension, critique_prompt};

use crate::generation::expand_banned_terms;
use brandforge_config::{BrandConfig, EvaluationPattern, EvaluationWeights};
use brandforge_core::completion::StageUsage;
use brandforge_core::error::{Error, Result};
use brandforge_core::message::Message;
use brandforge_core::provider::ProviderRequest;
use brandforge_providers::ModelGateway;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const STAGE: &str = "evaluation";

/// Threshold used when neither the request nor the brand sets one.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 7.0;
pub const DEFAULT_CONTENT_TYPE: &str = "POST";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a rigorous content evaluator. Score and explain.";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const REFLECTION_MAX_TOKENS: u32 = 800;
const RUBRIC_MAX_TOKENS: u32 = 1200;

/// Request threshold, then the brand's, then [`DEFAULT_QUALITY_THRESHOLD`].
pub fn resolve_threshold(requested: Option<f64>, brand: &BrandConfig) -> f64 {
    requested
        .or(brand.quality_threshold)
        .unwrap_or(DEFAULT_QUALITY_THRESHOLD)
}

#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub content: &'a str,
    pub brand: &'a BrandConfig,
    /// Template key; selects the structural requirements.
    pub content_type: Option<&'a str>,
    /// Conversation the reflection pattern critiques against.
    pub history: &'a [Message],
    pub requested_threshold: Option<f64>,
    /// Passes completed before this one.
    pub iteration_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    pub pattern: EvaluationPattern,
    pub model: String,
    pub score: f64,
    pub threshold: f64,
    pub scores: BTreeMap<String, f64>,
    pub weights_version: String,
    pub usage: StageUsage,
}

#[derive(Debug, Clone)]
pub struct EvaluationOutput {
    pub critique: Critique,
    pub meets_quality_threshold: bool,
    pub threshold: f64,
    /// Iteration count after this pass.
    pub iteration_count: u32,
    pub metadata: EvaluationMetadata,
    pub messages: Vec<Message>,
}

impl EvaluationOutput {
    /// The note appended to the audit trail.
    pub fn audit_message(&self) -> String {
        format!(
            "Evaluation: {:.2}/10 (threshold={:.2})\n{}",
            self.critique.average_score(),
            self.threshold,
            self.critique.reasoning
        )
    }
}

pub struct EvaluationStage {
    gateway: ModelGateway,
    weights: EvaluationWeights,
}

impl EvaluationStage {
    pub fn new(gateway: ModelGateway, weights: EvaluationWeights) -> Self {
        Self { gateway, weights }
    }

    pub fn weights(&self) -> &EvaluationWeights {
        &self.weights
    }

    fn reflection_messages(request: &EvaluationRequest<'_>) -> Result<Vec<Message>> {
        if request.history.is_empty() {
            return Err(Error::configuration(
                "reflection evaluation needs conversation history",
            ));
        }
        let mut messages = request.history.to_vec();
        messages.push(Message::user(format!(
            "Evaluate the following content against the brand guidelines.\n\nContent:\n{}",
            request.content
        )));
        Ok(messages)
    }

    fn rubric_messages(&self, request: &EvaluationRequest<'_>) -> Result<Vec<Message>> {
        let content_type = request.content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let rubric = EvaluationRubric::build(request.brand, content_type, &self.weights);
        let prompt = critique_prompt(request.content, &rubric.prompt_yaml()?);

        let configured = &request.brand.models.content_evaluation.system_message;
        let base = if configured.trim().is_empty() {
            DEFAULT_SYSTEM_MESSAGE
        } else {
            configured.as_str()
        };
        let system = expand_banned_terms(base, &request.brand.voice.banned_terms);
        Ok(vec![Message::system(system), Message::user(prompt)])
    }

    pub async fn evaluate(&self, request: &EvaluationRequest<'_>) -> Result<EvaluationOutput> {
        let config = &request.brand.models.content_evaluation;
        let (messages, default_max_tokens) = match config.pattern {
            EvaluationPattern::Reflection => {
                (Self::reflection_messages(request)?, REFLECTION_MAX_TOKENS)
            }
            EvaluationPattern::EvaluatorOptimizer => {
                (self.rubric_messages(request)?, RUBRIC_MAX_TOKENS)
            }
        };
        let max_tokens = if config.max_tokens > 0 {
            config.max_tokens
        } else {
            default_max_tokens
        };
        let temperature = if config.temperature.is_finite() {
            config.temperature
        } else {
            DEFAULT_TEMPERATURE
        };

        let llm_request = ProviderRequest::new(config.model.clone(), messages)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        let (scores, result) = self
            .gateway
            .complete_structured::<CritiqueScores>(llm_request)
            .await?;

        let critique = Critique::new(scores, self.weights.clone());
        let threshold = resolve_threshold(request.requested_threshold, request.brand);
        let score = critique.average_score();
        let meets_quality_threshold = critique.meets(threshold);
        let iteration_count = request.iteration_count + 1;
        info!(
            pattern = ?config.pattern,
            score,
            threshold,
            passed = meets_quality_threshold,
            iteration = iteration_count,
            "Evaluation complete"
        );

        let metadata = EvaluationMetadata {
            pattern: config.pattern,
            model: result.model.clone(),
            score,
            threshold,
            scores: critique.scores(),
            weights_version: self.weights.version.clone(),
            usage: StageUsage::from_completion(&result),
        };
        let mut output = EvaluationOutput {
            critique,
            meets_quality_threshold,
            threshold,
            iteration_count,
            metadata,
            messages: Vec::new(),
        };
        let mut note = Message::system(output.audit_message()).from_stage(STAGE);
        note.metadata
            .insert("score".into(), serde_json::Value::from(score));
        note.metadata
            .insert("threshold".into(), serde_json::Value::from(threshold));
        output.messages.push(note);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{acme, critique_json, gateway};
    use brandforge_core::message::Role;
    use brandforge_providers::test_helpers::ScriptedProvider;
    use std::sync::Arc;

    fn request<'a>(brand: &'a BrandConfig, history: &'a [Message]) -> EvaluationRequest<'a> {
        EvaluationRequest {
            content: "Zero trust starts with one question.",
            brand,
            content_type: Some("LINKEDIN_POST_ZERO_SHOT"),
            history,
            requested_threshold: None,
            iteration_count: 0,
        }
    }

    fn stage(provider: Arc<ScriptedProvider>) -> EvaluationStage {
        EvaluationStage::new(gateway(provider), EvaluationWeights::default())
    }

    #[tokio::test]
    async fn rubric_pattern_scores_and_passes() {
        let provider = Arc::new(ScriptedProvider::new().reply(critique_json(8.0, 6.0, 9.0)));
        let brand = acme();

        let output = stage(provider.clone()).evaluate(&request(&brand, &[])).await.unwrap();

        assert!((output.critique.average_score() - 7.8).abs() < 1e-9);
        assert!(output.meets_quality_threshold);
        assert_eq!(output.threshold, 7.0);
        assert_eq!(output.iteration_count, 1);
        assert_eq!(output.metadata.scores["brand_voice"], 8.0);
        assert_eq!(output.metadata.weights_version, "1.0");
        assert_eq!(
            output.messages[0].content,
            "Evaluation: 7.80/10 (threshold=7.00)\nSolid hook, but the closing leans on hype."
        );

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.max_tokens, Some(1200));
        assert!(sent.messages[0].content.contains("   - game-changer"));
        assert!(!sent.messages[0].content.contains("{banned_terms}"));
        assert!(sent.messages[1].content.contains("EVALUATION RUBRIC:\nbrand_voice:"));
        assert!(sent.messages[1].content.contains("120 to 200 words"));
    }

    #[tokio::test]
    async fn requested_threshold_wins() {
        let provider = Arc::new(ScriptedProvider::new().reply(critique_json(8.0, 6.0, 9.0)));
        let brand = acme();
        let mut req = request(&brand, &[]);
        req.requested_threshold = Some(8.0);
        req.iteration_count = 2;

        let output = stage(provider).evaluate(&req).await.unwrap();
        assert!(!output.meets_quality_threshold);
        assert_eq!(output.iteration_count, 3);
    }

    #[test]
    fn threshold_fallback_chain() {
        let mut brand = acme();
        assert_eq!(resolve_threshold(Some(9.0), &brand), 9.0);
        brand.quality_threshold = Some(6.5);
        assert_eq!(resolve_threshold(None, &brand), 6.5);
        brand.quality_threshold = None;
        assert_eq!(resolve_threshold(None, &brand), DEFAULT_QUALITY_THRESHOLD);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_rejected() {
        let provider = Arc::new(ScriptedProvider::new().reply(critique_json(12.0, 6.0, 9.0)));
        let brand = acme();
        let err = stage(provider).evaluate(&request(&brand, &[])).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn reflection_requires_history() {
        let provider = Arc::new(ScriptedProvider::new().reply(critique_json(8.0, 8.0, 8.0)));
        let mut brand = acme();
        brand.models.content_evaluation.pattern = EvaluationPattern::Reflection;

        let err = stage(provider.clone())
            .evaluate(&request(&brand, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn reflection_critiques_over_history() {
        let provider = Arc::new(ScriptedProvider::new().reply(critique_json(8.0, 8.0, 8.0)));
        let mut brand = acme();
        brand.models.content_evaluation.pattern = EvaluationPattern::Reflection;
        let history = vec![
            Message::system("You are Acme's content writer."),
            Message::user("Generate a LinkedIn post ..."),
            Message::assistant("Zero trust starts with one question."),
        ];

        let output = stage(provider.clone())
            .evaluate(&request(&brand, &history))
            .await
            .unwrap();
        assert_eq!(output.metadata.pattern, EvaluationPattern::Reflection);

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.messages.len(), 4);
        assert_eq!(sent.messages[3].role, Role::User);
        assert!(sent.messages[3].content.starts_with(
            "Evaluate the following content against the brand guidelines.\n\nContent:\nZero trust"
        ));
        assert!(!sent.messages.iter().any(|m| m.content.contains("EVALUATION RUBRIC")));
    }
}
