//! Generation stage: one draft per pass.
//!
//! Revision passes switch to the brand's optimization instruction and carry
//! the previous draft plus its critique as feedback. The stage itself never
//! loops; deciding whether to revise again belongs to the controller.

pub mod prompt;
pub mod templates;

pub use prompt::{
    COT_INSTRUCTION, COT_SCAFFOLD, PromptInput, build_generation_prompt, expand_banned_terms,
    feedback_message, format_brand_guidelines,
};
pub use templates::{
    ContentFamily, PromptTemplate, ReferencePosts, TEMPLATES, template, template_keys,
};

use crate::evaluation::Critique;
use brandforge_config::{BrandConfig, StageModelConfig};
use brandforge_core::completion::StageUsage;
use brandforge_core::error::Result;
use brandforge_core::message::Message;
use brandforge_core::provider::ProviderRequest;
use brandforge_core::tool::Capability;
use brandforge_providers::ModelGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const STAGE: &str = "generation";

/// Which base instruction a pass used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionVariant {
    Generation,
    Optimization,
}

/// The previous draft and what the evaluator said about it.
#[derive(Debug, Clone, Copy)]
pub struct Revision<'a> {
    pub draft: &'a str,
    pub critique: &'a Critique,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub topic: &'a str,
    pub brand: &'a BrandConfig,
    pub tool_contexts: &'a BTreeMap<Capability, String>,
    pub template_key: &'a str,
    pub use_cot: bool,
    pub iteration_count: u32,
    /// Outcome of the previous evaluation; false before the first one.
    pub meets_quality_threshold: bool,
    pub revision: Option<Revision<'a>>,
}

impl GenerationRequest<'_> {
    pub fn variant(&self) -> InstructionVariant {
        if self.iteration_count > 0 && !self.meets_quality_threshold {
            InstructionVariant::Optimization
        } else {
            InstructionVariant::Generation
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub template: String,
    pub variant: InstructionVariant,
    pub model: String,
    pub system_message: String,
    pub prompt: String,
    pub usage: StageUsage,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub content: String,
    pub metadata: GenerationMetadata,
    /// Messages this pass adds to the audit trail.
    pub messages: Vec<Message>,
}

pub struct GenerationStage {
    gateway: ModelGateway,
}

impl GenerationStage {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    pub async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerationOutput> {
        let variant = request.variant();
        let models = &request.brand.models;
        let settings: &StageModelConfig = match variant {
            InstructionVariant::Generation => &models.content_generation,
            InstructionVariant::Optimization => &models.content_optimization,
        };
        let system_message =
            expand_banned_terms(&settings.system_message, &request.brand.voice.banned_terms);
        let prompt = build_generation_prompt(&PromptInput {
            topic: request.topic,
            brand: request.brand,
            tool_contexts: request.tool_contexts,
            template_key: request.template_key,
            use_cot: request.use_cot,
        })?;

        let mut conversation = vec![
            Message::system(system_message.clone()),
            Message::user(prompt.clone()),
        ];
        let feedback = match (variant, request.revision) {
            (InstructionVariant::Optimization, Some(revision)) => {
                conversation.push(Message::assistant(revision.draft));
                let feedback = Message::user(feedback_message(revision.critique));
                conversation.push(feedback.clone());
                Some(feedback)
            }
            _ => None,
        };

        info!(
            template = %request.template_key,
            variant = ?variant,
            model = %settings.model,
            iteration = request.iteration_count,
            "Generating draft"
        );
        let llm_request = ProviderRequest::new(settings.model.clone(), conversation)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens);
        let result = self.gateway.complete(llm_request).await?;
        let content = result.content.trim().to_string();

        let mut messages = vec![
            Message::system(system_message.clone()).from_stage(STAGE),
            Message::user(prompt.clone()).from_stage(STAGE),
        ];
        if let Some(feedback) = feedback {
            messages.push(feedback.from_stage(STAGE));
        }
        let mut draft = Message::assistant(content.clone()).from_stage(STAGE);
        draft.metadata.insert(
            "iteration".into(),
            serde_json::Value::from(request.iteration_count),
        );
        messages.push(draft);

        Ok(GenerationOutput {
            content,
            metadata: GenerationMetadata {
                template: request.template_key.to_string(),
                variant,
                model: result.model.clone(),
                system_message,
                prompt,
                usage: StageUsage::from_completion(&result),
                timestamp: result.timestamp,
            },
            messages,
        })
    }
}

/// The generation conversation recorded in an audit trail.
pub fn generation_dialogue(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.stage() == Some(STAGE))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::CritiqueScores;
    use crate::test_helpers::{acme, gateway};
    use brandforge_config::EvaluationWeights;
    use brandforge_core::message::Role;
    use brandforge_providers::test_helpers::ScriptedProvider;
    use std::sync::Arc;

    fn critique() -> Critique {
        Critique::new(
            CritiqueScores {
                brand_voice: 5.0,
                structure: 6.0,
                accuracy: 7.0,
                violations: vec!["Uses 'revolutionary'".into()],
                reasoning: "Opening is a slogan.".into(),
            },
            EvaluationWeights::default(),
        )
    }

    fn request<'a>(
        brand: &'a BrandConfig,
        contexts: &'a BTreeMap<Capability, String>,
    ) -> GenerationRequest<'a> {
        GenerationRequest {
            topic: "Zero trust security",
            brand,
            tool_contexts: contexts,
            template_key: "LINKEDIN_POST_ZERO_SHOT",
            use_cot: false,
            iteration_count: 0,
            meets_quality_threshold: false,
            revision: None,
        }
    }

    #[tokio::test]
    async fn first_pass_uses_generation_instruction() {
        let provider = Arc::new(ScriptedProvider::new().reply("  First draft.  "));
        let stage = GenerationStage::new(gateway(provider.clone()));
        let brand = acme();
        let contexts = BTreeMap::new();

        let output = stage.generate(&request(&brand, &contexts)).await.unwrap();

        assert_eq!(output.content, "First draft.");
        assert_eq!(output.metadata.variant, InstructionVariant::Generation);
        assert_eq!(output.metadata.model, "openai/gpt-4o");
        assert_eq!(output.metadata.usage.calls, 1);
        assert_eq!(provider.calls(), 1);

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.messages.len(), 2);
        assert!(sent.messages[0].content.starts_with("You are Acme's content writer."));
        assert_eq!(sent.temperature, 0.7);

        let roles: Vec<Role> = output.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(output.messages.iter().all(|m| m.stage() == Some(STAGE)));
    }

    #[tokio::test]
    async fn revision_pass_carries_feedback() {
        let provider = Arc::new(ScriptedProvider::new().reply("Second draft."));
        let stage = GenerationStage::new(gateway(provider.clone()));
        let brand = acme();
        let contexts = BTreeMap::new();
        let critique = critique();

        let mut req = request(&brand, &contexts);
        req.iteration_count = 1;
        req.revision = Some(Revision {
            draft: "First draft.",
            critique: &critique,
        });
        let output = stage.generate(&req).await.unwrap();

        assert_eq!(output.metadata.variant, InstructionVariant::Optimization);
        let sent = provider.last_request().unwrap();
        assert!(sent.messages[0].content.starts_with("You revise Acme drafts."));
        assert_eq!(sent.messages[2].role, Role::Assistant);
        assert_eq!(sent.messages[2].content, "First draft.");
        assert!(sent.messages[3].content.starts_with("FEEDBACK:\n- Opening is a slogan."));
        assert!(sent.messages[3].content.contains("Uses 'revolutionary'"));
        assert_eq!(sent.temperature, 0.5);
        assert_eq!(output.messages.len(), 4);
    }

    #[tokio::test]
    async fn passing_draft_keeps_generation_instruction() {
        let provider = Arc::new(ScriptedProvider::new().reply("Draft."));
        let stage = GenerationStage::new(gateway(provider.clone()));
        let brand = acme();
        let contexts = BTreeMap::new();
        let mut req = request(&brand, &contexts);
        req.iteration_count = 2;
        req.meets_quality_threshold = true;

        let output = stage.generate(&req).await.unwrap();
        assert_eq!(output.metadata.variant, InstructionVariant::Generation);
        assert_eq!(provider.last_request().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new().fail(
            brandforge_core::error::ProviderError::AuthenticationFailed("bad key".into()),
        ));
        let stage = GenerationStage::new(gateway(provider));
        let brand = acme();
        let contexts = BTreeMap::new();
        let err = stage.generate(&request(&brand, &contexts)).await.unwrap_err();
        assert_eq!(err.kind(), "provider");
    }

    #[test]
    fn dialogue_keeps_generation_messages() {
        let trail = vec![
            Message::system("Planner decision").from_stage("planning"),
            Message::user("prompt").from_stage(STAGE),
            Message::assistant("draft").from_stage(STAGE),
        ];
        let dialogue = generation_dialogue(&trail);
        assert_eq!(dialogue.len(), 2);
        assert_eq!(dialogue[1].content, "draft");
    }
}
