//! Evaluation rubric built from a brand configuration.
//!
//! Three weighted dimensions. The structural one takes its requirements from
//! the content family of the template being evaluated.

use crate::generation::templates::requirements_for;
use brandforge_config::{BrandConfig, EvaluationWeights};
use brandforge_core::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricDimension<C> {
    pub description: String,
    pub criteria: C,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandVoiceCriteria {
    pub positioning: String,
    pub tone: String,
    pub style_guidelines: Vec<String>,
    pub banned_terms: Vec<String>,
    pub content_generation_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureCriteria {
    pub content_type: String,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyCriteria {
    pub factual_accuracy: Vec<String>,
    pub content_generation_rules: Vec<String>,
}

/// Where a rubric came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricMetadata {
    pub brand: String,
    pub config_version: String,
    pub generated_at: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRubric {
    pub brand_voice: RubricDimension<BrandVoiceCriteria>,
    pub structure: RubricDimension<StructureCriteria>,
    pub accuracy: RubricDimension<AccuracyCriteria>,
    pub metadata: RubricMetadata,
}

/// The rubric as the evaluator model sees it.
#[derive(Serialize)]
struct PromptView<'a> {
    brand_voice: &'a RubricDimension<BrandVoiceCriteria>,
    structure: &'a RubricDimension<StructureCriteria>,
    accuracy: &'a RubricDimension<AccuracyCriteria>,
}

fn yaml_error(e: serde_yaml::Error) -> Error {
    Error::configuration(format!("rubric YAML: {e}"))
}

impl EvaluationRubric {
    pub fn build(brand: &BrandConfig, content_type: &str, weights: &EvaluationWeights) -> Self {
        let voice = &brand.voice;
        Self {
            brand_voice: RubricDimension {
                description: "Alignment with brand tone, voice, and style guidelines".into(),
                criteria: BrandVoiceCriteria {
                    positioning: brand.positioning.clone(),
                    tone: voice.tone.clone(),
                    style_guidelines: voice.style_guidelines.clone(),
                    banned_terms: voice.banned_terms.clone(),
                    content_generation_rules: brand.content_generation_rules.clone(),
                },
                weight: weights.brand_voice,
            },
            structure: RubricDimension {
                description: format!("Content organization and formatting for {content_type}"),
                criteria: StructureCriteria {
                    content_type: content_type.to_string(),
                    requirements: requirements_for(content_type, &brand.formatting_rules).to_vec(),
                },
                weight: weights.structure,
            },
            accuracy: RubricDimension {
                description: "Factual correctness and claim validation".into(),
                criteria: AccuracyCriteria {
                    factual_accuracy: brand.factual_accuracy.clone(),
                    content_generation_rules: brand.content_generation_rules.clone(),
                },
                weight: weights.accuracy,
            },
            metadata: RubricMetadata {
                brand: brand.key(),
                config_version: brand.version.clone(),
                generated_at: Utc::now().to_rfc3339(),
                content_type: content_type.to_string(),
            },
        }
    }

    /// YAML of the three dimensions, without metadata.
    pub fn prompt_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&PromptView {
            brand_voice: &self.brand_voice,
            structure: &self.structure,
            accuracy: &self.accuracy,
        })
        .map_err(yaml_error)
    }
}

/// The user prompt of a rubric-based evaluation.
pub fn critique_prompt(content: &str, rubric_yaml: &str) -> String {
    format!(
        "Evaluate the following content against the brand rubric.\n\n\
         CONTENT TO EVALUATE:\n{content}\n\n\
         EVALUATION RUBRIC:\n{rubric_yaml}\n\n\
         Rate each dimension 1-10 where:\n\
         - 9-10: Exceptional adherence to all criteria\n\
         - 7-8: Good adherence with minor issues\n\
         - 5-6: Acceptable but notable violations\n\
         - 3-4: Multiple violations or critical failure\n\
         - 1-2: Fundamental misalignment with criteria\n\n\
         For brand_voice: Check tone, style guidelines (including opening/hook rules if present), banned terms, and content generation rules.\n\
         For structure: Check content-type-specific formatting requirements (length, headers, paragraphs, etc.).\n\
         For accuracy: Check factual claims are sourced/qualified, no fabricated statistics, no invented links.\n\n\
         Identify specific violations with examples from the post.\n\
         Provide detailed reasoning for each score.\n"
    )
}
