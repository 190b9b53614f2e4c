//! The critique model.
//!
//! Scores are stored; the weighted average never is. It is always derived
//! from the stored scores and the weights the critique was produced under.

use brandforge_config::EvaluationWeights;
use brandforge_providers::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// The evaluator model's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CritiqueScores {
    /// Alignment with brand tone, style, and voice guidelines (1-10)
    pub brand_voice: f64,
    /// Compliance with content-type formatting requirements (1-10)
    pub structure: f64,
    /// Factual correctness and claim validation (1-10)
    pub accuracy: f64,
    /// Specific violations found in the content
    #[serde(default)]
    pub violations: Vec<String>,
    /// Detailed reasoning for scores
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredOutput for CritiqueScores {
    fn output_name() -> &'static str {
        "critique"
    }

    fn check(&self) -> Result<(), String> {
        for (name, score) in [
            ("brand_voice", self.brand_voice),
            ("structure", self.structure),
            ("accuracy", self.accuracy),
        ] {
            if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
                return Err(format!("{name} score {score} is outside 1-10"));
            }
        }
        Ok(())
    }
}

/// A scored evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub brand_voice: f64,
    pub structure: f64,
    pub accuracy: f64,
    pub violations: Vec<String>,
    pub reasoning: String,
    pub weights: EvaluationWeights,
}

impl Critique {
    pub fn new(scores: CritiqueScores, weights: EvaluationWeights) -> Self {
        Self {
            brand_voice: scores.brand_voice,
            structure: scores.structure,
            accuracy: scores.accuracy,
            violations: scores.violations,
            reasoning: scores.reasoning,
            weights,
        }
    }

    /// `Σ(score·weight) / Σ(weight)`.
    pub fn average_score(&self) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return (self.brand_voice + self.structure + self.accuracy) / 3.0;
        }
        (self.brand_voice * w.brand_voice + self.structure * w.structure + self.accuracy * w.accuracy)
            / total
    }

    /// Per-dimension scores.
    pub fn scores(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("brand_voice".to_string(), self.brand_voice),
            ("structure".to_string(), self.structure),
        ])
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.average_score() >= threshold
    }
}
