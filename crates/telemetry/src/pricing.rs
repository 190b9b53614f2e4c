//! Built-in pricing table for the model families the engine uses.
//!
//! Prices are in EUR per 1,000 tokens. Models are matched by family: the
//! first family whose pattern occurs in the lowercased model name wins, so
//! more specific families (`gpt-4o-mini`) are listed before broader ones
//! (`gpt-4o`). A model no family matches is an error, never a free call.

use crate::TelemetryError;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Per-1K-token pricing for a model family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    /// Price per 1K input tokens in EUR.
    pub input_per_1k: f64,
    /// Price per 1K output tokens in EUR.
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) * self.input_per_1k + f64::from(output_tokens) * self.output_per_1k)
            / 1_000.0
    }
}

/// A family: any of `patterns` occurring in the model name selects `pricing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFamily {
    pub patterns: Vec<String>,
    pub pricing: ModelPricing,
}

impl PriceFamily {
    fn matches(&self, model_lower: &str) -> bool {
        self.patterns.iter().any(|p| model_lower.contains(p.as_str()))
    }
}

/// Thread-safe, ordered pricing table.
pub struct PricingTable {
    families: RwLock<Vec<PriceFamily>>,
}

impl PricingTable {
    /// Create a pricing table with the built-in families.
    pub fn with_defaults() -> Self {
        let family = |patterns: &[&str], input: f64, output: f64| PriceFamily {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            pricing: ModelPricing::new(input, output),
        };

        let families = vec![
            // ── OpenAI ─────────────────────────────────────────────────
            family(&["gpt-4o-mini"], 0.00015, 0.0006),
            family(&["gpt-4o"], 0.005, 0.015),
            family(&["gpt-5"], 0.0015, 0.01),
            // ── Embeddings ─────────────────────────────────────────────
            family(&["embedding", "ada"], 0.00002, 0.0),
            // ── Anthropic ──────────────────────────────────────────────
            family(&["sonnet-4"], 0.003, 0.015),
        ];

        Self {
            families: RwLock::new(families),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            families: RwLock::new(Vec::new()),
        }
    }

    /// Price a family ahead of the existing ones.
    ///
    /// A family already registered under the same pattern is replaced.
    pub fn set(&self, pattern: impl Into<String>, pricing: ModelPricing) {
        let pattern = pattern.into().to_lowercase();
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        families.retain(|f| !(f.patterns.len() == 1 && f.patterns[0] == pattern));
        families.insert(
            0,
            PriceFamily {
                patterns: vec![pattern],
                pricing,
            },
        );
    }

    /// Look up pricing for a model.
    pub fn lookup(&self, model: &str) -> Result<ModelPricing, TelemetryError> {
        let model_lower = model.to_lowercase();
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        families
            .iter()
            .find(|f| f.matches(&model_lower))
            .map(|f| f.pricing)
            .ok_or_else(|| TelemetryError::UnknownModel(model.to_string()))
    }

    /// Compute cost for a model call.
    pub fn compute_cost(
        &self,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Result<f64, TelemetryError> {
        Ok(self.lookup(model)?.cost(input_tokens, output_tokens))
    }

    /// Snapshot of the families in match order.
    pub fn families(&self) -> Vec<PriceFamily> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of families in the table.
    pub fn len(&self) -> usize {
        self.families.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_families() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.len(), 5);
        assert!(!table.is_empty());
    }

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();
        // gpt-4o: 0.005/1K input, 0.015/1K output
        let cost = table.compute_cost("openai/gpt-4o", 1000, 500).unwrap();
        // 0.005 + 0.0075
        assert!((cost - 0.0125).abs() < 1e-12);
    }

    #[test]
    fn specific_family_wins_over_broad_one() {
        let table = PricingTable::with_defaults();
        let mini = table.lookup("openai/gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(mini, ModelPricing::new(0.00015, 0.0006));
    }

    #[test]
    fn embedding_models_match_either_pattern() {
        let table = PricingTable::with_defaults();
        let small = table.lookup("text-embedding-3-small").unwrap();
        let ada = table.lookup("text-ada-002").unwrap();
        assert_eq!(small, ada);
        assert_eq!(small.output_per_1k, 0.0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let table = PricingTable::with_defaults();
        assert!(table.lookup("anthropic/claude-SONNET-4").is_ok());
    }

    #[test]
    fn unknown_model_is_an_error() {
        let table = PricingTable::with_defaults();
        let err = table.compute_cost("unknown/model-xyz", 1000, 500).unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownModel(ref m) if m == "unknown/model-xyz"));
    }

    #[test]
    fn custom_family_takes_precedence() {
        let table = PricingTable::with_defaults();
        table.set("gpt-4o", ModelPricing::new(1.0, 2.0));
        let cost = table.compute_cost("gpt-4o", 1_000, 1_000).unwrap();
        assert!((cost - 3.0).abs() < 1e-12);
        // gpt-4o-mini is still reachable before the broad built-in family,
        // but the custom pattern is checked first and also matches it.
        assert_eq!(table.lookup("gpt-4o-mini").unwrap(), ModelPricing::new(1.0, 2.0));
    }

    #[test]
    fn set_replaces_same_pattern() {
        let table = PricingTable::empty();
        table.set("local-llama", ModelPricing::new(0.1, 0.1));
        table.set("local-llama", ModelPricing::new(0.2, 0.2));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup("local-llama-3").unwrap(),
            ModelPricing::new(0.2, 0.2)
        );
    }
}
