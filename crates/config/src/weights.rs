//! Versioned critique weights.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-dimension weights used to average a critique.
///
/// Passed explicitly into the evaluation stage; the `version` travels with
/// every critique so scores stay comparable across weight changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationWeights {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_brand_voice")]
    pub brand_voice: f64,

    #[serde(default = "default_structure")]
    pub structure: f64,

    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

fn default_version() -> String {
    "1.0".into()
}
fn default_brand_voice() -> f64 {
    0.9
}
fn default_structure() -> f64 {
    0.9
}
fn default_accuracy() -> f64 {
    1.2
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            version: default_version(),
            brand_voice: default_brand_voice(),
            structure: default_structure(),
            accuracy: default_accuracy(),
        }
    }
}

impl EvaluationWeights {
    pub fn total(&self) -> f64 {
        self.brand_voice + self.structure + self.accuracy
    }

    /// Weights keyed by dimension name.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("brand_voice".to_string(), self.brand_voice),
            ("structure".to_string(), self.structure),
        ])
    }

    pub fn validate(&self) -> Result<(), String> {
        let all = [self.brand_voice, self.structure, self.accuracy];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("evaluation weights must be finite and non-negative".into());
        }
        if self.total() <= 0.0 {
            return Err("evaluation weights must not all be zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let w = EvaluationWeights::default();
        assert_eq!(w.version, "1.0");
        assert!((w.total() - 3.0).abs() < 1e-12);
        assert_eq!(w.as_map()["accuracy"], 1.2);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn rejects_negative_and_zero() {
        let negative = EvaluationWeights {
            structure: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero = EvaluationWeights {
            version: "2".into(),
            brand_voice: 0.0,
            structure: 0.0,
            accuracy: 0.0,
        };
        assert!(zero.validate().is_err());
    }
}
