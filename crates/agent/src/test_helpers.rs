//! Shared fixtures for stage tests.

use brandforge_config::BrandConfig;
use brandforge_providers::ModelGateway;
use brandforge_providers::test_helpers::ScriptedProvider;
use brandforge_telemetry::{InMemoryLedger, PricingTable};
use std::path::Path;
use std::sync::Arc;

pub const ACME_YAML: &str = include_str!("../../../config/brands/acme.yaml");

pub fn acme() -> BrandConfig {
    BrandConfig::from_yaml_str(ACME_YAML, Path::new("acme.yaml")).unwrap()
}

pub fn gateway(provider: Arc<ScriptedProvider>) -> ModelGateway {
    ModelGateway::new(
        provider,
        Arc::new(PricingTable::with_defaults()),
        Arc::new(InMemoryLedger::new()),
    )
}

/// A critique answer in the shape the evaluator model returns.
pub fn critique_json(brand_voice: f64, structure: f64, accuracy: f64) -> String {
    serde_json::json!({
        "brand_voice": brand_voice,
        "structure": structure,
        "accuracy": accuracy,
        "violations": ["Uses the banned term 'synergy'"],
        "reasoning": "Solid hook, but the closing leans on hype."
    })
    .to_string()
}
