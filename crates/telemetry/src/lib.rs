//! Cost tracking for brandforge.
//!
//! Prices every gateway call against a per-1K-token table matched by model
//! family, appends one immutable record per successful call to a cost
//! ledger, and aggregates ledgers into cost summaries.

pub mod ledger;
pub mod model;
pub mod pricing;

pub use ledger::{CostLedger, InMemoryLedger, JsonlLedger};
pub use model::{CostRecord, CostSummary, ModelCost};
pub use pricing::{ModelPricing, PricingTable};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("no price configured for model '{0}'")]
    UnknownModel(String),

    #[error("ledger I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
