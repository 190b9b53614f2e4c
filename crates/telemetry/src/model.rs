//! Data model for ledger records and cost summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Record ────────────────────────────────────────────────────────────────

/// One successful gateway call. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost in EUR.
    pub cost_eur: f64,
    /// Seconds spent in the successful attempt.
    pub latency_secs: f64,
}

impl CostRecord {
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

// ── Summary ───────────────────────────────────────────────────────────────

/// Aggregated cost over a set of ledger records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    /// Total cost in EUR.
    pub total_cost_eur: f64,
    /// Number of calls.
    pub calls: u64,
    /// Average cost per call in EUR.
    pub average_cost_per_call: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Earliest record.
    pub from: Option<DateTime<Utc>>,
    /// Latest record.
    pub to: Option<DateTime<Utc>>,
    /// Breakdown by model, most expensive first.
    pub by_model: Vec<ModelCost>,
}

/// Cost breakdown for a single model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCost {
    pub model: String,
    pub cost_eur: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: u64,
}

impl CostSummary {
    pub fn from_records(records: &[CostRecord]) -> Self {
        let mut summary = CostSummary::default();
        let mut by_model: HashMap<&str, ModelCost> = HashMap::new();

        for record in records {
            summary.total_cost_eur += record.cost_eur;
            summary.calls += 1;
            summary.total_input_tokens += u64::from(record.input_tokens);
            summary.total_output_tokens += u64::from(record.output_tokens);
            summary.from = Some(summary.from.map_or(record.timestamp, |t| t.min(record.timestamp)));
            summary.to = Some(summary.to.map_or(record.timestamp, |t| t.max(record.timestamp)));

            let entry = by_model.entry(record.model.as_str()).or_insert_with(|| ModelCost {
                model: record.model.clone(),
                cost_eur: 0.0,
                input_tokens: 0,
                output_tokens: 0,
                calls: 0,
            });
            entry.cost_eur += record.cost_eur;
            entry.input_tokens += u64::from(record.input_tokens);
            entry.output_tokens += u64::from(record.output_tokens);
            entry.calls += 1;
        }

        if summary.calls > 0 {
            summary.average_cost_per_call = summary.total_cost_eur / summary.calls as f64;
        }

        let mut by_model: Vec<ModelCost> = by_model.into_values().collect();
        by_model.sort_by(|a, b| {
            b.cost_eur
                .partial_cmp(&a.cost_eur)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.model.cmp(&b.model))
        });
        summary.by_model = by_model;
        summary
    }
}
