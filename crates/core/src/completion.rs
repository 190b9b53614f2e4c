//! Per-call and per-stage accounting values.

use chrono::{DateTime, Utc};
use crate::provider::ToolCall;
use serde::{Deserialize, Serialize};

/// The outcome of one gateway completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Raw text returned by the model.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost in EUR.
    pub cost: f64,
    /// Wall-clock seconds of the successful attempt.
    pub latency_secs: f64,
    /// Model the call was priced against.
    pub model: String,
    pub timestamp: DateTime<Utc>,
    /// Parsed JSON when a response schema was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
    /// Tool calls the model requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// The outcome of one gateway embedding call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub input_tokens: u32,
    pub cost: f64,
    pub latency_secs: f64,
    pub model: String,
}

/// Summed usage of every gateway call made inside one stage pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageUsage {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub latency_secs: f64,
    /// Distinct models used, in call order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl StageUsage {
    pub fn from_completion(result: &CompletionResult) -> Self {
        let mut usage = Self::default();
        usage.record(result);
        usage
    }

    /// Add one completion to the totals.
    pub fn record(&mut self, result: &CompletionResult) {
        self.calls += 1;
        self.input_tokens += u64::from(result.input_tokens);
        self.output_tokens += u64::from(result.output_tokens);
        self.cost += result.cost;
        self.latency_secs += result.latency_secs;
        if !self.models.contains(&result.model) {
            self.models.push(result.model.clone());
        }
    }

    pub fn record_embedding(&mut self, result: &EmbeddingResult) {
        self.calls += 1;
        self.input_tokens += u64::from(result.input_tokens);
        self.cost += result.cost;
        self.latency_secs += result.latency_secs;
        if !self.models.contains(&result.model) {
            self.models.push(result.model.clone());
        }
    }

    pub fn merge(&mut self, other: &StageUsage) {
        self.calls += other.calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
        self.latency_secs += other.latency_secs;
        for model in &other.models {
            if !self.models.contains(model) {
                self.models.push(model.clone());
            }
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
