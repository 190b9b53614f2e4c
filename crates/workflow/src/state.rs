//! The record a run threads through its stages.

use brandforge_agent::generation::template;
use brandforge_agent::{
    Critique, EvaluationMetadata, EvaluationOutput, GenerationMetadata, GenerationOutput,
    PlanningDecision, ResearchResult, Route, resolve_threshold,
};
use brandforge_config::{BrandConfig, RunDefaults};
use brandforge_core::completion::StageUsage;
use brandforge_core::error::{Error, Result};
use brandforge_core::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TEMPLATE: &str = "LINKEDIN_POST_ZERO_SHOT";
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// What the caller asked for. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub topic: String,
    pub brand: String,
    pub template_key: String,
    pub use_cot: bool,
    pub max_iterations: u32,
    /// Falls back to the brand's threshold when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<f64>,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, brand: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            brand: brand.into(),
            template_key: DEFAULT_TEMPLATE.into(),
            use_cot: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            quality_threshold: None,
        }
    }

    /// A request seeded from the `[run]` config section.
    pub fn from_defaults(
        topic: impl Into<String>,
        brand: impl Into<String>,
        defaults: &RunDefaults,
    ) -> Self {
        Self {
            template_key: defaults.template.clone(),
            use_cot: defaults.use_cot,
            max_iterations: defaults.max_iterations,
            ..Self::new(topic, brand)
        }
    }

    pub fn with_template(mut self, key: impl Into<String>) -> Self {
        self.template_key = key.into();
        self
    }

    pub fn with_cot(mut self, use_cot: bool) -> Self {
        self.use_cot = use_cot;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }

    /// Reject a request before any model call is made.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::configuration("topic must not be empty"));
        }
        if self.max_iterations < 1 {
            return Err(Error::configuration(format!(
                "max_iterations must be at least 1, got {}",
                self.max_iterations
            )));
        }
        if let Some(threshold) = self.quality_threshold {
            if !threshold.is_finite() || !(0.0..=10.0).contains(&threshold) {
                return Err(Error::configuration(format!(
                    "quality_threshold must be within [0, 10], got {threshold}"
                )));
            }
        }
        template(&self.template_key)?;
        Ok(())
    }

    /// [`validate`](Self::validate) plus the checks that need the brand:
    /// few-shot templates require the brand's reference posts.
    pub fn validate_for(&self, brand: &BrandConfig) -> Result<()> {
        self.validate()?;
        if template(&self.template_key)?.requires_examples() && brand.examples.is_empty() {
            return Err(Error::configuration(format!(
                "template {} needs reference posts, but brand '{}' defines no examples",
                self.template_key, brand.name
            )));
        }
        Ok(())
    }
}

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Planning,
    Research,
    Generating,
    Evaluating,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "PLANNING",
            Self::Research => "RESEARCH",
            Self::Generating => "GENERATING",
            Self::Evaluating => "EVALUATING",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage per stage over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunUsage {
    pub planning: StageUsage,
    pub research: StageUsage,
    pub generation: StageUsage,
    pub evaluation: StageUsage,
}

impl RunUsage {
    pub fn total(&self) -> StageUsage {
        let mut total = StageUsage::default();
        for stage in [
            &self.planning,
            &self.research,
            &self.generation,
            &self.evaluation,
        ] {
            total.merge(stage);
        }
        total
    }
}

/// One generate/evaluate cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Iteration count after the cycle's evaluation.
    pub iteration: u32,
    pub score: f64,
    pub passed: bool,
    pub generation: StageUsage,
    pub evaluation: StageUsage,
}

impl CycleRecord {
    pub fn cost(&self) -> f64 {
        self.generation.cost + self.evaluation.cost
    }

    pub fn latency_secs(&self) -> f64 {
        self.generation.latency_secs + self.evaluation.latency_secs
    }
}

/// What a stage pass hands back to the controller.
#[derive(Debug, Clone)]
pub enum StageDelta {
    Planned {
        decision: PlanningDecision,
        usage: StageUsage,
        messages: Vec<Message>,
    },
    Researched {
        result: ResearchResult,
        usage: StageUsage,
        messages: Vec<Message>,
    },
    Generated {
        content: String,
        metadata: GenerationMetadata,
        messages: Vec<Message>,
    },
    Evaluated {
        critique: Critique,
        meets_quality_threshold: bool,
        iteration_count: u32,
        metadata: EvaluationMetadata,
        messages: Vec<Message>,
    },
}

impl From<GenerationOutput> for StageDelta {
    fn from(output: GenerationOutput) -> Self {
        Self::Generated {
            content: output.content,
            metadata: output.metadata,
            messages: output.messages,
        }
    }
}

impl From<EvaluationOutput> for StageDelta {
    fn from(output: EvaluationOutput) -> Self {
        Self::Evaluated {
            critique: output.critique,
            meets_quality_threshold: output.meets_quality_threshold,
            iteration_count: output.iteration_count,
            metadata: output.metadata,
            messages: output.messages,
        }
    }
}

/// The single mutable record of a run.
///
/// Fields change only through [`WorkflowState::apply`], after the stage that
/// owns them has returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: String,
    pub topic: String,
    pub brand: String,
    pub brand_config: BrandConfig,
    pub template_key: String,
    pub use_cot: bool,
    /// Append-only audit trail.
    pub messages: Vec<Message>,
    /// Current draft; empty until the first generation pass.
    pub content: String,
    pub planning_decision: Option<PlanningDecision>,
    pub research_result: Option<ResearchResult>,
    pub critique: Option<Critique>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub meets_quality_threshold: bool,
    pub generation_metadata: Option<GenerationMetadata>,
    pub evaluation_metadata: Option<EvaluationMetadata>,
    pub phase: Phase,
    pub usage: RunUsage,
    pub cycles: Vec<CycleRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(request: &RunRequest, brand_config: BrandConfig) -> Self {
        let quality_threshold = resolve_threshold(request.quality_threshold, &brand_config);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            topic: request.topic.clone(),
            brand: brand_config.key(),
            brand_config,
            template_key: request.template_key.clone(),
            use_cot: request.use_cot,
            messages: Vec::new(),
            content: String::new(),
            planning_decision: None,
            research_result: None,
            critique: None,
            iteration_count: 0,
            max_iterations: request.max_iterations,
            quality_threshold,
            meets_quality_threshold: false,
            generation_metadata: None,
            evaluation_metadata: None,
            phase: Phase::Planning,
            usage: RunUsage::default(),
            cycles: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Weighted score of the latest critique.
    pub fn average_score(&self) -> Option<f64> {
        self.critique.as_ref().map(Critique::average_score)
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// One-line summary for diagnostics.
    pub fn snapshot(&self) -> String {
        format!(
            "run_id={} phase={} iteration_count={}/{} draft_chars={} messages={}",
            self.run_id,
            self.phase,
            self.iteration_count,
            self.max_iterations,
            self.content.chars().count(),
            self.messages.len()
        )
    }

    /// Merge a stage's delta.
    pub fn apply(&mut self, delta: StageDelta) -> Result<()> {
        match delta {
            StageDelta::Planned {
                decision,
                usage,
                messages,
            } => {
                self.usage.planning.merge(&usage);
                self.planning_decision = Some(decision);
                self.messages.extend(messages);
            }
            StageDelta::Researched {
                result,
                usage,
                messages,
            } => {
                self.usage.research.merge(&usage);
                self.research_result = Some(result);
                self.messages.extend(messages);
            }
            StageDelta::Generated {
                content,
                metadata,
                messages,
            } => {
                self.usage.generation.merge(&metadata.usage);
                self.content = content;
                self.generation_metadata = Some(metadata);
                self.messages.extend(messages);
            }
            StageDelta::Evaluated {
                critique,
                meets_quality_threshold,
                iteration_count,
                metadata,
                messages,
            } => {
                if iteration_count != self.iteration_count + 1 {
                    return Err(Error::workflow(format!(
                        "evaluation reported iteration_count={iteration_count}, expected {} ({})",
                        self.iteration_count + 1,
                        self.snapshot()
                    )));
                }
                self.usage.evaluation.merge(&metadata.usage);
                self.cycles.push(CycleRecord {
                    iteration: iteration_count,
                    score: metadata.score,
                    passed: meets_quality_threshold,
                    generation: self
                        .generation_metadata
                        .as_ref()
                        .map(|g| g.usage.clone())
                        .unwrap_or_default(),
                    evaluation: metadata.usage.clone(),
                });
                self.iteration_count = iteration_count;
                self.meets_quality_threshold = meets_quality_threshold;
                self.critique = Some(critique);
                self.evaluation_metadata = Some(metadata);
                self.messages.extend(messages);
            }
        }
        Ok(())
    }

    /// The phase that follows the current one, given the merged state.
    pub fn next_phase(&self) -> Result<Phase> {
        let next = match self.phase {
            Phase::Planning => match self.planning_decision.as_ref().map(|d| d.route) {
                Some(Route::Research) if self.research_result.is_none() => Phase::Research,
                Some(_) => Phase::Generating,
                None => {
                    return Err(Error::workflow(format!(
                        "planning finished without a decision ({})",
                        self.snapshot()
                    )));
                }
            },
            Phase::Research => Phase::Planning,
            Phase::Generating => Phase::Evaluating,
            Phase::Evaluating => {
                if self.meets_quality_threshold || self.iteration_count >= self.max_iterations {
                    Phase::Done
                } else {
                    Phase::Generating
                }
            }
            Phase::Done => Phase::Done,
        };
        Ok(next)
    }
}
