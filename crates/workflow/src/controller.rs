//! The iteration controller.
//!
//! ```text
//! PLANNING ──research──▶ RESEARCH ──▶ PLANNING ──write──▶ GENERATING ──▶ EVALUATING
//!     └──────────────────write─────────────────────────────────▲              │
//!                                                               └──fail, budget left
//!                                              pass or budget spent ──▶ DONE
//! ```
//!
//! Stages never retry here; a failed stage ends the run with a
//! [`RunFailure`] carrying the audit trail up to that point.

use crate::state::{Phase, RunRequest, StageDelta, WorkflowState};
use brandforge_agent::{
    EvaluationRequest, EvaluationStage, GenerationRequest, GenerationStage, Planner,
    PlanningInput, ResearchStage, Revision, generation_dialogue, plan_after_research,
};
use brandforge_config::BrandConfig;
use brandforge_core::completion::StageUsage;
use brandforge_core::error::{Error, Result};
use brandforge_core::message::Message;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PLANNING_STAGE: &str = "planning";
const RESEARCH_STAGE: &str = "research";

/// A run that stopped before reaching DONE.
#[derive(Debug, thiserror::Error)]
#[error("run failed during {phase}: {error}")]
pub struct RunFailure {
    #[source]
    pub error: Error,
    pub phase: Phase,
    /// Audit trail up to the failure.
    pub messages: Vec<Message>,
}

impl RunFailure {
    /// A failure raised before any stage ran.
    pub fn before_start(error: Error) -> Self {
        Self {
            error,
            phase: Phase::Planning,
            messages: Vec::new(),
        }
    }

    fn at(state: WorkflowState, error: Error) -> Self {
        Self {
            error,
            phase: state.phase,
            messages: state.messages,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

pub struct IterationController {
    planner: Planner,
    research: ResearchStage,
    generation: GenerationStage,
    evaluation: EvaluationStage,
    cancel: CancellationToken,
}

impl IterationController {
    pub fn new(
        planner: Planner,
        research: ResearchStage,
        generation: GenerationStage,
        evaluation: EvaluationStage,
    ) -> Self {
        Self {
            planner,
            research,
            generation,
            evaluation,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort between stages once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive one request from PLANNING to DONE.
    pub async fn run(
        &self,
        request: &RunRequest,
        brand: BrandConfig,
    ) -> std::result::Result<WorkflowState, RunFailure> {
        request.validate_for(&brand).map_err(RunFailure::before_start)?;

        let mut state = WorkflowState::new(request, brand);
        info!(
            run_id = %state.run_id,
            topic = %state.topic,
            brand = %state.brand,
            template = %state.template_key,
            max_iterations = state.max_iterations,
            threshold = state.quality_threshold,
            "Starting content run"
        );

        while !state.is_done() {
            if self.cancel.is_cancelled() {
                warn!(run_id = %state.run_id, phase = %state.phase, "Run cancelled");
                return Err(RunFailure::at(state, Error::Cancelled));
            }

            let delta = match self.step(&state).await {
                Ok(delta) => delta,
                Err(error) => {
                    warn!(
                        run_id = %state.run_id,
                        phase = %state.phase,
                        kind = error.kind(),
                        error = %error,
                        "Stage failed, aborting run"
                    );
                    return Err(RunFailure::at(state, error));
                }
            };

            // A stage that finished after cancellation is discarded.
            if self.cancel.is_cancelled() {
                warn!(run_id = %state.run_id, phase = %state.phase, "Run cancelled");
                return Err(RunFailure::at(state, Error::Cancelled));
            }

            let next = state.apply(delta).and_then(|()| state.next_phase());
            match next {
                Ok(next) => {
                    debug!(from = %state.phase, to = %next, "Phase transition");
                    state.phase = next;
                }
                Err(error) => return Err(RunFailure::at(state, error)),
            }
        }

        state.finished_at = Some(chrono::Utc::now());
        let total = state.usage.total();
        info!(
            run_id = %state.run_id,
            iterations = state.iteration_count,
            score = state.average_score().unwrap_or_default(),
            passed = state.meets_quality_threshold,
            calls = total.calls,
            cost = total.cost,
            "Content run finished"
        );
        Ok(state)
    }

    async fn step(&self, state: &WorkflowState) -> Result<StageDelta> {
        match state.phase {
            Phase::Planning => self.plan(state).await,
            Phase::Research => self.research(state).await,
            Phase::Generating => self.generate(state).await,
            Phase::Evaluating => self.evaluate(state).await,
            Phase::Done => Err(Error::workflow(format!(
                "no stage runs after DONE ({})",
                state.snapshot()
            ))),
        }
    }

    // ── Planning ──
    async fn plan(&self, state: &WorkflowState) -> Result<StageDelta> {
        let (decision, usage) = match &state.research_result {
            Some(research) => (plan_after_research(research), StageUsage::default()),
            None => {
                let input = PlanningInput {
                    topic: state.topic.clone(),
                    brand: state.brand.clone(),
                    history: state.messages.clone(),
                    settings: state.brand_config.models.content_planning.clone(),
                };
                let outcome = self.planner.plan(&input).await?;
                (outcome.decision, outcome.usage)
            }
        };
        let note = Message::system(decision.audit_message()).from_stage(PLANNING_STAGE);
        Ok(StageDelta::Planned {
            decision,
            usage,
            messages: vec![note],
        })
    }

    // ── Research ──
    async fn research(&self, state: &WorkflowState) -> Result<StageDelta> {
        let decision = state.planning_decision.as_ref().ok_or_else(|| {
            Error::workflow(format!(
                "reached RESEARCH without a planning decision ({})",
                state.snapshot()
            ))
        })?;
        let outcome = self
            .research
            .run(&state.topic, &state.brand_config, &decision.tools)
            .await;
        let note = Message::system(outcome.result.audit_message(&state.topic, &state.brand))
            .from_stage(RESEARCH_STAGE);
        Ok(StageDelta::Researched {
            result: outcome.result,
            usage: outcome.usage,
            messages: vec![note],
        })
    }

    // ── Generation ──
    async fn generate(&self, state: &WorkflowState) -> Result<StageDelta> {
        let no_contexts = BTreeMap::new();
        let tool_contexts = state
            .research_result
            .as_ref()
            .map_or(&no_contexts, |r| &r.tool_contexts);
        let revision = state
            .critique
            .as_ref()
            .filter(|_| !state.content.is_empty())
            .map(|critique| Revision {
                draft: &state.content,
                critique,
            });

        let output = self
            .generation
            .generate(&GenerationRequest {
                topic: &state.topic,
                brand: &state.brand_config,
                tool_contexts,
                template_key: &state.template_key,
                use_cot: state.use_cot,
                iteration_count: state.iteration_count,
                meets_quality_threshold: state.meets_quality_threshold,
                revision,
            })
            .await?;
        Ok(output.into())
    }

    // ── Evaluation ──
    async fn evaluate(&self, state: &WorkflowState) -> Result<StageDelta> {
        if state.content.trim().is_empty() {
            return Err(Error::workflow(format!(
                "reached EVALUATING with no draft ({})",
                state.snapshot()
            )));
        }
        let history = generation_dialogue(&state.messages);
        let output = self
            .evaluation
            .evaluate(&EvaluationRequest {
                content: &state.content,
                brand: &state.brand_config,
                content_type: Some(&state.template_key),
                history: &history,
                requested_threshold: Some(state.quality_threshold),
                iteration_count: state.iteration_count,
            })
            .await?;
        Ok(output.into())
    }
}
