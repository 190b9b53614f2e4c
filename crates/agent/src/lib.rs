//! The pipeline stages of brandforge.
//!
//! Each stage is a small struct around the model gateway (or the tool
//! registry) with one async entry point. Stages never touch workflow state:
//! they take borrowed inputs and return an output the controller merges.
//!
//! 1. **Planning**: research or write, and with which capabilities
//! 2. **Research**: run the selected capabilities, collect contexts
//! 3. **Generation**: render the prompt, request one draft
//! 4. **Evaluation**: critique the draft, compare against the threshold

pub mod evaluation;
pub mod generation;
pub mod planning;
pub mod research;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use evaluation::{
    Critique, CritiqueScores, EvaluationMetadata, EvaluationOutput, EvaluationRequest,
    EvaluationRubric, EvaluationStage, resolve_threshold,
};
pub use generation::{
    GenerationMetadata, GenerationOutput, GenerationRequest, GenerationStage, InstructionVariant,
    Revision, generation_dialogue, template_keys,
};
pub use planning::{
    GatewayRoutingAdapter, Planner, PlanningDecision, PlanningInput, PlanningOutcome, RawRouting,
    Route, RoutingAdapter, RoutingAnswer, plan_after_research,
};
pub use research::{ResearchOutcome, ResearchResult, ResearchStage};
