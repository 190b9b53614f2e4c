//! Workflow engine: the iteration-controlled content run.
//!
//! A run threads one [`WorkflowState`] through the stages of
//! `brandforge-agent`. Stages return deltas; the [`IterationController`]
//! merges them and owns every transition, including the decision to revise a
//! draft again or stop. [`ContentEngine`] wires the controller from
//! configuration and is the entry point front-ends call.

pub mod controller;
pub mod engine;
pub mod state;

pub use controller::{IterationController, RunFailure};
pub use engine::ContentEngine;
pub use state::{CycleRecord, Phase, RunRequest, RunUsage, StageDelta, WorkflowState};
