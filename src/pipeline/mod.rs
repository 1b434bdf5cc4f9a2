//! The update pipeline: a fixed sequence of steps from discovery to build
//! verification, driven by [`Pipeline::run`].

pub mod context;
pub mod orchestrator;
pub mod outcome;

pub use context::RunContext;
pub use orchestrator::{Collaborators, Pipeline, PipelineOptions};
pub use outcome::{
    CheckKind, CheckRecord, EXIT_FAILURE, EXIT_OK, EarlyExitReason, Outcome, RunReason,
    RunResult, RunStatistics, StepName, StepOutcome,
};
