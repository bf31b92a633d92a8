//! Typed error hierarchy for the reportflow workflow.
//!
//! Three enums cover the three failure domains:
//! - `GuardViolation` — a workflow transition whose precondition is unmet
//! - `LoopError` — fatal failures of the generate→evaluate loop
//! - `ServiceError` — remote backend failures, surfaced as values
//!
//! Guard violations and loop errors are recoverable by the user (supply the
//! missing input, retry the action); they never carry partial state changes.

use thiserror::Error;

use crate::workflow::Step;

/// An attempted transition whose precondition is unmet. Each variant names
/// the missing precondition so the caller can report exactly what to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("cannot leave {step}: no generation engine selected")]
    MissingEngine { step: Step },

    #[error("cannot leave {step}: smartview selection is empty")]
    EmptySmartviewSelection { step: Step },

    #[error("cannot leave {step}: no template uploaded")]
    MissingTemplate { step: Step },

    #[error("cannot leave {step}: project data has not been fetched")]
    DataNotFetched { step: Step },

    #[error("cannot leave {step}: no field mapping recorded")]
    MissingMapping { step: Step },

    #[error("cannot leave {step}: no long-text strategy selected")]
    MissingStrategy { step: Step },

    #[error("{step} is terminal; only reset leaves it")]
    TerminalStep { step: Step },

    #[error("regeneration is only valid from evaluating, not {step}")]
    NotEvaluating { step: Step },

    #[error("operation belongs to {expected}, but the session is at {actual}")]
    WrongStep { expected: Step, actual: Step },
}

/// Fatal failures of the generation-evaluation loop. A low score is never an
/// error — it either retries or degrades to a best-effort outcome.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("generation requires {missing} on the session")]
    NotReady { missing: &'static str },

    #[error("maxIterations must be at least 1")]
    EmptyBudget,

    #[error("generation engine failed on iteration {iteration}: {message}")]
    GenerationFailed { iteration: u32, message: String },

    #[error("generation cancelled after {iterations_used} completed iterations")]
    Cancelled { iterations_used: u32 },
}

/// A single engine or evaluator call failing. The loop decides whether this
/// is fatal (generation) or degrades to a zero score (evaluation).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Remote backend failures, converted to values at the service boundary so
/// the orchestrator always has a determinate shape to act on.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("{endpoint} reported failure: {message}")]
    Backend { endpoint: String, message: String },

    #[error("unexpected response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

/// Union of everything an orchestrator operation can surface.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    #[error(transparent)]
    Remote(#[from] ServiceError),

    #[error(transparent)]
    Loop(#[from] LoopError),
}
