//! The ordered workflow state machine.
//!
//! Ten steps, strictly linear forward progress, with two documented
//! exceptions: the `check_fetched_data` / `check_mapping` checkpoints fall
//! straight through when a resumed session already satisfies them, and
//! `evaluating` may loop back to `generating` while the quality gate
//! retries. Everything here is a pure function over `(step, context)` so it
//! is testable without any UI or I/O.

use serde::{Deserialize, Serialize};

use crate::errors::GuardViolation;
use crate::session::state::{LongTextStrategy, SessionState};

/// One position in the workflow. `current_step` is always one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SelectEngine,
    ConfigureProjects,
    UploadTemplate,
    CheckFetchedData,
    CheckMapping,
    Mapping,
    LongTextOptions,
    Generating,
    Evaluating,
    Done,
}

/// Total order for forward progress.
pub const STEP_ORDER: [Step; 10] = [
    Step::SelectEngine,
    Step::ConfigureProjects,
    Step::UploadTemplate,
    Step::CheckFetchedData,
    Step::CheckMapping,
    Step::Mapping,
    Step::LongTextOptions,
    Step::Generating,
    Step::Evaluating,
    Step::Done,
];

pub const INITIAL_STEP: Step = Step::SelectEngine;

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::SelectEngine => "select_engine",
            Step::ConfigureProjects => "configure_projects",
            Step::UploadTemplate => "upload_template",
            Step::CheckFetchedData => "check_fetched_data",
            Step::CheckMapping => "check_mapping",
            Step::Mapping => "mapping",
            Step::LongTextOptions => "long_text_options",
            Step::Generating => "generating",
            Step::Evaluating => "evaluating",
            Step::Done => "done",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Step::SelectEngine => 0,
            Step::ConfigureProjects => 1,
            Step::UploadTemplate => 2,
            Step::CheckFetchedData => 3,
            Step::CheckMapping => 4,
            Step::Mapping => 5,
            Step::LongTextOptions => 6,
            Step::Generating => 7,
            Step::Evaluating => 8,
            Step::Done => 9,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Step::Done
    }

    fn next_in_order(&self) -> Option<Step> {
        STEP_ORDER.get(self.index() + 1).copied()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the guards need to evaluate a transition.
pub struct WorkflowContext<'a> {
    pub state: &'a SessionState,
    pub strategy: Option<LongTextStrategy>,
}

impl<'a> WorkflowContext<'a> {
    pub fn new(state: &'a SessionState) -> Self {
        Self {
            state,
            strategy: None,
        }
    }

    pub fn with_strategy(state: &'a SessionState, strategy: LongTextStrategy) -> Self {
        Self {
            state,
            strategy: Some(strategy),
        }
    }

    fn scope_selected(&self) -> bool {
        self.state
            .smartview_selection
            .as_ref()
            .is_some_and(|selection| !selection.is_empty())
    }

    fn mapping_reusable(&self) -> bool {
        self.state.last_mapping_id.is_some()
    }
}

/// Check the guard for leaving `step`, reporting the missing precondition.
pub fn can_advance(step: Step, ctx: &WorkflowContext<'_>) -> Result<(), GuardViolation> {
    match step {
        Step::SelectEngine if ctx.state.engine.is_none() => {
            Err(GuardViolation::MissingEngine { step })
        }
        Step::ConfigureProjects if !ctx.scope_selected() => {
            Err(GuardViolation::EmptySmartviewSelection { step })
        }
        Step::UploadTemplate if ctx.state.last_template_id.is_none() => {
            Err(GuardViolation::MissingTemplate { step })
        }
        Step::CheckFetchedData if !ctx.state.has_fetched_data => {
            Err(GuardViolation::DataNotFetched { step })
        }
        Step::Mapping if ctx.state.last_mapping_id.is_none() => {
            Err(GuardViolation::MissingMapping { step })
        }
        Step::LongTextOptions if ctx.strategy.is_none() => {
            Err(GuardViolation::MissingStrategy { step })
        }
        Step::Done => Err(GuardViolation::TerminalStep { step }),
        _ => Ok(()),
    }
}

/// A checkpoint whose condition is already satisfied resolves past the work
/// it would otherwise demand.
fn checkpoint_target(step: Step, ctx: &WorkflowContext<'_>) -> Option<Step> {
    match step {
        Step::CheckFetchedData if ctx.state.has_fetched_data => Some(Step::CheckMapping),
        Step::CheckMapping if ctx.mapping_reusable() => Some(Step::LongTextOptions),
        _ => None,
    }
}

/// Advance one step, falling through checkpoints a resumed session already
/// satisfies. Fails with a [`GuardViolation`] and no state change when the
/// current step's guard is unmet.
pub fn advance(step: Step, ctx: &WorkflowContext<'_>) -> Result<Step, GuardViolation> {
    can_advance(step, ctx)?;
    let mut next = match checkpoint_target(step, ctx) {
        Some(target) => target,
        None => step
            .next_in_order()
            .ok_or(GuardViolation::TerminalStep { step })?,
    };
    while let Some(target) = checkpoint_target(next, ctx) {
        next = target;
    }
    Ok(next)
}

/// The documented loop-back: the quality gate sends `evaluating` back to
/// `generating` for another attempt. Invalid from any other step.
pub fn regenerate(step: Step) -> Result<Step, GuardViolation> {
    if step == Step::Evaluating {
        Ok(Step::Generating)
    } else {
        Err(GuardViolation::NotEvaluating { step })
    }
}

/// The only transition that does not follow the forward order.
pub fn reset() -> Step {
    INITIAL_STEP
}
