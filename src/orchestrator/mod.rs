//! Composition root for the report workflow.
//!
//! Ties the pure state machine to the persisted store, the session backend
//! and the generation loop. Each operation checks that the workflow is at
//! the step the operation belongs to, does its work, persists the resulting
//! state change, then advances the machine.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::errors::{GuardViolation, OrchestratorError};
use crate::generation::{
    Evaluator, GenerationEngine, GenerationOutcome, LoopParams, run_generation,
};
use crate::session::service::SessionApi;
use crate::session::state::{Engine, LongTextStrategy, SessionState, SmartviewSelection};
use crate::session::store::SessionStore;
use crate::workflow::{self, Step, WorkflowContext};

pub struct WorkflowOrchestrator<S: SessionApi> {
    store: SessionStore,
    service: S,
    step: Step,
}

impl<S: SessionApi> WorkflowOrchestrator<S> {
    pub fn new(store: SessionStore, service: S) -> Self {
        Self {
            store,
            service,
            step: workflow::reset(),
        }
    }

    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn state(&self) -> SessionState {
        self.store.load()
    }

    fn expect_step(&self, expected: Step) -> Result<(), GuardViolation> {
        if self.step == expected {
            Ok(())
        } else {
            Err(GuardViolation::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }

    fn advance_with(&mut self, ctx: &WorkflowContext<'_>) -> Result<(), GuardViolation> {
        let from = self.step;
        self.step = workflow::advance(from, ctx)?;
        debug!(from = %from, to = %self.step, "workflow advanced");
        Ok(())
    }

    /// `select_engine` → `configure_projects`.
    pub fn select_engine(&mut self, engine: Engine) -> Result<(), OrchestratorError> {
        self.expect_step(Step::SelectEngine)?;
        let state = self.store.update_engine(engine);
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(engine = %engine, "engine selected");
        Ok(())
    }

    /// `configure_projects` → `upload_template`.
    pub fn configure_scope(
        &mut self,
        selection: SmartviewSelection,
    ) -> Result<(), OrchestratorError> {
        self.expect_step(Step::ConfigureProjects)?;
        let name = selection.smartview_name.clone();
        let projects = selection.projects.len();
        let state = self.store.update_smartview_selection(selection);
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(smartview = %name, projects, "scope configured");
        Ok(())
    }

    /// `upload_template` onward; a resumed session may fall through the
    /// checkpoints right here.
    pub fn register_template(&mut self, template_id: &str) -> Result<(), OrchestratorError> {
        self.expect_step(Step::UploadTemplate)?;
        let state = self.store.update_template_id(template_id);
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(template_id, "template registered");
        Ok(())
    }

    /// Satisfy the `check_fetched_data` checkpoint with fresh data.
    pub fn mark_data_fetched(&mut self, data_id: &str) -> Result<(), OrchestratorError> {
        self.expect_step(Step::CheckFetchedData)?;
        self.store.update_fetched_data_id(data_id);
        let state = self.store.update_fetched_data_flag(true);
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(data_id, "project data fetched");
        Ok(())
    }

    /// Complete the `mapping` step with a newly built mapping.
    pub fn record_mapping(&mut self, mapping_id: &str) -> Result<(), OrchestratorError> {
        self.expect_step(Step::Mapping)?;
        let state = self.store.update_mapping_id(mapping_id);
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(mapping_id, "mapping recorded");
        Ok(())
    }

    /// Answer the `check_mapping` checkpoint with "build a new one";
    /// proceeds to the `mapping` step.
    pub fn decline_reuse(&mut self) -> Result<(), OrchestratorError> {
        self.expect_step(Step::CheckMapping)?;
        let state = self.store.load();
        self.advance_with(&WorkflowContext::new(&state))?;
        Ok(())
    }

    /// At `check_mapping`, clone a prior mapping server-side instead of
    /// building a new one. Lands on `long_text_options`.
    pub async fn reuse_mapping(
        &mut self,
        source_mapping_id: &str,
    ) -> Result<(), OrchestratorError> {
        self.expect_step(Step::CheckMapping)?;
        let state = self.store.load();
        let copied = self
            .service
            .copy_mapping(&state.session_id, source_mapping_id)
            .await?;
        let mut state = self.store.update_mapping_id(source_mapping_id);
        if copied.has_fetched_data {
            state = self.store.update_fetched_data_flag(true);
        }
        self.advance_with(&WorkflowContext::new(&state))?;
        info!(
            source_mapping_id,
            carried_data = copied.has_fetched_data,
            "prior mapping reused"
        );
        Ok(())
    }

    /// `long_text_options` → `generating`; the strategy is pushed to the
    /// backend before the machine moves.
    pub async fn choose_strategy(
        &mut self,
        strategy: LongTextStrategy,
    ) -> Result<(), OrchestratorError> {
        self.expect_step(Step::LongTextOptions)?;
        let state = self.store.load();
        self.service
            .update_long_text_strategy(&state.session_id, strategy)
            .await?;
        self.advance_with(&WorkflowContext::with_strategy(&state, strategy))?;
        info!(strategy = %strategy, "long-text strategy chosen");
        Ok(())
    }

    /// Run the quality-gated loop from `generating` through `evaluating` to
    /// `done`, persisting the accepted artifact.
    pub async fn run(
        &mut self,
        engine: &dyn GenerationEngine,
        evaluator: &dyn Evaluator,
        strategy: LongTextStrategy,
        params: LoopParams,
        cancel: &watch::Receiver<bool>,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        self.expect_step(Step::Generating)?;
        let state = self.store.load();
        let outcome = run_generation(engine, evaluator, &state, strategy, params, cancel).await?;

        let state = self.store.update_artifact_id(outcome.artifact_id());
        let ctx = WorkflowContext::with_strategy(&state, strategy);
        self.advance_with(&ctx)?; // generating → evaluating
        self.advance_with(&ctx)?; // evaluating → done
        info!(
            artifact_id = outcome.artifact_id(),
            score = outcome.score(),
            "generation complete"
        );
        Ok(outcome)
    }

    /// Start over with a fresh session id; reusable artifacts survive.
    pub fn reset(&mut self) -> SessionState {
        let state = self.store.reset_session();
        self.step = workflow::reset();
        info!(session_id = %state.session_id, "session reset");
        state
    }

    /// Reconcile with the backend: when the server's `current_step` differs
    /// from the local optimistic step, the server wins.
    pub async fn resume(&mut self) -> Result<SessionState, OrchestratorError> {
        let state = self.store.load();
        let snapshot = self.service.get_session(&state.session_id).await?;
        if let Some(remote) = snapshot.session {
            if remote.current_step != self.step {
                info!(
                    local = %self.step,
                    remote = %remote.current_step,
                    "adopting server-side step"
                );
                self.step = remote.current_step;
            }
        }
        Ok(state)
    }
}
