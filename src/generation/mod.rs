//! The generate→evaluate→retry loop.
//!
//! One artifact is generated and scored per iteration, sequentially, because
//! each iteration's decision depends on the prior score. The loop accepts
//! the first candidate at or above the threshold; when the budget runs out
//! it returns the best-scoring candidate seen so far rather than the last
//! one. An engine error aborts immediately — a broken call is not improved
//! by retrying blindly within the same budget — while an evaluator error
//! scores that candidate 0 and still consumes an iteration.

pub mod backend;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::errors::{EngineError, LoopError};
use crate::session::state::{Engine, LongTextStrategy, SessionState};

pub use backend::HttpGenerationBackend;

pub const DEFAULT_MAX_ITERATIONS: u32 = 2;
pub const DEFAULT_THRESHOLD: u8 = 65;

/// Everything one generation attempt needs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub session_id: String,
    pub engine: Engine,
    pub template_id: Option<String>,
    pub mapping_id: String,
    pub long_text_strategy: LongTextStrategy,
}

/// Produces one candidate artifact per call; the artifact is opaque to the
/// loop and identified by a handle.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError>;
}

/// Scores a candidate artifact from 0 to 100.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, artifact_id: &str) -> Result<u8, EngineError>;
}

/// Loop bounds. Overridable via configuration, never hardcoded at call
/// sites.
#[derive(Debug, Clone, Copy)]
pub struct LoopParams {
    pub max_iterations: u32,
    pub threshold: u8,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A candidate reached the threshold.
    Accepted {
        artifact_id: String,
        score: u8,
        iterations_used: u32,
    },
    /// Budget exhausted below the threshold; carries the best candidate
    /// seen across all iterations.
    AcceptedWithWarning {
        artifact_id: String,
        score: u8,
        iterations_used: u32,
    },
}

impl GenerationOutcome {
    pub fn artifact_id(&self) -> &str {
        match self {
            GenerationOutcome::Accepted { artifact_id, .. }
            | GenerationOutcome::AcceptedWithWarning { artifact_id, .. } => artifact_id,
        }
    }

    pub fn score(&self) -> u8 {
        match self {
            GenerationOutcome::Accepted { score, .. }
            | GenerationOutcome::AcceptedWithWarning { score, .. } => *score,
        }
    }
}

/// Fresh cancellation channel; send `true` to abort the loop between calls.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Run the bounded quality-gated loop for one session.
///
/// Cancellation is observed before each generation call and before each
/// evaluation; a cancelled loop surfaces [`LoopError::Cancelled`] and leaves
/// no partial artifact behind.
pub async fn run_generation(
    engine: &dyn GenerationEngine,
    evaluator: &dyn Evaluator,
    session: &SessionState,
    strategy: LongTextStrategy,
    params: LoopParams,
    cancel: &watch::Receiver<bool>,
) -> Result<GenerationOutcome, LoopError> {
    let selected = session.engine.ok_or(LoopError::NotReady { missing: "engine" })?;
    let mapping_id = session
        .last_mapping_id
        .clone()
        .ok_or(LoopError::NotReady {
            missing: "lastMappingId",
        })?;
    if params.max_iterations == 0 {
        return Err(LoopError::EmptyBudget);
    }

    let request = GenerationRequest {
        session_id: session.session_id.clone(),
        engine: selected,
        template_id: session.last_template_id.clone(),
        mapping_id,
        long_text_strategy: strategy,
    };

    let mut best: Option<(String, u8)> = None;
    let mut iterations_used = 0u32;

    while iterations_used < params.max_iterations {
        if *cancel.borrow() {
            return Err(LoopError::Cancelled { iterations_used });
        }
        let iteration = iterations_used + 1;
        info!(iteration, engine = %selected, strategy = %strategy, "invoking generation engine");

        let artifact_id = engine
            .generate(&request)
            .await
            .map_err(|err| LoopError::GenerationFailed {
                iteration,
                message: err.to_string(),
            })?;

        if *cancel.borrow() {
            return Err(LoopError::Cancelled { iterations_used });
        }
        let score = match evaluator.evaluate(&artifact_id).await {
            Ok(score) => score.min(100),
            Err(err) => {
                warn!(
                    iteration,
                    artifact_id = %artifact_id,
                    error = %err,
                    "evaluation call failed; scoring candidate 0"
                );
                0
            }
        };
        iterations_used = iteration;
        info!(iteration, score, artifact_id = %artifact_id, "iteration evaluated");

        if score >= params.threshold {
            return Ok(GenerationOutcome::Accepted {
                artifact_id,
                score,
                iterations_used,
            });
        }

        // Equal scores prefer the most recent candidate: later iterations
        // had more context.
        if best.as_ref().is_none_or(|(_, prior)| score >= *prior) {
            best = Some((artifact_id, score));
        }
    }

    let (artifact_id, score) = best.ok_or(LoopError::EmptyBudget)?;
    warn!(
        score,
        threshold = params.threshold,
        iterations_used,
        "budget exhausted below threshold; returning best candidate"
    );
    Ok(GenerationOutcome::AcceptedWithWarning {
        artifact_id,
        score,
        iterations_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Engine returning artifact-1, artifact-2, ... or a scripted failure.
    struct ScriptedEngine {
        calls: AtomicU32,
        fail_on: Option<u32>,
    }

    impl ScriptedEngine {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_on: None,
            }
        }

        fn failing_on(call: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_on: Some(call),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationEngine for ScriptedEngine {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(call) {
                return Err(EngineError("engine exploded".into()));
            }
            Ok(format!("artifact-{call}"))
        }
    }

    /// Evaluator handing out a scripted sequence of scores or failures.
    struct ScriptedEvaluator {
        scores: Mutex<Vec<Result<u8, String>>>,
        calls: AtomicU32,
    }

    impl ScriptedEvaluator {
        fn new(scores: Vec<Result<u8, String>>) -> Self {
            Self {
                scores: Mutex::new(scores),
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn evaluate(&self, _artifact_id: &str) -> Result<u8, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut scores = self.scores.lock().unwrap();
            assert!(!scores.is_empty(), "more evaluations than scripted scores");
            scores.remove(0).map_err(EngineError)
        }
    }

    fn ready_session() -> SessionState {
        SessionState {
            engine: Some(Engine::ClaudePptx),
            last_template_id: Some("tpl-1".into()),
            last_mapping_id: Some("map-1".into()),
            ..SessionState::default()
        }
    }

    fn params() -> LoopParams {
        LoopParams {
            max_iterations: 2,
            threshold: 65,
        }
    }

    async fn run(
        engine: &ScriptedEngine,
        evaluator: &ScriptedEvaluator,
        params: LoopParams,
    ) -> Result<GenerationOutcome, LoopError> {
        let (_tx, rx) = cancellation();
        run_generation(
            engine,
            evaluator,
            &ready_session(),
            LongTextStrategy::Summarize,
            params,
            &rx,
        )
        .await
    }

    #[tokio::test]
    async fn low_scores_exhaust_budget_and_keep_the_best() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Ok(40), Ok(50)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::AcceptedWithWarning {
                artifact_id: "artifact-2".into(),
                score: 50,
                iterations_used: 2,
            }
        );
    }

    #[tokio::test]
    async fn threshold_hit_on_first_try_stops_after_one_iteration() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Ok(70)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Accepted {
                artifact_id: "artifact-1".into(),
                score: 70,
                iterations_used: 1,
            }
        );
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn retry_that_clears_the_threshold_is_accepted() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Ok(60), Ok(80)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Accepted {
                artifact_id: "artifact-2".into(),
                score: 80,
                iterations_used: 2,
            }
        );
    }

    #[tokio::test]
    async fn earlier_better_candidate_wins_over_a_worse_retry() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Ok(55), Ok(30)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(outcome.artifact_id(), "artifact-1");
        assert_eq!(outcome.score(), 55);
    }

    #[tokio::test]
    async fn equal_scores_prefer_the_later_candidate() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Ok(50), Ok(50)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(outcome.artifact_id(), "artifact-2");
    }

    #[tokio::test]
    async fn engine_failure_is_fatal_and_skips_evaluation() {
        let engine = ScriptedEngine::failing_on(1);
        let evaluator = ScriptedEvaluator::new(vec![]);
        let err = run(&engine, &evaluator, params()).await.unwrap_err();
        assert!(matches!(
            err,
            LoopError::GenerationFailed { iteration: 1, .. }
        ));
        assert_eq!(evaluator.call_count(), 0);
    }

    #[tokio::test]
    async fn evaluation_failure_scores_zero_and_consumes_the_iteration() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![Err("scorer down".into()), Ok(80)]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Accepted {
                artifact_id: "artifact-2".into(),
                score: 80,
                iterations_used: 2,
            }
        );
    }

    #[tokio::test]
    async fn all_evaluations_failing_still_yields_a_best_effort_result() {
        let engine = ScriptedEngine::new();
        let evaluator =
            ScriptedEvaluator::new(vec![Err("down".into()), Err("still down".into())]);
        let outcome = run(&engine, &evaluator, params()).await.unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::AcceptedWithWarning {
                artifact_id: "artifact-2".into(),
                score: 0,
                iterations_used: 2,
            }
        );
    }

    #[tokio::test]
    async fn cancellation_before_the_first_call_makes_no_engine_call() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![]);
        let (tx, rx) = cancellation();
        tx.send(true).unwrap();
        let err = run_generation(
            &engine,
            &evaluator,
            &ready_session(),
            LongTextStrategy::Omit,
            params(),
            &rx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoopError::Cancelled { iterations_used: 0 }));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_mapping_is_reported_before_any_call() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![]);
        let session = SessionState {
            engine: Some(Engine::Gamma),
            ..SessionState::default()
        };
        let (_tx, rx) = cancellation();
        let err = run_generation(
            &engine,
            &evaluator,
            &session,
            LongTextStrategy::Ellipsis,
            params(),
            &rx,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            LoopError::NotReady {
                missing: "lastMappingId"
            }
        ));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_iteration_budget_is_rejected() {
        let engine = ScriptedEngine::new();
        let evaluator = ScriptedEvaluator::new(vec![]);
        let err = run(
            &engine,
            &evaluator,
            LoopParams {
                max_iterations: 0,
                threshold: 65,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoopError::EmptyBudget));
    }
}
