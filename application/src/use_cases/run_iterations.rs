//! Run Iterations use case
//!
//! Drives one [`Plan`] from `pending` to a terminal status: admits pending
//! variations through the [`LimitEnforcer`], starts them on the
//! [`ExecutionService`], polls the in-flight runs on a fixed tick, records
//! every outcome in the [`ResultCollector`], and aggregates once the plan is
//! done.
//!
//! # Loop
//!
//! ```text
//! ┌─► completion criteria met, or nothing pending and nothing in flight? ──► finish
//! │        │ no
//! │        ▼
//! │   admission pass (priority order, stops at the first transient denial;
//! │        │       in-flight runs keep being polled while a start is pending)
//! │        ▼
//! │   wait one tick (interrupted by stop())
//! │        │
//! │        ▼
//! └── poll every in-flight run concurrently, enforce local timeouts
//! ```
//!
//! All mutable state sits behind one mutex that is only ever locked between
//! awaits, so results and counters have a single writer at any moment.
//! Listener notifications are queued under the lock and delivered once it is
//! released.

use crate::config::RunnerParams;
use crate::ports::event_logger::{IterationEvent, IterationEventLogger, NoIterationLogger};
use crate::ports::execution_service::{
    CompletedRun, ExecutionError, ExecutionService, PollResponse, StartResponse,
};
use chrono::{DateTime, Utc};
use fanout_domain::{
    AggregatedResult, DenialReason, DomainError, ExecutionStrategy, IterationResult,
    LimitEnforcer, Plan, PlanStatus, PlanSummary, ResultCollector, ResultListener, ResultMetrics,
    Variation, VariationStatus, aggregate, notify_result_listeners, parse_confidence_from_output,
    score_result,
};
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error recorded when a run outlives its own time budget
pub const LOCAL_TIMEOUT_ERROR: &str = "time limit";

/// Error recorded when the execution service reports a timeout itself
pub const SERVICE_TIMEOUT_ERROR: &str = "execution service reported timeout";

/// Errors that end `execute()` abnormally.
///
/// Per-variation failures never show up here; they become failed results.
#[derive(Error, Debug)]
pub enum RunIterationsError {
    #[error("Plan is not pending (status: {0})")]
    NotPending(PlanStatus),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Callback invoked each time the execution service accepts a variation
pub type SpawnListener = Arc<dyn Fn(&Variation) + Send + Sync>;

/// Snapshot returned by [`RunIterationsUseCase::status`]
#[derive(Debug, Clone)]
pub struct RunnerStatus {
    pub plan: Plan,
    pub summary: PlanSummary,
}

/// A run the service accepted and has not finished yet
#[derive(Debug, Clone)]
struct InFlight {
    variation_id: String,
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    /// Fixed at spawn time, so late starters get less
    timeout: Duration,
}

impl InFlight {
    fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }
}

enum Admission {
    Allowed,
    /// Try again next cycle
    Deferred,
    /// Will never be admitted in this run
    Skip(DenialReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnOutcome {
    Started,
    Failed,
    Skipped,
    Deferred,
    /// Not pending, unknown, or the plan already ended
    Ignored,
}

/// A listener call queued until the state lock is released
enum Notice {
    Spawned(Variation),
    Finished(IterationResult),
}

struct RunState {
    collector: ResultCollector,
    limits: LimitEnforcer,
    in_flight: Vec<InFlight>,
    /// Admitted, waiting for the service to answer `start`
    starting: HashSet<String>,
    spawn_listeners: Vec<SpawnListener>,
    outbox: Vec<Notice>,
}

impl RunState {
    fn admission(&self, strategy: ExecutionStrategy) -> Admission {
        let active = self.limits.active_count();
        if strategy == ExecutionStrategy::Sequential && active > 0 {
            return Admission::Deferred;
        }

        let decision = self.limits.can_spawn();
        match decision.reason {
            _ if decision.allowed => Admission::Allowed,
            // with nothing in flight, no slot will ever free up
            Some(reason) if reason.is_exhausted() || active == 0 => Admission::Skip(reason),
            _ => Admission::Deferred,
        }
    }

    fn is_done(&self) -> bool {
        if self.collector.is_complete() {
            return true;
        }
        self.collector.plan().count_with_status(VariationStatus::Pending) == 0
            && self.in_flight.is_empty()
            && self.starting.is_empty()
    }

    fn record(&mut self, result: IterationResult) -> Result<(), DomainError> {
        self.limits.record_completion(&result);
        self.collector.insert_result(result.clone())?;
        self.outbox.push(Notice::Finished(result));
        Ok(())
    }
}

/// The runner: executes a plan's variations under its limits.
///
/// Methods take `&self`, so a shared handle can call [`stop`](Self::stop) or
/// [`status`](Self::status) while [`execute`](Self::execute) is running.
/// Listeners run after the state lock is released, so they may read
/// [`status`](Self::status) or [`results`](Self::results).
pub struct RunIterationsUseCase<S: ExecutionService + 'static> {
    service: Arc<S>,
    params: RunnerParams,
    state: Mutex<RunState>,
    cancel: CancellationToken,
    event_logger: Arc<dyn IterationEventLogger>,
}

impl<S: ExecutionService + 'static> RunIterationsUseCase<S> {
    pub fn new(service: Arc<S>, plan: Plan, params: RunnerParams) -> Self {
        let limits = LimitEnforcer::new(plan.limits.clone());
        Self {
            service,
            params,
            state: Mutex::new(RunState {
                collector: ResultCollector::new(plan),
                limits,
                in_flight: Vec::new(),
                starting: HashSet::new(),
                spawn_listeners: Vec::new(),
                outbox: Vec::new(),
            }),
            cancel: CancellationToken::new(),
            event_logger: Arc::new(NoIterationLogger),
        }
    }

    pub fn with_event_logger(mut self, logger: Arc<dyn IterationEventLogger>) -> Self {
        self.event_logger = logger;
        self
    }

    /// Token that stops the run when cancelled (e.g. from a Ctrl-C handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn on_result(&self, listener: ResultListener) {
        self.lock().collector.on_result(listener);
    }

    pub fn on_spawn(&self, listener: SpawnListener) {
        self.lock().spawn_listeners.push(listener);
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Public API ====================

    /// Run the plan to completion and aggregate its results.
    ///
    /// Returns early (still `Ok`) when [`stop`](Self::stop) is called; the
    /// aggregation then covers whatever finished before the stop.
    pub async fn execute(&self) -> Result<AggregatedResult, RunIterationsError> {
        self.begin()?;

        loop {
            if self.cancel.is_cancelled() || self.lock().is_done() {
                break;
            }

            self.admit_pending().await?;

            if self.cancel.is_cancelled() || self.lock().is_done() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.params.poll_interval) => {}
            }

            self.poll_in_flight().await?;
        }

        Ok(self.finish_plan())
    }

    /// Try to start one pending variation right now.
    ///
    /// Returns `true` only if the execution service accepted it. A variation
    /// whose budget is spent is marked `skipped`; a failed start marks it
    /// `failed`. Both return `false`.
    pub async fn spawn_variation(&self, variation_id: &str) -> bool {
        match self.try_spawn(variation_id).await {
            Ok(outcome) => outcome == SpawnOutcome::Started,
            Err(e) => {
                warn!(variation_id, error = %e, "Could not record spawn outcome");
                false
            }
        }
    }

    /// Cancel the plan. In-flight runs are left alone and keep their status.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.cancel_plan(&mut self.lock());
    }

    pub fn status(&self) -> RunnerStatus {
        let state = self.lock();
        RunnerStatus {
            plan: state.collector.plan().clone(),
            summary: state.collector.summary(),
        }
    }

    pub fn results(&self) -> Vec<IterationResult> {
        self.lock().collector.results().to_vec()
    }

    pub fn best_result(&self) -> Option<IterationResult> {
        self.lock().collector.best_result().cloned()
    }

    // ==================== Lifecycle ====================

    fn begin(&self) -> Result<(), RunIterationsError> {
        let mut state = self.lock();
        let plan = state.collector.plan_mut();
        if !plan.start() {
            return Err(RunIterationsError::NotPending(plan.status));
        }

        let plan_id = plan.id.clone();
        let strategy = plan.strategy;
        let variations = plan.variations.len();

        // restart the budget clock unless spawns already happened
        if state.limits.active_count() == 0 && state.limits.completed_count() == 0 {
            state.limits.reset();
        }

        info!(plan_id = %plan_id, variations, strategy = %strategy, "Plan started");
        self.event_logger.log(IterationEvent::new(
            "plan_started",
            json!({
                "plan_id": plan_id,
                "strategy": strategy,
                "variations": variations,
                "limits": state.limits.config(),
            }),
        ));
        Ok(())
    }

    fn finish_plan(&self) -> AggregatedResult {
        let mut state = self.lock();

        if self.cancel.is_cancelled() {
            self.cancel_plan(&mut state);
        } else {
            let leftover = state.collector.plan().pending_in_priority_order();
            for variation_id in leftover {
                self.skip(&mut state, &variation_id, "plan finished");
            }
            state.collector.plan_mut().complete();
        }

        let plan = state.collector.plan();
        let aggregated = aggregate(state.collector.results(), plan.aggregation);
        let summary = state.collector.summary();

        info!(
            plan_id = %plan.id,
            status = %plan.status,
            completed = summary.completed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            skipped = summary.skipped,
            confidence = aggregated.confidence,
            "Plan finished"
        );
        self.event_logger.log(IterationEvent::new(
            "plan_finished",
            json!({
                "plan_id": plan.id,
                "status": plan.status,
                "strategy": aggregated.strategy,
                "confidence": aggregated.confidence,
                "selected": aggregated
                    .selected_results
                    .iter()
                    .map(|r| r.variation_id.as_str())
                    .collect::<Vec<_>>(),
                "summary": summary,
            }),
        ));

        aggregated
    }

    fn cancel_plan(&self, state: &mut RunState) {
        let plan = state.collector.plan_mut();
        if plan.cancel() {
            info!(plan_id = %plan.id, "Plan cancelled");
            self.event_logger.log(IterationEvent::new(
                "plan_cancelled",
                json!({
                    "plan_id": plan.id,
                    "in_flight": state.in_flight.len(),
                }),
            ));
        }
    }

    // ==================== Admission ====================

    async fn admit_pending(&self) -> Result<(), RunIterationsError> {
        let pending = self.lock().collector.plan().pending_in_priority_order();
        for variation_id in pending {
            if self.cancel.is_cancelled() {
                break;
            }
            if self.try_spawn(&variation_id).await? == SpawnOutcome::Deferred {
                break;
            }
        }
        Ok(())
    }

    async fn try_spawn(&self, variation_id: &str) -> Result<SpawnOutcome, RunIterationsError> {
        let outcome = self.spawn_one(variation_id).await;
        self.flush_notices();
        outcome
    }

    async fn spawn_one(&self, variation_id: &str) -> Result<SpawnOutcome, RunIterationsError> {
        let (variation, budget) = {
            let mut state = self.lock();
            let plan = state.collector.plan();
            if plan.status.is_terminal() {
                return Ok(SpawnOutcome::Ignored);
            }
            let strategy = plan.strategy;
            let Some(variation) = plan.variation(variation_id) else {
                return Ok(SpawnOutcome::Ignored);
            };
            if variation.status != VariationStatus::Pending
                || state.starting.contains(variation_id)
            {
                return Ok(SpawnOutcome::Ignored);
            }
            let variation = variation.clone();

            match state.admission(strategy) {
                Admission::Allowed => {}
                Admission::Deferred => {
                    debug!(variation_id, "Admission deferred");
                    return Ok(SpawnOutcome::Deferred);
                }
                Admission::Skip(reason) => {
                    self.skip(&mut state, variation_id, reason.message());
                    return Ok(SpawnOutcome::Skipped);
                }
            }

            // reserve the slot before awaiting the service
            state.limits.record_spawn();
            state.starting.insert(variation_id.to_string());
            let budget = Duration::from_millis(state.limits.iteration_timeout_ms());
            (variation, budget)
        };

        let Some(response) = self.await_start(&variation, budget).await? else {
            let mut state = self.lock();
            state.starting.remove(variation_id);
            state.limits.release_spawn();
            debug!(variation_id, "Start abandoned after stop");
            return Ok(SpawnOutcome::Ignored);
        };

        let mut state = self.lock();
        state.starting.remove(variation_id);
        match response {
            Ok(StartResponse::Accepted { run_id, session_key }) => {
                let timeout_ms = state.limits.iteration_timeout_ms();
                let plan = state.collector.plan_mut();
                let plan_id = plan.id.clone();
                let Some(spawned) = plan.variation_mut(variation_id) else {
                    return Err(DomainError::UnknownVariation(variation_id.to_string()).into());
                };
                spawned.mark_spawned(run_id.clone(), session_key)?;
                let snapshot = spawned.clone();

                state.in_flight.push(InFlight {
                    variation_id: variation_id.to_string(),
                    run_id: run_id.clone(),
                    started_at: Utc::now(),
                    started: Instant::now(),
                    timeout: Duration::from_millis(timeout_ms),
                });

                info!(plan_id = %plan_id, variation_id, run_id = %run_id, timeout_ms, "Variation spawned");
                self.event_logger.log(IterationEvent::new(
                    "variation_spawned",
                    json!({
                        "plan_id": plan_id,
                        "variation_id": variation_id,
                        "label": snapshot.label,
                        "model": snapshot.model,
                        "thinking_level": snapshot.thinking_level,
                        "run_id": run_id,
                        "timeout_ms": timeout_ms,
                    }),
                ));
                state.outbox.push(Notice::Spawned(snapshot));
                Ok(SpawnOutcome::Started)
            }
            Ok(StartResponse::Error { error }) | Err(error) => {
                self.fail_start(&mut state, variation_id, error)?;
                Ok(SpawnOutcome::Failed)
            }
        }
    }

    /// Wait for the service to answer `start`, within `budget`, polling the
    /// runs already in flight meanwhile. `None` once the run is stopped.
    async fn await_start(
        &self,
        variation: &Variation,
        budget: Duration,
    ) -> Result<Option<Result<StartResponse, String>>, RunIterationsError> {
        let start = tokio::time::timeout(budget, self.service.start(variation));
        tokio::pin!(start);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                answered = &mut start => {
                    return Ok(Some(match answered {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!(
                            "execution service did not answer start within {} ms",
                            budget.as_millis()
                        )),
                    }));
                }
                _ = tokio::time::sleep(self.params.poll_interval) => {
                    self.poll_in_flight().await?;
                }
            }
        }
    }

    fn skip(&self, state: &mut RunState, variation_id: &str, reason: &str) {
        let plan = state.collector.plan_mut();
        let plan_id = plan.id.clone();
        let Some(variation) = plan.variation_mut(variation_id) else {
            return;
        };
        if variation.transition(VariationStatus::Skipped).is_err() {
            return;
        }

        info!(plan_id = %plan_id, variation_id, reason, "Variation skipped");
        self.event_logger.log(IterationEvent::new(
            "variation_skipped",
            json!({
                "plan_id": plan_id,
                "variation_id": variation_id,
                "reason": reason,
            }),
        ));
    }

    fn fail_start(
        &self,
        state: &mut RunState,
        variation_id: &str,
        error: String,
    ) -> Result<(), DomainError> {
        warn!(variation_id, error = %error, "Variation failed to start");
        let now = Utc::now();
        let result = IterationResult::failure(variation_id, error).with_timing(now, now);
        self.record(state, result)
    }

    // ==================== Polling ====================

    async fn poll_in_flight(&self) -> Result<(), RunIterationsError> {
        let runs = self.lock().in_flight.clone();
        if runs.is_empty() {
            return Ok(());
        }

        let service = &self.service;
        let tick = self.params.poll_interval;
        let polls = runs.iter().map(|run| async move {
            let remaining = run.remaining();
            if remaining.is_zero() {
                return None;
            }
            // an unanswered poll counts as still running for this tick
            tokio::time::timeout(remaining.min(tick), service.poll(&run.run_id))
                .await
                .ok()
        });
        let responses = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(()),
            responses = join_all(polls) => responses,
        };

        let recorded = self.record_polls(runs, responses);
        self.flush_notices();
        recorded
    }

    fn record_polls(
        &self,
        runs: Vec<InFlight>,
        responses: Vec<Option<Result<PollResponse, ExecutionError>>>,
    ) -> Result<(), RunIterationsError> {
        let mut state = self.lock();
        for (run, response) in runs.into_iter().zip(responses) {
            let Some(result) = self.interpret(&run, response) else {
                continue;
            };
            state.in_flight.retain(|r| r.run_id != run.run_id);
            self.record(&mut state, result)?;
        }
        Ok(())
    }

    /// Turn a poll response into a result, or `None` while still running.
    /// A missing response means the poll did not answer in time.
    fn interpret(
        &self,
        run: &InFlight,
        response: Option<Result<PollResponse, ExecutionError>>,
    ) -> Option<IterationResult> {
        let result = match response {
            None | Some(Ok(PollResponse::Running)) => {
                if !run.remaining().is_zero() {
                    return None;
                }
                IterationResult::timeout(&run.variation_id, LOCAL_TIMEOUT_ERROR)
            }
            Some(Ok(PollResponse::Completed(done))) => self.completed_result(run, done),
            Some(Ok(PollResponse::Error { error })) => {
                IterationResult::failure(&run.variation_id, error)
            }
            Some(Ok(PollResponse::Timeout)) => {
                IterationResult::timeout(&run.variation_id, SERVICE_TIMEOUT_ERROR)
            }
            Some(Err(e)) => IterationResult::failure(&run.variation_id, e.to_string()),
        };

        Some(
            result
                .with_run_id(run.run_id.clone())
                .with_timing(run.started_at, Utc::now()),
        )
    }

    fn completed_result(&self, run: &InFlight, done: CompletedRun) -> IterationResult {
        let reported = done.metrics.unwrap_or_default();
        let confidence = reported
            .confidence
            .filter(|c| c.is_finite())
            .or_else(|| parse_confidence_from_output(&done.output));

        let mut result = IterationResult::success(&run.variation_id, done.output).with_metrics(
            ResultMetrics {
                confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
                completeness: reported.completeness,
                code_quality: reported.code_quality,
                responsiveness: reported.responsiveness,
                overall_score: 0.0,
            },
        );
        if let Some(usage) = done.usage {
            result = result.with_usage(usage);
        }

        // duration feeds the speed term
        let result = result.with_timing(run.started_at, Utc::now());
        let score = reported
            .overall_score
            .filter(|s| s.is_finite())
            .or(confidence)
            .unwrap_or_else(|| score_result(&result, &self.params.scoring));
        result.with_overall_score(score)
    }

    // ==================== Recording ====================

    /// Deliver queued notices with the lock released.
    fn flush_notices(&self) {
        let (notices, spawn_listeners, result_listeners) = {
            let mut state = self.lock();
            if state.outbox.is_empty() {
                return;
            }
            (
                std::mem::take(&mut state.outbox),
                state.spawn_listeners.clone(),
                state.collector.listeners().to_vec(),
            )
        };

        for notice in notices {
            match notice {
                Notice::Spawned(variation) => notify_spawn(&spawn_listeners, &variation),
                Notice::Finished(result) => notify_result_listeners(&result_listeners, &result),
            }
        }
    }

    fn record(&self, state: &mut RunState, result: IterationResult) -> Result<(), DomainError> {
        let result = if result.success {
            result
        } else {
            let score = score_result(&result, &self.params.scoring);
            result.with_overall_score(score)
        };

        let plan_id = state.collector.plan().id.clone();
        if result.success {
            info!(
                plan_id = %plan_id,
                variation_id = %result.variation_id,
                score = result.score(),
                duration_ms = result.duration_ms,
                "Variation completed"
            );
        } else {
            warn!(
                plan_id = %plan_id,
                variation_id = %result.variation_id,
                timed_out = result.timed_out,
                error = result.error.as_deref().unwrap_or(""),
                "Variation failed"
            );
        }
        self.event_logger.log(IterationEvent::new(
            "variation_finished",
            json!({
                "plan_id": plan_id,
                "variation_id": result.variation_id,
                "run_id": result.run_id,
                "success": result.success,
                "timed_out": result.timed_out,
                "score": result.score(),
                "duration_ms": result.duration_ms,
                "usage": result.usage,
                "error": result.error,
            }),
        ));

        state.record(result)
    }
}

fn notify_spawn(listeners: &[SpawnListener], variation: &Variation) {
    for (index, listener) in listeners.iter().enumerate() {
        if catch_unwind(AssertUnwindSafe(|| listener(variation))).is_err() {
            warn!(
                listener = index,
                variation_id = %variation.id,
                "Spawn listener panicked; continuing"
            );
        }
    }
}
