//! The restart scheduler: one cancellable workflow per server.
//!
//! # Concurrency
//!
//! All scheduler state sits behind one `std::sync::Mutex`. Every
//! transition, and the "is a run in flight?" check in [`submit`], is a
//! single critical section that never spans an `.await`. The workflow
//! itself (player query, broadcasts, timers, restart) runs on a spawned
//! Tokio task and only re-enters the lock to commit a transition.
//!
//! Each run is stamped with a generation number. Cancelling bumps the
//! generation and wakes the run's timers; any transition attempted by a
//! task whose generation is stale is refused, so a timer that fires after
//! a cancellation is a no-op.
//!
//! [`submit`]: RestartScheduler::submit

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};
use warden_control::{ControlError, PlayerCount, ServerControl};

use crate::request::{describe_reasons, merge_reasons};
use crate::{RestartConfig, RestartError, RestartPhase, RestartReason, RestartRequest};

/// What [`RestartScheduler::submit`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The scheduler was idle; a new workflow was started.
    Started,
    /// A workflow was already running in the given phase; the request
    /// was folded into it.
    Coalesced(RestartPhase),
}

/// How the most recent workflow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Save and restart were issued and the restart succeeded.
    Restarted,
    /// The restart command failed. The game process was left as it was.
    RestartFailed(String),
    /// The player count could not be determined; nothing was scheduled.
    Discarded,
    /// The workflow was cancelled before executing.
    Cancelled(String),
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSnapshot {
    pub phase: RestartPhase,
    /// Reasons of the running workflow (empty when idle).
    pub reasons: Vec<RestartReason>,
    /// When the running workflow was started.
    pub started_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<RestartOutcome>,
}

/// The live workflow. Exists only while the phase is not `Idle`.
struct ActiveRun {
    reasons: Vec<RestartReason>,
    started_at: DateTime<Utc>,
    /// Wakes the run's timers on cancellation.
    cancel: Arc<Notify>,
}

struct RunState {
    phase: RestartPhase,
    generation: u64,
    run: Option<ActiveRun>,
    last_outcome: Option<RestartOutcome>,
}

struct Shared<C: ServerControl> {
    control: Arc<C>,
    config: RestartConfig,
    state: Mutex<RunState>,
    phase_tx: watch::Sender<RestartPhase>,
}

/// Decides between immediate and deferred restarts and runs the warning
/// timeline.
///
/// Cheap to clone; clones share the same state. There must be exactly one
/// scheduler (and its clones) per game server.
pub struct RestartScheduler<C: ServerControl> {
    shared: Arc<Shared<C>>,
}

impl<C: ServerControl> Clone for RestartScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: ServerControl> RestartScheduler<C> {
    /// Creates an idle scheduler that drives `control`.
    pub fn new(control: Arc<C>, config: RestartConfig) -> Self {
        let (phase_tx, _) = watch::channel(RestartPhase::Idle);
        Self {
            shared: Arc::new(Shared {
                control,
                config: config.validated(),
                state: Mutex::new(RunState {
                    phase: RestartPhase::Idle,
                    generation: 0,
                    run: None,
                    last_outcome: None,
                }),
                phase_tx,
            }),
        }
    }

    /// The control handle the workflow uses.
    pub fn control(&self) -> &Arc<C> {
        &self.shared.control
    }

    pub fn config(&self) -> &RestartConfig {
        &self.shared.config
    }

    /// Hands a restart request to the scheduler.
    ///
    /// Never waits for the workflow. If the scheduler is idle a new
    /// workflow is spawned on the current Tokio runtime; otherwise the
    /// request's reasons are merged into the running one and nothing else
    /// happens (no new timers, no extra messages).
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: RestartRequest) -> Submission {
        let (generation, cancel) = {
            let mut state = self.shared.lock();
            if !state.phase.is_idle() {
                let phase = state.phase;
                if let Some(run) = state.run.as_mut() {
                    merge_reasons(&mut run.reasons, request.reasons);
                }
                info!(%phase, "restart already in progress, request coalesced");
                return Submission::Coalesced(phase);
            }

            state.generation += 1;
            let cancel = Arc::new(Notify::new());
            info!(
                reasons = %request.describe(),
                generation = state.generation,
                "restart requested"
            );
            state.run = Some(ActiveRun {
                reasons: request.reasons,
                started_at: request.created_at,
                cancel: Arc::clone(&cancel),
            });
            self.shared.set_phase(&mut state, RestartPhase::Evaluating);
            (state.generation, cancel)
        };

        tokio::spawn(run_workflow(Arc::clone(&self.shared), generation, cancel));
        Submission::Started
    }

    /// Aborts the running workflow before it reaches `Executing`.
    ///
    /// Returns the phase that was interrupted. Timers of the cancelled
    /// run are woken and will not act.
    ///
    /// # Errors
    /// - [`RestartError::NothingToCancel`] if idle
    /// - [`RestartError::NotCancellable`] while executing
    pub fn cancel(&self, reason: &str) -> Result<RestartPhase, RestartError> {
        let mut state = self.shared.lock();
        let phase = state.phase;
        if phase.is_idle() {
            return Err(RestartError::NothingToCancel);
        }
        if !phase.is_cancellable() {
            return Err(RestartError::NotCancellable(phase));
        }

        state.generation += 1;
        if let Some(run) = state.run.take() {
            run.cancel.notify_one();
        }
        state.last_outcome = Some(RestartOutcome::Cancelled(reason.to_string()));
        self.shared.set_phase(&mut state, RestartPhase::Idle);
        info!(%phase, reason, "scheduled restart cancelled");
        Ok(phase)
    }

    /// Current phase.
    pub fn phase(&self) -> RestartPhase {
        self.shared.lock().phase
    }

    /// Watch channel carrying the latest phase.
    pub fn subscribe(&self) -> watch::Receiver<RestartPhase> {
        self.shared.phase_tx.subscribe()
    }

    pub fn snapshot(&self) -> RestartSnapshot {
        let state = self.shared.lock();
        RestartSnapshot {
            phase: state.phase,
            reasons: state
                .run
                .as_ref()
                .map(|r| r.reasons.clone())
                .unwrap_or_default(),
            started_at: state.run.as_ref().map(|r| r.started_at),
            last_outcome: state.last_outcome.clone(),
        }
    }

    /// Waits until the scheduler is idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot
        // observe a closed channel.
        let _ = rx.wait_for(RestartPhase::is_idle).await;
    }
}

impl<C: ServerControl> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        // A panic while holding the lock leaves plain data behind; keep
        // going with it rather than wedging the monitor.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut RunState, next: RestartPhase) {
        debug_assert!(
            state.phase.can_transition_to(next),
            "illegal restart transition {} -> {}",
            state.phase,
            next
        );
        debug!(from = %state.phase, to = %next, "restart phase change");
        state.phase = next;
        self.phase_tx.send_replace(next);
    }

    /// Commits `next` if `generation` is still the live run.
    fn advance(&self, generation: u64, next: RestartPhase) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.run.is_none() {
            debug!(generation, %next, "stale restart step ignored");
            return false;
        }
        self.set_phase(&mut state, next);
        true
    }

    /// `true` if `generation` is still the live run.
    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.generation == generation && state.run.is_some()
    }

    /// Ends the run `generation` and returns to `Idle`. Returns `false`
    /// if the run was already superseded.
    fn finish(&self, generation: u64, outcome: RestartOutcome) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.run.is_none() {
            return false;
        }
        state.run = None;
        state.last_outcome = Some(outcome);
        self.set_phase(&mut state, RestartPhase::Idle);
        true
    }

    /// Reasons of the live run, for logging.
    fn describe_run(&self) -> String {
        self.lock()
            .run
            .as_ref()
            .map(|r| describe_reasons(&r.reasons))
            .unwrap_or_default()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ControlError>>,
    ) -> Result<T, ControlError> {
        bounded_by(self.config.call_timeout(), call).await
    }

    async fn player_count(&self) -> PlayerCount {
        let limit = self.config.call_timeout();
        match tokio::time::timeout(limit, self.control.player_count()).await {
            Ok(count) => count,
            Err(_) => {
                warn!(timeout = ?limit, "player count query timed out");
                PlayerCount::Unknown
            }
        }
    }

    async fn broadcast(&self, message: &str) {
        if message.is_empty() {
            return;
        }
        if let Err(e) = self.bounded(self.control.broadcast(message)).await {
            // Players miss one notice; the timeline still runs.
            warn!(error = %e, "restart broadcast failed");
        }
    }
}

async fn bounded_by<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ControlError>>,
) -> Result<T, ControlError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ControlError::Timeout(limit)))
}

/// Sleeps for `duration` unless the run is cancelled first.
///
/// Returns `false` if woken by cancellation.
async fn wait(cancel: &Notify, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.notified() => false,
    }
}

async fn run_workflow<C: ServerControl>(shared: Arc<Shared<C>>, generation: u64, cancel: Arc<Notify>) {
    let count = shared.player_count().await;

    match count {
        PlayerCount::Unknown => {
            if shared.finish(generation, RestartOutcome::Discarded) {
                warn!("could not determine player count, skipping restart until next detection");
            }
        }
        PlayerCount::Known(0) => {
            if !shared.advance(generation, RestartPhase::Executing) {
                return;
            }
            info!("no players connected, restarting immediately");
            execute(&shared, generation).await;
        }
        PlayerCount::Known(players) => {
            if !shared.advance(generation, RestartPhase::Scheduled) {
                return;
            }
            info!(
                players,
                lead = ?shared.config.total_lead(),
                reasons = %shared.describe_run(),
                "players connected, restart scheduled with warnings"
            );
            shared.broadcast(&shared.config.first_warning_message).await;

            if !wait(&cancel, shared.config.first_warning_lead()).await
                || !shared.advance(generation, RestartPhase::Warning1)
            {
                return;
            }
            shared.broadcast(&shared.config.final_warning_message).await;

            if !wait(&cancel, shared.config.final_warning_lead()).await
                || !shared.is_current(generation)
            {
                return;
            }
            // A cancel that lands while this notice is in flight cannot
            // recall it; the grace wait below still sees the cancel and
            // nothing is executed.
            shared.broadcast(&shared.config.restart_message).await;
            if !shared.is_current(generation) {
                info!("restart cancelled while the final notice was being sent");
                return;
            }

            if !wait(&cancel, shared.config.grace()).await
                || !shared.advance(generation, RestartPhase::Executing)
            {
                return;
            }
            execute(&shared, generation).await;
        }
    }
}

async fn execute<C: ServerControl>(shared: &Shared<C>, generation: u64) {
    info!(reasons = %shared.describe_run(), "executing restart");

    if let Err(e) = shared.bounded(shared.control.request_save()).await {
        // The server also saves on an orderly shutdown.
        warn!(error = %e, "world save failed, restarting anyway");
    }

    let limit = shared.config.restart_timeout();
    let outcome = match bounded_by(limit, shared.control.request_restart()).await {
        Ok(()) => {
            info!("restart completed");
            RestartOutcome::Restarted
        }
        Err(e @ ControlError::Timeout(_)) => {
            // The process manager may still be working through the stop.
            error!(error = %e, timeout = ?limit, "restart did not finish in time, server state unknown");
            RestartOutcome::RestartFailed(e.to_string())
        }
        Err(e) => {
            error!(error = %e, "restart failed, server left running; will retry on next detection");
            RestartOutcome::RestartFailed(e.to_string())
        }
    };
    shared.finish(generation, outcome);
}
