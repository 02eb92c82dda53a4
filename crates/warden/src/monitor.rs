//! The periodic update check.
//!
//! Each cycle asks the [`UpdateSource`] for fresh identifiers, lets the
//! [`VersionStore`] decide what changed, and hands at most one
//! [`RestartRequest`] to the [`RestartScheduler`]. The cycle never waits
//! for the restart itself; that runs on the scheduler's own task.
//!
//! A change is recorded in the store as soon as it is seen, but stays
//! pending in the monitor until a restart that covered it succeeds. If
//! the workflow is discarded (unknown player count) or the restart
//! fails, the next cycle submits the pending changes again.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use warden_control::{RconControl, ServerControl};
use warden_restart::{
    RestartError, RestartOutcome, RestartPhase, RestartReason, RestartRequest, RestartScheduler,
    Submission,
};
use warden_source::{SourceError, SteamConfig, SteamSource, UpdateSource};
use warden_store::{Subject, VersionStore};

use crate::{MonitorConfig, WardenConfig, WardenError};

/// What one check cycle found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Subjects whose identifier changed since the last cycle.
    pub changed: Vec<Subject>,
    /// Subjects seen for the first time and only recorded.
    pub seeded: Vec<Subject>,
    /// Subjects that could not be checked or recorded this cycle.
    pub failed: Vec<Subject>,
    /// Set when a restart request was handed to the scheduler.
    pub submission: Option<Submission>,
    /// Set when the request carried only changes from earlier cycles
    /// whose restart did not happen.
    pub retried: bool,
    /// Set when a pending restart was dropped because the server had been
    /// stopped; holds the interrupted phase.
    pub cancelled: Option<RestartPhase>,
}

/// Drives update checks for one game server.
pub struct MonitorLoop<S: UpdateSource, C: ServerControl> {
    source: S,
    store: VersionStore,
    scheduler: RestartScheduler<C>,
    config: MonitorConfig,
    app_id: String,
    addons: Vec<String>,
    /// Changes recorded in the store that no successful restart has
    /// applied yet.
    unapplied: BTreeSet<Subject>,
    /// The part of `unapplied` handed to the current or last workflow.
    covered: BTreeSet<Subject>,
}

impl MonitorLoop<SteamSource, RconControl> {
    /// Wires the production stack: Steam, SQLite at
    /// `monitor.database_path`, RCON and systemd.
    pub fn from_config(config: &WardenConfig) -> Result<Self, WardenError> {
        let source = SteamSource::from_config(&config.steam)?;
        let store = VersionStore::open(&config.monitor.database_path)?;
        let control = Arc::new(RconControl::from_config(&config.server));
        let scheduler = RestartScheduler::new(control, config.restart.clone());
        Ok(Self::new(
            source,
            store,
            scheduler,
            &config.steam,
            config.monitor.clone(),
        ))
    }
}

impl<S: UpdateSource, C: ServerControl> MonitorLoop<S, C> {
    /// Tracks the game `steam.app_id` and the addons in
    /// `steam.workshop_items`.
    pub fn new(
        source: S,
        store: VersionStore,
        scheduler: RestartScheduler<C>,
        steam: &SteamConfig,
        config: MonitorConfig,
    ) -> Self {
        Self {
            source,
            store,
            scheduler,
            config,
            app_id: steam.app_id.clone(),
            addons: steam.tracked_addons(),
            unapplied: BTreeSet::new(),
            covered: BTreeSet::new(),
        }
    }

    pub fn scheduler(&self) -> &RestartScheduler<C> {
        &self.scheduler
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Changes still waiting for a successful restart.
    pub fn pending_updates(&self) -> Vec<Subject> {
        self.unapplied.iter().cloned().collect()
    }

    /// Runs one check cycle.
    ///
    /// 1. Optionally asks the server to check its own addons.
    /// 2. Cancels a pending restart if the server was stopped by hand.
    /// 3. Settles the outcome of the last workflow: changes it covered
    ///    stop being pending only if it restarted the server.
    /// 4. Queries every tracked subject and records what changed.
    /// 5. Submits one restart request covering all pending changes, when
    ///    something new changed or the scheduler is idle.
    ///
    /// Failures are logged and reported; they never abort the cycle.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.config.trigger_server_check {
            if let Err(e) = self.scheduler.control().trigger_update_check().await {
                warn!(error = %e, "server update check command failed");
            }
        }

        report.cancelled = cancel_if_stopped(&self.scheduler).await;
        self.settle_last_run();

        self.observe_all(false, &mut report).await;
        self.unapplied.extend(report.changed.iter().cloned());

        let idle = self.scheduler.phase().is_idle();
        if !self.unapplied.is_empty() && (idle || !report.changed.is_empty()) {
            let subjects = self.pending_updates();
            let request = RestartRequest::new(reasons_for(&subjects));
            report.retried = report.changed.is_empty();
            if report.retried {
                info!(reasons = %request.describe(), "retrying restart for pending updates");
            } else {
                info!(reasons = %request.describe(), "updates detected");
            }

            let submission = self.scheduler.submit(request);
            match submission {
                Submission::Started => self.covered = self.unapplied.clone(),
                Submission::Coalesced(phase) if phase != RestartPhase::Executing => {
                    self.covered.extend(subjects);
                }
                // Too late for the running restart to pick these up.
                Submission::Coalesced(_) => {}
            }
            report.submission = Some(submission);
        }

        report
    }

    /// Applies the outcome of the finished workflow to the pending set.
    fn settle_last_run(&mut self) {
        if self.covered.is_empty() {
            return;
        }
        let snapshot = self.scheduler.snapshot();
        if !snapshot.phase.is_idle() {
            return;
        }

        let covered = std::mem::take(&mut self.covered);
        match snapshot.last_outcome {
            Some(RestartOutcome::Restarted) => {
                self.unapplied.retain(|s| !covered.contains(s));
            }
            // Someone stopped the server on purpose; it picks up the
            // current build when it is started again.
            Some(RestartOutcome::Cancelled(reason)) => {
                info!(%reason, dropped = covered.len(), "pending updates dropped with cancelled restart");
                self.unapplied.retain(|s| !covered.contains(s));
            }
            Some(RestartOutcome::Discarded | RestartOutcome::RestartFailed(_)) | None => {
                warn!(pending = self.unapplied.len(), "restart did not happen, updates still pending");
            }
        }
    }

    /// Records the current identifier of every tracked subject without
    /// ever requesting a restart.
    pub async fn seed(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.observe_all(true, &mut report).await;
        info!(
            recorded = report.seeded.len(),
            failed = report.failed.len(),
            "version store seeded"
        );
        report
    }

    /// Checks every `monitor.check_interval_secs` until `shutdown`
    /// resolves.
    ///
    /// The first check runs immediately. A cycle that overruns the
    /// interval delays the next one instead of bunching them up. On
    /// shutdown a pending restart is cancelled; one that is already
    /// executing is waited for.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let period = self.config.check_interval();
        info!(
            interval = ?period,
            app_id = %self.app_id,
            addons = self.addons.len(),
            "update monitor started"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let report = self.tick().await;
                    debug!(
                        changed = report.changed.len(),
                        seeded = report.seeded.len(),
                        failed = report.failed.len(),
                        "update check finished"
                    );
                }
            }
        }

        info!("update monitor stopping");
        match self.scheduler.cancel("monitor shutting down") {
            Ok(phase) => info!(%phase, "pending restart cancelled"),
            Err(RestartError::NothingToCancel) => {}
            Err(RestartError::NotCancellable(_)) => {
                info!("restart in progress, waiting for it to finish");
                self.scheduler.wait_idle().await;
            }
        }
    }

    async fn observe_all(&mut self, seeding: bool, report: &mut TickReport) {
        let game = self.source.game_build_id().await;
        self.record(Subject::Game(self.app_id.clone()), game, seeding, report);

        if !self.config.check_addons {
            return;
        }
        for id in self.addons.clone() {
            let observed = self
                .source
                .addon_metadata(&id)
                .await
                .map(|meta| meta.identifier());
            self.record(Subject::Mod(id), observed, seeding, report);
        }
    }

    fn record(
        &mut self,
        subject: Subject,
        observed: Result<String, SourceError>,
        seeding: bool,
        report: &mut TickReport,
    ) {
        let identifier = match observed {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!(%subject, error = %e, "update check failed, will retry next cycle");
                report.failed.push(subject);
                return;
            }
        };

        let first_seen = match self.store.last_seen(&subject) {
            Ok(previous) => previous.is_none(),
            Err(e) => {
                error!(%subject, error = %e, "failed to read stored build identifier");
                report.failed.push(subject);
                return;
            }
        };

        match self.store.record_and_diff(&subject, &identifier) {
            Ok(false) => debug!(%subject, %identifier, "no change"),
            Ok(true) if seeding || (first_seen && !self.config.restart_on_first_observation) => {
                info!(%subject, %identifier, "first observation recorded");
                report.seeded.push(subject);
            }
            Ok(true) => {
                info!(%subject, %identifier, "update detected");
                report.changed.push(subject);
            }
            Err(e) => {
                error!(%subject, error = %e, "failed to record build identifier");
                report.failed.push(subject);
            }
        }
    }
}

/// Drops a pending restart if the process manager says the server is
/// down: someone stopped it on purpose.
async fn cancel_if_stopped<C: ServerControl>(
    scheduler: &RestartScheduler<C>,
) -> Option<RestartPhase> {
    if !scheduler.phase().is_cancellable() {
        return None;
    }
    match scheduler.control().is_running().await {
        Ok(true) => None,
        Ok(false) => match scheduler.cancel("server was stopped") {
            Ok(phase) => {
                warn!(%phase, "server is not running, pending restart cancelled");
                Some(phase)
            }
            // The workflow moved on while we were asking.
            Err(e) => {
                debug!(error = %e, "no restart to cancel");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "could not query server status");
            None
        }
    }
}

/// One `GameUpdate` if the game changed, one `ModUpdate` for all changed
/// addons.
fn reasons_for(changed: &[Subject]) -> Vec<RestartReason> {
    let mut reasons = Vec::new();
    if changed.iter().any(|s| matches!(s, Subject::Game(_))) {
        reasons.push(RestartReason::GameUpdate);
    }
    let mods: Vec<String> = changed
        .iter()
        .filter_map(|s| match s {
            Subject::Mod(id) => Some(id.clone()),
            Subject::Game(_) => None,
        })
        .collect();
    if !mods.is_empty() {
        reasons.push(RestartReason::ModUpdate(mods));
    }
    reasons
}
