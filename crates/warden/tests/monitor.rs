//! End-to-end tests for the monitor loop: mock Steam, mock server,
//! in-memory version store, real scheduler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden::prelude::*;
use warden::{RestartOutcome, Submission};
use warden_control::ControlError;
use warden_source::{AddonMetadata, SourceError};

// =========================================================================
// Mock update source
// =========================================================================

#[derive(Default)]
struct SourceState {
    /// `None` simulates an unreachable API.
    game_build: Option<String>,
    addons: HashMap<String, i64>,
    game_queries: usize,
    addon_queries: usize,
}

#[derive(Clone, Default)]
struct MockSource {
    state: Arc<Mutex<SourceState>>,
}

impl MockSource {
    fn new(build: &str, addons: &[(&str, i64)]) -> Self {
        let source = Self::default();
        {
            let mut state = source.state.lock().unwrap();
            state.game_build = Some(build.to_string());
            for (id, time) in addons {
                state.addons.insert(id.to_string(), *time);
            }
        }
        source
    }

    fn set_build(&self, build: Option<&str>) {
        self.state.lock().unwrap().game_build = build.map(str::to_string);
    }

    fn set_addon(&self, id: &str, time: i64) {
        self.state.lock().unwrap().addons.insert(id.to_string(), time);
    }

    fn game_queries(&self) -> usize {
        self.state.lock().unwrap().game_queries
    }

    fn addon_queries(&self) -> usize {
        self.state.lock().unwrap().addon_queries
    }
}

impl UpdateSource for MockSource {
    async fn game_build_id(&self) -> Result<String, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.game_queries += 1;
        state
            .game_build
            .clone()
            .ok_or_else(|| SourceError::MissingField("buildid".into()))
    }

    async fn addon_metadata(&self, id: &str) -> Result<AddonMetadata, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.addon_queries += 1;
        state
            .addons
            .get(id)
            .map(|&last_updated| AddonMetadata { last_updated })
            .ok_or_else(|| SourceError::AddonNotFound(id.to_string()))
    }
}

// =========================================================================
// Mock server control
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    PlayerCount,
    Broadcast(String),
    Save,
    Restart,
    TriggerCheck,
    IsRunning,
}

struct MockControl {
    players: Mutex<PlayerCount>,
    running: Mutex<bool>,
    restart_failures: Mutex<u32>,
    restart_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl MockControl {
    fn with_players(count: u32) -> Arc<Self> {
        Arc::new(Self {
            players: Mutex::new(PlayerCount::Known(count)),
            running: Mutex::new(true),
            restart_failures: Mutex::new(0),
            restart_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count_of(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    fn broadcasts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Broadcast(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

impl ServerControl for MockControl {
    async fn player_count(&self) -> PlayerCount {
        self.record(Call::PlayerCount);
        *self.players.lock().unwrap()
    }

    async fn broadcast(&self, message: &str) -> Result<(), ControlError> {
        self.record(Call::Broadcast(message.to_string()));
        Ok(())
    }

    async fn request_save(&self) -> Result<(), ControlError> {
        self.record(Call::Save);
        Ok(())
    }

    async fn request_restart(&self) -> Result<(), ControlError> {
        self.record(Call::Restart);
        let delay = *self.restart_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut failures = self.restart_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ControlError::ProcessManager("exit status 1".into()));
        }
        Ok(())
    }

    async fn trigger_update_check(&self) -> Result<(), ControlError> {
        self.record(Call::TriggerCheck);
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, ControlError> {
        self.record(Call::IsRunning);
        Ok(*self.running.lock().unwrap())
    }
}

// =========================================================================
// Helpers
// =========================================================================

const APP: &str = "108600";

fn game() -> Subject {
    Subject::Game(APP.to_string())
}

fn addon(id: &str) -> Subject {
    Subject::Mod(id.to_string())
}

fn steam(addons: &[&str]) -> SteamConfig {
    SteamConfig {
        app_id: APP.to_string(),
        workshop_items: addons.iter().map(|s| s.to_string()).collect(),
        ..SteamConfig::default()
    }
}

/// Store that already knows game build `build`.
fn store_with_build(build: &str) -> VersionStore {
    let mut store = VersionStore::open_in_memory().unwrap();
    store.record_and_diff(&game(), build).unwrap();
    store
}

fn monitor(
    source: &MockSource,
    store: VersionStore,
    control: &Arc<MockControl>,
    addons: &[&str],
    config: MonitorConfig,
) -> MonitorLoop<MockSource, MockControl> {
    let scheduler = RestartScheduler::new(Arc::clone(control), RestartConfig::default());
    MonitorLoop::new(source.clone(), store, scheduler, &steam(addons), config)
}

// =========================================================================
// Update detection to restart
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_game_update_on_empty_server_restarts_once() {
    let source = MockSource::new("A", &[]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    let report = m.tick().await;
    assert!(report.changed.is_empty());
    assert_eq!(report.submission, None);

    source.set_build(Some("B"));
    let report = m.tick().await;
    assert_eq!(report.changed, vec![game()]);
    assert_eq!(report.submission, Some(Submission::Started));

    m.scheduler().wait_idle().await;

    assert_eq!(control.count_of(&Call::Save), 1);
    assert_eq!(control.count_of(&Call::Restart), 1);
    assert!(control.broadcasts().is_empty());
    assert_eq!(m.store().last_seen(&game()).unwrap().as_deref(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn test_game_update_with_players_warns_then_restarts() {
    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(2);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    m.tick().await;
    m.scheduler().wait_idle().await;

    let defaults = RestartConfig::default();
    assert_eq!(
        control.broadcasts(),
        vec![
            defaults.first_warning_message,
            defaults.final_warning_message,
            defaults.restart_message,
        ]
    );
    assert_eq!(control.count_of(&Call::Save), 1);
    assert_eq!(control.count_of(&Call::Restart), 1);
    assert_eq!(
        m.scheduler().snapshot().last_outcome,
        Some(RestartOutcome::Restarted)
    );
}

#[tokio::test(start_paused = true)]
async fn test_several_changes_produce_one_request() {
    let source = MockSource::new("A", &[("111", 100), ("222", 200)]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        VersionStore::open_in_memory().unwrap(),
        &control,
        &["111", "222"],
        MonitorConfig::default(),
    );

    // First pass only seeds.
    m.tick().await;

    source.set_build(Some("B"));
    source.set_addon("111", 101);
    source.set_addon("222", 201);
    let report = m.tick().await;

    assert_eq!(report.changed, vec![game(), addon("111"), addon("222")]);
    assert_eq!(report.submission, Some(Submission::Started));

    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::PlayerCount), 1);
    assert_eq!(control.count_of(&Call::Restart), 1);
}

#[tokio::test(start_paused = true)]
async fn test_addon_update_alone_triggers_restart() {
    let source = MockSource::new("A", &[("111", 100)]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        VersionStore::open_in_memory().unwrap(),
        &control,
        &["111"],
        MonitorConfig::default(),
    );
    m.tick().await;

    // Any difference counts, even an older timestamp.
    source.set_addon("111", 50);
    let report = m.tick().await;

    assert_eq!(report.changed, vec![addon("111")]);
    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 1);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_source_failure_leaves_store_untouched() {
    let source = MockSource::new("A", &[("111", 100)]);
    source.set_build(None);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &["111", "999"],
        MonitorConfig::default(),
    );

    let report = m.tick().await;

    assert_eq!(report.failed, vec![game(), addon("999")]);
    assert_eq!(report.seeded, vec![addon("111")]);
    assert_eq!(report.submission, None);
    assert_eq!(m.store().last_seen(&game()).unwrap().as_deref(), Some("A"));
    assert_eq!(m.store().last_seen(&addon("999")).unwrap(), None);
    assert!(control.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_player_count_retries_pending_update() {
    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(0);
    *control.players.lock().unwrap() = PlayerCount::Unknown;
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    m.tick().await;
    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 0);
    assert_eq!(
        m.scheduler().snapshot().last_outcome,
        Some(RestartOutcome::Discarded)
    );
    assert_eq!(m.pending_updates(), vec![game()]);

    // Same build "B": nothing new upstream, but it was never applied.
    *control.players.lock().unwrap() = PlayerCount::Known(0);
    let report = m.tick().await;
    assert!(report.changed.is_empty());
    assert!(report.retried);
    assert_eq!(report.submission, Some(Submission::Started));

    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 1);

    let report = m.tick().await;
    assert_eq!(report.submission, None);
    assert!(m.pending_updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_restart_retries_pending_update() {
    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(0);
    *control.restart_failures.lock().unwrap() = 1;
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    m.tick().await;
    m.scheduler().wait_idle().await;
    assert!(matches!(
        m.scheduler().snapshot().last_outcome,
        Some(RestartOutcome::RestartFailed(_))
    ));
    assert_eq!(m.pending_updates(), vec![game()]);

    let report = m.tick().await;
    assert!(report.retried);
    assert_eq!(report.submission, Some(Submission::Started));
    m.scheduler().wait_idle().await;

    assert_eq!(control.count_of(&Call::Restart), 2);
    assert_eq!(
        m.scheduler().snapshot().last_outcome,
        Some(RestartOutcome::Restarted)
    );

    let report = m.tick().await;
    assert_eq!(report.submission, None);
    assert_eq!(control.count_of(&Call::Restart), 2);
}

#[tokio::test(start_paused = true)]
async fn test_store_write_failure_skips_subject_without_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("versions.db");
    {
        let mut store = VersionStore::open(&path).unwrap();
        store.record_and_diff(&game(), "A").unwrap();
    }

    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        VersionStore::open_read_only(&path).unwrap(),
        &control,
        &[],
        MonitorConfig::default(),
    );

    let report = m.tick().await;

    assert_eq!(report.failed, vec![game()]);
    assert!(report.changed.is_empty());
    assert_eq!(report.submission, None);
    assert!(m.pending_updates().is_empty());
    assert_eq!(m.store().last_seen(&game()).unwrap().as_deref(), Some("A"));
    assert!(control.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_during_executing_restart_is_retried_afterwards() {
    let source = MockSource::new("B", &[("111", 100)]);
    let control = MockControl::with_players(0);
    *control.restart_delay.lock().unwrap() = Some(Duration::from_secs(30));
    let mut store = store_with_build("A");
    store.record_and_diff(&addon("111"), "100").unwrap();
    let mut m = monitor(&source, store, &control, &["111"], MonitorConfig::default());

    m.tick().await;
    let mut phase = m.scheduler().subscribe();
    phase.wait_for(|p| *p == RestartPhase::Executing).await.unwrap();

    source.set_addon("111", 101);
    assert_eq!(
        m.tick().await.submission,
        Some(Submission::Coalesced(RestartPhase::Executing))
    );
    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 1);

    // The addon arrived too late for the first restart.
    let report = m.tick().await;
    assert!(report.retried);
    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 2);

    let report = m.tick().await;
    assert_eq!(report.submission, None);
    assert!(m.pending_updates().is_empty());
}

// =========================================================================
// Cold start
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_observation_is_seeded_silently() {
    let source = MockSource::new("A", &[("111", 100)]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        VersionStore::open_in_memory().unwrap(),
        &control,
        &["111"],
        MonitorConfig::default(),
    );

    let report = m.tick().await;
    assert_eq!(report.seeded, vec![game(), addon("111")]);
    assert!(report.changed.is_empty());
    assert_eq!(report.submission, None);

    let report = m.tick().await;
    assert!(report.seeded.is_empty());
    assert!(report.changed.is_empty());
    assert!(control.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_observation_can_trigger_restart() {
    let source = MockSource::new("A", &[]);
    let control = MockControl::with_players(0);
    let config = MonitorConfig {
        restart_on_first_observation: true,
        ..MonitorConfig::default()
    };
    let mut m = monitor(
        &source,
        VersionStore::open_in_memory().unwrap(),
        &control,
        &[],
        config,
    );

    let report = m.tick().await;
    assert_eq!(report.changed, vec![game()]);
    assert_eq!(report.submission, Some(Submission::Started));
    m.scheduler().wait_idle().await;
    assert_eq!(control.count_of(&Call::Restart), 1);
}

#[tokio::test(start_paused = true)]
async fn test_seed_never_restarts() {
    let source = MockSource::new("B", &[("111", 100)]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &["111"],
        MonitorConfig::default(),
    );

    let report = m.seed().await;

    assert_eq!(report.seeded, vec![game(), addon("111")]);
    assert_eq!(report.submission, None);
    assert!(m.scheduler().phase().is_idle());
    assert_eq!(m.store().last_seen(&game()).unwrap().as_deref(), Some("B"));
    assert!(control.calls().is_empty());
}

// =========================================================================
// Coalescing and cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_updates_during_pending_restart_are_coalesced() {
    let source = MockSource::new("A", &[("111", 100)]);
    let control = MockControl::with_players(3);
    let mut m = monitor(
        &source,
        VersionStore::open_in_memory().unwrap(),
        &control,
        &["111"],
        MonitorConfig::default(),
    );
    m.tick().await;

    source.set_build(Some("B"));
    assert_eq!(m.tick().await.submission, Some(Submission::Started));

    let mut phase = m.scheduler().subscribe();
    phase.wait_for(|p| *p == RestartPhase::Scheduled).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;

    source.set_addon("111", 101);
    assert_eq!(
        m.tick().await.submission,
        Some(Submission::Coalesced(RestartPhase::Scheduled))
    );

    m.scheduler().wait_idle().await;

    let first = RestartConfig::default().first_warning_message;
    assert_eq!(control.count_of(&Call::Broadcast(first)), 1);
    assert_eq!(control.count_of(&Call::Restart), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_cancels_pending_restart() {
    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(3);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    m.tick().await;
    let mut phase = m.scheduler().subscribe();
    phase.wait_for(|p| *p == RestartPhase::Scheduled).await.unwrap();

    *control.running.lock().unwrap() = false;
    let report = m.tick().await;
    assert_eq!(report.cancelled, Some(RestartPhase::Scheduled));
    assert!(m.scheduler().phase().is_idle());

    assert!(m.pending_updates().is_empty());

    tokio::time::sleep(Duration::from_secs(40 * 60)).await;
    assert_eq!(m.tick().await.submission, None);
    assert_eq!(control.count_of(&Call::Restart), 0);
    assert_eq!(control.broadcasts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_liveness_is_only_checked_while_restart_pending() {
    let source = MockSource::new("A", &[]);
    let control = MockControl::with_players(0);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    m.tick().await;
    m.tick().await;
    assert_eq!(control.count_of(&Call::IsRunning), 0);
}

// =========================================================================
// Config switches
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_addon_checks_can_be_disabled() {
    let source = MockSource::new("A", &[("111", 100)]);
    let control = MockControl::with_players(0);
    let config = MonitorConfig {
        check_addons: false,
        ..MonitorConfig::default()
    };
    let mut m = monitor(&source, store_with_build("A"), &control, &["111"], config);

    m.tick().await;
    assert_eq!(source.game_queries(), 1);
    assert_eq!(source.addon_queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_check_trigger_is_sent_each_cycle() {
    let source = MockSource::new("A", &[]);
    let control = MockControl::with_players(0);
    let config = MonitorConfig {
        trigger_server_check: true,
        ..MonitorConfig::default()
    };
    let mut m = monitor(&source, store_with_build("A"), &control, &[], config);

    m.tick().await;
    m.tick().await;
    assert_eq!(control.count_of(&Call::TriggerCheck), 2);
}

// =========================================================================
// Run loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_run_checks_on_interval_and_cancels_on_shutdown() {
    let source = MockSource::new("B", &[]);
    let control = MockControl::with_players(3);
    let mut m = monitor(
        &source,
        store_with_build("A"),
        &control,
        &[],
        MonitorConfig::default(),
    );

    // Checks at 0 s, 300 s and 600 s; shutdown mid-warning.
    m.run(tokio::time::sleep(Duration::from_secs(601))).await;

    assert_eq!(source.game_queries(), 3);
    assert!(m.scheduler().phase().is_idle());
    assert_eq!(
        m.scheduler().snapshot().last_outcome,
        Some(RestartOutcome::Cancelled("monitor shutting down".into()))
    );
    assert_eq!(control.count_of(&Call::Restart), 0);
}
