// ── Controller abstraction ──
//
// Full lifecycle management for an ETI/Domo controller connection.
// Handles the session, device discovery, the status long-poll loop, energy
// polling, command routing, and bounded teardown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use etidomo_api::{
    DomoClient, Feature, FeatureList, LightSwitch, OpeningMove, RawRecord, TransportConfig,
    ZoneConfig,
};
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::{Command, CommandEnvelope, CommandResult, CoverAction};
use crate::config::{BackoffConfig, ControllerConfig, TeardownConfig};
use crate::energy::{EnergyStore, EnergyTracker};
use crate::error::CoreError;
use crate::model::{
    Device, DeviceKind, DomoEvent, EntityId, Floor, LightState, Room, Scenario, ThermoView,
    fields, set_point_tenths,
};
use crate::store::{DataStore, Reconciliation};
use crate::stream::EntityStream;

const COMMAND_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 256;

/// Keep-alive requests are sent at this fraction of the session lifetime.
const KEEP_ALIVE_DIVISOR: u32 = 2;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── Teardown report ──────────────────────────────────────────────

/// Background tasks owned by a connected controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    EnergyPoller,
    StatusListener,
    CommandProcessor,
    KeepAlive,
    /// Delayed scenario reload after an activation.
    ScenarioRefresh,
}

impl TaskKind {
    /// How long teardown waits for this task before aborting it.
    pub fn teardown_budget(self, config: &TeardownConfig) -> Duration {
        match self {
            Self::EnergyPoller => config.energy_task,
            Self::StatusListener => config.status_listener,
            Self::CommandProcessor | Self::KeepAlive | Self::ScenarioRefresh => {
                config.other_tasks
            }
        }
    }
}

/// How a background task ended during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskExit {
    Stopped,
    /// Did not stop within its budget and was aborted.
    TimedOut,
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub task: TaskKind,
    pub exit: TaskExit,
    pub waited_ms: u64,
}

/// What `disconnect()` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub tasks: Vec<TaskOutcome>,
    /// Energy counters were written during teardown.
    pub energy_persisted: bool,
    pub elapsed_ms: u64,
}

impl TeardownReport {
    /// Every task stopped on its own.
    pub fn is_clean(&self) -> bool {
        self.tasks.iter().all(|t| t.exit == TaskExit::Stopped)
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Manages the full
/// connection lifecycle: session, discovery, background polling,
/// command routing, and reactive entity streaming.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<DataStore>,
    energy: EnergyTracker,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<Arc<DomoEvent>>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child of `cancel`, replaced on every connect so the controller can
    /// reconnect after a disconnect.
    cancel_child: Mutex<CancellationToken>,
    client: Mutex<Option<Arc<DomoClient>>>,
    identity: Mutex<Option<FeatureList>>,
    features: Mutex<Vec<Feature>>,
    task_handles: Mutex<Vec<(TaskKind, JoinHandle<()>)>>,
}

impl Controller {
    /// Create a new Controller from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to log in and start background tasks.
    pub fn new(config: ControllerConfig) -> Self {
        let store = Arc::new(DataStore::new());
        let energy = EnergyTracker::new(config.state_dir.as_ref().map(EnergyStore::in_dir));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                energy,
                connection_state,
                event_tx,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                client: Mutex::new(None),
                identity: Mutex::new(None),
                features: Mutex::new(Vec::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Access the energy counters.
    pub fn energy(&self) -> &EnergyTracker {
        &self.inner.energy
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the controller.
    ///
    /// Logs in, reads features, topology, devices and scenarios, restores
    /// energy counters, and spawns the background tasks.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        if let Err(e) = self.establish().await {
            *self.inner.client.lock().await = None;
            self.set_state(ConnectionState::Failed);
            return Err(e);
        }

        match self.inner.energy.restore().await {
            Ok(0) => {}
            Ok(count) => debug!(count, "energy counters restored"),
            Err(e) => warn!(error = %e, "could not restore energy counters"),
        }

        // Spawn background tasks
        let config = &self.inner.config;
        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push((
                TaskKind::CommandProcessor,
                tokio::spawn(command_processor_task(ctrl, rx, child.clone())),
            ));
        }

        if config.listen {
            let ctrl = self.clone();
            handles.push((
                TaskKind::StatusListener,
                tokio::spawn(status_listener_task(ctrl, child.clone())),
            ));
        }

        if config.energy {
            let ctrl = self.clone();
            handles.push((
                TaskKind::EnergyPoller,
                tokio::spawn(energy_task(ctrl, child.clone())),
            ));
        }

        if config.keep_alive {
            let ctrl = self.clone();
            handles.push((
                TaskKind::KeepAlive,
                tokio::spawn(keep_alive_task(ctrl, child.clone())),
            ));
        }
        drop(handles);

        self.set_state(ConnectionState::Connected);
        info!(
            host = %config.host,
            devices = self.inner.store.device_count(),
            scenarios = self.inner.store.scenario_count(),
            "connected to controller"
        );
        Ok(())
    }

    /// Log in and load the initial inventory.
    async fn establish(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let client = Arc::new(DomoClient::new(
            &config.host,
            config.username.clone(),
            config.password.clone(),
            &transport,
        )?);

        client.login().await?;
        debug!(endpoint = %client.endpoint(), "session established");

        let identity = client.feature_list().await?;
        let features = supported_features(&identity);
        debug!(
            swver = identity.swver.as_deref().unwrap_or("-"),
            features = ?features,
            "controller features"
        );

        *self.inner.client.lock().await = Some(client);
        *self.inner.identity.lock().await = Some(identity);
        *self.inner.features.lock().await = features;

        self.refresh_topology().await?;
        self.pull_devices().await?;
        if self.has_feature(&Feature::Scenarios).await {
            self.refresh_scenarios().await?;
        }
        Ok(())
    }

    /// Disconnect from the controller.
    ///
    /// Cancels background tasks and waits for each within its teardown
    /// budget, aborting any that overrun. Persists energy counters, drops
    /// the session and credentials, and clears the store.
    pub async fn disconnect(&self) -> TeardownReport {
        let started = Instant::now();

        // Cancel the child token (not the parent, so reconnect works).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles: Vec<(TaskKind, JoinHandle<()>)> =
            self.inner.task_handles.lock().await.drain(..).collect();
        handles.sort_by_key(|(kind, _)| *kind);

        let mut report = TeardownReport::default();
        for (kind, handle) in handles {
            let budget = kind.teardown_budget(&self.inner.config.teardown);
            report.tasks.push(join_bounded(kind, handle, budget).await);
        }

        match self.inner.energy.persist().await {
            Ok(written) => report.energy_persisted = written,
            Err(e) => warn!(error = %e, "could not persist energy counters"),
        }

        if let Some(client) = self.inner.client.lock().await.take() {
            client.invalidate().await;
        }
        *self.inner.identity.lock().await = None;
        self.inner.features.lock().await.clear();

        // Recreate command channel so reconnects can spawn a fresh receiver.
        // The previous receiver is consumed by the command processor task.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        self.inner.store.clear();
        self.set_state(ConnectionState::Disconnected);

        report.elapsed_ms = millis(started.elapsed());
        if report.is_clean() {
            debug!(elapsed_ms = report.elapsed_ms, "disconnected");
        } else {
            warn!(elapsed_ms = report.elapsed_ms, "disconnected with forced task cleanup");
        }
        report
    }

    // ── Services ─────────────────────────────────────────────────

    /// Re-read every supported device list and apply each record to its
    /// device. Returns the number of devices that changed.
    pub async fn force_update(&self) -> Result<usize, CoreError> {
        let client = self.client().await?;
        let features = self.inner.features.lock().await.clone();
        let store = &self.inner.store;

        let mut changed = 0;
        for feature in &features {
            let Some(kind) = DeviceKind::for_feature(feature) else {
                continue;
            };
            let listing = client.list_devices(feature).await?;
            for record in &listing.array {
                for device in store.apply_device_update(record, Some(kind)) {
                    changed += 1;
                    self.emit(DomoEvent::DeviceUpdated {
                        at: Utc::now(),
                        device,
                    });
                }
            }
            for (measurement, record) in listing.analog_sensors() {
                if let Some(device) = store.apply_analog_update(measurement, record) {
                    changed += 1;
                    self.emit(DomoEvent::DeviceUpdated {
                        at: Utc::now(),
                        device,
                    });
                }
            }
        }

        info!(changed, "force update complete");
        Ok(changed)
    }

    /// Re-read the full device inventory and reconcile the store against
    /// it: vanished devices are removed, new ones added.
    pub async fn pull_devices(&self) -> Result<Reconciliation, CoreError> {
        let client = self.client().await?;
        let features = self.inner.features.lock().await.clone();

        let devices = read_inventory(&client, &features).await?;
        if self.is_closing().await {
            debug!("connection closing, discarding device inventory");
            return Err(CoreError::ControllerDisconnected);
        }
        let outcome = self.inner.store.reconcile_devices(devices);

        if !outcome.added.is_empty() {
            info!(count = outcome.added.len(), "new devices discovered");
            self.emit(DomoEvent::DevicesAdded {
                at: Utc::now(),
                entity_ids: outcome.added.clone(),
            });
        }
        if !outcome.removed.is_empty() {
            info!(count = outcome.removed.len(), "devices no longer reported, removed");
            self.emit(DomoEvent::DevicesRemoved {
                at: Utc::now(),
                entity_ids: outcome.removed.clone(),
            });
        }
        Ok(outcome)
    }

    /// Replace the scenario list. Returns the number of scenarios.
    pub async fn refresh_scenarios(&self) -> Result<usize, CoreError> {
        let client = self.client().await?;
        let records = client.list_scenarios().await?;
        if self.is_closing().await {
            debug!("connection closing, discarding scenario list");
            return Err(CoreError::ControllerDisconnected);
        }

        let scenarios: Vec<Scenario> = records
            .iter()
            .filter_map(|record| {
                let scenario = Scenario::from_record(record);
                if scenario.is_none() {
                    warn!(?record, "skipping scenario without id");
                }
                scenario
            })
            .collect();

        let count = self.inner.store.replace_scenarios(scenarios);
        debug!(count, "scenario list refreshed");
        self.emit(DomoEvent::ScenariosRefreshed {
            at: Utc::now(),
            count,
        });
        Ok(count)
    }

    /// Read the energy meters once and feed the counters.
    /// Returns the number of meters whose reading changed.
    pub async fn poll_energy(&self) -> Result<usize, CoreError> {
        let client = self.client().await?;
        let budget = self.inner.config.energy_timeout;

        let readings = tokio::time::timeout(budget, client.meters(Some(budget)))
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: budget.as_secs(),
            })??;

        let store = &self.inner.store;
        let mut changed = 0;
        for record in &readings {
            for device in store.apply_device_update(record, Some(DeviceKind::EnergySensor)) {
                changed += 1;
                self.emit(DomoEvent::DeviceUpdated {
                    at: Utc::now(),
                    device,
                });
            }
        }

        let now = Utc::now();
        for meter in store.devices_of_kind(DeviceKind::EnergySensor) {
            self.inner.energy.record(&meter, now).await;
        }
        if let Err(e) = self.inner.energy.persist().await {
            warn!(error = %e, "could not persist energy counters");
        }

        trace!(readings = readings.len(), changed, "energy poll complete");
        Ok(changed)
    }

    /// Re-read floors and rooms.
    pub async fn refresh_topology(&self) -> Result<(), CoreError> {
        let client = self.client().await?;
        let floors: Vec<Floor> = client.floors().await?.into_iter().map(Floor::from).collect();
        let rooms: Vec<Room> = client.rooms().await?.into_iter().map(Room::from).collect();
        debug!(floors = floors.len(), rooms = rooms.len(), "topology loaded");
        self.inner.store.replace_topology(floors, rooms);
        Ok(())
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the controller.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let accepting = matches!(
            *self.inner.connection_state.borrow(),
            ConnectionState::Connected | ConnectionState::Reconnecting { .. }
        );
        if !accepting {
            return Err(CoreError::ControllerDisconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ControllerDisconnected)?;

        rx.await.map_err(|_| CoreError::ControllerDisconnected)?
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Optimized for the CLI: the status listener, energy poller and
    /// keep-alive are disabled since only a request-response cycle is
    /// needed. The controller is disconnected even when the closure fails.
    pub async fn oneshot<F, Fut, T>(config: ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.listen = false;
        cfg.energy = false;
        cfg.keep_alive = false;

        let controller = Controller::new(cfg);
        controller.connect().await?;
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to the event broadcast stream.
    pub fn events(&self) -> broadcast::Receiver<Arc<DomoEvent>> {
        self.inner.event_tx.subscribe()
    }

    /// Identity reported by the controller (`feature_list_resp`).
    pub async fn identity(&self) -> Option<FeatureList> {
        self.inner.identity.lock().await.clone()
    }

    /// Features in use for discovery.
    pub async fn features(&self) -> Vec<Feature> {
        self.inner.features.lock().await.clone()
    }

    // ── Snapshot accessors (delegate to DataStore) ───────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.store.devices_snapshot()
    }

    pub fn scenarios_snapshot(&self) -> Arc<Vec<Arc<Scenario>>> {
        self.inner.store.scenarios_snapshot()
    }

    pub fn floors_snapshot(&self) -> Arc<Vec<Arc<Floor>>> {
        self.inner.store.floors_snapshot()
    }

    pub fn rooms_snapshot(&self) -> Arc<Vec<Arc<Room>>> {
        self.inner.store.rooms_snapshot()
    }

    // ── Stream accessors (delegate to DataStore) ─────────────────

    pub fn devices(&self) -> EntityStream<Device> {
        self.inner.store.subscribe_devices()
    }

    pub fn scenarios(&self) -> EntityStream<Scenario> {
        self.inner.store.subscribe_scenarios()
    }

    // ── Internals ────────────────────────────────────────────────

    async fn client(&self) -> Result<Arc<DomoClient>, CoreError> {
        self.inner
            .client
            .lock()
            .await
            .clone()
            .ok_or(CoreError::ControllerDisconnected)
    }

    /// The current connection has been cancelled by `disconnect()`.
    async fn is_closing(&self) -> bool {
        self.inner.cancel_child.lock().await.is_cancelled()
    }

    async fn has_feature(&self, feature: &Feature) -> bool {
        self.inner.features.lock().await.contains(feature)
    }

    fn emit(&self, event: DomoEvent) {
        let _ = self.inner.event_tx.send(Arc::new(event));
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.inner.connection_state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            self.emit(DomoEvent::ConnectionChanged {
                at: Utc::now(),
                state,
            });
        }
    }

    /// Apply one batch of status records from the long poll.
    async fn dispatch_status(&self, records: Vec<RawRecord>) {
        let store = &self.inner.store;
        for record in records {
            let cmd_name = fields::string(&record, "cmd_name").unwrap_or_default();

            if cmd_name.starts_with("scenario_") {
                self.handle_scenario_record(&cmd_name, &record).await;
            } else if cmd_name == "plant_update_ind" {
                info!("plant configuration changed, reloading devices");
                self.emit(DomoEvent::PlantChanged { at: Utc::now() });
                if let Err(e) = self.pull_devices().await {
                    warn!(error = %e, "device reload after plant update failed");
                }
            } else if fields::int(&record, "act_id").is_some() {
                for device in store.apply_device_update(&record, None) {
                    debug!(entity_id = %device.entity_id, state = %device.state_summary(), "device updated");
                    self.emit(DomoEvent::DeviceUpdated {
                        at: Utc::now(),
                        device,
                    });
                }
            } else {
                trace!(cmd_name = %cmd_name, "ignoring status record");
            }
        }
    }

    async fn handle_scenario_record(&self, cmd_name: &str, record: &RawRecord) {
        match cmd_name {
            "scenario_status_ind" => {
                if let Some(scenario) = self.inner.store.apply_scenario_status(record) {
                    debug!(entity_id = %scenario.entity_id, status = ?scenario.scenario_status, "scenario status");
                    self.emit(DomoEvent::ScenarioStatus {
                        at: Utc::now(),
                        scenario,
                    });
                }
            }
            "scenario_user_ind" => {
                let action = fields::string(record, "action").unwrap_or_default();
                if matches!(action.as_str(), "add" | "create" | "delete") {
                    debug!(action = %action, "user scenarios changed");
                    if let Err(e) = self.refresh_scenarios().await {
                        warn!(error = %e, "scenario refresh failed");
                    }
                }
            }
            other => trace!(cmd_name = other, "ignoring scenario record"),
        }
    }

    /// Refresh scenarios after `delay`, unless the connection ends first.
    ///
    /// The task is tracked with the other background tasks so teardown
    /// waits for it or aborts it.
    async fn schedule_scenario_refresh(&self, delay: Duration, cancel: CancellationToken) {
        let mut handles = self.inner.task_handles.lock().await;
        // `disconnect()` cancels before draining, so nothing is pushed after the drain.
        if cancel.is_cancelled() {
            return;
        }
        handles.retain(|(kind, handle)| {
            *kind != TaskKind::ScenarioRefresh || !handle.is_finished()
        });

        let ctrl = self.clone();
        let task = async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = ctrl.refresh_scenarios().await {
                warn!(error = %e, "scheduled scenario refresh failed");
            }
        };
        handles.push((
            TaskKind::ScenarioRefresh,
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = task => {}
                }
            }),
        ));
    }
}

// ── Discovery ────────────────────────────────────────────────────

/// Features with a device listing, in discovery order. Unknown features
/// are logged and skipped.
fn supported_features(identity: &FeatureList) -> Vec<Feature> {
    let mut features = Vec::new();
    for feature in identity.features() {
        match feature {
            Feature::Other(ref name) => debug!(feature = %name, "skipping unsupported feature"),
            f if !features.contains(&f) => features.push(f),
            _ => {}
        }
    }
    features
}

/// Read every device of every listed feature.
///
/// Any listing failure aborts the whole read, so a partial inventory can
/// never be mistaken for vanished devices.
async fn read_inventory(client: &DomoClient, features: &[Feature]) -> Result<Vec<Device>, CoreError> {
    let mut devices = Vec::new();
    for feature in features {
        let Some(kind) = DeviceKind::for_feature(feature) else {
            continue;
        };
        let listing = client.list_devices(feature).await?;

        for record in listing.array.iter().cloned() {
            let device = Device::from_record(kind, record);
            if device.act_id.is_none() && device.name.is_empty() {
                warn!(%feature, record = ?device.record, "skipping malformed device record");
                continue;
            }
            devices.push(device);
        }
        for (measurement, record) in listing.analog_sensors() {
            devices.push(Device::analog(measurement, record.clone()));
        }
    }
    Ok(devices)
}

// ── Background tasks ─────────────────────────────────────────────

/// Long-poll the controller for status changes until cancelled.
async fn status_listener_task(controller: Controller, cancel: CancellationToken) {
    let config = controller.config().clone();
    let mut failures: u32 = 0;

    loop {
        let Ok(client) = controller.client().await else {
            break;
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            r = client.status_update(Some(config.poll_timeout_secs)) => r,
        };

        let pause = match result {
            Ok(records) => {
                if failures > 0 {
                    info!(after = failures, "status polling recovered");
                    failures = 0;
                    controller.set_state(ConnectionState::Connected);
                }
                if !records.is_empty() {
                    controller.dispatch_status(records).await;
                }
                config.poll_pause
            }
            Err(e) => {
                let delay = calculate_backoff(failures, &config.backoff);
                failures = failures.saturating_add(1);
                warn!(
                    error = %e,
                    attempt = failures,
                    delay_ms = millis(delay),
                    "status poll failed"
                );
                controller.set_state(ConnectionState::Reconnecting { attempt: failures });
                delay
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(pause) => {}
        }
    }
    debug!("status listener stopped");
}

/// Poll energy meters on a fixed interval until cancelled.
async fn energy_task(controller: Controller, cancel: CancellationToken) {
    let config = controller.config().clone();

    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(config.energy_start_delay) => {}
    }

    let mut interval = tokio::time::interval(config.energy_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    r = controller.poll_energy() => r,
                };
                if let Err(e) = result {
                    warn!(error = %e, "energy poll failed");
                }
            }
        }
    }
    debug!("energy poller stopped");
}

/// Renew the session before the controller expires it.
async fn keep_alive_task(controller: Controller, cancel: CancellationToken) {
    loop {
        let Ok(client) = controller.client().await else {
            break;
        };
        let period = client.keep_alive_period().await / KEEP_ALIVE_DIVISOR;

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            r = client.keep_alive() => r,
        };
        if let Err(e) = result {
            warn!(error = %e, "keep-alive failed, session will be re-established");
        }
    }
}

/// Process commands from the mpsc channel, routing each to the
/// matching protocol request.
async fn command_processor_task(
    controller: Controller,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command, &cancel).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

/// Wait for a task within `budget`, aborting it on overrun.
async fn join_bounded(kind: TaskKind, mut handle: JoinHandle<()>, budget: Duration) -> TaskOutcome {
    let started = Instant::now();
    let exit = match tokio::time::timeout(budget, &mut handle).await {
        Ok(Err(e)) if e.is_panic() => {
            warn!(task = %kind, "background task panicked");
            TaskExit::Panicked
        }
        Ok(_) => TaskExit::Stopped,
        Err(_) => {
            warn!(
                task = %kind,
                budget_ms = millis(budget),
                "did not stop within timeout, forcing cleanup"
            );
            handle.abort();
            TaskExit::TimedOut
        }
    };
    TaskOutcome {
        task: kind,
        exit,
        waited_ms: millis(started.elapsed()),
    }
}

// ── Command routing ──────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
async fn route_command(
    controller: &Controller,
    cmd: Command,
    cancel: &CancellationToken,
) -> Result<CommandResult, CoreError> {
    let client = controller.client().await?;
    let store = controller.store();

    match cmd {
        // ── Lights ───────────────────────────────────────────────

        Command::LightOn { id } => switch_light(&client, store, &id, LightState::On).await,
        Command::LightOff { id } => switch_light(&client, store, &id, LightState::Off).await,
        Command::LightAuto { id } => switch_light(&client, store, &id, LightState::Auto).await,

        Command::LightBrightness { id, brightness } => {
            let device = device_of_kind(store, &id, DeviceKind::Light)?;
            let act_id = act_id(&device)?;
            let Some(light) = device.light() else {
                return Err(wrong_kind("set brightness", &id));
            };
            if !light.supports_brightness() {
                return Ok(ignored(&id, "does not support brightness"));
            }
            let brightness = brightness.min(100);
            let (perc, rgb) = if light.supports_color() {
                (None, Some(light.rgb_for_brightness(brightness)))
            } else {
                (Some(brightness), None)
            };
            client
                .switch_light(&LightSwitch {
                    act_id,
                    wanted_status: LightState::On.wanted_status(),
                    perc,
                    rgb,
                })
                .await?;
            Ok(CommandResult::Ok)
        }

        Command::LightRgb { id, rgb } => set_light_colour(&client, store, &id, |_| rgb).await,

        Command::LightHs {
            id,
            hue,
            saturation,
        } => {
            if !hue.is_finite() || !saturation.is_finite() {
                return Err(CoreError::ValidationFailed {
                    message: "hue and saturation must be finite numbers".into(),
                });
            }
            set_light_colour(&client, store, &id, |light| light.rgb_for_hs(hue, saturation)).await
        }

        // ── Covers ───────────────────────────────────────────────

        Command::Cover { id, action } => {
            let device = device_of_kind(store, &id, DeviceKind::Opening)?;
            let movement = match action {
                CoverAction::Open => OpeningMove::Open,
                CoverAction::Close => OpeningMove::Close,
                CoverAction::Stop => OpeningMove::Stop,
                CoverAction::SlatOpen => OpeningMove::SlatOpen,
                CoverAction::SlatClose => OpeningMove::SlatClose,
            };
            client.move_opening(act_id(&device)?, movement).await?;
            Ok(CommandResult::Ok)
        }

        // ── Switches ─────────────────────────────────────────────

        Command::SwitchOn { id } => {
            let device = device_of_kind(store, &id, DeviceKind::Relay)?;
            client.switch_relay(act_id(&device)?, true).await?;
            Ok(CommandResult::Ok)
        }

        Command::SwitchOff { id } => {
            let device = device_of_kind(store, &id, DeviceKind::Relay)?;
            client.switch_relay(act_id(&device)?, false).await?;
            Ok(CommandResult::Ok)
        }

        // ── Climate ──────────────────────────────────────────────

        Command::SetTemperature { id, celsius } => {
            if !celsius.is_finite() {
                return Err(CoreError::ValidationFailed {
                    message: "temperature must be a finite number".into(),
                });
            }
            configure_zone(&client, store, &id, |_, cfg| {
                cfg.set_point = set_point_tenths(celsius);
                Ok(())
            })
            .await
        }

        Command::SetHvacMode { id, mode } => {
            let Some(settings) = mode.zone_settings() else {
                return Err(CoreError::Unsupported {
                    operation: format!("hvac mode {mode}"),
                    entity_id: id.to_string(),
                });
            };
            configure_zone(&client, store, &id, |_, cfg| {
                cfg.mode = settings.mode.code();
                cfg.season = settings.season.map(|s| s.to_string());
                Ok(())
            })
            .await
        }

        Command::SetFanMode { id, mode } => {
            configure_zone(&client, store, &id, |zone, cfg| {
                if !zone.is_fancoil() {
                    return Err(CoreError::Unsupported {
                        operation: "fan mode".into(),
                        entity_id: id.to_string(),
                    });
                }
                cfg.fan_speed = Some(mode.speed());
                Ok(())
            })
            .await
        }

        Command::SetSeason { id, season } => {
            configure_zone(&client, store, &id, |_, cfg| {
                cfg.season = Some(season.to_string());
                Ok(())
            })
            .await
        }

        // ── Scenarios ────────────────────────────────────────────

        Command::ActivateScenario { id } => {
            let scenario = store
                .scenario(&id)
                .ok_or_else(|| CoreError::ScenarioNotFound {
                    identifier: id.to_string(),
                })?;
            client.activate_scenario(scenario.id).await?;
            info!(entity_id = %id, "scenario activated");
            controller
                .schedule_scenario_refresh(
                    controller.config().scenario_refresh_delay,
                    cancel.clone(),
                )
                .await;
            Ok(CommandResult::Ok)
        }

        Command::CreateScenario { name } => {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(CoreError::ValidationFailed {
                    message: "scenario name must not be empty".into(),
                });
            }
            client.create_scenario(&name).await?;
            Ok(CommandResult::Ok)
        }

        Command::DeleteScenario { id } => {
            let scenario = store
                .scenario(&id)
                .ok_or_else(|| CoreError::ScenarioNotFound {
                    identifier: id.to_string(),
                })?;
            if !scenario.user_defined {
                return Err(CoreError::Rejected {
                    message: format!("{id} is not a user-defined scenario"),
                });
            }
            client.delete_scenario(scenario.id).await?;
            if let Err(e) = controller.refresh_scenarios().await {
                warn!(error = %e, "scenario refresh after delete failed");
            }
            Ok(CommandResult::Ok)
        }
    }
}

async fn switch_light(
    client: &DomoClient,
    store: &DataStore,
    id: &EntityId,
    state: LightState,
) -> Result<CommandResult, CoreError> {
    let device = device_of_kind(store, id, DeviceKind::Light)?;
    client
        .switch_light(&LightSwitch {
            act_id: act_id(&device)?,
            wanted_status: state.wanted_status(),
            perc: None,
            rgb: None,
        })
        .await?;
    Ok(CommandResult::Ok)
}

async fn set_light_colour<F>(
    client: &DomoClient,
    store: &DataStore,
    id: &EntityId,
    colour: F,
) -> Result<CommandResult, CoreError>
where
    F: FnOnce(&crate::model::LightView<'_>) -> [u8; 3],
{
    let device = device_of_kind(store, id, DeviceKind::Light)?;
    let act_id = act_id(&device)?;
    let Some(light) = device.light() else {
        return Err(wrong_kind("set colour", id));
    };
    if !light.supports_color() {
        return Ok(ignored(id, "does not support colour"));
    }
    let rgb = colour(&light);
    client
        .switch_light(&LightSwitch {
            act_id,
            wanted_status: LightState::On.wanted_status(),
            perc: None,
            rgb: Some(rgb),
        })
        .await?;
    Ok(CommandResult::Ok)
}

/// Send a zone configuration built from the zone's current mode and set
/// point, adjusted by `adjust`.
async fn configure_zone<F>(
    client: &DomoClient,
    store: &DataStore,
    id: &EntityId,
    adjust: F,
) -> Result<CommandResult, CoreError>
where
    F: FnOnce(&ThermoView<'_>, &mut ZoneConfig) -> Result<(), CoreError>,
{
    let device = device_of_kind(store, id, DeviceKind::Thermostat)?;
    let act_id = act_id(&device)?;
    let Some(zone) = device.thermo() else {
        return Err(wrong_kind("configure zone", id));
    };

    let mut config = ZoneConfig {
        act_id,
        mode: zone
            .mode_code()
            .unwrap_or(crate::model::ThermoMode::Manual.code()),
        set_point: zone.set_point_raw().unwrap_or_default(),
        season: None,
        fan_speed: None,
    };
    adjust(&zone, &mut config)?;

    client.configure_zone(&config).await?;
    Ok(CommandResult::Ok)
}

// ── Helpers ──────────────────────────────────────────────────────

fn device_of_kind(store: &DataStore, id: &EntityId, kind: DeviceKind) -> Result<Arc<Device>, CoreError> {
    let device = store.device(id).ok_or_else(|| CoreError::DeviceNotFound {
        identifier: id.to_string(),
    })?;
    if device.kind != kind {
        return Err(wrong_kind(&format!("{kind} command"), id));
    }
    Ok(device)
}

fn act_id(device: &Device) -> Result<i64, CoreError> {
    device
        .act_id
        .filter(|id| *id != 0)
        .ok_or_else(|| CoreError::UnmanagedDevice {
            entity_id: device.entity_id.to_string(),
        })
}

fn wrong_kind(operation: &str, id: &EntityId) -> CoreError {
    CoreError::Unsupported {
        operation: operation.to_owned(),
        entity_id: id.to_string(),
    }
}

fn ignored(id: &EntityId, reason: &str) -> CommandResult {
    debug!(entity_id = %id, reason, "command ignored");
    CommandResult::Ignored {
        reason: format!("{id} {reason}"),
    }
}

/// Exponential backoff with deterministic jitter.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
fn calculate_backoff(attempt: u32, config: &BackoffConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(30) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let config = BackoffConfig::default();
        let first = calculate_backoff(0, &config);
        assert_eq!(first, Duration::from_secs(1));

        let third = calculate_backoff(2, &config);
        assert!(third >= Duration::from_secs(3) && third <= Duration::from_secs(5));

        for attempt in 10..40 {
            let delay = calculate_backoff(attempt, &config);
            assert!(delay <= Duration::from_secs_f64(30.0 * 1.25));
            assert!(delay >= Duration::from_secs_f64(30.0 * 0.75));
        }
    }

    #[test]
    fn teardown_budgets() {
        let config = TeardownConfig::default();
        assert_eq!(TaskKind::EnergyPoller.teardown_budget(&config), Duration::from_secs(2));
        assert_eq!(TaskKind::StatusListener.teardown_budget(&config), Duration::from_secs(5));
        assert_eq!(TaskKind::KeepAlive.teardown_budget(&config), Duration::from_secs(2));
        assert_eq!(TaskKind::ScenarioRefresh.teardown_budget(&config), Duration::from_secs(2));
    }

    #[test]
    fn unknown_features_are_skipped() {
        let identity = FeatureList {
            list: vec![
                "lights".into(),
                "sprinklers".into(),
                "lights".into(),
                "scenarios".into(),
            ],
            ..FeatureList::default()
        };
        assert_eq!(
            supported_features(&identity),
            vec![Feature::Lights, Feature::Scenarios]
        );
    }

    #[tokio::test]
    async fn join_bounded_aborts_stuck_tasks() {
        let stuck = tokio::spawn(std::future::pending::<()>());
        let outcome = join_bounded(TaskKind::StatusListener, stuck, Duration::from_millis(50)).await;
        assert_eq!(outcome.exit, TaskExit::TimedOut);

        let done = tokio::spawn(async {});
        let outcome = join_bounded(TaskKind::KeepAlive, done, Duration::from_secs(1)).await;
        assert_eq!(outcome.exit, TaskExit::Stopped);
    }

    #[tokio::test]
    async fn execute_requires_connection() {
        let controller = Controller::new(ControllerConfig::default());
        let err = controller
            .execute(Command::CreateScenario { name: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ControllerDisconnected));
    }
}
