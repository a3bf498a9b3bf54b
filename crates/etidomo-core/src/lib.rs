//! Reactive data layer between `etidomo-api` and its consumers.
//!
//! This crate owns the device model, the polling machinery and the
//! services of an ETI/Domo integration:
//!
//! - **[`Controller`]** -- Central facade managing the full lifecycle:
//!   [`connect()`](Controller::connect) logs in, reads features, topology,
//!   devices and scenarios, then spawns the status listener, energy poller,
//!   keep-alive and command processor. [`disconnect()`](Controller::disconnect)
//!   tears them down within per-task time budgets and reports what happened.
//!   [`Controller::oneshot()`](Controller::oneshot) runs a single
//!   request-response cycle for CLI invocations.
//!
//! - **Services** -- [`force_update()`](Controller::force_update),
//!   [`pull_devices()`](Controller::pull_devices) and
//!   [`refresh_scenarios()`](Controller::refresh_scenarios).
//!
//! - **[`DataStore`]** -- Lock-free reactive storage built on
//!   `EntityCollection<T>` (`DashMap` + `tokio::sync::watch` channels).
//!
//! - **[`EntityStream<T>`]** -- Subscription handle vended by the `DataStore`.
//!
//! - **[`Command`]** -- Typed actuator requests routed through an `mpsc`
//!   channel to the controller's command processor.
//!
//! - **[`EnergyTracker`]** -- Cumulative kWh counters integrated from meter
//!   power readings and persisted to `energy.json`.
//!
//! - **Domain model** ([`model`]) -- Devices keyed by stable [`EntityId`]s
//!   of the form `{platform}.{name}_{act_id}`.

pub mod command;
pub mod config;
pub mod controller;
pub mod energy;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, CoverAction};
pub use config::{BackoffConfig, ControllerConfig, TeardownConfig};
pub use controller::{
    ConnectionState, Controller, TaskExit, TaskKind, TaskOutcome, TeardownReport,
};
pub use energy::{ENERGY_STATE_FILE, EnergyCounter, EnergyState, EnergyStore, EnergyTracker};
pub use error::CoreError;
pub use store::{DataStore, Reconciliation};
pub use stream::EntityStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AnalogSensorView, Device, DeviceKind, DomoEvent, EnergyMeterView, EntityId, FanMode, Floor,
    HvacAction, HvacMode, LightState, LightType, LightView, OpeningState, OpeningView, Platform,
    Room, Scenario, Season, ThermoMode, ThermoView, sanitize_name,
};
