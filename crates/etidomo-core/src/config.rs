// ── Runtime connection configuration ──
//
// These types describe *how* to reach and poll an ETI/Domo controller.
// They carry credential data and timing, but never touch disk. The CLI
// constructs a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Exponential backoff between failed status polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Upper bounds on how long `disconnect()` waits for each background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownConfig {
    pub energy_task: Duration,
    pub status_listener: Duration,
    /// Command processor, keep-alive and any other task.
    pub other_tasks: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            energy_task: Duration::from_secs(2),
            status_listener: Duration::from_secs(5),
            other_tasks: Duration::from_secs(2),
        }
    }
}

/// Configuration for connecting to a single controller.
///
/// Built by the CLI, passed to `Controller`. Core never reads config files.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller address, e.g. `192.168.1.3` (scheme optional).
    pub host: String,
    pub username: String,
    pub password: SecretString,
    /// Per-request HTTP timeout.
    pub timeout: Duration,

    // ── Status listener ──
    /// Run the status long-poll loop after connecting.
    pub listen: bool,
    /// Seconds the controller may hold a status poll open.
    pub poll_timeout_secs: u64,
    /// Pause between consecutive status polls.
    pub poll_pause: Duration,
    pub backoff: BackoffConfig,

    // ── Energy poller ──
    /// Poll energy meters after connecting.
    pub energy: bool,
    pub energy_interval: Duration,
    pub energy_timeout: Duration,
    pub energy_start_delay: Duration,

    /// Renew the session ahead of the controller's keep-alive deadline.
    pub keep_alive: bool,

    /// Delay before re-reading scenarios after an activation.
    pub scenario_refresh_delay: Duration,

    pub teardown: TeardownConfig,

    /// Directory for persisted state (`energy.json`). `None` keeps energy
    /// counters in memory only.
    pub state_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.3".into(),
            username: "admin".into(),
            password: SecretString::from("admin".to_owned()),
            timeout: Duration::from_secs(10),
            listen: true,
            poll_timeout_secs: 5,
            poll_pause: Duration::from_secs(1),
            backoff: BackoffConfig::default(),
            energy: true,
            energy_interval: Duration::from_secs(10),
            energy_timeout: Duration::from_secs(5),
            energy_start_delay: Duration::from_secs(5),
            keep_alive: true,
            scenario_refresh_delay: Duration::from_secs(2),
            teardown: TeardownConfig::default(),
            state_dir: None,
        }
    }
}
