//! Shared configuration for the ETI/Domo CLI.
//!
//! TOML profiles (one per controller), credential resolution
//! (env + keyring + plaintext), and translation to
//! `etidomo_core::ControllerConfig`. The CLI adds flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use etidomo_core::ControllerConfig;

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "etidomo";

/// Password used by controllers that were never reconfigured.
pub const DEFAULT_PASSWORD: &str = "admin";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The profile already configured for `host`, if any.
    ///
    /// Hosts compare case-insensitively, ignoring a scheme prefix and a
    /// trailing slash.
    pub fn profile_for_host(&self, host: &str) -> Option<(&str, &Profile)> {
        let wanted = normalize_host(host);
        self.profiles
            .iter()
            .find(|(_, p)| normalize_host(&p.host) == wanted)
            .map(|(name, p)| (name.as_str(), p))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named controller profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Controller address (e.g., "192.168.1.3").
    pub host: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,

    /// Seconds the controller may hold a status poll open.
    pub poll_timeout: Option<u64>,

    /// Seconds between energy meter polls.
    pub energy_interval: Option<u64>,

    /// Override the directory holding `energy.json`.
    pub state_dir: Option<PathBuf>,
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: default_username(),
            password: None,
            password_env: None,
            timeout: None,
            poll_timeout: None,
            energy_interval: None,
            state_dir: None,
        }
    }
}

fn default_username() -> String {
    "admin".into()
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_ascii_lowercase()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "etidomo", "etidomo")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Base directory for persisted runtime state (energy counters).
pub fn state_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_local_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("etidomo");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// Environment keys use `ETIDOMO_` and `__` for nesting, e.g.
/// `ETIDOMO_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ETIDOMO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring_entry(profile_name).ok()?.get_password().ok()
}

/// Resolve a profile's password.
///
/// Order: the profile's `password_env` variable, `ETIDOMO_PASSWORD`, the
/// system keyring, the plaintext password, and finally the factory
/// default `admin`.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> SecretString {
    resolve_password_with(profile, profile_name, |var| std::env::var(var).ok(), keyring_password)
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> SecretString {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Some(val) = env(env_name) {
            return SecretString::from(val);
        }
    }

    // 2. Global env var
    if let Some(val) = env("ETIDOMO_PASSWORD") {
        return SecretString::from(val);
    }

    // 3. System keyring
    if let Some(val) = keyring(profile_name) {
        return SecretString::from(val);
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return SecretString::from(pw.clone());
    }

    SecretString::from(DEFAULT_PASSWORD.to_owned())
}

/// Build a `ControllerConfig` from a profile -- no CLI flag overrides.
///
/// Energy counters are kept under `state_dir()/{profile}` unless the
/// profile overrides the directory.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ControllerConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let defaults = ControllerConfig::default();
    let mut config = ControllerConfig {
        host: host.to_owned(),
        username: profile.username.clone(),
        password: resolve_password(profile, profile_name),
        state_dir: Some(
            profile
                .state_dir
                .clone()
                .unwrap_or_else(|| state_dir().join(profile_name)),
        ),
        ..defaults
    };

    if let Some(secs) = profile.timeout {
        config.timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(secs) = profile.poll_timeout {
        config.poll_timeout_secs = secs;
    }
    if let Some(secs) = profile.energy_interval {
        if secs == 0 {
            return Err(ConfigError::Validation {
                field: "energy_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        config.energy_interval = Duration::from_secs(secs);
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "casa"

[defaults]
output = "json"

[profiles.casa]
host = "192.168.1.3"
password_env = "CASA_PW"
energy_interval = 30
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("casa"));
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 10);

        let casa = &cfg.profiles["casa"];
        assert_eq!(casa.username, "admin");
        assert_eq!(casa.energy_interval, Some(30));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.defaults.output, "table");
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut profile = Profile::new("10.0.0.7");
        profile.poll_timeout = Some(8);
        cfg.profiles.insert("villa".into(), profile);
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["villa"].host, "10.0.0.7");
        assert_eq!(loaded.profiles["villa"].poll_timeout, Some(8));
    }

    #[test]
    fn host_lookup_ignores_scheme_and_case() {
        let mut cfg = Config::default();
        cfg.profiles.insert("casa".into(), Profile::new("http://Domo.local/"));

        let (name, _) = cfg.profile_for_host("domo.local").unwrap();
        assert_eq!(name, "casa");
        assert!(cfg.profile_for_host("192.168.1.4").is_none());
    }

    #[test]
    fn password_resolution_order() {
        let mut profile = Profile::new("192.168.1.3");
        profile.password = Some("plain".into());
        profile.password_env = Some("CASA_PW".into());

        let from_profile_env = resolve_password_with(
            &profile,
            "casa",
            |var| (var == "CASA_PW").then(|| "from-env".to_owned()),
            |_| Some("from-keyring".into()),
        );
        assert_eq!(from_profile_env.expose_secret(), "from-env");

        let from_global_env = resolve_password_with(
            &profile,
            "casa",
            |var| (var == "ETIDOMO_PASSWORD").then(|| "global".to_owned()),
            |_| Some("from-keyring".into()),
        );
        assert_eq!(from_global_env.expose_secret(), "global");

        let from_keyring =
            resolve_password_with(&profile, "casa", no_env, |_| Some("from-keyring".into()));
        assert_eq!(from_keyring.expose_secret(), "from-keyring");

        let plaintext = resolve_password_with(&profile, "casa", no_env, |_| None);
        assert_eq!(plaintext.expose_secret(), "plain");

        profile.password = None;
        let fallback = resolve_password_with(&profile, "casa", no_env, |_| None);
        assert_eq!(fallback.expose_secret(), DEFAULT_PASSWORD);
    }

    #[test]
    fn profile_maps_to_controller_config() {
        let mut profile = Profile::new(" 192.168.1.3 ");
        profile.timeout = Some(4);
        profile.poll_timeout = Some(9);
        profile.energy_interval = Some(20);
        profile.state_dir = Some(PathBuf::from("/tmp/etidomo-state"));

        let config = profile_to_controller_config(&profile, "casa").unwrap();
        assert_eq!(config.host, "192.168.1.3");
        assert_eq!(config.timeout, Duration::from_secs(4));
        assert_eq!(config.poll_timeout_secs, 9);
        assert_eq!(config.energy_interval, Duration::from_secs(20));
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/etidomo-state")));
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        let err = profile_to_controller_config(&Profile::new("  "), "x").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "host"));

        let mut profile = Profile::new("192.168.1.3");
        profile.energy_interval = Some(0);
        let err = profile_to_controller_config(&profile, "x").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "energy_interval"));
    }
}
