//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Input, Select};
use etidomo_core::{Controller, ControllerConfig, CoreError};
use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "username = \"{}\"", p.username);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(poll) = p.poll_timeout {
            let _ = writeln!(out, "poll_timeout = {poll}");
        }
        if let Some(interval) = p.energy_interval {
            let _ = writeln!(out, "energy_interval = {interval}");
        }
        if let Some(ref dir) = p.state_dir {
            let _ = writeln!(out, "state_dir = \"{}\"", dir.display());
        }
    }

    out
}

/// Copy of the config with plaintext passwords masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_secs(field: &str, value: &str) -> Result<u64, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be a number (seconds)".into(),
    })
}

/// Why a setup login attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupFailure {
    Timeout,
    CannotConnect,
    InvalidAuth,
    Unknown,
}

impl SetupFailure {
    fn classify(err: &CoreError) -> Self {
        match err {
            CoreError::Timeout { .. } => Self::Timeout,
            CoreError::ConnectionFailed { .. } | CoreError::ControllerDisconnected => {
                Self::CannotConnect
            }
            CoreError::AuthenticationFailed { .. } => Self::InvalidAuth,
            _ => Self::Unknown,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::CannotConnect => "cannot_connect",
            Self::InvalidAuth => "invalid_auth",
            Self::Unknown => "unknown",
        }
    }
}

/// Log in once with the entered credentials.
async fn test_login(host: &str, username: &str, password: &str) -> Result<usize, CoreError> {
    let cfg = ControllerConfig {
        host: host.to_owned(),
        username: username.to_owned(),
        password: SecretString::from(password.to_owned()),
        state_dir: None,
        ..ControllerConfig::default()
    };
    Controller::oneshot(cfg, |c| async move { Ok(c.store().device_count()) }).await
}

/// Offer to store the password in the system keyring or return it for
/// plaintext config. Returns `None` when it went to the keyring.
fn prompt_password_storage(password: &str, profile_name: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_password(profile_name, password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive setup ─────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            let mut cfg = config::load_config_or_default();
            eprintln!("etidomo -- controller setup");
            eprintln!("   Config path: {}\n", config_path.display());

            let host: String = Input::new()
                .with_prompt("Controller IP address")
                .default("192.168.1.3".into())
                .interact_text()
                .map_err(prompt_err)?;
            let host = host.trim().to_owned();

            if let Some((existing, _)) = cfg.profile_for_host(&host) {
                return Err(CliError::Conflict {
                    resource_type: "controller".into(),
                    identifier: host.clone(),
                    hint: format!("Profile '{existing}' already uses this host."),
                });
            }

            let username: String = Input::new()
                .with_prompt("Username")
                .default("admin".into())
                .interact_text()
                .map_err(prompt_err)?;
            let mut password = rpassword::prompt_password("Password [admin]: ").map_err(prompt_err)?;
            if password.is_empty() {
                etidomo_config::DEFAULT_PASSWORD.clone_into(&mut password);
            }

            eprintln!("   Testing connection...");
            let devices = match test_login(&host, &username, &password).await {
                Ok(n) => n,
                Err(e) => {
                    let failure = SetupFailure::classify(&e);
                    tracing::warn!(error = %e, reason = failure.code(), "setup login failed");
                    eprintln!("   ✗ {}: {e}", failure.code());
                    return Err(e.into());
                }
            };
            eprintln!("   ✓ Connected, {devices} devices found\n");

            let default_name = if cfg.profiles.is_empty() {
                "default".to_owned()
            } else {
                etidomo_core::sanitize_name(&host)
            };
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default(default_name)
                .interact_text()
                .map_err(prompt_err)?;
            if cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::Conflict {
                    resource_type: "profile".into(),
                    identifier: profile_name,
                    hint: "Choose another profile name.".into(),
                });
            }

            let mut profile = Profile::new(host);
            profile.username = username;
            profile.password = prompt_password_storage(&password, &profile_name)?;

            cfg.profiles.insert(profile_name.clone(), profile);
            let has_default = cfg
                .default_profile
                .as_ref()
                .is_some_and(|name| cfg.profiles.contains_key(name));
            if !has_default {
                cfg.default_profile = Some(profile_name.clone());
            }
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Try it: etidomo devices list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let available = config::available_profiles(&cfg);
            let Some(profile) = cfg.profiles.get_mut(&profile_name) else {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available,
                });
            };

            match key.as_str() {
                "host" => profile.host = value,
                "username" => profile.username = value,
                "password_env" | "password-env" => profile.password_env = Some(value),
                "timeout" => profile.timeout = Some(parse_secs("timeout", &value)?),
                "poll_timeout" | "poll-timeout" => {
                    profile.poll_timeout = Some(parse_secs("poll_timeout", &value)?);
                }
                "energy_interval" | "energy-interval" => {
                    let secs = parse_secs("energy_interval", &value)?;
                    if secs == 0 {
                        return Err(CliError::Validation {
                            field: "energy_interval".into(),
                            reason: "must be at least 1 second".into(),
                        });
                    }
                    profile.energy_interval = Some(secs);
                }
                "state_dir" | "state-dir" => profile.state_dir = Some(value.into()),
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: host, username, \
                             password_env, timeout, poll_timeout, energy_interval, state_dir"
                        ),
                    });
                }
            }

            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: etidomo config init");
            } else {
                for (name, profile) in &cfg.profiles {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}\t{}", profile.host);
                }
            }
            Ok(())
        }

        // ── Use <name> ──────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            config::store_password(&profile_name, &secret)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path { state } => {
            let path = if state {
                config::state_dir()
            } else {
                config::config_path()
            };
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_failures_are_classified() {
        let cases = [
            (CoreError::Timeout { timeout_secs: 10 }, "timeout"),
            (
                CoreError::ConnectionFailed {
                    host: "192.168.1.3".into(),
                    reason: "refused".into(),
                },
                "cannot_connect",
            ),
            (CoreError::ControllerDisconnected, "cannot_connect"),
            (
                CoreError::AuthenticationFailed {
                    message: "Invalid user".into(),
                },
                "invalid_auth",
            ),
            (CoreError::Internal("boom".into()), "unknown"),
        ];
        for (err, code) in cases {
            assert_eq!(SetupFailure::classify(&err).code(), code, "{err}");
        }
    }

    #[test]
    fn redaction_masks_plaintext_passwords() {
        let mut cfg = Config::default();
        let mut profile = Profile::new("192.168.1.3");
        profile.password = Some("secret".into());
        cfg.profiles.insert("home".into(), profile);

        let masked = redacted(&cfg);
        assert_eq!(masked.profiles["home"].password.as_deref(), Some("****"));
        assert!(!format_config_redacted(&masked).contains("secret"));
    }
}
