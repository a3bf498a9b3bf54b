//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use etidomo_config::ConfigError;
use etidomo_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to controller at {host}")]
    #[diagnostic(
        code(etidomo::connection_failed),
        help(
            "Check that the controller is powered and reachable on the local network.\n\
             Host: {host}"
        )
    )]
    ConnectionFailed {
        host: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(etidomo::auth_failed),
        help(
            "Verify the controller username and password.\n\
             Run: etidomo config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(etidomo::not_found),
        help("Run: etidomo {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(etidomo::conflict), help("{hint}"))]
    Conflict {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    // ── Controller ───────────────────────────────────────────────────

    #[error("Controller error ({code}): {message}")]
    #[diagnostic(code(etidomo::controller_error))]
    ControllerError { code: String, message: String },

    #[error("'{operation}' is not supported by {entity_id}")]
    #[diagnostic(
        code(etidomo::unsupported),
        help("Run: etidomo devices show {entity_id} to see what the device reports")
    )]
    Unsupported { operation: String, entity_id: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(etidomo::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(etidomo::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: etidomo config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(etidomo::no_config),
        help(
            "Create a profile with: etidomo config init\n\
             Or pass --host / set ETIDOMO_HOST.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(etidomo::config))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(etidomo::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(etidomo::timeout),
        help("Increase timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(etidomo::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { host, reason } => CliError::ConnectionFailed {
                host,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::ControllerDisconnected => CliError::ConnectionFailed {
                host: "(disconnected)".into(),
                source: "Controller connection was lost".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::ScenarioNotFound { identifier } => CliError::NotFound {
                resource_type: "scenario".into(),
                identifier,
                list_command: "scenarios list".into(),
            },

            CoreError::InvalidEntityId { value, reason } => CliError::Validation {
                field: "entity id".into(),
                reason: format!("{value}: {reason}"),
            },

            CoreError::UnmanagedDevice { entity_id } => CliError::Unsupported {
                operation: "control".into(),
                entity_id,
            },

            CoreError::Unsupported {
                operation,
                entity_id,
            } => CliError::Unsupported {
                operation,
                entity_id,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Rejected { message } => CliError::ControllerError {
                code: "rejected".into(),
                message,
            },

            CoreError::Api { message, code } => CliError::ControllerError {
                code: code.map_or_else(|| "api".into(), |c| c.to_string()),
                message,
            },

            CoreError::Persistence { path, message } => CliError::ControllerError {
                code: "persistence".into(),
                message: format!("{path}: {message}"),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ControllerError {
                code: "internal".into(),
                message,
            },
        }
    }
}
