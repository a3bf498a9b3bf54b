// ── Core error types ──
//
// User-facing errors from etidomo-core. Consumers never see raw protocol
// acknowledgement codes or JSON parse failures directly: the
// `From<etidomo_api::Error>` impl translates them into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Controller disconnected")]
    ControllerDisconnected,

    #[error("Controller connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Scenario not found: {identifier}")]
    ScenarioNotFound { identifier: String },

    #[error("Invalid entity id {value:?}: {reason}")]
    InvalidEntityId { value: String, reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Device {entity_id} has no action id and cannot be controlled")]
    UnmanagedDevice { entity_id: String },

    #[error("Operation not supported: {operation} on {entity_id}")]
    Unsupported { operation: String, entity_id: String },

    #[error("Operation rejected by controller: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Session-layer acknowledgement code, when the controller sent one.
        code: Option<i64>,
    },

    // ── Persistence / configuration ──────────────────────────────────
    #[error("Energy state error at {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures caused by the controller being unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::ControllerDisconnected
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<etidomo_api::Error> for CoreError {
    fn from(err: etidomo_api::Error) -> Self {
        match err {
            // The client reports its own timeouts as `Error::Timeout` with the
            // budget that expired, so none reach this arm.
            etidomo_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_request() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        host: e
                            .url()
                            .and_then(|u| u.host_str().map(String::from))
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                    }
                }
            }
            etidomo_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid controller address: {e}"),
            },
            etidomo_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ref ack @ etidomo_api::Error::Ack { code, ref message } => {
                if ack.is_auth_failure() {
                    CoreError::AuthenticationFailed {
                        message: message.clone(),
                    }
                } else {
                    CoreError::Rejected {
                        message: format!("{message} (#{code})"),
                    }
                }
            }
            etidomo_api::Error::MissingClientId => CoreError::AuthenticationFailed {
                message: "controller did not assign a session".into(),
            },
            etidomo_api::Error::UnexpectedReply { expected, actual } => CoreError::Api {
                message: format!(
                    "unexpected reply: expected {expected}, got {}",
                    actual.as_deref().unwrap_or("nothing")
                ),
                code: None,
            },
            etidomo_api::Error::UnsupportedFeature(feature) => CoreError::Unsupported {
                operation: "device listing".into(),
                entity_id: feature,
            },
            etidomo_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_user_maps_to_auth_failure() {
        let err = CoreError::from(etidomo_api::Error::from_ack(1));
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn other_ack_codes_are_rejections() {
        let err = CoreError::from(etidomo_api::Error::from_ack(11));
        assert_eq!(
            err.to_string(),
            "Operation rejected by controller: Wrong application data (#11)"
        );
    }

    #[test]
    fn timeouts_are_connection_errors() {
        let err = CoreError::from(etidomo_api::Error::Timeout { timeout_secs: 5 });
        assert!(err.is_connection());
    }

    #[test]
    fn timeouts_carry_the_expired_budget() {
        let err = CoreError::from(etidomo_api::Error::Timeout { timeout_secs: 10 });
        assert_eq!(err.to_string(), "Controller connection timed out after 10s");
    }
}
