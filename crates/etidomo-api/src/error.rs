use thiserror::Error;

/// Top-level error type for the `etidomo-api` crate.
///
/// Covers every failure mode of the controller protocol: transport,
/// session-layer acknowledgements, application replies, and decoding.
/// `etidomo-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Session layer ───────────────────────────────────────────────
    /// The controller answered with a non-zero `sl_data_ack_reason`.
    #[error("Controller rejected request: {message} (#{code})")]
    Ack { code: i64, message: String },

    /// Login succeeded but the acknowledgement carried no client id.
    #[error("Controller did not assign a session client id")]
    MissingClientId,

    // ── Application layer ───────────────────────────────────────────
    /// The reply's command name did not match what the request expects.
    #[error("Unexpected reply: expected {expected:?}, got {actual:?}")]
    UnexpectedReply {
        expected: String,
        actual: Option<String>,
    },

    /// The feature has no device listing command.
    #[error("Feature {0:?} has no device listing")]
    UnsupportedFeature(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Human-readable text for a session-layer acknowledgement code.
pub fn ack_reason(code: i64) -> &'static str {
    match code {
        1 => "Invalid user",
        3 => "Too many sessions during login",
        4 => "Error occurred in JSON Syntax",
        5 => "No session layer command tag",
        6 => "Unrecognized session layer command",
        7 => "No client ID in request",
        8 => "Wrong client ID in request",
        9 => "Wrong application command",
        10 => "No reply to application command, maybe service down",
        11 => "Wrong application data",
        _ => "Unknown error",
    }
}

impl Error {
    /// Build an [`Error::Ack`] from a raw acknowledgement code.
    pub fn from_ack(code: i64) -> Self {
        Self::Ack {
            code,
            message: ack_reason(code).to_owned(),
        }
    }

    /// Returns `true` if the credentials themselves were refused.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Ack { code: 1, .. })
    }

    /// Returns `true` if the controller no longer recognises our session,
    /// so a fresh login might resolve it.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, Self::Ack { code: 7 | 8, .. } | Self::MissingClientId)
    }

    /// Returns `true` if the controller could not be reached at all.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the session should be dropped after this failure.
    ///
    /// A request that merely ran out of time leaves the session intact;
    /// the controller is still there and other requests share the session.
    pub fn drops_session(&self) -> bool {
        match self {
            Self::Transport(e) => (e.is_connect() || e.is_request()) && !e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Ack { code: 3 | 10, .. } => true,
            _ => false,
        }
    }

    /// The session-layer acknowledgement code, if this is an [`Error::Ack`].
    pub fn ack_code(&self) -> Option<i64> {
        match self {
            Self::Ack { code, .. } => Some(*code),
            _ => None,
        }
    }
}
