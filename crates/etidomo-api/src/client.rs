// ETI/Domo HTTP client
//
// Wraps `reqwest::Client` with the controller's session layer: every call
// is a form POST of `command=<json>` to `/domo/`, answered by an envelope
// carrying `sl_data_ack_reason`. Application endpoints (devices, scenarios,
// status) are implemented as inherent methods in separate files to keep
// this module focused on session and transport mechanics.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::{RawRecord, RegistrationAck, SessionReply};
use crate::transport::TransportConfig;

/// Reply name of every application command that has no dedicated answer.
pub const GENERIC_REPLY: &str = "generic_reply";

/// Keep-alive period assumed when the controller does not announce one.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(900);

/// Sessions are treated as expired this long before the controller drops them.
const SESSION_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// One long poll plus one command may be in flight at a time.
const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// Length of the body excerpt carried by decode errors.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug)]
struct Session {
    client_id: Option<String>,
    expires_at: Option<Instant>,
    keep_alive: Duration,
}

impl Session {
    fn valid_id(&self, now: Instant) -> Option<&str> {
        match (&self.client_id, self.expires_at) {
            (Some(id), Some(expires)) if now < expires => Some(id),
            _ => None,
        }
    }

    fn renew(&mut self, now: Instant) {
        self.expires_at = Some(now + self.keep_alive.saturating_sub(SESSION_EXPIRY_MARGIN));
    }

    fn clear(&mut self) {
        self.client_id = None;
        self.expires_at = None;
    }
}

/// Session-aware HTTP client for one ETI/Domo controller.
///
/// Credentials are held only in memory. The session client id is obtained
/// lazily and re-established whenever it expires or the controller stops
/// recognising it, so callers never manage login themselves.
pub struct DomoClient {
    http: reqwest::Client,
    endpoint: Url,
    username: String,
    password: SecretString,
    session: Mutex<Session>,
    in_flight: Semaphore,
    request_timeout: Duration,
}

impl DomoClient {
    /// Create a client for the controller at `host` (IP, `host:port`, or URL).
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let endpoint = endpoint_for(host)?;
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, endpoint, username, password);
        client.request_timeout = transport.timeout;
        Ok(client)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoint: Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            endpoint,
            username: username.into(),
            password,
            session: Mutex::new(Session {
                client_id: None,
                expires_at: None,
                keep_alive: DEFAULT_KEEP_ALIVE,
            }),
            in_flight: Semaphore::new(DEFAULT_MAX_IN_FLIGHT),
            request_timeout: TransportConfig::default().timeout,
        }
    }

    /// Override how many application requests may run concurrently.
    pub fn with_max_in_flight(mut self, permits: usize) -> Self {
        self.in_flight = Semaphore::new(permits.max(1));
        self
    }

    /// The `/domo/` endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Default per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Whether a non-expired session is currently held.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.valid_id(Instant::now()).is_some()
    }

    /// Session keep-alive period announced by the controller.
    pub async fn keep_alive_period(&self) -> Duration {
        self.session.lock().await.keep_alive
    }

    // ── Session management ───────────────────────────────────────────

    /// Establish a session unless a valid one already exists.
    pub async fn login(&self) -> Result<(), Error> {
        self.ensure_session().await.map(|_| ())
    }

    /// Renew the current session. A no-op when there is none.
    ///
    /// On failure the session is dropped so the next request logs in again.
    pub async fn keep_alive(&self) -> Result<(), Error> {
        let mut session = self.session.lock().await;
        let Some(client_id) = session.client_id.clone() else {
            return Ok(());
        };

        debug!("sending keep-alive");
        let command = json!({
            "sl_cmd": "sl_keep_alive_req",
            "sl_client_id": client_id,
        });
        match self
            .session_request(&command, Some("sl_keep_alive_ack"), None)
            .await
        {
            Ok(_) => {
                session.renew(Instant::now());
                trace!("session renewed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "keep-alive failed, dropping session");
                session.clear();
                Err(e)
            }
        }
    }

    /// Forget the current session. The next request logs in again.
    pub async fn invalidate(&self) {
        self.session.lock().await.clear();
    }

    async fn ensure_session(&self) -> Result<String, Error> {
        let mut session = self.session.lock().await;
        if let Some(id) = session.valid_id(Instant::now()) {
            return Ok(id.to_owned());
        }
        self.register(&mut session).await
    }

    async fn register(&self, session: &mut Session) -> Result<String, Error> {
        debug!(user = %self.username, "logging in to controller");
        session.clear();

        let command = json!({
            "sl_cmd": "sl_registration_req",
            "sl_login": self.username,
            "sl_pwd": self.password.expose_secret(),
        });
        let payload = self
            .session_request(&command, Some("sl_registration_ack"), None)
            .await?;
        let ack: RegistrationAck = decode_record(payload)?;

        let client_id = ack
            .sl_client_id
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingClientId)?;
        session.keep_alive = ack
            .sl_keep_alive_timeout_sec
            .map_or(DEFAULT_KEEP_ALIVE, Duration::from_secs);
        session.client_id = Some(client_id.clone());
        session.renew(Instant::now());

        info!(
            keep_alive_secs = session.keep_alive.as_secs(),
            "controller session established"
        );
        Ok(client_id)
    }

    // ── Application layer ────────────────────────────────────────────

    /// Send an application command and return the reply record.
    ///
    /// `expected` is the reply's `cmd_name`; pass `None` for commands whose
    /// answer is not worth checking. A rejected session id is refreshed and
    /// the command retried once.
    pub async fn application_request(
        &self,
        command: Value,
        expected: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<RawRecord, Error> {
        // The semaphore is never closed, so a failed acquire just means no throttling.
        let _permit = self.in_flight.acquire().await.ok();

        let mut retried = false;
        loop {
            let client_id = self.ensure_session().await?;
            let envelope = json!({
                "sl_cmd": "sl_data_req",
                "sl_client_id": client_id,
                "sl_appl_msg": command,
            });

            match self.session_request(&envelope, None, timeout).await {
                Ok(reply) => {
                    check_reply_name(&reply, expected)?;
                    return Ok(reply);
                }
                Err(e) if e.is_session_rejected() && !retried => {
                    debug!(error = %e, "session rejected, logging in again");
                    self.invalidate().await;
                    retried = true;
                }
                Err(e) => {
                    if e.drops_session() {
                        debug!("controller went offline, resetting session");
                        self.invalidate().await;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Send an application command and decode its reply into `T`.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        command: Value,
        expected: &str,
        timeout: Option<Duration>,
    ) -> Result<T, Error> {
        let reply = self
            .application_request(command, Some(expected), timeout)
            .await?;
        decode_record(reply)
    }

    // ── Session layer ────────────────────────────────────────────────

    /// POST one session-layer command and validate its acknowledgement.
    async fn session_request(
        &self,
        command: &Value,
        expected_ack: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<RawRecord, Error> {
        let sl_cmd = command.get("sl_cmd").and_then(Value::as_str).unwrap_or("?");
        debug!(sl_cmd, "POST {}", self.endpoint);

        let body = command.to_string();
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .form(&[("command", body.as_str())]);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let effective_timeout = timeout.unwrap_or(self.request_timeout);

        let resp = builder
            .send()
            .await
            .map_err(|e| map_transport(e, effective_timeout))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| map_transport(e, effective_timeout))?;
        let text = resp
            .text()
            .await
            .map_err(|e| map_transport(e, effective_timeout))?;
        trace!(body = %text, "controller reply");

        let reply: SessionReply = serde_json::from_str(&text).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&text)),
                body: text.clone(),
            }
        })?;

        match reply.sl_data_ack_reason {
            Some(0) => {}
            Some(code) => return Err(Error::from_ack(code)),
            None => {
                return Err(Error::Deserialization {
                    message: "reply carries no sl_data_ack_reason".into(),
                    body: text,
                });
            }
        }

        if let Some(expected) = expected_ack {
            if reply.sl_cmd.as_deref() != Some(expected) {
                return Err(Error::UnexpectedReply {
                    expected: expected.to_owned(),
                    actual: reply.sl_cmd,
                });
            }
        }

        Ok(reply.payload)
    }
}

/// Resolve a configured host into the controller's `/domo/` endpoint.
///
/// Accepts a bare address (`192.168.1.3`, `domo.lan:8080`) or a full URL.
/// A URL with an explicit path other than `/` is used as-is.
pub fn endpoint_for(host: &str) -> Result<Url, Error> {
    let host = host.trim();
    let mut url = if host.contains("://") {
        Url::parse(host)?
    } else {
        Url::parse(&format!("http://{host}"))?
    };
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/domo/");
    }
    Ok(url)
}

fn check_reply_name(reply: &RawRecord, expected: Option<&str>) -> Result<(), Error> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = reply.get("cmd_name").and_then(Value::as_str);
    if actual == Some(expected) {
        Ok(())
    } else {
        Err(Error::UnexpectedReply {
            expected: expected.to_owned(),
            actual: actual.map(String::from),
        })
    }
}

pub(crate) fn decode_record<T: DeserializeOwned>(record: RawRecord) -> Result<T, Error> {
    let value = Value::Object(record);
    serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

/// At most the first 200 characters of a reply body.
fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(text.len(), |(i, _)| i);
    &text[..end]
}

fn map_transport(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(e)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_bare_ip() {
        let url = endpoint_for("192.168.1.3").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.3/domo/");
    }

    #[test]
    fn endpoint_keeps_port_and_explicit_path() {
        assert_eq!(
            endpoint_for("domo.lan:8080").unwrap().as_str(),
            "http://domo.lan:8080/domo/"
        );
        assert_eq!(
            endpoint_for("http://10.0.0.2/custom/").unwrap().as_str(),
            "http://10.0.0.2/custom/"
        );
    }

    #[test]
    fn session_expiry_applies_margin() {
        let mut session = Session {
            client_id: Some("abc".into()),
            expires_at: None,
            keep_alive: Duration::from_secs(60),
        };
        let now = Instant::now();
        session.renew(now);

        assert_eq!(session.valid_id(now), Some("abc"));
        assert_eq!(session.valid_id(now + Duration::from_secs(31)), None);
    }

    #[test]
    fn reply_name_mismatch_is_reported() {
        let mut reply = RawRecord::new();
        reply.insert("cmd_name".into(), Value::String("generic_reply".into()));

        assert!(check_reply_name(&reply, Some(GENERIC_REPLY)).is_ok());
        assert!(check_reply_name(&reply, None).is_ok());
        let err = check_reply_name(&reply, Some("floor_list_resp")).unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply { .. }));
    }

    #[test]
    fn preview_stops_on_a_char_boundary() {
        let body = format!("{}à{}", "x".repeat(199), "y".repeat(50));
        let excerpt = preview(&body);
        assert_eq!(excerpt.chars().count(), 200);
        assert!(excerpt.ends_with('à'));
        assert_eq!(preview("short"), "short");
    }
}
