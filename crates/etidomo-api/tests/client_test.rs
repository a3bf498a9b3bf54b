#![allow(clippy::unwrap_used)]
// Integration tests for `DomoClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use etidomo_api::{DomoClient, Error, Feature, LightSwitch, OpeningMove, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DomoClient) {
    let server = MockServer::start().await;
    let client = DomoClient::new(
        &server.uri(),
        "admin",
        "secret".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

/// Decode the `command=<json>` form field of a request.
fn command_of(request: &Request) -> Option<Value> {
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == "command")
        .and_then(|(_, value)| serde_json::from_str(&value).ok())
}

/// Matches a session-layer command by its `sl_cmd`.
struct SessionCommand(&'static str);

impl Match for SessionCommand {
    fn matches(&self, request: &Request) -> bool {
        command_of(request)
            .is_some_and(|c| c.get("sl_cmd").and_then(Value::as_str) == Some(self.0))
    }
}

/// Matches an application command by its `cmd_name`.
struct AppCommand(&'static str);

impl Match for AppCommand {
    fn matches(&self, request: &Request) -> bool {
        command_of(request).is_some_and(|c| {
            c.pointer("/sl_appl_msg/cmd_name").and_then(Value::as_str) == Some(self.0)
        })
    }
}

fn reply(mut body: Value) -> ResponseTemplate {
    let obj = body.as_object_mut().unwrap();
    obj.entry("sl_cmd").or_insert(json!("sl_data_ack"));
    obj.entry("sl_data_ack_reason").or_insert(json!(0));
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/domo/"))
        .and(SessionCommand("sl_registration_req"))
        .respond_with(reply(json!({
            "sl_cmd": "sl_registration_ack",
            "sl_client_id": "c0ffee",
            "sl_keep_alive_timeout_sec": 900
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_credentials_and_stores_session() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    client.login().await.unwrap();
    assert!(client.is_connected().await);

    // A valid session is reused.
    client.login().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let command = command_of(&requests[0]).unwrap();
    assert_eq!(command["sl_login"], "admin");
    assert_eq!(command["sl_pwd"], "secret");
}

#[tokio::test]
async fn test_login_invalid_user() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(SessionCommand("sl_registration_req"))
        .respond_with(reply(json!({ "sl_data_ack_reason": 1 })))
        .mount(&server)
        .await;

    let err = client.login().await.unwrap_err();
    assert!(err.is_auth_failure(), "expected auth failure, got: {err:?}");
    assert_eq!(err.ack_code(), Some(1));
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_login_without_client_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(SessionCommand("sl_registration_req"))
        .respond_with(reply(json!({ "sl_cmd": "sl_registration_ack", "sl_client_id": "" })))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(matches!(result, Err(Error::MissingClientId)), "got: {result:?}");
}

#[tokio::test]
async fn test_application_request_wraps_command_in_session_envelope() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("feature_list_req"))
        .respond_with(reply(json!({
            "cmd_name": "feature_list_resp",
            "swver": "1.4.2",
            "serial": "0011AABB",
            "list": ["lights", "thermoregulation", "scenarios"]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let features = client.feature_list().await.unwrap();
    assert_eq!(features.swver.as_deref(), Some("1.4.2"));
    assert_eq!(
        features.features(),
        vec![Feature::Lights, Feature::Thermoregulation, Feature::Scenarios]
    );

    // Second call reuses the session: only one login is expected.
    client.feature_list().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let data = command_of(&requests[1]).unwrap();
    assert_eq!(data["sl_cmd"], "sl_data_req");
    assert_eq!(data["sl_client_id"], "c0ffee");
}

#[tokio::test]
async fn test_rejected_session_logs_in_again_once() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("POST"))
        .and(AppCommand("room_list_req"))
        .respond_with(reply(json!({ "sl_data_ack_reason": 8 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(AppCommand("room_list_req"))
        .respond_with(reply(json!({
            "cmd_name": "room_list_resp",
            "room_list": [{ "room_ind": 3, "name": "Cucina", "floor_ind": 1 }]
        })))
        .mount(&server)
        .await;

    let rooms = client.rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].name, "Cucina");
    assert_eq!(rooms[0].floor_ind, Some(1));
}

#[tokio::test]
async fn test_unexpected_reply_name() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("floor_list_req"))
        .respond_with(reply(json!({ "cmd_name": "generic_reply" })))
        .mount(&server)
        .await;

    let result = client.floors().await;
    match result {
        Err(Error::UnexpectedReply { expected, actual }) => {
            assert_eq!(expected, "floor_list_resp");
            assert_eq!(actual.as_deref(), Some("generic_reply"));
        }
        other => panic!("expected UnexpectedReply, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_ack_code_is_reported() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("scenarios_list_req"))
        .respond_with(reply(json!({ "sl_data_ack_reason": 99 })))
        .mount(&server)
        .await;

    let err = client.list_scenarios().await.unwrap_err();
    assert_eq!(err.to_string(), "Controller rejected request: Unknown error (#99)");
}

#[tokio::test]
async fn test_garbage_body_is_a_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("busy")),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_long_non_json_body_with_accents_is_a_deserialization_error() {
    let (server, client) = setup().await;
    let body = format!("{}à{}", "x".repeat(199), "y".repeat(50));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let result = client.login().await;
    match result {
        Err(Error::Deserialization { message, body: raw }) => {
            assert_eq!(raw, body);
            assert!(message.contains('à'), "preview should end on the accent: {message}");
            assert!(!message.contains('y'), "preview should stop at 200 chars: {message}");
        }
        other => panic!("expected deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_request_times_out_without_dropping_session() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("meters_list_req"))
        .respond_with(
            reply(json!({ "cmd_name": "meters_list_resp", "array": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(AppCommand("feature_list_req"))
        .respond_with(reply(json!({ "cmd_name": "feature_list_resp", "list": ["lights"] })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.meters(Some(Duration::from_secs(1))).await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_secs: 1 }),
        "expected timeout, got: {err:?}"
    );
    assert!(client.is_connected().await);

    // The next request reuses the session: `mount_login` expects one login.
    client.feature_list().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_controller_is_a_connection_error() {
    let client = DomoClient::new(
        "127.0.0.1:1",
        "admin",
        "admin".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();

    let err = client.login().await.unwrap_err();
    assert!(err.is_connection(), "expected connection error, got: {err:?}");
}

// ── Endpoint tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_uses_feature_stem() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("thermo_list_req"))
        .respond_with(reply(json!({
            "cmd_name": "thermo_list_resp",
            "array": [
                { "act_id": 52, "name": "Zona notte", "mode": 1, "set_point": 205, "temp": 198 }
            ],
            "humidity": { "act_id": 60, "name": "Umidita", "value": 48, "unit": "%" }
        })))
        .mount(&server)
        .await;

    let listing = client.list_devices(&Feature::Thermoregulation).await.unwrap();
    assert_eq!(listing.array.len(), 1);
    assert_eq!(listing.array[0]["name"], "Zona notte");
    assert_eq!(listing.analog_sensors().len(), 1);

    let requests = server.received_requests().await.unwrap();
    let data = command_of(&requests[1]).unwrap();
    assert_eq!(data["sl_appl_msg"]["topologic_scope"], "plant");
}

#[tokio::test]
async fn test_scenarios_have_no_listing() {
    let (_server, client) = setup().await;
    let result = client.list_devices(&Feature::Scenarios).await;
    assert!(matches!(result, Err(Error::UnsupportedFeature(_))), "got: {result:?}");
}

#[tokio::test]
async fn test_switch_light_sends_optional_fields() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("light_switch_req"))
        .respond_with(reply(json!({ "cmd_name": "generic_reply" })))
        .expect(2)
        .mount(&server)
        .await;

    client
        .switch_light(&LightSwitch {
            act_id: 59,
            wanted_status: 1,
            perc: Some(140),
            rgb: None,
        })
        .await
        .unwrap();
    client
        .switch_light(&LightSwitch {
            act_id: 60,
            wanted_status: 1,
            perc: None,
            rgb: Some([255, 64, 0]),
        })
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let dimmer = command_of(&requests[1]).unwrap();
    assert_eq!(dimmer["sl_appl_msg"]["perc"], 100);
    assert!(dimmer["sl_appl_msg"].get("rgb").is_none());

    let rgb = command_of(&requests[2]).unwrap();
    assert_eq!(rgb["sl_appl_msg"]["rgb"], json!([255, 64, 0]));
    assert!(rgb["sl_appl_msg"].get("perc").is_none());
}

#[tokio::test]
async fn test_move_opening_and_relay() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .respond_with(reply(json!({ "cmd_name": "generic_reply" })))
        .mount(&server)
        .await;

    client.move_opening(7, OpeningMove::Close).await.unwrap();
    client.switch_relay(11, true).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let opening = command_of(&requests[1]).unwrap();
    assert_eq!(opening["sl_appl_msg"]["cmd_name"], "opening_move_req");
    assert_eq!(opening["sl_appl_msg"]["wanted_status"], 2);

    let relay = command_of(&requests[2]).unwrap();
    assert_eq!(relay["sl_appl_msg"]["cmd_name"], "relay_activation_req");
    assert_eq!(relay["sl_appl_msg"]["wanted_status"], 1);
}

#[tokio::test]
async fn test_scenario_activation_tolerates_any_reply() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("scenario_activation_req"))
        .respond_with(reply(json!({ "cmd_name": "whatever_ack" })))
        .mount(&server)
        .await;

    client.activate_scenario(4).await.unwrap();
}

#[tokio::test]
async fn test_status_update_forwards_timeout() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(AppCommand("status_update_req"))
        .respond_with(reply(json!({
            "cmd_name": "status_update_resp",
            "result": [
                { "cmd_name": "light_switch_ind", "act_id": 59, "status": 1 },
                { "cmd_name": "plant_update_ind" }
            ]
        })))
        .mount(&server)
        .await;

    let updates = client.status_update(Some(3)).await.unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0]["act_id"], 59);

    let requests = server.received_requests().await.unwrap();
    let data = command_of(&requests[1]).unwrap();
    assert_eq!(data["sl_appl_msg"]["timeout"], 3);
}
