//! Integration tests for the `etidomo` CLI binary.
//!
//! Most tests cover argument parsing, help output, completions and error
//! handling without a controller; the last ones drive the binary against a
//! wiremock controller.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const ISOLATED_HOME: &str = "/tmp/etidomo-cli-test-nonexistent";

/// Build a [`Command`] for the `etidomo` binary with env isolation.
///
/// Clears all `ETIDOMO_*` env vars and points config and data directories
/// at a nonexistent path so tests never touch the user's real setup.
fn etidomo_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("etidomo");
    cmd.env("HOME", ISOLATED_HOME)
        .env("XDG_CONFIG_HOME", ISOLATED_HOME)
        .env("XDG_DATA_HOME", ISOLATED_HOME)
        .env_remove("ETIDOMO_PROFILE")
        .env_remove("ETIDOMO_HOST")
        .env_remove("ETIDOMO_USERNAME")
        .env_remove("ETIDOMO_PASSWORD")
        .env_remove("ETIDOMO_OUTPUT")
        .env_remove("ETIDOMO_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = etidomo_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    etidomo_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ETI/Domo")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("services"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    etidomo_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("etidomo"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    etidomo_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    etidomo_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    etidomo_cmd()
        .args(["completions", "fish", "--dir"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(dir.path().join("etidomo.fish").exists());
}

// ── Subcommand help ─────────────────────────────────────────────────

#[test]
fn test_services_help_lists_all_services() {
    etidomo_cmd().args(["services", "--help"]).assert().success().stdout(
        predicate::str::contains("force-update")
            .and(predicate::str::contains("pull-devices"))
            .and(predicate::str::contains("refresh-scenarios")),
    );
}

#[test]
fn test_lights_help() {
    etidomo_cmd().args(["lights", "--help"]).assert().success().stdout(
        predicate::str::contains("brightness").and(predicate::str::contains("color")),
    );
}

#[test]
fn test_config_help() {
    etidomo_cmd().args(["config", "--help"]).assert().success().stdout(
        predicate::str::contains("init")
            .and(predicate::str::contains("set-password"))
            .and(predicate::str::contains("profiles")),
    );
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = etidomo_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_without_config() {
    etidomo_cmd()
        .args(["devices", "list"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("config")
                .or(predicate::str::contains("controller"))
                .or(predicate::str::contains("profile")),
        );
}

#[test]
fn test_unknown_profile_is_reported() {
    let output = etidomo_cmd()
        .args(["--profile", "cantina", "devices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("cantina"));
}

#[test]
fn test_config_show_no_config() {
    // `config show` falls back to the default config when no file exists.
    etidomo_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_invalid_output_format() {
    let output = etidomo_cmd()
        .args(["--output", "invalid", "devices", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("invalid"), "Expected value error:\n{text}");
}

#[test]
fn test_brightness_out_of_range_is_rejected() {
    etidomo_cmd()
        .args(["lights", "brightness", "light.cucina_59", "150"])
        .assert()
        .code(2);
}

// ── Against a mock controller ───────────────────────────────────────

fn command_of(request: &Request) -> Option<Value> {
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == "command")
        .and_then(|(_, value)| serde_json::from_str(&value).ok())
}

struct SessionCommand(&'static str);

impl Match for SessionCommand {
    fn matches(&self, request: &Request) -> bool {
        command_of(request)
            .is_some_and(|c| c.get("sl_cmd").and_then(Value::as_str) == Some(self.0))
    }
}

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

async fn mount(server: &MockServer, cmd_name: &'static str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/domo/"))
        .and(AppCommand(cmd_name))
        .respond_with(reply(body))
        .mount(server)
        .await;
}

async fn mock_controller() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/domo/"))
        .and(SessionCommand("sl_registration_req"))
        .respond_with(reply(json!({
            "sl_cmd": "sl_registration_ack",
            "sl_client_id": "c0ffee",
            "sl_keep_alive_timeout_sec": 900
        })))
        .mount(&server)
        .await;
    mount(
        &server,
        "feature_list_req",
        json!({ "cmd_name": "feature_list_resp", "swver": "1.2.3", "list": ["lights"] }),
    )
    .await;
    mount(
        &server,
        "floor_list_req",
        json!({ "cmd_name": "floor_list_resp", "floor_list": [] }),
    )
    .await;
    mount(
        &server,
        "room_list_req",
        json!({ "cmd_name": "room_list_resp", "room_list": [] }),
    )
    .await;
    mount(
        &server,
        "light_list_req",
        json!({
            "cmd_name": "light_list_resp",
            "array": [{ "act_id": 59, "name": "Cucina", "status": 1, "type": "STEP_STEP" }]
        }),
    )
    .await;
    server
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let host = server.uri();
    let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
    tokio::task::spawn_blocking(move || {
        etidomo_cmd()
            .env("ETIDOMO_HOST", host)
            .env("ETIDOMO_PASSWORD", "secret")
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_json_against_controller() {
    let server = mock_controller().await;
    let output = run_against(&server, &["-o", "json", "devices", "list"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = devices
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["entity_id"].as_str())
        .collect();
    assert_eq!(ids, ["light.cucina_59"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_entity_exits_not_found() {
    let server = mock_controller().await;
    let output = run_against(&server, &["lights", "on", "cantina"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}
