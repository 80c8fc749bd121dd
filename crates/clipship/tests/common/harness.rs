//! Mock record store and isolated-config helpers.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipship::config::{Config, Directories, StoreConfig};

pub const APP_TOKEN: &str = "basTESTAPP";
pub const TABLE_ID: &str = "tblTEST01";

pub fn token_path() -> String {
    "/open-apis/auth/v3/tenant_access_token/internal/".to_string()
}

pub fn records_path() -> String {
    format!(
        "/open-apis/bitable/v1/apps/{}/tables/{}/records",
        APP_TOKEN, TABLE_ID
    )
}

pub fn update_path() -> String {
    format!("{}/batch_update", records_path())
}

/// Store configuration pointed at the mock server.
pub fn store_config(server: &MockServer) -> StoreConfig {
    StoreConfig {
        base_url: server.uri(),
        app_id: "cli_test_app".to_string(),
        app_secret: "test_secret".to_string(),
        app_token: APP_TOKEN.to_string(),
        table_id: TABLE_ID.to_string(),
        view_id: None,
        page_size: 500,
    }
}

/// Runtime configuration rooted in an isolated temp directory.
pub fn test_config(root: &Path) -> Config {
    Config {
        dirs: Directories {
            root: root.to_path_buf(),
            videos: root.join("videos"),
            runs: root.join("runs"),
            cookies: root.join("cookies"),
        },
        ..Config::default()
    }
}

/// Mounts a successful token exchange.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-test-token",
        })))
        .mount(server)
        .await;
}

/// Mounts a single-page listing returning `items`.
pub async fn mount_list(server: &MockServer, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(records_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": { "items": items, "has_more": false },
        })))
        .mount(server)
        .await;
}

/// Mounts an update endpoint answering every call with `code`.
pub async fn mount_update(server: &MockServer, code: i64, expected_calls: u64) {
    let msg = if code == 0 { "ok" } else { "record not found" };
    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": code,
            "msg": msg,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Bodies of every batch-update request the server saw, in order.
pub async fn update_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == update_path())
        .map(|req| serde_json::from_slice(&req.body).expect("update body is JSON"))
        .collect()
}

/// Writes an executable stand-in for the workflow runner that emits
/// `script_body` and returns its path.
#[cfg(unix)]
pub fn fake_runner(dir: &Path, script_body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-runner.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
