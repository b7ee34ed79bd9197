//! Integration tests for the keep-alive HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use worker_registration::config::ConfigStatus;
use worker_registration::health::{HealthState, health_routes};
use worker_registration::i18n::Language;
use worker_registration::registration::SessionStore;

/// Start the health routes on a random port, return (base url, sessions).
async fn start_server() -> (String, Arc<SessionStore>) {
    let sessions = SessionStore::new();
    let state = HealthState {
        config: ConfigStatus {
            bot_token: true,
            admin_count: 2,
            google_sheets: false,
            cli_mode: false,
        },
        sessions: Arc::clone(&sessions),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = health_routes(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), sessions)
}

#[tokio::test]
async fn root_answers_ok() {
    let (base, _sessions) = start_server().await;

    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn health_reports_config_and_sessions() {
    let (base, sessions) = start_server().await;
    sessions.lock("42").await.create(Language::En);

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["config"]["bot_token"], true);
    assert_eq!(body["config"]["admin_count"], 2);
    assert_eq!(body["config"]["google_sheets"], false);
    assert_eq!(body["active_sessions"], 1);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (base, _sessions) = start_server().await;

    let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}
