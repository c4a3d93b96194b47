// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process mock OAuth provider, credential
//! builders, and assertion helpers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::credential::provider::Endpoints;
use crate::credential::{epoch_secs, BackupCredentialSet, CredentialSet};

/// Scripted token endpoint responses for one grant type.
///
/// Queued responses are served first; once the queue is empty the fallback
/// repeats. Without either the endpoint answers 500.
#[derive(Default)]
struct Script {
    queue: VecDeque<(u16, String)>,
    fallback: Option<(u16, String)>,
}

impl Script {
    fn next(&mut self) -> (u16, String) {
        self.queue
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| (500, r#"{"error":"server_error"}"#.to_owned()))
    }
}

/// One request received by the mock token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub form: HashMap<String, String>,
    pub authorization: Option<String>,
}

impl TokenRequest {
    pub fn grant_type(&self) -> &str {
        self.form.get("grant_type").map(String::as_str).unwrap_or_default()
    }
}

#[derive(Default)]
struct MockState {
    refresh: Mutex<Script>,
    client_credentials: Mutex<Script>,
    token_delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<TokenRequest>>,
    accepted: Mutex<HashSet<String>>,
    probe_status: Mutex<Option<u16>>,
    devices: Mutex<serde_json::Value>,
    refresh_calls: AtomicU32,
    client_credentials_calls: AtomicU32,
    probe_calls: AtomicU32,
    device_calls: AtomicU32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-process OAuth provider bound to `127.0.0.1:0`.
///
/// Serves `POST /token`, `GET /v1/me`, and `GET /v1/me/player/devices`.
/// The server task lives until the runtime shuts down.
pub struct MockProvider {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockProvider {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        *lock(&state.devices) = serde_json::json!({ "devices": [] });

        let app = Router::new()
            .route("/token", post(token_handler))
            .route("/v1/me", get(me_handler))
            .route("/v1/me/player/devices", get(devices_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, state })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Endpoints for a client named `test-client`.
    pub fn endpoints(&self, client_secret: Option<&str>) -> Endpoints {
        Endpoints {
            token_url: self.token_url(),
            api_url: self.api_url(),
            client_id: "test-client".to_owned(),
            client_secret: client_secret.map(str::to_owned),
        }
    }

    /// A `check` config pointed at this provider with state under `dir`.
    pub fn config(&self, dir: &Path) -> Config {
        let mut config = Config::test();
        config.state_dir = Some(dir.to_owned());
        config.token_url = self.token_url();
        config.api_url = self.api_url();
        config
    }

    pub fn push_refresh(&self, status: u16, body: impl Into<String>) {
        lock(&self.state.refresh).queue.push_back((status, body.into()));
    }

    pub fn set_refresh(&self, status: u16, body: impl Into<String>) {
        lock(&self.state.refresh).fallback = Some((status, body.into()));
    }

    pub fn push_client_credentials(&self, status: u16, body: impl Into<String>) {
        lock(&self.state.client_credentials).queue.push_back((status, body.into()));
    }

    pub fn set_client_credentials(&self, status: u16, body: impl Into<String>) {
        lock(&self.state.client_credentials).fallback = Some((status, body.into()));
    }

    /// Delay every token endpoint response.
    pub fn set_token_delay(&self, delay: Duration) {
        *lock(&self.state.token_delay) = Some(delay);
    }

    /// Make `/v1/me` answer 200 for this bearer token.
    pub fn accept_token(&self, token: &str) {
        lock(&self.state.accepted).insert(token.to_owned());
    }

    pub fn reject_token(&self, token: &str) {
        lock(&self.state.accepted).remove(token);
    }

    /// Force `/v1/me` to answer `status` for every token.
    pub fn set_probe_status(&self, status: Option<u16>) {
        *lock(&self.state.probe_status) = status;
    }

    /// Devices listed for any accepted token, as `(id, is_active)` pairs.
    pub fn set_devices(&self, devices: &[(&str, bool)]) {
        let list: Vec<_> = devices
            .iter()
            .map(|(id, active)| serde_json::json!({ "id": id, "is_active": active, "name": id }))
            .collect();
        *lock(&self.state.devices) = serde_json::json!({ "devices": list });
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn client_credentials_calls(&self) -> u32 {
        self.state.client_credentials_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> u32 {
        self.state.probe_calls.load(Ordering::SeqCst)
    }

    pub fn device_calls(&self) -> u32 {
        self.state.device_calls.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        lock(&self.state.requests).clone()
    }
}

async fn token_handler(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let authorization =
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let request = TokenRequest { form, authorization };
    let (status, body) = match request.grant_type() {
        "refresh_token" => {
            s.refresh_calls.fetch_add(1, Ordering::SeqCst);
            lock(&s.refresh).next()
        }
        "client_credentials" => {
            s.client_credentials_calls.fetch_add(1, Ordering::SeqCst);
            lock(&s.client_credentials).next()
        }
        _ => (400, r#"{"error":"unsupported_grant_type"}"#.to_owned()),
    };
    lock(&s.requests).push(request);

    let delay = *lock(&s.token_delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn authorized(s: &MockState, headers: &HeaderMap) -> bool {
    bearer(headers).is_some_and(|t| lock(&s.accepted).contains(&t))
}

async fn me_handler(State(s): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    s.probe_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = *lock(&s.probe_status) {
        return StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR).into_response();
    }
    if authorized(&s, &headers) {
        (StatusCode::OK, axum::Json(serde_json::json!({ "id": "test-user" }))).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn devices_handler(State(s): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    s.device_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&s, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let devices = lock(&s.devices).clone();
    (StatusCode::OK, axum::Json(devices)).into_response()
}

/// Token endpoint success body.
pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> String {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::from(refresh);
    }
    body.to_string()
}

/// Token endpoint error body, e.g. `error_body("invalid_grant")`.
pub fn error_body(code: &str) -> String {
    serde_json::json!({ "error": code, "error_description": code }).to_string()
}

/// A user credential expiring `expires_in` seconds from now (negative for
/// already expired).
pub fn credential(access: &str, refresh: Option<&str>, expires_in: i64) -> CredentialSet {
    CredentialSet {
        access_token: access.to_owned(),
        refresh_token: refresh.map(str::to_owned),
        expires_at: epoch_secs().saturating_add_signed(expires_in),
    }
}

pub fn backup(creds: CredentialSet) -> BackupCredentialSet {
    BackupCredentialSet { credentials: creds, backup_time: epoch_secs() }
}

/// Write raw contents into a state directory file.
pub fn write_raw(dir: &Path, file: &str, contents: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(file), contents)?;
    Ok(())
}

/// Assert that an expression evaluates to `Err` whose display contains a substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
