//! In-process mock of the CareerPath backend's auth and roadmap endpoints.

#![allow(dead_code)]

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";

/// Shared backend state, inspectable from tests
#[derive(Default)]
pub struct BackendState {
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
    registered: Mutex<HashSet<String>>,
    access_seq: AtomicUsize,
    refresh_seq: AtomicUsize,
    refresh_delay_ms: AtomicU64,
    last_protected_auth: Mutex<Option<String>>,

    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub protected_calls: AtomicUsize,
}

impl BackendState {
    fn issue_access(&self) -> String {
        let token = format!("A{}", self.access_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.valid_access.lock().unwrap().insert(token.clone());
        token
    }

    fn issue_refresh(&self) -> String {
        let token = format!("R{}", self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.valid_refresh.lock().unwrap().insert(token.clone());
        token
    }

    fn access_ok(&self, token: &str) -> bool {
        self.valid_access.lock().unwrap().contains(token)
    }

    fn refresh_ok(&self, token: &str) -> bool {
        self.valid_refresh.lock().unwrap().contains(token)
    }

    /// Every issued access token stops working
    pub fn expire_access_tokens(&self) {
        self.valid_access.lock().unwrap().clear();
    }

    /// Every issued refresh token stops working
    pub fn revoke_refresh_tokens(&self) {
        self.valid_refresh.lock().unwrap().clear();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// `Authorization` header of the last protected request
    pub fn last_protected_auth(&self) -> Option<String> {
        self.last_protected_auth.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Mock backend server for tests
pub struct MockBackend {
    pub state: Arc<BackendState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockBackend {
    /// Start the mock server on an ephemeral port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(BackendState::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let app = Router::new()
            .route("/api/v1/auth/login", post(handle_login))
            .route("/api/v1/auth/register", post(handle_register))
            .route("/api/v1/auth/me", get(handle_me))
            .route("/api/v1/auth/refresh", post(handle_refresh))
            .route("/api/v1/auth/logout", post(handle_logout))
            .route("/api/v1/roadmaps", get(handle_roadmaps))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            state,
            shutdown_tx: Some(shutdown_tx),
            port,
        }
    }

    /// Base URL including the API prefix
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/api/v1", self.port)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

type Shared = State<Arc<BackendState>>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn user_json(email: &str) -> serde_json::Value {
    json!({
        "id": 1,
        "email": email,
        "username": "user",
        "is_active": true,
        "is_email_verified": false
    })
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn handle_login(State(state): Shared, Form(form): Form<LoginForm>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if form.username != EMAIL || form.password != PASSWORD {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect username or password");
    }
    Json(json!({
        "access_token": state.issue_access(),
        "refresh_token": state.issue_refresh(),
        "token_type": "bearer",
        "user": user_json(EMAIL),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    #[allow(dead_code)]
    username: String,
    email: String,
    #[allow(dead_code)]
    password: String,
}

async fn handle_register(State(state): Shared, Json(body): Json<RegisterBody>) -> Response {
    state.register_calls.fetch_add(1, Ordering::SeqCst);
    if !state.registered.lock().unwrap().insert(body.email.clone()) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    Json(json!({
        "access_token": state.issue_access(),
        "refresh_token": state.issue_refresh(),
        "token_type": "bearer",
        "user": user_json(&body.email),
    }))
    .into_response()
}

async fn handle_me(State(state): Shared, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    match bearer(&headers) {
        Some(token) if state.access_ok(&token) => Json(user_json(EMAIL)).into_response(),
        _ => detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}

async fn handle_refresh(State(state): Shared, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let valid = bearer(&headers).map(|t| state.refresh_ok(&t)).unwrap_or(false);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !valid {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate refresh token");
    }
    Json(json!({
        "access_token": state.issue_access(),
        "refresh_token": "",
        "token_type": "bearer",
    }))
    .into_response()
}

async fn handle_logout(State(state): Shared, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = bearer(&headers) {
        state.valid_refresh.lock().unwrap().remove(&token);
    }
    Json(json!({ "message": "Successfully logged out" })).into_response()
}

async fn handle_roadmaps(State(state): Shared, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_protected_auth.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    match bearer(&headers) {
        Some(token) if state.access_ok(&token) => Json(json!([{
            "id": 1,
            "title": "Backend Engineer",
            "owner_id": 1,
            "topics": []
        }]))
        .into_response(),
        _ => detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}
