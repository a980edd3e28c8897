#![allow(dead_code)]

//! In-process mock of the Zhex API, bound to an ephemeral port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;

use zhex_auth::TokenStore;
use zhex_client::{ApiClient, ClientConfig};

pub const FORWARDED_HOST: &str = "merchant.zhex.test";

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub query_token: Option<String>,
    pub forwarded_host: Option<String>,
    pub request_id: Option<String>,
}

pub struct MockState {
    pub valid_token: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_ok: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub failing_document: Mutex<Option<String>>,
    pub hits: Mutex<Vec<Hit>>,
}

impl MockState {
    /// `valid_token` is the only access token protected routes accept.
    pub fn new(valid_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            refresh_delay_ms: AtomicU64::new(0),
            failing_document: Mutex::new(None),
            hits: Mutex::new(Vec::new()),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let valid = self.valid_token.lock().unwrap().clone();
        bearer(headers).is_some_and(|token| token == valid)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, path: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path == path).collect()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockApi {
    pub async fn spawn(state: MockState) -> Self {
        zhex_observability::init_for_tests();
        let state = Arc::new(state);
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(Url::parse(&self.base_url).unwrap()).with_forwarded_host(FORWARDED_HOST)
    }

    pub fn client(&self, tokens: Arc<dyn TokenStore>) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(self.config(), tokens).unwrap())
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(|| async { Json(json!({ "success": true })) }))
        .route("/products/:id", get(product))
        .route("/always-unauthorized", get(|| async { unauthorized("nope") }))
        .route("/wallet/balance", get(balance))
        .route("/wallet/withdrawals", post(withdraw))
        .route("/onboarding/status", get(onboarding_status))
        .route("/onboarding/step-1/profile", post(step_profile))
        .route("/onboarding/step-2/company-details", put(step_company))
        .route("/onboarding/step-3/representatives", put(step_representatives))
        .route("/onboarding/step-3/representatives/:id/documents", post(upload_document))
        .route("/dashboard", get(dashboard_ws))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
        .with_state(state)
}

async fn record(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    let headers = req.headers();
    let query_token = req.uri().query().and_then(|q| {
        q.split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .map(str::to_string)
    });
    let hit = Hit {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        bearer: bearer(headers),
        query_token,
        forwarded_host: header(headers, "x-forwarded-host"),
        request_id: header(headers, "x-request-id"),
    };
    state.hits.lock().unwrap().push(hit);
    next.run(req).await
}

async fn login(Json(body): Json<Value>) -> Json<Value> {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let authenticated = json!({
        "success": 1,
        "user": { "name": "Ana", "email": email },
        "accessToken": "T1",
        "refreshToken": "R1"
    });

    match (email, password) {
        ("a@b.com", "secret1") => Json(authenticated),
        ("multi@b.com", "secret1") if body.get("companyId").is_some() => Json(authenticated),
        ("multi@b.com", "secret1") => Json(json!({
            "success": 2,
            "companies": [{ "id": 1, "name": "Acme" }, { "id": 2, "name": "Globex" }]
        })),
        _ => Json(json!({ "success": false, "message": "Invalid e-mail or password" })),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.refresh_ok.load(Ordering::SeqCst) && body["refreshToken"] == "R1" {
        *state.valid_token.lock().unwrap() = "T2".to_string();
        Json(json!({ "accessToken": "T2" })).into_response()
    } else {
        unauthorized("Refresh token expired")
    }
}

async fn product(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !state.authorized(&headers) {
        return unauthorized("Token expired");
    }
    Json(json!({ "id": id, "name": format!("Product {id}"), "price": 1990 })).into_response()
}

async fn balance(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized("Token expired");
    }
    Json(json!({ "available": 5000, "pending": 1200 })).into_response()
}

async fn withdraw(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !state.authorized(&headers) {
        return unauthorized("Token expired");
    }
    Json(json!({
        "id": "w1",
        "amount": body["amount"],
        "status": "pending",
        "requestedAt": "2024-05-01T12:00:00Z"
    }))
    .into_response()
}

async fn onboarding_status(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("token").map(String::as_str) {
        Some("abc") => Json(json!({
            "nextStep": { "step": 4, "title": "Conta bancária" },
            "completedSteps": { "profile": true, "companyDetails": true, "representatives": true }
        }))
        .into_response(),
        _ => unauthorized("Invalid onboarding token"),
    }
}

async fn step_profile() -> Json<Value> {
    Json(json!({
        "id": 10,
        "onboardingToken": "abc",
        "nextStep": { "step": 2, "title": "Empresa" },
        "completedSteps": { "profile": true }
    }))
}

async fn step_company(Query(query): Query<HashMap<String, String>>) -> Response {
    if query.get("token").map(String::as_str) != Some("abc") {
        return unauthorized("Invalid onboarding token");
    }
    Json(json!({
        "nextStep": { "step": 3, "title": "Sócios" },
        "completedSteps": { "profile": true, "companyDetails": true }
    }))
    .into_response()
}

async fn step_representatives(Json(body): Json<Value>) -> Json<Value> {
    let created: Vec<Value> = body["representatives"]
        .as_array()
        .map(|reps| {
            reps.iter()
                .enumerate()
                .map(|(i, rep)| json!({ "id": format!("r{}", i + 1), "cpf": rep["cpf"] }))
                .collect()
        })
        .unwrap_or_default();

    Json(json!({
        "representatives": created,
        "nextStep": { "step": 4 },
        "completedSteps": { "profile": true, "companyDetails": true, "representatives": true }
    }))
}

async fn upload_document(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut file_name = None;
    let mut kind = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                let _ = field.bytes().await.unwrap();
            }
            Some("type") => kind = Some(field.text().await.unwrap()),
            _ => {}
        }
    }

    let failing = state.failing_document.lock().unwrap().clone();
    if file_name.is_some() && file_name == failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "storage unavailable" })),
        )
            .into_response();
    }

    let file_name = file_name.unwrap_or_default();
    Json(json!({ "id": format!("{id}-{file_name}"), "type": kind })).into_response()
}

async fn dashboard_ws(State(state): State<Arc<MockState>>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(echo_socket)
}

/// Greets with `support_email_verified`, then echoes every frame as `echo`.
async fn echo_socket(mut socket: WebSocket) {
    let hello = json!({ "event": "support_email_verified", "data": { "email": "a@b.com" } });
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let echo = json!({ "event": "echo", "data": data });
            if socket.send(Message::Text(echo.to_string())).await.is_err() {
                break;
            }
        }
    }
}
