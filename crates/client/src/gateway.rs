//! Single outbound gateway for every REST call.
//!
//! The gateway attaches the current access token, and owns the refresh
//! protocol:
//!
//! - A 401 on an authenticated request moves the client from `Idle` to
//!   `Refreshing` and issues exactly one `POST /auth/refresh`.
//! - Any 401 that arrives while a refresh is in flight queues behind it instead
//!   of starting another one.
//! - On success the new token is stored and every affected request is replayed
//!   once. On failure both tokens are cleared and every affected request fails
//!   with [`ApiError::SessionExpired`].
//!
//! A 401 for a request that was sent with a token that has since been replaced
//! is replayed with the current token straight away.

use std::mem;
use std::sync::{Arc, Mutex};

use reqwest::header::HeaderValue;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use zhex_auth::{Credentials, RefreshRequest, RefreshResponse, TokenStore};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

const REFRESH_PATH: &str = "/auth/refresh";

type RefreshOutcome = ApiResult<String>;

enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// A file part of a multipart upload.
///
/// Kept as owned bytes so the request can be rebuilt for a replay.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

impl Upload {
    fn to_form(&self) -> ApiResult<reqwest::multipart::Form> {
        let part = reqwest::multipart::Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)
            .map_err(|e| ApiError::Decode(format!("invalid mime type {:?}: {e}", self.mime)))?;

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form.part(self.field.clone(), part))
    }
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Value),
    Multipart(Upload),
}

/// A request description that can be sent (and replayed) by the gateway.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Body,
    anonymous: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Decode(format!("failed to encode request body: {e}")))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, upload: Upload) -> Self {
        self.body = Body::Multipart(upload);
        self
    }

    /// Send without credentials and never run the refresh protocol
    /// (login, waitlist, password reset).
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The HTTP gateway. Share it behind an `Arc`.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
    refresh: Mutex<RefreshState>,
}

impl core::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.config.api_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            tokens,
            refresh: Mutex::new(RefreshState::Idle),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Whether an access token is currently stored.
    pub async fn has_session(&self) -> ApiResult<bool> {
        Ok(self.tokens.access_token().await?.is_some())
    }

    pub async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = ApiRequest::new(method, path);
        if let Some(body) = body {
            request = request.json(body)?;
        }
        self.send(request).await
    }

    pub async fn request_with_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let request = query
            .iter()
            .fold(ApiRequest::new(method, path), |req, (key, value)| req.query(*key, value));
        self.send(request).await
    }

    /// `POST` a multipart form with one file part.
    pub async fn upload<T: DeserializeOwned>(&self, path: &str, upload: Upload) -> ApiResult<T> {
        self.send(ApiRequest::post(path).multipart(upload)).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Send a request, running the refresh protocol on 401.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let token = if request.anonymous {
            None
        } else {
            self.tokens.access_token().await?
        };

        let (status, body) = self.send_once(&request, token.as_deref()).await?;
        if status != StatusCode::UNAUTHORIZED {
            return decode(status, &body);
        }

        // Anonymous calls (and calls made without a session) surface the 401 as is.
        let Some(sent_with) = token else {
            return Err(ApiError::from_response(status, &body));
        };

        debug!(method = %request.method, path = %request.path, "401 received, renewing access token");
        let fresh = self.renew_after_unauthorized(&sent_with).await?;

        // Replayed at most once: a second 401 is final.
        let (status, body) = self.send_once(&request, Some(&fresh)).await?;
        decode(status, &body)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Single-flight: concurrent callers wait for the refresh already in
    /// progress and observe its outcome.
    pub async fn refresh(&self) -> ApiResult<String> {
        let waiter = {
            let mut state = self.refresh.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!("refresh already in flight, queued");
            return rx.await.unwrap_or(Err(ApiError::SessionExpired));
        }

        let guard = RefreshGuard {
            state: &self.refresh,
            finished: false,
        };
        let outcome = self.exchange_refresh_token().await;
        guard.finish(&outcome);
        outcome
    }

    async fn renew_after_unauthorized(&self, sent_with: &str) -> ApiResult<String> {
        if let Some(current) = self.tokens.access_token().await? {
            if current != sent_with {
                debug!("access token already replaced, replaying with current token");
                return Ok(current);
            }
        }
        self.refresh().await
    }

    async fn exchange_refresh_token(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.tokens.refresh_token().await? else {
            warn!("no refresh token stored; ending session");
            self.tokens.clear().await?;
            return Err(ApiError::SessionExpired);
        };

        info!("refreshing access token");
        let request = ApiRequest::post(REFRESH_PATH)
            .json(&RefreshRequest { refresh_token })?
            .anonymous();

        let result = match self.send_once(&request, None).await {
            Ok((status, body)) if status.is_success() => {
                serde_json::from_slice::<RefreshResponse>(&body).map_err(|e| {
                    warn!(error = %e, "refresh response could not be decoded");
                    ApiError::SessionExpired
                })
            }
            Ok((status, _)) => {
                warn!(%status, "refresh token rejected");
                Err(ApiError::SessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "refresh call failed");
                Err(ApiError::SessionExpired)
            }
        };

        match result {
            Ok(RefreshResponse {
                access_token,
                refresh_token: Some(rotated),
            }) => {
                self.tokens
                    .store(&Credentials::new(access_token.clone(), rotated))
                    .await?;
                info!("access token refreshed (refresh token rotated)");
                Ok(access_token)
            }
            Ok(RefreshResponse { access_token, .. }) => {
                self.tokens.set_access_token(access_token.clone()).await?;
                info!("access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                self.tokens.clear().await?;
                Err(e)
            }
        }
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> ApiResult<(StatusCode, Vec<u8>)> {
        let request_id = Uuid::now_v7().to_string();
        let url = self.config.endpoint(&request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(host) = &self.config.forwarded_host {
            if let Ok(value) = HeaderValue::from_str(host) {
                builder = builder.header(FORWARDED_HOST_HEADER, value);
            }
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(upload) => builder.multipart(upload.to_form()?),
        };

        let response = builder.send().await.map_err(|e| {
            warn!(%request_id, method = %request.method, path = %request.path, error = %e, "request failed");
            ApiError::from(e)
        })?;

        let status = response.status();
        debug!(%request_id, method = %request.method, path = %request.path, %status, "response received");

        let body = response.bytes().await.map_err(ApiError::from)?;
        Ok((status, body.to_vec()))
    }
}

/// Puts the refresh state back to `Idle` and releases every queued waiter,
/// also when the refreshing future is dropped half-way.
struct RefreshGuard<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl RefreshGuard<'_> {
    fn finish(mut self, outcome: &RefreshOutcome) {
        self.release(outcome);
        self.finished = true;
    }

    fn release(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), ok = outcome.is_ok(), "releasing queued requests");
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release(&Err(ApiError::Network("token refresh was interrupted".to_string())));
        }
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiResult<T> {
    if !status.is_success() {
        return Err(ApiError::from_response(status, body));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: u32,
    }

    #[test]
    fn decode_success_body() {
        let thing: Thing = decode(StatusCode::OK, br#"{"id":7}"#).unwrap();
        assert_eq!(thing, Thing { id: 7 });
    }

    #[test]
    fn empty_body_decodes_into_unit_and_option() {
        decode::<()>(StatusCode::NO_CONTENT, b"").unwrap();
        assert_eq!(decode::<Option<Thing>>(StatusCode::OK, b"  ").unwrap(), None);
        assert!(matches!(decode::<Thing>(StatusCode::OK, b""), Err(ApiError::Decode(_))));
    }

    #[test]
    fn decode_error_status() {
        let err = decode::<Thing>(StatusCode::FORBIDDEN, br#"{"message":"nope"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(msg) if msg == "nope"));
    }

    #[test]
    fn request_builder_collects_query() {
        let req = ApiRequest::get("/transactions")
            .query("page", 2)
            .query_opt("status", Some("paid"))
            .query_opt("from", None::<String>);
        assert_eq!(
            req.query,
            vec![("page".to_string(), "2".to_string()), ("status".to_string(), "paid".to_string())]
        );
    }

    #[test]
    fn interrupted_refresh_releases_waiters() {
        let state = Mutex::new(RefreshState::Refreshing(Vec::new()));
        let (tx, mut rx) = oneshot::channel();
        if let RefreshState::Refreshing(waiters) = &mut *state.lock().unwrap() {
            waiters.push(tx);
        }

        drop(RefreshGuard {
            state: &state,
            finished: false,
        });

        assert!(matches!(*state.lock().unwrap(), RefreshState::Idle));
        assert!(matches!(rx.try_recv(), Ok(Err(ApiError::Network(_)))));
    }
}
