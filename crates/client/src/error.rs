//! Error taxonomy of the client.
//!
//! Every public operation returns `Result<_, ApiError>` (or a module error that
//! wraps it). [`ApiError::kind`] folds the variants into the four categories a
//! screen reacts to.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use zhex_auth::TokenStoreError;
use zhex_core::{DomainError, FieldErrors};

pub type ApiResult<T> = Result<T, ApiError>;

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session is gone; prompt for login again.
    Reauthenticate,
    /// Input was rejected; show field-level messages.
    Validation,
    /// Permission or not-found style failure; show a generic message.
    Failed,
    /// Connectivity or server trouble; the user may retry the same action.
    Retryable,
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    /// The refresh token was missing or rejected; both tokens have been cleared.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// 401 on an anonymous call, or on a request already replayed once.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Client-side check failed before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(DomainError),

    /// HTTP 422 (or 400 with field errors). Messages are passed through verbatim.
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("token storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::SessionExpired | ApiError::Unauthorized(_) => ErrorKind::Reauthenticate,
            ApiError::InvalidInput(_) | ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Network(_) => ErrorKind::Retryable,
            ApiError::Server { status, .. } if *status >= 500 || *status == 429 => ErrorKind::Retryable,
            ApiError::Server { .. }
            | ApiError::Forbidden(_)
            | ApiError::NotFound(_)
            | ApiError::Decode(_)
            | ApiError::Storage(_) => ErrorKind::Failed,
        }
    }

    /// Field-level messages, for client-side and server-side validation failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation { fields, .. } => Some(fields),
            ApiError::InvalidInput(err) => err.field_errors(),
            _ => None,
        }
    }

    /// Map a non-2xx response to an error, using the server-provided message
    /// when the body has one and the status text otherwise.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let json: Option<Value> = serde_json::from_slice(body).ok();
        let message = json
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| status_text(status));
        let fields = json.as_ref().map(extract_fields).unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation { message, fields },
            StatusCode::BAD_REQUEST if !fields.is_empty() => ApiError::Validation { message, fields },
            _ => ApiError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::InvalidInput(err)
    }
}

impl From<TokenStoreError> for ApiError {
    fn from(err: TokenStoreError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_timeout() {
            ApiError::Network(format!("request timed out: {err}"))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// `message` may be a string or a list of strings (validation pipes).
fn extract_message(body: &Value) -> Option<String> {
    match body.get("message").or_else(|| body.get("error"))? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

/// `errors` may be `{field: msg | [msg]}` or `[{field|property, message}]`.
fn extract_fields(body: &Value) -> FieldErrors {
    let mut fields = FieldErrors::new();
    match body.get("errors") {
        Some(Value::Object(map)) => {
            for (field, msg) in map {
                match msg {
                    Value::String(s) => fields.add(field.clone(), s.clone()),
                    Value::Array(items) => {
                        if let Some(first) = items.iter().find_map(Value::as_str) {
                            fields.add(field.clone(), first);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let field = item
                    .get("field")
                    .or_else(|| item.get("property"))
                    .and_then(Value::as_str);
                let msg = item.get("message").and_then(Value::as_str);
                if let (Some(field), Some(msg)) = (field, msg) {
                    fields.add(field, msg);
                }
            }
        }
        _ => {}
    }
    fields
}
