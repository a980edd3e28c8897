//! Transport seam of the realtime channel.
//!
//! The manager only needs "connect with a token", "send a frame" and "wait for
//! the next frame or the reason the connection ended". [`super::ws`] provides
//! the WebSocket implementation; tests script their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// One event on the wire: `{"event": name, "data": payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Why a connection ended (or never came up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed the connection.
    ServerClose,
    /// The local side closed the connection without a manual disconnect.
    ClientClose,
    /// The stream ended without a close handshake.
    TransportClose,
    /// I/O or protocol error.
    TransportError,
    /// The server refused the access token.
    AuthRejected,
    /// [`super::ChannelManager::disconnect`] was called.
    Manual,
}

impl DisconnectReason {
    /// Closes that are not transient network blips usually mean the access
    /// token expired; the manager refreshes once before backing off.
    pub fn suggests_expired_token(&self) -> bool {
        matches!(
            self,
            DisconnectReason::ServerClose | DisconnectReason::ClientClose | DisconnectReason::AuthRejected
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("handshake rejected: {0}")]
    Unauthorized(String),
    #[error("transport failure: {0}")]
    Io(String),
}

impl TransportError {
    pub fn reason(&self) -> DisconnectReason {
        match self {
            TransportError::Unauthorized(_) => DisconnectReason::AuthRejected,
            TransportError::Io(_) => DisconnectReason::TransportError,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &Url, token: &str) -> Result<Box<dyn Connection>, TransportError>;
}

#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Next frame, or the reason the connection is gone. Must be cancel safe.
    async fn recv(&mut self) -> Result<Frame, DisconnectReason>;

    async fn close(&mut self);
}
