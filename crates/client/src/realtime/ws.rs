//! WebSocket transport (`tokio-tungstenite`), JSON text frames.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::transport::{Connection, DisconnectReason, Frame, Transport, TransportError};
use crate::gateway::FORWARDED_HOST_HEADER;

/// Close codes the API uses when it refuses the token mid-session.
const AUTH_CLOSE_CODES: [u16; 4] = [1008, 4001, 4401, 4403];

/// Connects with `Authorization: Bearer <token>` on the upgrade request.
#[derive(Debug, Clone, Default)]
pub struct WsTransport {
    forwarded_host: Option<String>,
}

impl WsTransport {
    pub fn new(forwarded_host: Option<String>) -> Self {
        Self { forwarded_host }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url, token: &str) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::Io(format!("invalid token header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        if let Some(host) = &self.forwarded_host {
            if let Ok(value) = HeaderValue::from_str(host) {
                request.headers_mut().insert(FORWARDED_HOST_HEADER, value);
            }
        }

        match connect_async(request).await {
            Ok((stream, _)) => {
                debug!(%url, "websocket connected");
                Ok(Box::new(WsConnection { stream }))
            }
            Err(WsError::Http(response))
                if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
            {
                Err(TransportError::Unauthorized(response.status().to_string()))
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

fn close_reason(frame: Option<CloseFrame<'_>>) -> DisconnectReason {
    match frame {
        Some(frame) if AUTH_CLOSE_CODES.contains(&u16::from(frame.code)) => DisconnectReason::AuthRejected,
        _ => DisconnectReason::ServerClose,
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let text = serde_json::to_string(&frame).map_err(|e| TransportError::Io(e.to_string()))?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Frame, DisconnectReason> {
        loop {
            match self.stream.next().await {
                None => return Err(DisconnectReason::TransportClose),
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Frame>(&text) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => warn!(error = %e, "ignoring malformed realtime frame"),
                },
                Some(Ok(Message::Close(frame))) => return Err(close_reason(frame)),
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Err(DisconnectReason::ClientClose);
                }
                Some(Err(e)) => {
                    debug!(error = %e, "websocket error");
                    return Err(DisconnectReason::TransportError);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
