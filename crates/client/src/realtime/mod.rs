//! Realtime channel (`/dashboard` namespace).
//!
//! One [`ChannelManager`] owns at most one live connection. A background driver
//! task runs the connection lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> (backoff) -> Connecting ...
//!                                                         \-> Failed (attempts exhausted)
//! ```
//!
//! - A successful connect resets the attempt counter and publishes
//!   [`ChannelEvent::Connected`]; callers re-join their rooms on it.
//! - A close that suggests an expired token triggers one token refresh and an
//!   immediate reconnect before any backoff.
//! - [`ChannelManager::reconnect`] restarts the cycle with a fresh counter;
//!   [`ChannelManager::disconnect`] cancels any pending timer or refresh and stops the driver.

pub mod backoff;
pub mod events;
pub mod transport;
pub mod ws;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use zhex_auth::{TokenStore, TokenStoreError};
use zhex_core::{CompanyId, ProductId};

use crate::config::ConfigError;
use crate::error::ApiResult;
use crate::gateway::ApiClient;

pub use backoff::ReconnectPolicy;
pub use events::{ChannelEvent, ServerEvent};
pub use transport::{Connection, DisconnectReason, Frame, Transport, TransportError};
pub use ws::WsTransport;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Automatic reconnects are exhausted; only [`ChannelManager::reconnect`] resumes.
    Failed,
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("no session: sign in before opening the realtime channel")]
    NoSession,
    #[error("realtime channel is not connected")]
    NotConnected,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] TokenStoreError),
}

/// Source of a fresh access token after the server dropped the old one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> ApiResult<String>;
}

#[async_trait]
impl TokenRefresher for ApiClient {
    async fn refresh(&self) -> ApiResult<String> {
        ApiClient::refresh(self).await
    }
}

enum Command {
    Emit(Frame),
    Disconnect,
}

struct Shared {
    url: Url,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ChannelEvent>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn publish(&self, event: ChannelEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn fail(&self) {
        self.set_state(ConnectionState::Failed);
        self.publish(ChannelEvent::Failed);
    }

    fn stopped(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.publish(ChannelEvent::Disconnected(DisconnectReason::Manual));
        info!("realtime channel closed");
    }
}

struct Driver {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

pub struct ChannelManager {
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

impl core::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("url", &self.shared.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    pub fn new(
        url: Url,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            shared: Arc::new(Shared {
                url,
                policy,
                transport,
                tokens,
                refresher,
                state,
                events,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Channel sharing the gateway's configuration, token store and refresh.
    pub fn for_client(client: Arc<ApiClient>, transport: Arc<dyn Transport>) -> Result<Self, RealtimeError> {
        let url = client.config().realtime_url()?;
        let policy = ReconnectPolicy::from(&client.config().realtime);
        let tokens = Arc::clone(client.tokens());
        Ok(Self::new(url, policy, transport, tokens, client))
    }

    /// WebSocket channel for `client`.
    pub fn websocket(client: Arc<ApiClient>) -> Result<Self, RealtimeError> {
        let transport = WsTransport::new(client.config().forwarded_host.clone());
        Self::for_client(client, Arc::new(transport))
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    /// Open the channel. No-op while a driver is already running.
    pub async fn start(&self) -> Result<(), RealtimeError> {
        if self.shared.tokens.access_token().await?.is_none() {
            return Err(RealtimeError::NoSession);
        }

        let mut driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            return Ok(());
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(Arc::clone(&self.shared), rx));
        *driver = Some(Driver { commands, task });
        Ok(())
    }

    /// Restart the cycle with a fresh attempt counter (also after `Failed`).
    pub async fn reconnect(&self) -> Result<(), RealtimeError> {
        info!("manual realtime reconnect");
        self.disconnect().await;
        self.start().await
    }

    /// Close the connection and cancel any pending reconnect.
    pub async fn disconnect(&self) {
        let driver = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(driver) = driver {
            if driver.commands.send(Command::Disconnect).is_ok() {
                let _ = driver.task.await;
            } else {
                driver.task.abort();
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Send an event on the live connection.
    pub fn emit(&self, event: &str, data: Value) -> Result<(), RealtimeError> {
        self.send(Frame::new(event, data))
    }

    pub fn join_product_room(&self, product_id: &ProductId) -> Result<(), RealtimeError> {
        self.send(events::product_room(events::JOIN_PRODUCT_ROOM, product_id))
    }

    pub fn leave_product_room(&self, product_id: &ProductId) -> Result<(), RealtimeError> {
        self.send(events::product_room(events::LEAVE_PRODUCT_ROOM, product_id))
    }

    pub fn join_company_room(&self, company_id: &CompanyId) -> Result<(), RealtimeError> {
        self.send(events::company_room(company_id))
    }

    fn send(&self, frame: Frame) -> Result<(), RealtimeError> {
        if self.state() != ConnectionState::Connected {
            return Err(RealtimeError::NotConnected);
        }
        let driver = self.driver.lock().unwrap_or_else(|e| e.into_inner());
        let driver = driver.as_ref().ok_or(RealtimeError::NotConnected)?;
        driver
            .commands
            .send(Command::Emit(frame))
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        let driver = self.driver.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(driver) = driver {
            driver.task.abort();
        }
    }
}

/// Returns `false` when the driver must stop.
fn handle_idle_command(command: Option<Command>) -> bool {
    match command {
        Some(Command::Emit(frame)) => {
            debug!(event = %frame.event, "not connected, dropping emit");
            true
        }
        Some(Command::Disconnect) | None => false,
    }
}

async fn run(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut attempt: u32 = 0;
    let mut refreshed = false;
    let mut fresh_token: Option<String> = None;

    loop {
        let token = match fresh_token.take() {
            Some(token) => token,
            None => match shared.tokens.access_token().await {
                Ok(Some(token)) => token,
                Ok(None) => {
                    warn!("no access token, realtime channel stopped");
                    shared.fail();
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "token store unavailable, realtime channel stopped");
                    shared.fail();
                    return;
                }
            },
        };

        shared.set_state(ConnectionState::Connecting);
        debug!(attempt, url = %shared.url, "connecting realtime channel");

        let connected = {
            let mut connect = shared.transport.connect(&shared.url, &token);
            loop {
                tokio::select! {
                    result = &mut connect => break result,
                    command = commands.recv() => {
                        if !handle_idle_command(command) {
                            shared.stopped();
                            return;
                        }
                    }
                }
            }
        };

        let reason = match connected {
            Ok(mut connection) => {
                attempt = 0;
                refreshed = false;
                shared.set_state(ConnectionState::Connected);
                shared.publish(ChannelEvent::Connected);
                info!("realtime channel connected");

                let reason = pump(&shared, connection.as_mut(), &mut commands).await;
                if reason == DisconnectReason::Manual {
                    connection.close().await;
                    shared.stopped();
                    return;
                }
                reason
            }
            Err(e) => {
                warn!(error = %e, attempt, "realtime connect failed");
                e.reason()
            }
        };

        shared.set_state(ConnectionState::Disconnected);
        shared.publish(ChannelEvent::Disconnected(reason));
        info!(?reason, "realtime channel disconnected");

        if reason.suggests_expired_token() && !refreshed {
            refreshed = true;
            if matches!(shared.tokens.refresh_token().await, Ok(Some(_))) {
                let refreshed_token = {
                    let mut refresh = shared.refresher.refresh();
                    loop {
                        tokio::select! {
                            result = &mut refresh => break result,
                            command = commands.recv() => {
                                if !handle_idle_command(command) {
                                    shared.stopped();
                                    return;
                                }
                            }
                        }
                    }
                };
                match refreshed_token {
                    Ok(token) => {
                        debug!("access token refreshed, reconnecting now");
                        fresh_token = Some(token);
                        continue;
                    }
                    Err(e) => warn!(error = %e, "token refresh failed, falling back to backoff"),
                }
            }
        }

        if !shared.policy.allows(attempt) {
            warn!(attempts = attempt, "realtime reconnect attempts exhausted");
            shared.fail();
            return;
        }

        let delay = shared.policy.delay_for_attempt(attempt);
        attempt += 1;
        debug!(attempt, delay_ms = delay.as_millis() as u64, "realtime reconnect scheduled");

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => {
                    if !handle_idle_command(command) {
                        shared.stopped();
                        return;
                    }
                }
            }
        }
    }
}

/// Forward frames and commands until the connection ends.
async fn pump(
    shared: &Shared,
    connection: &mut dyn Connection,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            frame = connection.recv() => match frame {
                Ok(frame) => {
                    debug!(event = %frame.event, "realtime event received");
                    shared.publish(ChannelEvent::Server(ServerEvent::from(frame)));
                }
                Err(reason) => return reason,
            },
            command = commands.recv() => match command {
                Some(Command::Emit(frame)) => {
                    let event = frame.event.clone();
                    if let Err(e) = connection.send(frame).await {
                        warn!(%event, error = %e, "realtime emit failed");
                        return DisconnectReason::TransportError;
                    }
                }
                Some(Command::Disconnect) | None => return DisconnectReason::Manual,
            },
        }
    }
}
