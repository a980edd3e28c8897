//! Explicit wiring of the client: configuration, persisted state, the
//! gateway, the endpoint services and the realtime channel.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use zhex_core::OnboardingToken;

use crate::config::{ClientConfig, ConfigError};
use crate::error::ApiError;
use crate::gateway::ApiClient;
use crate::onboarding::OnboardingSession;
use crate::realtime::{ChannelManager, RealtimeError};
use crate::services::{
    AuthService, CheckoutService, CompanyService, ProductService, ProfileService,
    TransactionService, WalletService,
};
use crate::storage::{LocalStore, PersistentTokenStore, StorageError, default_state_path};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

/// One signed-in (or signing-in) dashboard session.
pub struct Dashboard {
    store: LocalStore,
    client: Arc<ApiClient>,
    auth: AuthService,
    products: ProductService,
    transactions: TransactionService,
    wallet: WalletService,
    checkout: CheckoutService,
    profile: ProfileService,
    companies: CompanyService,
    realtime: OnceCell<Arc<ChannelManager>>,
}

impl Dashboard {
    /// Open the persisted state (at `config.state_path`, or the per-user
    /// default) and wire everything on top of it.
    pub async fn open(config: ClientConfig) -> Result<Self, DashboardError> {
        let path = match &config.state_path {
            Some(path) => path.clone(),
            None => default_state_path().map_err(StorageError::from)?,
        };
        debug!(path = %path.display(), "opening client state");
        let store = LocalStore::open(&path).await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: LocalStore) -> Result<Self, DashboardError> {
        let tokens = Arc::new(PersistentTokenStore::new(store.clone()));
        let client = Arc::new(ApiClient::new(config, tokens)?);
        info!(api_url = %client.config().api_url, "dashboard client ready");

        Ok(Self {
            store,
            auth: AuthService::new(Arc::clone(&client)),
            products: ProductService::new(Arc::clone(&client)),
            transactions: TransactionService::new(Arc::clone(&client)),
            wallet: WalletService::new(Arc::clone(&client)),
            checkout: CheckoutService::new(Arc::clone(&client)),
            profile: ProfileService::new(Arc::clone(&client)),
            companies: CompanyService::new(Arc::clone(&client)),
            client,
            realtime: OnceCell::new(),
        })
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn products(&self) -> &ProductService {
        &self.products
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    pub fn wallet(&self) -> &WalletService {
        &self.wallet
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    pub fn profile(&self) -> &ProfileService {
        &self.profile
    }

    pub fn companies(&self) -> &CompanyService {
        &self.companies
    }

    /// A new onboarding run, optionally continuing the record behind `token`.
    pub fn onboarding(&self, token: Option<OnboardingToken>) -> OnboardingSession {
        OnboardingSession::new(Arc::clone(&self.client), token)
    }

    /// The realtime channel, created on first use. Not started: subscribe
    /// first, then call [`ChannelManager::start`].
    pub async fn realtime(&self) -> Result<Arc<ChannelManager>, RealtimeError> {
        self.realtime
            .get_or_try_init(|| async { ChannelManager::websocket(Arc::clone(&self.client)).map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Close the realtime channel and end the session.
    pub async fn sign_out(&self) -> Result<(), DashboardError> {
        if let Some(channel) = self.realtime.get() {
            channel.disconnect().await;
        }
        self.auth.logout().await?;
        Ok(())
    }
}
