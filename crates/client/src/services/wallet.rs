use std::sync::Arc;

use tracing::info;

use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};
use crate::types::{Page, PageRequest, WalletBalance, Withdrawal, WithdrawalRequest};

/// Balance and withdrawals.
#[derive(Debug, Clone)]
pub struct WalletService {
    client: Arc<ApiClient>,
}

impl WalletService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn balance(&self) -> ApiResult<WalletBalance> {
        self.client.get("/wallet/balance").await
    }

    pub async fn withdrawals(&self, page: PageRequest) -> ApiResult<Page<Withdrawal>> {
        let request = page
            .to_query()
            .into_iter()
            .fold(ApiRequest::get("/wallet/withdrawals"), |req, (key, value)| req.query(key, value));
        self.client.send(request).await
    }

    /// Request a withdrawal after checking it against the current balance.
    ///
    /// The server re-checks the balance; this only spares a round trip for
    /// requests that cannot succeed.
    pub async fn request_withdrawal(&self, request: &WithdrawalRequest) -> ApiResult<Withdrawal> {
        let balance = self.balance().await?;
        request.check_against(&balance)?;

        let withdrawal: Withdrawal = self.client.post("/wallet/withdrawals", request).await?;
        info!(withdrawal_id = %withdrawal.id, amount = %withdrawal.amount, "withdrawal requested");
        Ok(withdrawal)
    }
}
