use std::sync::Arc;

use zhex_core::{TransactionId, Validate};

use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};
use crate::types::{Page, Transaction, TransactionFilter};

/// Payment transactions (read only).
#[derive(Debug, Clone)]
pub struct TransactionService {
    client: Arc<ApiClient>,
}

impl TransactionService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &TransactionFilter) -> ApiResult<Page<Transaction>> {
        filter.validate()?;
        let request = filter
            .to_query()
            .into_iter()
            .fold(ApiRequest::get("/transactions"), |req, (key, value)| req.query(key, value));
        self.client.send(request).await
    }

    pub async fn get(&self, id: &TransactionId) -> ApiResult<Transaction> {
        self.client.get(&format!("/transactions/{id}")).await
    }
}
