use std::sync::Arc;

use crate::error::ApiResult;
use crate::gateway::ApiClient;
use crate::types::Company;

/// Companies the signed-in user belongs to.
#[derive(Debug, Clone)]
pub struct CompanyService {
    client: Arc<ApiClient>,
}

impl CompanyService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ApiResult<Vec<Company>> {
        self.client.get("/companies").await
    }
}
