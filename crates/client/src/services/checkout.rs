use std::sync::Arc;

use zhex_core::{ProductId, Validate};

use crate::error::ApiResult;
use crate::gateway::ApiClient;
use crate::types::CheckoutCustomization;

/// Hosted checkout customization, one per product.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    client: Arc<ApiClient>,
}

impl CheckoutService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get(&self, product_id: &ProductId) -> ApiResult<CheckoutCustomization> {
        self.client.get(&checkout_path(product_id)).await
    }

    pub async fn update(
        &self,
        product_id: &ProductId,
        customization: &CheckoutCustomization,
    ) -> ApiResult<CheckoutCustomization> {
        customization.validate()?;
        self.client.put(&checkout_path(product_id), customization).await
    }
}

fn checkout_path(product_id: &ProductId) -> String {
    format!("/products/{product_id}/checkout")
}
