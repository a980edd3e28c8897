use std::sync::Arc;

use tracing::info;
use zhex_core::{ProductId, Validate};

use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};
use crate::types::{NewProduct, Page, PageRequest, Product, ProductUpdate};

/// Product catalog.
#[derive(Debug, Clone)]
pub struct ProductService {
    client: Arc<ApiClient>,
}

impl ProductService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, page: PageRequest) -> ApiResult<Page<Product>> {
        let request = page
            .to_query()
            .into_iter()
            .fold(ApiRequest::get("/products"), |req, (key, value)| req.query(key, value));
        self.client.send(request).await
    }

    pub async fn get(&self, id: &ProductId) -> ApiResult<Product> {
        self.client.get(&format!("/products/{id}")).await
    }

    pub async fn create(&self, product: &NewProduct) -> ApiResult<Product> {
        product.validate()?;
        let created: Product = self.client.post("/products", product).await?;
        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    pub async fn update(&self, id: &ProductId, update: &ProductUpdate) -> ApiResult<Product> {
        update.validate()?;
        self.client.put(&format!("/products/{id}"), update).await
    }

    pub async fn delete(&self, id: &ProductId) -> ApiResult<()> {
        let _: serde_json::Value = self.client.delete(&format!("/products/{id}")).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}
