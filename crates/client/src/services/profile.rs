use std::sync::Arc;

use serde_json::json;
use tracing::info;
use zhex_core::{Email, Validate};

use crate::error::ApiResult;
use crate::gateway::ApiClient;
use crate::types::{Ack, ChangeEmailRequest, ChangePasswordRequest, Profile, ProfileUpdate};

/// The signed-in user's profile.
#[derive(Debug, Clone)]
pub struct ProfileService {
    client: Arc<ApiClient>,
}

impl ProfileService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ApiResult<Profile> {
        self.client.get("/profile").await
    }

    pub async fn update(&self, update: &ProfileUpdate) -> ApiResult<Profile> {
        update.validate()?;
        self.client.put("/profile", update).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ApiResult<Ack> {
        let request = ChangePasswordRequest::new(current, new)?;
        let ack = self.client.put("/profile/password", &request).await?;
        info!("password changed");
        Ok(ack)
    }

    /// Starts an e-mail change; the server confirms it with an `email_changed`
    /// realtime event once the new address is verified.
    pub async fn change_email(&self, new_email: &str) -> ApiResult<Ack> {
        let request = ChangeEmailRequest {
            email: Email::parse(new_email)?,
        };
        self.client.put("/profile/email", &request).await
    }

    /// Ask the API to send a new verification e-mail.
    pub async fn resend_verification(&self) -> ApiResult<Ack> {
        self.client.post("/profile/email/verification", &json!({})).await
    }
}
