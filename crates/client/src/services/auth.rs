use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use zhex_auth::{LoginOutcome, LoginRequest, LoginResponse, WaitlistRequest};
use zhex_core::validation;
use zhex_core::{CompanyId, Email, Password, Validate};

use crate::error::{ApiError, ApiResult};
use crate::gateway::{ApiClient, ApiRequest};
use crate::types::Ack;

/// Login, logout and the anonymous account flows.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: Arc<ApiClient>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Sign in. Credentials are stored only for an `Authenticated` outcome.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<LoginOutcome> {
        let call = ApiRequest::post("/auth/login").json(request)?.anonymous();

        let response: LoginResponse = match self.client.send(call).await {
            Ok(response) => response,
            // Some deployments answer bad credentials with 401 instead of `success: false`.
            Err(ApiError::Unauthorized(message)) => {
                warn!(email = %request.email(), "login rejected");
                return Ok(LoginOutcome::Rejected { message });
            }
            Err(e) => return Err(e),
        };

        let (outcome, credentials) = response.into_outcome();
        match (&outcome, credentials) {
            (LoginOutcome::Authenticated { .. }, Some(credentials)) => {
                self.client.tokens().store(&credentials).await?;
                info!(email = %request.email(), company_id = ?request.company_id(), "signed in");
            }
            (LoginOutcome::CompanySelection { companies }, _) => {
                info!(email = %request.email(), companies = companies.len(), "company selection required");
            }
            (LoginOutcome::Rejected { message }, _) => {
                warn!(email = %request.email(), %message, "login rejected");
            }
            (LoginOutcome::Authenticated { .. }, None) => {}
        }
        Ok(outcome)
    }

    /// Second step of a multi-company login.
    pub async fn login_with_company(
        &self,
        request: LoginRequest,
        company_id: CompanyId,
    ) -> ApiResult<LoginOutcome> {
        self.login(&request.for_company(company_id)).await
    }

    /// Best-effort server logout; local tokens are always cleared.
    pub async fn logout(&self) -> ApiResult<()> {
        let tokens = self.client.tokens();
        if let Some(refresh_token) = tokens.refresh_token().await? {
            let call = ApiRequest::post("/auth/logout")
                .json(&json!({ "refreshToken": refresh_token }))?
                .anonymous();
            if let Err(e) = self.client.send::<serde_json::Value>(call).await {
                warn!(error = %e, "server logout failed; clearing local session anyway");
            }
        }
        tokens.clear().await?;
        info!("signed out");
        Ok(())
    }

    pub async fn join_waitlist(&self, request: &WaitlistRequest) -> ApiResult<Ack> {
        request.validate()?;
        let call = ApiRequest::post("/waitlist").json(request)?.anonymous();
        self.client.send(call).await
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<Ack> {
        let email = Email::parse(email)?;
        let call = ApiRequest::post("/auth/forgot-password")
            .json(&json!({ "email": email }))?
            .anonymous();
        self.client.send(call).await
    }

    /// Complete a reset with the token from the reset e-mail.
    pub async fn reset_password(&self, token: &str, password: &str) -> ApiResult<Ack> {
        let token = validation::required("token", token)?;
        let password = Password::parse(password)?;
        let call = ApiRequest::post("/auth/reset-password")
            .json(&json!({ "token": token, "password": password }))?
            .anonymous();
        self.client.send(call).await
    }
}

