//! Wire types of the auth endpoints (`/auth/login`, `/auth/refresh`, `/waitlist`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use zhex_core::validation::{self, Checks};
use zhex_core::{CompanyId, DomainError, DomainResult, Email, FieldErrors, Password, Validate};

use crate::Credentials;

/// Body of `POST /auth/login`.
///
/// Built through [`LoginRequest::new`], so an instance always holds a
/// well-formed e-mail and a password that satisfies the length rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    email: Email,
    password: Password,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<CompanyId>,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> DomainResult<Self> {
        let mut errors = FieldErrors::new();
        let email = errors.check("email", Email::parse(email));
        let password = errors.check("password", Password::parse(password));

        match (email, password) {
            (Some(email), Some(password)) => Ok(Self {
                email,
                password,
                company_id: None,
            }),
            _ => Err(DomainError::Validation(errors)),
        }
    }

    /// Same credentials, scoped to one of the companies offered by a
    /// multi-company login response.
    pub fn for_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn company_id(&self) -> Option<&CompanyId> {
        self.company_id.as_ref()
    }
}

/// The authenticated user as returned by the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Remaining user attributes, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the multi-company disambiguation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyChoice {
    pub id: CompanyId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw body of `POST /auth/login`.
///
/// `success` is loosely typed on the wire: `true`/`1` means authenticated,
/// `2` means the user must pick a company, anything else is a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub success: Value,
    #[serde(default)]
    pub user: Option<AuthenticatedUser>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub companies: Vec<CompanyChoice>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What a login attempt resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated { user: AuthenticatedUser },
    CompanySelection { companies: Vec<CompanyChoice> },
    Rejected { message: String },
}

const DEFAULT_REJECTION: &str = "Invalid e-mail or password";

impl LoginResponse {
    /// Interpret the response. Credentials are returned only for an
    /// authenticated outcome that actually carries both tokens.
    pub fn into_outcome(self) -> (LoginOutcome, Option<Credentials>) {
        let code = match &self.success {
            Value::Bool(true) => 1,
            Value::Number(n) => n.as_i64().unwrap_or(0),
            _ => 0,
        };

        match code {
            2 => (
                LoginOutcome::CompanySelection {
                    companies: self.companies,
                },
                None,
            ),
            1 => match (self.access_token, self.refresh_token) {
                (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => (
                    LoginOutcome::Authenticated {
                        user: self.user.unwrap_or_default(),
                    },
                    Some(Credentials::new(access, refresh)),
                ),
                _ => (
                    LoginOutcome::Rejected {
                        message: "login response did not include session tokens".to_string(),
                    },
                    None,
                ),
            },
            _ => (
                LoginOutcome::Rejected {
                    message: self.message.unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
                },
                None,
            ),
        }
    }
}

/// Body of `POST /auth/refresh`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body returned by `POST /auth/refresh`.
///
/// Some deployments rotate the refresh token as well; when present it replaces
/// the stored one.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body of `POST /waitlist`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl Validate for WaitlistRequest {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("name", validation::required("name", &self.name));
        checks.check("name", validation::max_len("name", &self.name, 120));
        checks.check("email", Email::parse(&self.email));
        if let Some(phone) = &self.phone {
            checks.check("phone", validation::digits("phone", phone, 10, 13));
        }
        checks.finish()
    }
}
