//! Wire models of the dashboard endpoints.
//!
//! These are fetch-and-display snapshots: the API owns every invariant, so the
//! models are lenient on input (unknown attributes are kept in `extra`, unknown
//! enum values map to `Unknown`) and only request payloads are validated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use zhex_core::validation::{self, Checks};
use zhex_core::{
    Amount, CompanyId, DomainError, DomainResult, Email, Password, ProductId, TransactionId,
    Validate, WithdrawalId,
};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Page selector sent as `page` / `limit` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// 1-based page; `per_page` is clamped to `1..=MAX_PER_PAGE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn to_query(self) -> Vec<(&'static str, String)> {
        vec![("page", self.page.to_string()), ("limit", self.per_page.to_string())]
    }
}

/// A page of results. Accepts both `items` and `data` as the list key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "data", default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(alias = "limit", default = "default_per_page")]
    pub per_page: u32,
}

fn first_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Amount,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

const PRODUCT_NAME_MAX: usize = 120;
const PRODUCT_DESCRIPTION_MAX: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Validate for NewProduct {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("name", validation::required("name", &self.name));
        checks.check("name", validation::max_len("name", &self.name, PRODUCT_NAME_MAX));
        if let Some(description) = &self.description {
            checks.check(
                "description",
                validation::max_len("description", description, PRODUCT_DESCRIPTION_MAX),
            );
        }
        if self.price.cents() <= 0 {
            checks.fail("price", "must be greater than zero");
        }
        checks.finish()
    }
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Validate for ProductUpdate {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        if let Some(name) = &self.name {
            checks.check("name", validation::required("name", name));
            checks.check("name", validation::max_len("name", name, PRODUCT_NAME_MAX));
        }
        if let Some(description) = &self.description {
            checks.check(
                "description",
                validation::max_len("description", description, PRODUCT_DESCRIPTION_MAX),
            );
        }
        if self.price.is_some_and(|p| p.cents() <= 0) {
            checks.fail("price", "must be greater than zero");
        }
        checks.finish()
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Refused,
    Refunded,
    Chargeback,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Refused => "refused",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Chargeback => "chargeback",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    Boleto,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Amount,
    #[serde(default)]
    pub net_amount: Option<Amount>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Filters of the transactions table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: PageRequest,
}

impl TransactionFilter {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = self.page.to_query();
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(from) = self.from {
            query.push(("startDate", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            query.push(("endDate", to.format("%Y-%m-%d").to_string()));
        }
        query
    }
}

impl Validate for TransactionFilter {
    fn validate(&self) -> DomainResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => {
                Err(DomainError::field("to", "must not be before the start date"))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub available: Amount,
    #[serde(default)]
    pub pending: Amount,
    #[serde(default)]
    pub reserved: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub amount: Amount,
    pub status: WithdrawalStatus,
    #[serde(alias = "createdAt")]
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_key: Option<String>,
}

impl WithdrawalRequest {
    /// Amount must be positive and covered by the available balance.
    pub fn check_against(&self, balance: &WalletBalance) -> DomainResult<()> {
        self.validate()?;
        if self.amount > balance.available {
            return Err(DomainError::field(
                "amount",
                format!("exceeds the available balance of {}", balance.available),
            ));
        }
        Ok(())
    }
}

impl Validate for WithdrawalRequest {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        checks.check("amount", Amount::positive(self.amount.cents()));
        if let Some(key) = &self.pix_key {
            checks.check("pixKey", validation::required("pixKey", key));
        }
        checks.finish()
    }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Look and behaviour of a product's hosted checkout page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default)]
    pub show_timer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_minutes: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

impl Validate for CheckoutCustomization {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        for (field, color) in [
            ("primaryColor", &self.primary_color),
            ("secondaryColor", &self.secondary_color),
        ] {
            if color.as_deref().is_some_and(|c| !is_hex_color(c)) {
                checks.fail(field, "must be a hex color such as #1A2B3C");
            }
        }
        if let Some(headline) = &self.headline {
            checks.check("headline", validation::max_len("headline", headline, 80));
        }
        if self.show_timer && !self.timer_minutes.is_some_and(|m| (1..=120).contains(&m)) {
            checks.fail("timerMinutes", "must be between 1 and 120 when the timer is shown");
        }
        checks.finish()
    }
}

// ---------------------------------------------------------------------------
// Profile & companies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> DomainResult<()> {
        let mut checks = Checks::new();
        if let Some(name) = &self.name {
            checks.check("name", validation::required("name", name));
            checks.check("name", validation::max_len("name", name, 120));
        }
        if let Some(phone) = &self.phone {
            checks.check("phone", validation::digits("phone", phone, 10, 13));
        }
        checks.finish()
    }
}

/// Body of `PUT /profile/password`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: Password,
}

impl ChangePasswordRequest {
    pub fn new(current: &str, new: &str) -> DomainResult<Self> {
        let mut checks = Checks::new();
        checks.check("currentPassword", validation::required("currentPassword", current));
        let new_password = checks.check("newPassword", Password::parse(new));
        if new_password.is_some() && current == new {
            checks.fail("newPassword", "must differ from the current password");
        }
        checks.finish()?;

        match new_password {
            Some(new_password) => Ok(Self {
                current_password: current.to_string(),
                new_password,
            }),
            None => Err(DomainError::field("newPassword", "is invalid")),
        }
    }
}

/// Body of `PUT /profile/email`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEmailRequest {
    pub email: Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_accepts_data_and_limit_aliases() {
        let page: Page<Company> = serde_json::from_value(json!({
            "data": [{ "id": 1, "name": "Acme" }],
            "total": 41,
            "page": 2,
            "limit": 20
        }))
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
    }

    #[test]
    fn unknown_status_does_not_break_decoding() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": "tx_1",
            "amount": 1990,
            "status": "in_dispute",
            "paymentMethod": "pix",
            "createdAt": "2024-05-01T12:00:00Z",
            "installments": 1
        }))
        .unwrap();

        assert_eq!(tx.status, TransactionStatus::Unknown);
        assert_eq!(tx.payment_method, Some(PaymentMethod::Pix));
        assert_eq!(tx.extra["installments"], 1);
    }

    #[test]
    fn transaction_filter_query() {
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Paid),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 31),
            page: PageRequest::new(3, 500),
        };
        assert!(filter.validate().is_ok());
        assert_eq!(
            filter.to_query(),
            vec![
                ("page", "3".to_string()),
                ("limit", "100".to_string()),
                ("status", "paid".to_string()),
                ("startDate", "2024-01-01".to_string()),
                ("endDate", "2024-01-31".to_string()),
            ]
        );

        let reversed = TransactionFilter {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..TransactionFilter::default()
        };
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn withdrawal_must_fit_available_balance() {
        let balance = WalletBalance {
            available: Amount::from_cents(10_000),
            ..WalletBalance::default()
        };
        let ok = WithdrawalRequest {
            amount: Amount::from_cents(10_000),
            pix_key: None,
        };
        assert!(ok.check_against(&balance).is_ok());

        let too_much = WithdrawalRequest {
            amount: Amount::from_cents(10_001),
            pix_key: None,
        };
        let err = too_much.check_against(&balance).unwrap_err();
        assert!(err.field_errors().unwrap().get("amount").is_some());

        let zero = WithdrawalRequest {
            amount: Amount::ZERO,
            pix_key: None,
        };
        assert!(zero.check_against(&balance).is_err());
    }

    #[test]
    fn new_product_rules() {
        let bad = NewProduct {
            name: "".into(),
            description: None,
            price: Amount::ZERO,
            image_url: None,
        };
        let err = bad.validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.get("name").is_some());
        assert!(fields.get("price").is_some());
    }

    #[test]
    fn product_update_sends_only_set_fields() {
        let update = ProductUpdate {
            active: Some(false),
            ..ProductUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "active": false }));
    }

    #[test]
    fn checkout_colors_and_timer() {
        let mut custom = CheckoutCustomization {
            primary_color: Some("#1a2b3c".into()),
            show_timer: true,
            timer_minutes: Some(15),
            ..CheckoutCustomization::default()
        };
        assert!(custom.validate().is_ok());

        custom.primary_color = Some("blue".into());
        custom.timer_minutes = None;
        let err = custom.validate().unwrap_err();
        assert_eq!(err.field_errors().unwrap().len(), 2);
    }

    #[test]
    fn change_password_rejects_same_password() {
        assert!(ChangePasswordRequest::new("secret1", "secret2").is_ok());
        let err = ChangePasswordRequest::new("secret1", "secret1").unwrap_err();
        assert!(err.field_errors().unwrap().get("newPassword").is_some());
        assert!(ChangePasswordRequest::new("", "abc").is_err());
    }
}
