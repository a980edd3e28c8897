//! Value objects: validated input values, compared by value.
//!
//! Each constructor enforces the same shape rules the dashboard forms check
//! before anything is sent to the API.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Minimum password length accepted by the login and profile forms.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum length of an e-mail address.
pub const MAX_EMAIL_LEN: usize = 254;

/// A syntactically valid e-mail address (lower-cased, trimmed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim().to_lowercase();
        if value.is_empty() {
            return Err(DomainError::field("email", "is required"));
        }
        if value.len() > MAX_EMAIL_LEN {
            return Err(DomainError::field("email", "is too long"));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::field("email", "must be a valid e-mail address"));
        };
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..");
        if local.is_empty() || !domain_ok || value.contains(char::is_whitespace) || domain.contains('@') {
            return Err(DomainError::field("email", "must be a valid e-mail address"));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl ValueObject for Email {}

/// A password that satisfies the length rule.
///
/// `Debug` is redacted so passwords never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Err(DomainError::field("password", "is required"));
        }
        if raw.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::field(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl ValueObject for Password {}

/// A monetary amount in minor units (cents).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// A strictly positive amount, as required for prices and withdrawals.
    pub fn positive(cents: i64) -> DomainResult<Self> {
        if cents <= 0 {
            return Err(DomainError::field("amount", "must be greater than zero"));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl ValueObject for Amount {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn email_is_normalized() {
        let email = Email::parse("  A@B.com ").unwrap();
        assert_eq!(email.as_str(), "a@b.com");
    }

    #[test]
    fn email_rejects_malformed_input() {
        for raw in ["", "plain", "@b.com", "a@b", "a@.com", "a@b..com", "a b@c.com", "a@b@c.com"] {
            assert!(Email::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn password_length_rule() {
        assert!(Password::parse("secret1").is_ok());
        let err = Password::parse("abc").unwrap_err();
        assert_eq!(
            err.field_errors().and_then(|f| f.get("password")),
            Some("must be at least 6 characters")
        );
    }

    #[test]
    fn password_debug_is_redacted() {
        let password = Password::parse("secret1").unwrap();
        assert_eq!(format!("{password:?}"), "Password(***)");
    }

    #[test]
    fn amount_display() {
        assert_eq!(Amount::from_cents(12345).to_string(), "123.45");
        assert_eq!(Amount::from_cents(-5).to_string(), "-0.05");
    }

    proptest! {
        #[test]
        fn positive_amount_accepts_exactly_positive_values(cents in any::<i64>()) {
            prop_assert_eq!(Amount::positive(cents).is_ok(), cents > 0);
        }

        #[test]
        fn parsed_email_roundtrips_through_parse(local in "[a-z0-9]{1,12}", domain in "[a-z]{1,10}", tld in "[a-z]{2,4}") {
            let raw = format!("{local}@{domain}.{tld}");
            let email = Email::parse(&raw).unwrap();
            prop_assert_eq!(Email::parse(email.as_str()).unwrap(), email);
        }
    }
}
