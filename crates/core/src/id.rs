//! Strongly-typed identifiers used across the client.
//!
//! The API owns every identifier; the client never mints one. Identifiers are
//! kept opaque and accept either JSON strings or integers on the wire.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

/// Identifier of a merchant company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CompanyId(String);

/// Identifier of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of a payment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

/// Identifier of a wallet withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WithdrawalId(String);

/// Identifier of a company representative created during onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RepresentativeId(String);

/// Identifier of an uploaded onboarding document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

/// Continuation token of a partially completed onboarding record.
///
/// Issued by the API; the client only stores and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OnboardingToken(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

macro_rules! impl_opaque_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a server-issued value. Fails on empty/blank input.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(format!("{} must not be empty", $name)));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = match RawId::deserialize(deserializer)? {
                    RawId::Text(s) => s,
                    RawId::Int(n) => n.to_string(),
                };
                Self::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_opaque_id!(CompanyId, "CompanyId");
impl_opaque_id!(ProductId, "ProductId");
impl_opaque_id!(TransactionId, "TransactionId");
impl_opaque_id!(WithdrawalId, "WithdrawalId");
impl_opaque_id!(RepresentativeId, "RepresentativeId");
impl_opaque_id!(DocumentId, "DocumentId");
impl_opaque_id!(OnboardingToken, "OnboardingToken");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_and_string_ids() {
        let a: ProductId = serde_json::from_str("42").unwrap();
        let b: ProductId = serde_json::from_str(r#""42""#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn rejects_blank_tokens() {
        assert!(OnboardingToken::new("   ").is_err());
        assert!(serde_json::from_str::<OnboardingToken>(r#""""#).is_err());
    }

    #[test]
    fn serializes_transparently() {
        let id = CompanyId::new("c-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""c-1""#);
    }
}
