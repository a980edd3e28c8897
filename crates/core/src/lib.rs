//! `zhex-core` — shared building blocks for the Zhex dashboard client.
//!
//! This crate contains **pure** primitives (no IO): typed identifiers, the
//! domain error model and client-side validation of user input.

pub mod error;
pub mod id;
pub mod validation;
pub mod value_object;

pub use error::{DomainError, DomainResult, FieldErrors};
pub use id::{CompanyId, DocumentId, OnboardingToken, ProductId, RepresentativeId, TransactionId, WithdrawalId};
pub use validation::{Checks, Validate};
pub use value_object::{Amount, Email, Password, ValueObject};
