//! Typed wrappers over the gateway, one per dashboard area.
//!
//! Each service validates request payloads locally, so malformed input never
//! reaches the network, and otherwise forwards to the API.

pub mod auth;
pub mod checkout;
pub mod companies;
pub mod products;
pub mod profile;
pub mod transactions;
pub mod wallet;

pub use auth::AuthService;
pub use checkout::CheckoutService;
pub use companies::CompanyService;
pub use products::ProductService;
pub use profile::ProfileService;
pub use transactions::TransactionService;
pub use wallet::WalletService;
