//! `zhex-auth` — session credentials and the login/refresh contract.
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines the
//! wire types of the auth endpoints and the [`TokenStore`] seam that the client
//! persists credentials through.

pub mod credentials;
pub mod login;
pub mod token_store;

pub use credentials::Credentials;
pub use login::{
    AuthenticatedUser, CompanyChoice, LoginOutcome, LoginRequest, LoginResponse, RefreshRequest,
    RefreshResponse, WaitlistRequest,
};
pub use token_store::{MemoryTokenStore, TokenStore, TokenStoreError};
