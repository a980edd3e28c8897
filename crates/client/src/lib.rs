//! `zhex-client` — client SDK of the Zhex merchant dashboard.
//!
//! **Responsibility:** everything the dashboard does besides rendering:
//! - session credentials, persisted locally
//! - a single HTTP gateway with the token-refresh protocol
//! - typed services for the dashboard areas
//! - the resumable onboarding wizard
//! - the realtime channel with bounded reconnects
//!
//! The API remains the authority for every business rule; this crate only
//! validates input shape and forwards requests.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod onboarding;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod types;

pub use config::{ClientConfig, ConfigError, RealtimeConfig};
pub use dashboard::{Dashboard, DashboardError};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use gateway::{ApiClient, ApiRequest, Upload};
pub use onboarding::{OnboardingError, OnboardingSession, OnboardingStep};
pub use realtime::{ChannelEvent, ChannelManager, ConnectionState, RealtimeError, ServerEvent};
pub use storage::{LocalStore, PersistedState, PersistentTokenStore, StorageError};
