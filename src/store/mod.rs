//! Remote session store.
//!
//! The tracker persists and reads sessions through [`SessionStore`]. The
//! production implementation talks to the care backend over HTTP; the
//! in-memory one backs tests and offline demos.

pub mod http;
pub mod memory;

use crate::core::session::{PersistedSession, WeeklyChart};
use async_trait::async_trait;

pub use http::{ApiConfig, HttpSessionStore};
pub use memory::InMemorySessionStore;

/// Fallback message when a failed response carries no `error` field.
pub const GENERIC_ERROR_MESSAGE: &str = "Request failed";

/// Operations the tracker needs from the backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Sessions created within the last `days` days.
    async fn list_sessions(&self, days: u32) -> Result<Vec<PersistedSession>, StoreError>;

    /// Persist a session and return the stored record.
    async fn create_session(&self, count: u32, notes: &str)
        -> Result<PersistedSession, StoreError>;

    /// Per-day kick totals for the last `days` days.
    async fn weekly_chart(&self, days: u32) -> Result<WeeklyChart, StoreError>;
}

/// Store error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No bearer credential available; nothing was sent
    CredentialMissing,
    /// Client setup error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::CredentialMissing => write!(f, "Not signed in: no access token available"),
            StoreError::Config(msg) => write!(f, "Store config error: {msg}"),
            StoreError::Network(msg) => write!(f, "Network error: {msg}"),
            StoreError::Server { status, message } => {
                write!(f, "Server error ({status}): {message}")
            }
            StoreError::Serialization(msg) => write!(f, "Unexpected response: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
