//! Error taxonomy for sync runs.

use thiserror::Error;

/// Errors surfaced by the API clients and the sync pass.
///
/// Everything except `DataIntegrity` aborts the current run; the next
/// scheduled invocation retries the whole pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The service rejected our credentials (401/403).
    #[error("{service} rejected credentials: {message}")]
    Authentication {
        service: &'static str,
        message: String,
    },

    /// A referenced task or card no longer exists upstream.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Transport-level failure (DNS, connect, timeout, TLS).
    #[error("network error talking to {service}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A card sits in the Done area but the cache has no task linked to
    /// it. Logged and skipped by the sync pass, never fatal.
    #[error("card {card_id} in done area has no linked task")]
    DataIntegrity { card_id: String },

    /// Any other non-success response from a service.
    #[error("{service} returned status {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Missing or invalid configuration, reported before any work starts.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.into(),
        }
    }

    pub fn card_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "card",
            id: id.into(),
        }
    }

    pub fn missing_env(var: &str) -> Self {
        Self::Config(format!("{} is not set", var))
    }

    /// Wrap a reqwest transport error for `service`.
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        Self::Network { service, source }
    }

    /// Classify a non-success HTTP status for `service`.
    ///
    /// 401/403 become `Authentication`; everything else is a generic API
    /// error. 404 is context-dependent, so the adapters map it themselves
    /// before calling this.
    pub fn status(service: &'static str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication {
                service,
                message: body,
            },
            _ => Self::Api {
                service,
                status,
                body,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for client and sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
