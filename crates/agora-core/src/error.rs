use thiserror::Error;

use crate::remote::RemoteError;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the `Repository`.
///
/// Lower-level failures (HTTP, disk) are reclassified into these variants
/// before they reach callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Cannot write {0} while offline")]
    OfflineWriteRejected(&'static str),

    #[error("{entity} {id} is not available offline - can't load, try again")]
    DataUnavailableOffline { entity: &'static str, id: String },

    #[error("Invalid {entity}: {reason}")]
    InvalidEntity { entity: &'static str, reason: String },

    #[error("Event {0} is full")]
    EventFull(String),

    #[error("Local storage error: {0}")]
    LocalStore(String),
}

impl SyncError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unavailable_offline(entity: &'static str, id: impl Into<String>) -> Self {
        SyncError::DataUnavailableOffline {
            entity,
            id: id.into(),
        }
    }

    /// Reclassify a remote failure for an entity lookup.
    pub fn from_remote(entity: &'static str, id: &str, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(_) => SyncError::not_found(entity, id),
            other => SyncError::RemoteUnavailable(other.to_string()),
        }
    }

    /// True for failures the caller may retry once connectivity returns.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnavailable(_)
                | SyncError::OfflineWriteRejected(_)
                | SyncError::DataUnavailableOffline { .. }
        )
    }
}
