//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Remote              │ │
//! │  │                 │  │  (abort cycle)  │  │   (row stays PENDING)   │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  RemoteRejected         │ │
//! │  │  MissingBusiness│  │  Timeout        │  │  UnexpectedResponse     │ │
//! │  │  InvalidUrl     │  │  Unauthorized   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │     Engine      │                              │
//! │  │                 │  │                 │                              │
//! │  │  DatabaseError  │  │  AlreadyRunning │                              │
//! │  │  Serialization  │  │  Internal       │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// No business id configured; the engine cannot scope the upload.
    #[error("Business ID not configured. Set [business] id or TALLY_BUSINESS_ID.")]
    MissingBusinessId,

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The remote store could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The remote refused our credentials. Every further call would fail too.
    #[error("Remote store rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote answered but refused one record.
    #[error("Remote rejected {table}/{id}: {message}")]
    RemoteRejected {
        table: String,
        id: String,
        message: String,
    },

    #[error("Unexpected response from remote store: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Another sync cycle is in flight.
    #[error("A sync cycle is already running")]
    AlreadyRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tally_db::DbError> for SyncError {
    fn from(err: tally_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt may succeed without any change on
    /// this device.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::RemoteRejected { .. }
                | SyncError::UnexpectedResponse(_)
                | SyncError::AlreadyRunning
        )
    }

    /// Returns true if the remote is unreachable (or refuses us entirely),
    /// so the rest of the cycle should be skipped.
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) | SyncError::Unauthorized(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingBusinessId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());
        assert!(SyncError::AlreadyRunning.is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingBusinessId.is_retryable());
        assert!(!SyncError::Unauthorized(401).is_retryable());
    }

    #[test]
    fn test_cycle_abort_categories() {
        assert!(SyncError::ConnectionFailed("dns".into()).aborts_cycle());
        assert!(SyncError::Unauthorized(403).aborts_cycle());

        let rejected = SyncError::RemoteRejected {
            table: "products".into(),
            id: "abc-123".into(),
            message: "validation failed".into(),
        };
        assert!(!rejected.aborts_cycle());
        assert!(rejected.to_string().contains("products/abc-123"));
    }
}
