//! # Payment Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Payment Error Categories                           │
//! │                                                                         │
//! │  Setup            Gateway              Callback          Local          │
//! │  ─────            ───────              ────────          ─────          │
//! │  NotConfigured    GatewayRejected      InvalidHash       Database       │
//! │  Validation       Transport            UnknownReference                 │
//! │                   MalformedResponse                                     │
//! │                   GatewayUnavailable                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::{Gateway, ValidationError};
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Credentials or URLs missing for this business.
    #[error("Payments not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid payment request: {0}")]
    Validation(#[from] ValidationError),

    /// The gateway answered with a non-ok status.
    #[error("Gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// A response or callback hash did not match.
    #[error("Hash verification failed")]
    InvalidHash,

    /// A callback named a reference this device never created.
    #[error("Unknown payment reference: {0}")]
    UnknownReference(String),

    #[error("Gateway unreachable: {0}")]
    Transport(String),

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    /// The gateway is known but not integrated yet.
    #[error("{0:?} payments are not available")]
    GatewayUnavailable(Gateway),

    #[error("Database error: {0}")]
    Database(#[from] tally_db::DbError),
}

impl PaymentError {
    /// Returns true if the same call may succeed later.
    ///
    /// A callback can race the insert of its pending payment, so an unknown
    /// reference is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Transport(_) | PaymentError::UnknownReference(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(PaymentError::Transport("timeout".into()).is_retryable());
        assert!(PaymentError::UnknownReference("R1".into()).is_retryable());
        assert!(!PaymentError::InvalidHash.is_retryable());
        assert!(!PaymentError::GatewayUnavailable(Gateway::Pesepay).is_retryable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            PaymentError::GatewayUnavailable(Gateway::Pesepay).to_string(),
            "Pesepay payments are not available"
        );
        let err: PaymentError = ValidationError::required("reference").into();
        assert!(err.to_string().contains("reference is required"));
    }
}
