//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core (this file)                                                │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tally-db            DbError      (wraps CoreError as DbError::Domain) │
//! │  tally-sync          SyncError                                         │
//! │  tally-pay           PaymentError                                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is raised BEFORE any row is written, or inside an
//! exclusive transaction that is then rolled back. The ledger is never left
//! half-written by one of these.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Selling more than is on hand (only raised when the caller opts into
    /// the stock check, or by manual adjustments).
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// The transaction being refunded is itself a refund.
    ///
    /// ## User Workflow
    /// ```text
    /// Receipt #41 (sale) ──refund──► Receipt #42 (refund)
    ///                                     │
    ///                          refund #42 again? ──► RefundOfRefund
    /// ```
    #[error("Transaction {0} is a refund and cannot be refunded")]
    RefundOfRefund(String),

    /// The original sale has already been refunded.
    #[error("Transaction {original} was already refunded by {refund}")]
    AlreadyRefunded { original: String, refund: String },

    /// The original transaction has no lines to reverse.
    #[error("Transaction {0} has no items to refund")]
    NothingToRefund(String),

    /// A shift is already open on this device.
    #[error("Shift {0} is already open")]
    ShiftAlreadyOpen(String),

    /// The shift does not exist or has already been closed.
    #[error("Shift {0} is not open")]
    ShiftNotOpen(String),

    /// Cash tendered does not cover the total.
    #[error("Tendered {tendered} does not cover total {total}")]
    InsufficientTender { tendered: i64, total: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any storage work begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, non-digit PIN).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A list that must contain entries is empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Mazoe Orange 2L".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Mazoe Orange 2L: available 3, requested 5"
        );

        let err = CoreError::RefundOfRefund("tx-42".to_string());
        assert_eq!(
            err.to_string(),
            "Transaction tx-42 is a refund and cannot be refunded"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("supplier").to_string(), "supplier is required");

        let err = ValidationError::Empty {
            field: "lines".to_string(),
        };
        assert_eq!(err.to_string(), "lines must contain at least one entry");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("cashier_id").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
