//! # tally-core: Pure Domain Logic for Tally POS
//!
//! Everything the ledger, the sync engine and the payment adapter agree on:
//! record types, money arithmetic, validation rules and the id/clock
//! utilities every row is stamped with.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  Presentation layer (out of scope)                                      │
//! │    create sale • refund • receive stock • shifts • run sync             │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   clock   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  new_id   │  │   rules   │  │   │
//! │  │   │Transaction│  │  TaxRate  │  │ now_millis│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │            tally-db (ledger) ──┴── tally-sync / tally-pay              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger records (Product, Transaction, CashShift, ...)
//! - [`money`] - Integer minor-unit money and tax rates
//! - [`totals`] - Sale totals computed before the ledger is touched
//! - [`clock`] - Identifier generation and the monotonic millisecond clock
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Money, TaxRate};
//!
//! let total = Money::from_cents(1150);
//! // 15% VAT already contained in the shelf price
//! let vat = total.included_tax(TaxRate::from_bps(1500));
//! assert_eq!(vat.cents(), 150);
//! assert_eq!(total.to_decimal_string(), "11.50");
//! ```

pub mod clock;
pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use totals::SaleTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines on a single sale or stock receipt.
pub const MAX_LINES: usize = 200;

/// Maximum quantity on a single line.
///
/// Guards against keying 1000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum unit price or unit cost, in cents.
///
/// With [`MAX_LINES`] and [`MAX_ITEM_QUANTITY`] this keeps every line and
/// document total well inside `i64`.
pub const MAX_UNIT_AMOUNT_CENTS: i64 = 10_000_000_000;
