//! # Repository Module
//!
//! Ledger repositories. Each owns one or more tables and exposes atomic
//! domain operations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ledger Operations                                    │
//! │                                                                         │
//! │  Presentation layer                                                    │
//! │       │  db.sales().create_sale(input)                                 │
//! │       ▼                                                                 │
//! │  SaleRepository::create_sale                                           │
//! │       │  validate (tally-core) ── nothing written on failure           │
//! │       ▼                                                                 │
//! │  db.begin_exclusive()  ─────────────────────────────┐                  │
//! │       │  meta::next_receipt_no(conn)                 │ one unit,        │
//! │       │  INSERT transactions / transaction_items     │ all or nothing   │
//! │       │  product::apply_stock_delta(conn, ...)       │                  │
//! │       │  activity::append_in(conn, ...)              │                  │
//! │       ▼                                              │                  │
//! │  tx.commit() ◄───────────────────────────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Helpers that take a `&mut SqliteConnection` run inside the caller's unit;
//! repository methods that take `&self` open their own.
//!
//! ## Available Repositories
//!
//! - [`BusinessRepository`](business::BusinessRepository) - Shop profile and gateway credentials
//! - [`UserRepository`](user::UserRepository) - Staff and PIN verification
//! - [`SubscriptionRepository`](subscription::SubscriptionRepository) - Plan status
//! - [`ProductRepository`](product::ProductRepository) - Catalogue, search, stock adjustments
//! - [`CustomerRepository`](customer::CustomerRepository) - Customer records
//! - [`SaleRepository`](sale::SaleRepository) - Sale creation and transaction reads
//! - [`RefundRepository`](refund::RefundRepository) - Refunds of completed sales
//! - [`StockRepository`](stock::StockRepository) - Supplier deliveries
//! - [`ShiftRepository`](shift::ShiftRepository) - Cash shift lifecycle
//! - [`ActivityRepository`](activity::ActivityRepository) - Audit trail
//! - [`PaymentRepository`](payment::PaymentRepository) - Pending gateway payments
//! - [`ReportRepository`](report::ReportRepository) - Read-only aggregations
//! - [`SyncRepository`](sync::SyncRepository) - PENDING/SYNCED bookkeeping
//! - [`MetaRepository`](meta::MetaRepository) - Receipt counter and device metadata

pub mod activity;
pub mod business;
pub mod customer;
pub mod meta;
pub mod payment;
pub mod product;
pub mod refund;
pub mod report;
pub mod sale;
pub mod shift;
pub mod stock;
pub mod subscription;
pub mod sync;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;
