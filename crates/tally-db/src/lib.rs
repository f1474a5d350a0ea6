//! # tally-db: Ledger Storage for Tally POS
//!
//! The local ledger: sales, refunds, stock movements, cash shifts and the
//! audit trail, kept consistent with no network at all. SQLite via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  Presentation layer (create sale, close shift, ...)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RefundRepo    │    │ 001_initial_ │  │   │
//! │  │   │ write lock    │    │ ShiftRepo     │    │   schema.sql │  │   │
//! │  │   │ ExclusiveTx   │    │ SyncRepo ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                              ▲                                  │
//! │       ▼                              │ PENDING rows                     │
//! │  ┌──────────────────┐         ┌──────┴───────┐                         │
//! │  │  SQLite (WAL)    │         │  tally-sync  │                         │
//! │  │  tally.db        │         │  tally-pay   │                         │
//! │  └──────────────────┘         └──────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and the exclusive write unit
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledger repositories (sale, refund, shift, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let sale = db.sales().create_sale(input).await?;
//! println!("Receipt #{}", sale.transaction.receipt_no);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, ExclusiveTx};

// Repository re-exports for convenience
pub use repository::activity::ActivityRepository;
pub use repository::business::{BusinessProfile, BusinessRepository, GatewayCredentials};
pub use repository::customer::{CustomerDetails, CustomerRepository};
pub use repository::meta::MetaRepository;
pub use repository::payment::{NewPendingPayment, PaymentRepository};
pub use repository::product::{NewProduct, ProductRepository, ProductUpdate};
pub use repository::refund::RefundRepository;
pub use repository::report::{DailySales, DashboardStats, ReportRepository, TopProduct};
pub use repository::sale::SaleRepository;
pub use repository::shift::ShiftRepository;
pub use repository::stock::StockRepository;
pub use repository::subscription::SubscriptionRepository;
pub use repository::sync::{PendingCount, SyncRepository};
pub use repository::user::{NewUser, UserRepository};
