//! # Domain Types
//!
//! Ledger records shared by the store, the sync engine and the payment
//! adapter.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Records                                  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Business     │   │   Transaction   │   │   CashShift     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tax_rate_bps   │──►│  receipt_no     │   │  opening_float  │       │
//! │  │  currency       │   │  total_cents    │   │  expected/actual│       │
//! │  └─────────────────┘   │  is_refund      │   │  variance       │       │
//! │          │             └────────┬────────┘   └─────────────────┘       │
//! │          ▼                      ▼ 1..n                                  │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│ TransactionItem │   │  StockReceipt   │       │
//! │  │  stock          │   │  name snapshot  │   │  ──► items 1..n │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Every synchronizable record carries:                                   │
//! │    sync_status (PENDING | SYNCED) • remote_id • deleted • updated_at    │
//! │                                                                         │
//! │  Local-only: PendingPayment, AppMeta                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timestamps
//! All `*_at` fields are milliseconds since the Unix epoch, produced by
//! [`crate::clock::now_millis`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, TaxRate};

// =============================================================================
// Sync Status
// =============================================================================

/// Per-row flag of remote acknowledgement.
///
/// Any local write to a business field resets the row to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
}

/// Implemented by every record the sync engine uploads.
pub trait Syncable {
    /// Stable record id; the remote store upserts by it.
    fn id(&self) -> &str;

    /// Last local write; used to detect writes racing an upload.
    fn updated_at(&self) -> i64;
}

macro_rules! impl_syncable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Syncable for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn updated_at(&self) -> i64 {
                    self.updated_at
                }
            }
        )*
    };
}

// =============================================================================
// Sync Tables
// =============================================================================

/// Every table the sync engine uploads, in upload order.
///
/// ## Upload Order
/// ```text
/// businesses → users → products → customers → subscriptions
///     → transactions (+ transaction_items)
///     → cash_shifts → activity_logs
///     → stock_receipts (+ stock_receipt_items)
/// ```
/// Tombstones go in the reverse order so children are deleted before
/// their parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    Businesses,
    Users,
    Products,
    Customers,
    Subscriptions,
    Transactions,
    TransactionItems,
    CashShifts,
    ActivityLogs,
    StockReceipts,
    StockReceiptItems,
}

impl SyncTable {
    /// All tables in dependency order (parents before children).
    pub const UPLOAD_ORDER: [SyncTable; 11] = [
        SyncTable::Businesses,
        SyncTable::Users,
        SyncTable::Products,
        SyncTable::Customers,
        SyncTable::Subscriptions,
        SyncTable::Transactions,
        SyncTable::TransactionItems,
        SyncTable::CashShifts,
        SyncTable::ActivityLogs,
        SyncTable::StockReceipts,
        SyncTable::StockReceiptItems,
    ];

    /// Local table name (also the remote collection name).
    pub const fn table_name(&self) -> &'static str {
        match self {
            SyncTable::Businesses => "businesses",
            SyncTable::Users => "users",
            SyncTable::Products => "products",
            SyncTable::Customers => "customers",
            SyncTable::Subscriptions => "subscriptions",
            SyncTable::Transactions => "transactions",
            SyncTable::TransactionItems => "transaction_items",
            SyncTable::CashShifts => "cash_shifts",
            SyncTable::ActivityLogs => "activity_logs",
            SyncTable::StockReceipts => "stock_receipts",
            SyncTable::StockReceiptItems => "stock_receipt_items",
        }
    }

    /// For child tables: the parent table and the foreign-key column.
    pub const fn parent(&self) -> Option<(SyncTable, &'static str)> {
        match self {
            SyncTable::TransactionItems => Some((SyncTable::Transactions, "transaction_id")),
            SyncTable::StockReceiptItems => Some((SyncTable::StockReceipts, "receipt_id")),
            _ => None,
        }
    }

    /// For parent tables: the child table uploaded together with it.
    pub const fn child(&self) -> Option<SyncTable> {
        match self {
            SyncTable::Transactions => Some(SyncTable::TransactionItems),
            SyncTable::StockReceipts => Some(SyncTable::StockReceiptItems),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

// =============================================================================
// Business
// =============================================================================

/// The shop this device belongs to.
///
/// The Paynow integration key lives in the same table but is never loaded
/// into this struct; see the business repository's credential accessors.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Business {
    pub id: String,
    pub name: String,
    /// ISO 4217 code, e.g. "USD".
    pub currency: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Tax included in shelf prices, in basis points.
    pub tax_rate_bps: u32,
    pub paynow_integration_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl Business {
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Owner,
    Manager,
    Cashier,
}

impl UserRole {
    /// Owners and managers may approve refunds.
    pub const fn can_approve(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Manager)
    }
}

/// A staff member who signs in at the till with a PIN.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub pin_hash: String,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

// =============================================================================
// Subscription
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Subscription {
    pub id: String,
    pub business_id: String,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub starts_at: i64,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl Subscription {
    /// Whether the subscription grants access at `now`.
    pub fn is_current(&self, now: i64) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        ) && self.expires_at.map_or(true, |expires| expires > now)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub business_id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub category: Option<String>,

    /// Stock Keeping Unit - business identifier.
    pub sku: Option<String>,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Selling price in cents (tax inclusive).
    pub price_cents: i64,

    /// Cost in cents (for margin reports).
    pub cost_cents: i64,

    /// Units on hand.
    pub stock: i64,

    /// At or below this level the product shows in the low-stock list.
    pub low_stock_threshold: i64,

    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash; the only method that produces change.
    Cash,
    /// Card on an external terminal.
    Card,
    /// EcoCash, OneMoney and similar wallets.
    MobileMoney,
    /// Paid through a payment gateway.
    Online,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::MobileMoney => "MOBILE_MONEY",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A sale or a refund. Immutable after creation except sync bookkeeping.
///
/// Refunds carry negated amounts and point at the original sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub business_id: String,
    /// Per-device receipt sequence.
    pub receipt_no: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// Tax contained in `total_cents`.
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_tendered_cents: i64,
    pub change_due_cents: i64,
    pub customer_id: Option<String>,
    pub cashier_id: String,
    pub is_refund: bool,
    pub original_transaction_id: Option<String>,
    /// Manager who approved a refund.
    pub approved_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl Transaction {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line on a transaction. Never updated after creation.
///
/// Uses the snapshot pattern: name and unit price are frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub unit_price_cents: i64,
    /// Negative on refund lines.
    pub quantity: i64,
    pub line_total_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

/// A transaction together with its lines, as returned by sale and refund
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionWithItems {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
}

// =============================================================================
// Cash Shift
// =============================================================================

/// A till session from opening float to cash count.
///
/// ## Lifecycle
/// ```text
/// CLOSED ──open_shift(float)──► OPEN ──close_shift(actual)──► CLOSED
///                                          │
///                     expected = float + Σ cash totals since opened_at
///                     variance = actual − expected
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashShift {
    pub id: String,
    pub business_id: String,
    pub opened_by: String,
    pub closed_by: Option<String>,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    pub opening_float_cents: i64,
    pub expected_cash_cents: Option<i64>,
    pub actual_cash_cents: Option<i64>,
    pub variance_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl CashShift {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

// =============================================================================
// Stock Receiving
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockReceipt {
    pub id: String,
    pub business_id: String,
    pub supplier: String,
    pub received_by: String,
    pub received_at: i64,
    pub total_cost_cents: i64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockReceiptItem {
    pub id: String,
    pub receipt_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_cost_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReceiptWithItems {
    pub receipt: StockReceipt,
    pub items: Vec<StockReceiptItem>,
}

// =============================================================================
// Activity Log
// =============================================================================

/// Append-only audit entry.
///
/// `entry_type` groups entries ("SALE", "REFUND", "STOCK", "SHIFT", ...);
/// `details` holds a JSON document describing the change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ActivityLog {
    pub id: String,
    pub business_id: String,
    pub entry_type: String,
    pub action: String,
    /// JSON text.
    pub details: String,
    pub user_id: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<String>,
    pub deleted: bool,
}

impl ActivityLog {
    /// Parses `details` back into JSON. Returns `Null` for corrupt text.
    pub fn details_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.details).unwrap_or(serde_json::Value::Null)
    }
}

impl_syncable!(
    Business,
    User,
    Subscription,
    Product,
    Customer,
    Transaction,
    TransactionItem,
    CashShift,
    StockReceipt,
    StockReceiptItem,
    ActivityLog,
);

// =============================================================================
// Pending Payment (local only)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gateway {
    Paynow,
    Pesepay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// COMPLETED and FAILED never change again.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// An outbound gateway payment awaiting its callback.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PendingPayment {
    pub id: String,
    pub business_id: String,
    pub gateway: Gateway,
    /// Client idempotency key echoed back by the gateway.
    pub reference: String,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// Gateway-side reference (`paynowreference`).
    pub external_id: Option<String>,
    pub poll_url: Option<String>,
    pub browser_url: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

// =============================================================================
// App Meta (local only)
// =============================================================================

/// The single `app_meta` row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AppMeta {
    pub receipt_counter: i64,
    pub device_id: Option<String>,
    pub last_sync_at: Option<i64>,
}

// =============================================================================
// Operation Inputs
// =============================================================================

/// One line of a sale as keyed at the till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    /// Price charged per unit (may differ from the catalogue price).
    pub unit_price_cents: i64,
    pub quantity: i64,
}

/// Input to `SaleRepository::create_sale`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSaleInput {
    pub business_id: String,
    pub lines: Vec<SaleLine>,
    #[serde(default)]
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount_tendered_cents: i64,
    pub cashier_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Tax included in prices; defaults to zero.
    #[serde(default)]
    pub tax_rate_bps: u32,
    /// Reject the sale when a product has less stock than requested.
    #[serde(default)]
    pub enforce_stock: bool,
}

/// Input to `RefundRepository::create_refund`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateRefundInput {
    pub original_transaction_id: String,
    pub cashier_id: String,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

/// Input to `StockRepository::receive_stock`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiveStockInput {
    pub business_id: String,
    pub supplier: String,
    pub lines: Vec<StockLine>,
    pub received_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
