//! # Remote Record Shapes
//!
//! What each ledger row looks like to the remote store. Field names are
//! camelCase and absent optionals are left out rather than sent as null.
//!
//! Local bookkeeping (`sync_status`, `remote_id`) never leaves the device,
//! and neither do secrets: users go up without their PIN hash and
//! businesses without their gateway key (the key is not even loaded into
//! [`Business`]).

use serde::Serialize;
use serde_json::Value;
use tally_core::{
    ActivityLog, Business, CashShift, Customer, PaymentMethod, Product, StockReceipt,
    StockReceiptItem, Subscription, SubscriptionStatus, SyncTable, Syncable, Transaction,
    TransactionItem, User, UserRole,
};

/// A ledger record the engine can upload.
pub trait ToRemote: Syncable {
    /// Table the record lives in locally.
    const TABLE: SyncTable;

    /// JSON payload for the remote upsert.
    fn to_remote(&self) -> serde_json::Result<Value>;
}

/// A record uploaded together with its parent.
pub trait ChildRecord: ToRemote {
    fn parent_id(&self) -> &str;
}

macro_rules! to_remote {
    ($record:ty, $table:expr, $dto:ident) => {
        impl ToRemote for $record {
            const TABLE: SyncTable = $table;

            fn to_remote(&self) -> serde_json::Result<Value> {
                serde_json::to_value($dto::from(self))
            }
        }
    };
}

// =============================================================================
// Reference data
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessDto<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub tax_rate_bps: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a Business> for BusinessDto<'a> {
    fn from(b: &'a Business) -> Self {
        BusinessDto {
            id: &b.id,
            name: &b.name,
            currency: &b.currency,
            address: b.address.as_deref(),
            phone: b.phone.as_deref(),
            email: b.email.as_deref(),
            tax_rate_bps: b.tax_rate_bps,
            created_at: b.created_at,
            updated_at: b.updated_at,
            deleted: b.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub role: UserRole,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a User> for UserDto<'a> {
    fn from(u: &'a User) -> Self {
        UserDto {
            id: &u.id,
            business_id: &u.business_id,
            name: &u.name,
            email: u.email.as_deref(),
            role: u.role,
            active: u.active,
            created_at: u.created_at,
            updated_at: u.updated_at,
            deleted: u.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub plan: &'a str,
    pub status: SubscriptionStatus,
    pub starts_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a Subscription> for SubscriptionDto<'a> {
    fn from(s: &'a Subscription) -> Self {
        SubscriptionDto {
            id: &s.id,
            business_id: &s.business_id,
            plan: &s.plan,
            status: s.status,
            starts_at: s.starts_at,
            expires_at: s.expires_at,
            created_at: s.created_at,
            updated_at: s.updated_at,
            deleted: s.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<&'a str>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a Product> for ProductDto<'a> {
    fn from(p: &'a Product) -> Self {
        ProductDto {
            id: &p.id,
            business_id: &p.business_id,
            name: &p.name,
            category: p.category.as_deref(),
            sku: p.sku.as_deref(),
            barcode: p.barcode.as_deref(),
            price_cents: p.price_cents,
            cost_cents: p.cost_cents,
            stock: p.stock,
            low_stock_threshold: p.low_stock_threshold,
            created_at: p.created_at,
            updated_at: p.updated_at,
            deleted: p.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a Customer> for CustomerDto<'a> {
    fn from(c: &'a Customer) -> Self {
        CustomerDto {
            id: &c.id,
            business_id: &c.business_id,
            name: &c.name,
            phone: c.phone.as_deref(),
            email: c.email.as_deref(),
            address: c.address.as_deref(),
            notes: c.notes.as_deref(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            deleted: c.deleted,
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub receipt_no: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_tendered_cents: i64,
    pub change_due_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<&'a str>,
    pub cashier_id: &'a str,
    pub is_refund: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a Transaction> for TransactionDto<'a> {
    fn from(t: &'a Transaction) -> Self {
        TransactionDto {
            id: &t.id,
            business_id: &t.business_id,
            receipt_no: t.receipt_no,
            subtotal_cents: t.subtotal_cents,
            discount_cents: t.discount_cents,
            tax_cents: t.tax_cents,
            total_cents: t.total_cents,
            payment_method: t.payment_method,
            amount_tendered_cents: t.amount_tendered_cents,
            change_due_cents: t.change_due_cents,
            customer_id: t.customer_id.as_deref(),
            cashier_id: &t.cashier_id,
            is_refund: t.is_refund,
            original_transaction_id: t.original_transaction_id.as_deref(),
            approved_by: t.approved_by.as_deref(),
            created_at: t.created_at,
            updated_at: t.updated_at,
            deleted: t.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItemDto<'a> {
    pub id: &'a str,
    pub transaction_id: &'a str,
    pub product_id: &'a str,
    pub name: &'a str,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a TransactionItem> for TransactionItemDto<'a> {
    fn from(i: &'a TransactionItem) -> Self {
        TransactionItemDto {
            id: &i.id,
            transaction_id: &i.transaction_id,
            product_id: &i.product_id,
            name: &i.name,
            unit_price_cents: i.unit_price_cents,
            quantity: i.quantity,
            line_total_cents: i.line_total_cents,
            created_at: i.created_at,
            updated_at: i.updated_at,
            deleted: i.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashShiftDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub opened_by: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<&'a str>,
    pub opened_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    pub opening_float_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_cash_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cash_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a CashShift> for CashShiftDto<'a> {
    fn from(s: &'a CashShift) -> Self {
        CashShiftDto {
            id: &s.id,
            business_id: &s.business_id,
            opened_by: &s.opened_by,
            closed_by: s.closed_by.as_deref(),
            opened_at: s.opened_at,
            closed_at: s.closed_at,
            opening_float_cents: s.opening_float_cents,
            expected_cash_cents: s.expected_cash_cents,
            actual_cash_cents: s.actual_cash_cents,
            variance_cents: s.variance_cents,
            notes: s.notes.as_deref(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            deleted: s.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReceiptDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub supplier: &'a str,
    pub received_by: &'a str,
    pub received_at: i64,
    pub total_cost_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a StockReceipt> for StockReceiptDto<'a> {
    fn from(r: &'a StockReceipt) -> Self {
        StockReceiptDto {
            id: &r.id,
            business_id: &r.business_id,
            supplier: &r.supplier,
            received_by: &r.received_by,
            received_at: r.received_at,
            total_cost_cents: r.total_cost_cents,
            notes: r.notes.as_deref(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted: r.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReceiptItemDto<'a> {
    pub id: &'a str,
    pub receipt_id: &'a str,
    pub product_id: &'a str,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_cost_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a StockReceiptItem> for StockReceiptItemDto<'a> {
    fn from(i: &'a StockReceiptItem) -> Self {
        StockReceiptItemDto {
            id: &i.id,
            receipt_id: &i.receipt_id,
            product_id: &i.product_id,
            quantity: i.quantity,
            unit_cost_cents: i.unit_cost_cents,
            line_cost_cents: i.line_cost_cents,
            created_at: i.created_at,
            updated_at: i.updated_at,
            deleted: i.deleted,
        }
    }
}

/// Activity details go up as parsed JSON, not as an escaped string.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogDto<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    #[serde(rename = "type")]
    pub entry_type: &'a str,
    pub action: &'a str,
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

impl<'a> From<&'a ActivityLog> for ActivityLogDto<'a> {
    fn from(a: &'a ActivityLog) -> Self {
        ActivityLogDto {
            id: &a.id,
            business_id: &a.business_id,
            entry_type: &a.entry_type,
            action: &a.action,
            details: a.details_json(),
            user_id: a.user_id.as_deref(),
            approved_by: a.approved_by.as_deref(),
            created_at: a.created_at,
            updated_at: a.updated_at,
            deleted: a.deleted,
        }
    }
}

to_remote!(Business, SyncTable::Businesses, BusinessDto);
to_remote!(User, SyncTable::Users, UserDto);
to_remote!(Subscription, SyncTable::Subscriptions, SubscriptionDto);
to_remote!(Product, SyncTable::Products, ProductDto);
to_remote!(Customer, SyncTable::Customers, CustomerDto);
to_remote!(Transaction, SyncTable::Transactions, TransactionDto);
to_remote!(TransactionItem, SyncTable::TransactionItems, TransactionItemDto);
to_remote!(CashShift, SyncTable::CashShifts, CashShiftDto);
to_remote!(StockReceipt, SyncTable::StockReceipts, StockReceiptDto);
to_remote!(StockReceiptItem, SyncTable::StockReceiptItems, StockReceiptItemDto);
to_remote!(ActivityLog, SyncTable::ActivityLogs, ActivityLogDto);

impl ChildRecord for TransactionItem {
    fn parent_id(&self) -> &str {
        &self.transaction_id
    }
}

impl ChildRecord for StockReceiptItem {
    fn parent_id(&self) -> &str {
        &self.receipt_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::SyncStatus;

    fn user() -> User {
        User {
            id: "u-1".into(),
            business_id: "b-1".into(),
            name: "Rudo".into(),
            email: None,
            role: UserRole::Cashier,
            pin_hash: "$argon2id$v=19$secret".into(),
            active: true,
            created_at: 1,
            updated_at: 2,
            sync_status: SyncStatus::Pending,
            remote_id: Some("r-9".into()),
            deleted: false,
        }
    }

    #[test]
    fn test_user_payload_hides_secrets_and_bookkeeping() {
        let value = user().to_remote().unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj["businessId"], "b-1");
        assert_eq!(obj["role"], "CASHIER");
        assert!(!obj.contains_key("pinHash"));
        assert!(!obj.contains_key("pin_hash"));
        assert!(!obj.contains_key("syncStatus"));
        assert!(!obj.contains_key("remoteId"));
        // None is omitted, not null
        assert!(!obj.contains_key("email"));
    }

    #[test]
    fn test_activity_details_are_structured() {
        let log = ActivityLog {
            id: "a-1".into(),
            business_id: "b-1".into(),
            entry_type: "SALE".into(),
            action: "CREATE".into(),
            details: r#"{"receipt_no":7}"#.into(),
            user_id: Some("u-1".into()),
            approved_by: None,
            created_at: 1,
            updated_at: 1,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        let value = log.to_remote().unwrap();
        assert_eq!(value["type"], "SALE");
        assert_eq!(value["details"]["receipt_no"], 7);
        assert_eq!(value["userId"], "u-1");
        assert!(value.get("approvedBy").is_none());
    }

    #[test]
    fn test_children_name_their_parent() {
        let item = StockReceiptItem {
            id: "i-1".into(),
            receipt_id: "r-1".into(),
            product_id: "p-1".into(),
            quantity: 4,
            unit_cost_cents: 50,
            line_cost_cents: 200,
            created_at: 1,
            updated_at: 1,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: true,
        };

        assert_eq!(item.parent_id(), "r-1");
        assert_eq!(<StockReceiptItem as ToRemote>::TABLE, SyncTable::StockReceiptItems);
        assert_eq!(item.to_remote().unwrap()["deleted"], true);
    }
}
