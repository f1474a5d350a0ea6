//! # Sale Repository
//!
//! Sale creation and transaction reads.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale(input)                               │
//! │                                                                         │
//! │  SaleTotals::compute(input)        validation, no I/O                  │
//! │       │  subtotal = Σ price × qty, total = max(0, subtotal − discount) │
//! │       ▼                                                                 │
//! │  ┌──────────────── begin_exclusive() ────────────────┐                 │
//! │  │ 1. receipt_no = next_receipt_no()                 │                 │
//! │  │ 2. INSERT transactions                            │                 │
//! │  │ 3. per line: read product (name snapshot)         │                 │
//! │  │              INSERT transaction_items             │                 │
//! │  │ 4.           stock -= qty                         │                 │
//! │  │ 5. INSERT activity_logs (SALE, CREATE)            │                 │
//! │  └──────────────────── commit ───────────────────────┘                 │
//! │       any error before commit: nothing is written                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::json;
use sqlx::SqliteConnection;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::validate_required;
use tally_core::{
    CoreError, CreateSaleInput, SaleTotals, SyncStatus, Transaction, TransactionItem,
    TransactionWithItems,
};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};
use crate::repository::meta::next_receipt_no;
use crate::repository::product::{apply_stock_delta, fetch_live_in};

// =============================================================================
// In-Unit Helpers
// =============================================================================

pub(crate) async fn insert_transaction_in(
    conn: &mut SqliteConnection,
    tx: &Transaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, business_id, receipt_no, subtotal_cents, discount_cents, tax_cents,
            total_cents, payment_method, amount_tendered_cents, change_due_cents,
            customer_id, cashier_id, is_refund, original_transaction_id, approved_by,
            created_at, updated_at, sync_status, deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, 0)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.business_id)
    .bind(tx.receipt_no)
    .bind(tx.subtotal_cents)
    .bind(tx.discount_cents)
    .bind(tx.tax_cents)
    .bind(tx.total_cents)
    .bind(tx.payment_method)
    .bind(tx.amount_tendered_cents)
    .bind(tx.change_due_cents)
    .bind(&tx.customer_id)
    .bind(&tx.cashier_id)
    .bind(tx.is_refund)
    .bind(&tx.original_transaction_id)
    .bind(&tx.approved_by)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .bind(tx.sync_status)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item_in(
    conn: &mut SqliteConnection,
    item: &TransactionItem,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_items (
            id, transaction_id, product_id, name, unit_price_cents, quantity,
            line_total_cents, created_at, updated_at, sync_status, deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
        "#,
    )
    .bind(&item.id)
    .bind(&item.transaction_id)
    .bind(&item.product_id)
    .bind(&item.name)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .bind(item.updated_at)
    .bind(item.sync_status)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_transaction_in(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Transaction>> {
    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(transaction)
}

pub(crate) async fn fetch_items_in(
    conn: &mut SqliteConnection,
    transaction_id: &str,
) -> DbResult<Vec<TransactionItem>> {
    let items = sqlx::query_as::<_, TransactionItem>(
        "SELECT * FROM transaction_items WHERE transaction_id = ?1 ORDER BY created_at, rowid",
    )
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleRepository {
    db: Database,
}

impl SaleRepository {
    pub fn new(db: Database) -> Self {
        SaleRepository { db }
    }

    /// Records a completed sale atomically.
    ///
    /// ## Errors
    /// - `DbError::Domain` - invalid input, short cash tender, or (with
    ///   `enforce_stock`) insufficient stock
    /// - `DbError::NotFound` - a line references a missing or deleted product
    /// - storage errors; in every case nothing is written
    pub async fn create_sale(&self, input: CreateSaleInput) -> DbResult<TransactionWithItems> {
        validate_required("business_id", &input.business_id, 64)?;
        let totals = SaleTotals::compute(&input)?;

        debug!(
            lines = input.lines.len(),
            subtotal = totals.subtotal.cents(),
            total = totals.total.cents(),
            "Creating sale"
        );

        let mut tx = self.db.begin_exclusive().await?;

        let receipt_no = next_receipt_no(tx.conn()).await?;
        let now = now_millis();
        let transaction = Transaction {
            id: new_id(),
            business_id: input.business_id.clone(),
            receipt_no,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            payment_method: input.payment_method,
            amount_tendered_cents: totals.tendered.cents(),
            change_due_cents: totals.change.cents(),
            customer_id: input.customer_id.clone(),
            cashier_id: input.cashier_id.clone(),
            is_refund: false,
            original_transaction_id: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };
        insert_transaction_in(tx.conn(), &transaction).await?;

        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            // Re-read per line so repeated products see earlier decrements
            let product = fetch_live_in(tx.conn(), &line.product_id).await?;
            if product.business_id != transaction.business_id {
                return Err(DbError::not_found("Product", &line.product_id));
            }

            if input.enforce_stock && product.stock < line.quantity {
                return Err(CoreError::InsufficientStock {
                    product: product.name,
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }

            let item_time = now_millis();
            let item = TransactionItem {
                id: new_id(),
                transaction_id: transaction.id.clone(),
                product_id: product.id.clone(),
                name: product.name,
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                line_total_cents: line.unit_price_cents * line.quantity,
                created_at: item_time,
                updated_at: item_time,
                sync_status: SyncStatus::Pending,
                remote_id: None,
                deleted: false,
            };
            insert_item_in(tx.conn(), &item).await?;
            apply_stock_delta(tx.conn(), &item.product_id, -item.quantity).await?;
            items.push(item);
        }

        append_in(
            tx.conn(),
            NewActivity::new(
                &transaction.business_id,
                entry_type::SALE,
                "CREATE",
                json!({
                    "transaction_id": transaction.id,
                    "receipt_no": receipt_no,
                    "total_cents": transaction.total_cents,
                    "discount_cents": transaction.discount_cents,
                    "payment_method": transaction.payment_method,
                    "items": items.iter().map(|i| json!({
                        "product_id": i.product_id,
                        "name": i.name,
                        "quantity": i.quantity,
                    })).collect::<Vec<_>>(),
                }),
            )
            .by(&transaction.cashier_id),
        )
        .await?;

        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            receipt_no,
            total = transaction.total_cents,
            method = transaction.payment_method.as_str(),
            "Sale recorded"
        );

        Ok(TransactionWithItems { transaction, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(transaction)
    }

    pub async fn get_items(&self, transaction_id: &str) -> DbResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(
            "SELECT * FROM transaction_items WHERE transaction_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(transaction_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(items)
    }

    pub async fn get_with_items(&self, id: &str) -> DbResult<TransactionWithItems> {
        let transaction = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))?;
        let items = self.get_items(id).await?;

        Ok(TransactionWithItems { transaction, items })
    }

    /// Sales and refunds, newest first.
    pub async fn list_recent(&self, business_id: &str, limit: u32) -> DbResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE business_id = ?1 AND deleted = 0
            ORDER BY receipt_no DESC
            LIMIT ?2
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(transactions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
