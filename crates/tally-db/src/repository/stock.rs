//! # Stock Repository
//!
//! Goods received from suppliers. One receipt per delivery, one line per
//! product, stock incremented in the same unit.

use serde_json::json;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{
    validate_line_count, validate_quantity, validate_required, validate_unit_amount,
};
use tally_core::{
    ReceiveStockInput, StockReceipt, StockReceiptItem, StockReceiptWithItems, SyncStatus,
};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};
use crate::repository::product::{apply_stock_delta, fetch_live_in};

#[derive(Debug, Clone)]
pub struct StockRepository {
    db: Database,
}

impl StockRepository {
    pub fn new(db: Database) -> Self {
        StockRepository { db }
    }

    /// Records a delivery and adds its quantities to stock.
    ///
    /// total cost = Σ quantity × unit cost
    pub async fn receive_stock(&self, input: ReceiveStockInput) -> DbResult<StockReceiptWithItems> {
        validate_required("business_id", &input.business_id, 64)?;
        let supplier = validate_required("supplier", &input.supplier, 200)?;
        validate_required("received_by", &input.received_by, 64)?;
        validate_line_count("lines", input.lines.len())?;
        for line in &input.lines {
            validate_quantity(line.quantity)?;
            validate_unit_amount("unit_cost", line.unit_cost_cents)?;
        }

        let total_cost_cents: i64 = input
            .lines
            .iter()
            .map(|l| l.quantity * l.unit_cost_cents)
            .sum();

        let now = now_millis();
        let receipt = StockReceipt {
            id: new_id(),
            business_id: input.business_id.clone(),
            supplier,
            received_by: input.received_by.clone(),
            received_at: now,
            total_cost_cents,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        debug!(supplier = %receipt.supplier, lines = input.lines.len(), "Receiving stock");

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO stock_receipts (
                id, business_id, supplier, received_by, received_at, total_cost_cents,
                notes, created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.business_id)
        .bind(&receipt.supplier)
        .bind(&receipt.received_by)
        .bind(receipt.received_at)
        .bind(receipt.total_cost_cents)
        .bind(&receipt.notes)
        .bind(receipt.created_at)
        .bind(receipt.updated_at)
        .bind(receipt.sync_status)
        .execute(tx.conn())
        .await?;

        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = fetch_live_in(tx.conn(), &line.product_id).await?;
            if product.business_id != receipt.business_id {
                return Err(DbError::not_found("Product", &line.product_id));
            }

            let item_time = now_millis();
            let item = StockReceiptItem {
                id: new_id(),
                receipt_id: receipt.id.clone(),
                product_id: product.id,
                quantity: line.quantity,
                unit_cost_cents: line.unit_cost_cents,
                line_cost_cents: line.quantity * line.unit_cost_cents,
                created_at: item_time,
                updated_at: item_time,
                sync_status: SyncStatus::Pending,
                remote_id: None,
                deleted: false,
            };

            sqlx::query(
                r#"
                INSERT INTO stock_receipt_items (
                    id, receipt_id, product_id, quantity, unit_cost_cents, line_cost_cents,
                    created_at, updated_at, sync_status, deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                "#,
            )
            .bind(&item.id)
            .bind(&item.receipt_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.line_cost_cents)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.sync_status)
            .execute(tx.conn())
            .await?;

            apply_stock_delta(tx.conn(), &item.product_id, item.quantity).await?;
            items.push(item);
        }

        append_in(
            tx.conn(),
            NewActivity::new(
                &receipt.business_id,
                entry_type::STOCK,
                "RECEIVE",
                json!({
                    "receipt_id": receipt.id,
                    "supplier": receipt.supplier,
                    "total_cost_cents": total_cost_cents,
                    "lines": items.iter().map(|i| json!({
                        "product_id": i.product_id,
                        "quantity": i.quantity,
                    })).collect::<Vec<_>>(),
                }),
            )
            .by(&receipt.received_by),
        )
        .await?;

        tx.commit().await?;

        info!(
            receipt_id = %receipt.id,
            supplier = %receipt.supplier,
            total_cost = total_cost_cents,
            "Stock received"
        );

        Ok(StockReceiptWithItems { receipt, items })
    }

    pub async fn get_with_items(&self, receipt_id: &str) -> DbResult<StockReceiptWithItems> {
        let receipt =
            sqlx::query_as::<_, StockReceipt>("SELECT * FROM stock_receipts WHERE id = ?1")
                .bind(receipt_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or_else(|| DbError::not_found("StockReceipt", receipt_id))?;

        let items = sqlx::query_as::<_, StockReceiptItem>(
            "SELECT * FROM stock_receipt_items WHERE receipt_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(receipt_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(StockReceiptWithItems { receipt, items })
    }

    /// Deliveries, newest first.
    pub async fn list_recent(&self, business_id: &str, limit: u32) -> DbResult<Vec<StockReceipt>> {
        let receipts = sqlx::query_as::<_, StockReceipt>(
            r#"
            SELECT * FROM stock_receipts
            WHERE business_id = ?1 AND deleted = 0
            ORDER BY received_at DESC
            LIMIT ?2
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(receipts)
    }
}
