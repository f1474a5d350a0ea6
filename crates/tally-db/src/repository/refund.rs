//! # Refund Repository
//!
//! Full refunds of completed sales.
//!
//! A refund is a mirror transaction: every amount negated, every line's
//! quantity negated, stock returned. The original is never modified.
//!
//! ```text
//! sale #41  total  360  lines (A × 2, B × 1)
//!    │
//!    └─► refund #57  total −360  lines (A × −2, B × −1)
//!                    original_transaction_id = sale #41
//!                    stock: A += 2, B += 1
//! ```
//!
//! ## Rejections
//! - original missing → `NotFound`
//! - original is itself a refund → `RefundOfRefund`
//! - original has no lines → `NothingToRefund`
//! - original already refunded → `AlreadyRefunded`

use serde_json::json;
use sqlx::SqliteConnection;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_required, validate_uuid};
use tally_core::{
    CoreError, CreateRefundInput, SyncStatus, Transaction, TransactionItem, TransactionWithItems,
    UserRole, ValidationError,
};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};
use crate::repository::meta::next_receipt_no;
use crate::repository::product::return_stock_in;
use crate::repository::sale::{
    fetch_items_in, fetch_transaction_in, insert_item_in, insert_transaction_in,
};

async fn find_refund_in(
    conn: &mut SqliteConnection,
    original_id: &str,
) -> DbResult<Option<Transaction>> {
    let refund = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE original_transaction_id = ?1 AND is_refund = 1 AND deleted = 0
        LIMIT 1
        "#,
    )
    .bind(original_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(refund)
}

/// The approver must be an active owner or manager of the same business.
async fn check_approver_in(
    conn: &mut SqliteConnection,
    business_id: &str,
    approver_id: &str,
) -> DbResult<()> {
    let role: Option<UserRole> = sqlx::query_scalar(
        r#"
        SELECT role FROM users
        WHERE id = ?1 AND business_id = ?2 AND active = 1 AND deleted = 0
        "#,
    )
    .bind(approver_id)
    .bind(business_id)
    .fetch_optional(&mut *conn)
    .await?;

    match role {
        Some(role) if role.can_approve() => Ok(()),
        _ => {
            warn!(approver_id = %approver_id, "Refund approver lacks authority");
            Err(ValidationError::InvalidFormat {
                field: "approved_by".to_string(),
                reason: "must be an active owner or manager".to_string(),
            }
            .into())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefundRepository {
    db: Database,
}

impl RefundRepository {
    pub fn new(db: Database) -> Self {
        RefundRepository { db }
    }

    /// Refunds a sale in full.
    pub async fn create_refund(&self, input: CreateRefundInput) -> DbResult<TransactionWithItems> {
        validate_required("original_transaction_id", &input.original_transaction_id, 64)?;
        validate_uuid("cashier_id", &input.cashier_id)?;
        let reason = match input.reason.as_deref() {
            Some(reason) => Some(validate_required("reason", reason, 500)?),
            None => None,
        };

        let mut tx = self.db.begin_exclusive().await?;

        let original = fetch_transaction_in(tx.conn(), &input.original_transaction_id)
            .await?
            .filter(|t| !t.deleted)
            .ok_or_else(|| DbError::not_found("Transaction", &input.original_transaction_id))?;

        if original.is_refund {
            return Err(CoreError::RefundOfRefund(original.id).into());
        }

        if let Some(existing) = find_refund_in(tx.conn(), &original.id).await? {
            return Err(CoreError::AlreadyRefunded {
                original: original.id,
                refund: existing.id,
            }
            .into());
        }

        let original_items = fetch_items_in(tx.conn(), &original.id).await?;
        if original_items.is_empty() {
            return Err(CoreError::NothingToRefund(original.id).into());
        }

        if let Some(approver) = input.approved_by.as_deref() {
            check_approver_in(tx.conn(), &original.business_id, approver).await?;
        }

        let receipt_no = next_receipt_no(tx.conn()).await?;
        let now = now_millis();
        let refund = Transaction {
            id: new_id(),
            business_id: original.business_id.clone(),
            receipt_no,
            subtotal_cents: -original.subtotal_cents,
            discount_cents: -original.discount_cents,
            tax_cents: -original.tax_cents,
            total_cents: -original.total_cents,
            payment_method: original.payment_method,
            amount_tendered_cents: -original.total_cents,
            change_due_cents: 0,
            customer_id: original.customer_id.clone(),
            cashier_id: input.cashier_id.clone(),
            is_refund: true,
            original_transaction_id: Some(original.id.clone()),
            approved_by: input.approved_by.clone(),
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };
        insert_transaction_in(tx.conn(), &refund).await?;

        let mut items = Vec::with_capacity(original_items.len());
        for line in &original_items {
            let item_time = now_millis();
            let item = TransactionItem {
                id: new_id(),
                transaction_id: refund.id.clone(),
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: -line.quantity,
                line_total_cents: -line.line_total_cents,
                created_at: item_time,
                updated_at: item_time,
                sync_status: SyncStatus::Pending,
                remote_id: None,
                deleted: false,
            };
            insert_item_in(tx.conn(), &item).await?;
            return_stock_in(tx.conn(), &line.product_id, line.quantity).await?;
            items.push(item);
        }

        append_in(
            tx.conn(),
            NewActivity::new(
                &refund.business_id,
                entry_type::REFUND,
                "Approved Refund",
                json!({
                    "refund_transaction_id": refund.id,
                    "original_transaction_id": original.id,
                    "original_receipt_no": original.receipt_no,
                    "receipt_no": receipt_no,
                    "total_cents": refund.total_cents,
                    "reason": reason,
                }),
            )
            .by(&refund.cashier_id)
            .approved_by(refund.approved_by.as_deref()),
        )
        .await?;

        tx.commit().await?;

        info!(
            refund_id = %refund.id,
            original_id = %original.id,
            total = refund.total_cents,
            approved_by = ?refund.approved_by,
            "Refund recorded"
        );

        Ok(TransactionWithItems {
            transaction: refund,
            items,
        })
    }

    /// The refund issued against a sale, if any.
    pub async fn find_refund_for(&self, original_id: &str) -> DbResult<Option<Transaction>> {
        let refund = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE original_transaction_id = ?1 AND is_refund = 1 AND deleted = 0
            LIMIT 1
            "#,
        )
        .bind(original_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{setup, Fixture};
    use tally_core::PaymentMethod;

    async fn completed_sale(fx: &Fixture) -> (TransactionWithItems, tally_core::Product, tally_core::Product) {
        let a = fx.product("Sadza Meal 2kg", 150, 10).await;
        let b = fx.product("Kapenta 250g", 80, 10).await;
        let mut input = fx.sale(&[(&a, 2), (&b, 1)], PaymentMethod::Card);
        input.discount_cents = 20;
        let sale = fx.db.sales().create_sale(input).await.unwrap();
        (sale, a, b)
    }

    fn refund_input(fx: &Fixture, original: &Transaction) -> CreateRefundInput {
        CreateRefundInput {
            original_transaction_id: original.id.clone(),
            cashier_id: fx.cashier.id.clone(),
            approved_by: Some(fx.manager.id.clone()),
            reason: Some("Wrong size".to_string()),
        }
    }

    #[tokio::test]
    async fn test_refund_mirrors_sale() {
        let fx = setup().await;
        let (sale, a, b) = completed_sale(&fx).await;

        let refund = fx
            .db
            .refunds()
            .create_refund(refund_input(&fx, &sale.transaction))
            .await
            .unwrap();

        let t = &refund.transaction;
        assert!(t.is_refund);
        assert_eq!(t.original_transaction_id.as_deref(), Some(sale.transaction.id.as_str()));
        assert_eq!(t.subtotal_cents, -380);
        assert_eq!(t.discount_cents, -20);
        assert_eq!(t.total_cents, -360);
        assert_eq!(t.payment_method, PaymentMethod::Card);
        assert!(t.receipt_no > sale.transaction.receipt_no);

        assert_eq!(refund.items.len(), sale.items.len());
        for (orig, mirrored) in sale.items.iter().zip(&refund.items) {
            assert_eq!(mirrored.quantity, -orig.quantity);
            assert_eq!(mirrored.line_total_cents, -orig.line_total_cents);
            assert_eq!(mirrored.name, orig.name);
        }

        // Stock back where it started
        assert_eq!(fx.stock_of(&a).await, 10);
        assert_eq!(fx.stock_of(&b).await, 10);

        let logs = fx
            .db
            .activity()
            .list_by_type(&fx.business.id, entry_type::REFUND, 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "Approved Refund");
        assert_eq!(logs[0].approved_by.as_deref(), Some(fx.manager.id.as_str()));
        let details = logs[0].details_json();
        assert_eq!(details["original_transaction_id"], sale.transaction.id);
        assert_eq!(details["refund_transaction_id"], t.id);

        let found = fx
            .db
            .refunds()
            .find_refund_for(&sale.transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, t.id);
    }

    #[tokio::test]
    async fn test_refund_of_refund_rejected() {
        let fx = setup().await;
        let (sale, _, _) = completed_sale(&fx).await;

        let refund = fx
            .db
            .refunds()
            .create_refund(refund_input(&fx, &sale.transaction))
            .await
            .unwrap();

        let err = fx
            .db
            .refunds()
            .create_refund(refund_input(&fx, &refund.transaction))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::RefundOfRefund(_))));
    }

    #[tokio::test]
    async fn test_double_refund_rejected() {
        let fx = setup().await;
        let (sale, a, _) = completed_sale(&fx).await;

        fx.db
            .refunds()
            .create_refund(refund_input(&fx, &sale.transaction))
            .await
            .unwrap();
        let err = fx
            .db
            .refunds()
            .create_refund(refund_input(&fx, &sale.transaction))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::AlreadyRefunded { .. })));
        assert_eq!(fx.stock_of(&a).await, 10);
    }

    #[tokio::test]
    async fn test_refund_after_product_deleted() {
        let fx = setup().await;
        let (sale, a, _) = completed_sale(&fx).await;
        fx.db.products().soft_delete(&a.id, &fx.owner.id).await.unwrap();

        let refund = fx
            .db
            .refunds()
            .create_refund(refund_input(&fx, &sale.transaction))
            .await
            .unwrap();

        assert_eq!(refund.items[0].name, "Sadza Meal 2kg");
        let restored = fx.db.products().get(&a.id).await.unwrap().unwrap();
        assert!(restored.deleted);
        assert_eq!(restored.stock, 10);
    }

    #[tokio::test]
    async fn test_missing_original() {
        let fx = setup().await;
        let err = fx
            .db
            .refunds()
            .create_refund(CreateRefundInput {
                original_transaction_id: new_id(),
                cashier_id: fx.cashier.id.clone(),
                approved_by: None,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cashier_cannot_approve() {
        let fx = setup().await;
        let (sale, a, _) = completed_sale(&fx).await;

        let mut input = refund_input(&fx, &sale.transaction);
        input.approved_by = Some(fx.cashier.id.clone());

        let err = fx.db.refunds().create_refund(input).await.unwrap_err();
        assert!(err.is_domain());
        assert_eq!(fx.stock_of(&a).await, 8);
        assert!(fx
            .db
            .refunds()
            .find_refund_for(&sale.transaction.id)
            .await
            .unwrap()
            .is_none());
    }
}
