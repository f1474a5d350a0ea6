//! # Shift Repository
//!
//! Cash shift lifecycle. At most one shift is open on a device; the check
//! runs inside the exclusive unit and a partial UNIQUE index backs it.
//!
//! ## Close-out
//! ```text
//! expected = opening float
//!          + Σ total of CASH transactions created in [opened_at, now]
//!            (refunds carry negative totals and reduce it)
//! variance = actual − expected
//! ```

use serde_json::json;
use sqlx::SqliteConnection;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_non_negative, validate_required};
use tally_core::{CashShift, CoreError, SyncStatus};
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

async fn fetch_open_in(conn: &mut SqliteConnection) -> DbResult<Option<CashShift>> {
    let shift = sqlx::query_as::<_, CashShift>(
        "SELECT * FROM cash_shifts WHERE closed_at IS NULL AND deleted = 0 LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(shift)
}

#[derive(Debug, Clone)]
pub struct ShiftRepository {
    db: Database,
}

impl ShiftRepository {
    pub fn new(db: Database) -> Self {
        ShiftRepository { db }
    }

    pub async fn open_shift(
        &self,
        business_id: &str,
        opening_float_cents: i64,
        user_id: &str,
    ) -> DbResult<CashShift> {
        validate_required("business_id", business_id, 64)?;
        validate_required("user_id", user_id, 64)?;
        validate_non_negative("opening_float", opening_float_cents)?;

        let mut tx = self.db.begin_exclusive().await?;

        if let Some(open) = fetch_open_in(tx.conn()).await? {
            warn!(shift_id = %open.id, "Shift already open");
            return Err(CoreError::ShiftAlreadyOpen(open.id).into());
        }

        let now = now_millis();
        let shift = CashShift {
            id: new_id(),
            business_id: business_id.to_string(),
            opened_by: user_id.to_string(),
            closed_by: None,
            opened_at: now,
            closed_at: None,
            opening_float_cents,
            expected_cash_cents: None,
            actual_cash_cents: None,
            variance_cents: None,
            notes: None,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_shifts (
                id, business_id, opened_by, opened_at, opening_float_cents,
                created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.business_id)
        .bind(&shift.opened_by)
        .bind(shift.opened_at)
        .bind(shift.opening_float_cents)
        .bind(shift.created_at)
        .bind(shift.updated_at)
        .bind(shift.sync_status)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                business_id,
                entry_type::SHIFT,
                "OPEN",
                json!({ "shift_id": shift.id, "opening_float_cents": opening_float_cents }),
            )
            .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(shift_id = %shift.id, opening_float = opening_float_cents, "Shift opened");
        Ok(shift)
    }

    /// Counts the till and closes the shift.
    ///
    /// ## Errors
    /// - `ShiftNotOpen` if the shift is unknown or already closed
    pub async fn close_shift(
        &self,
        shift_id: &str,
        actual_cash_cents: i64,
        user_id: &str,
        notes: Option<String>,
    ) -> DbResult<CashShift> {
        validate_required("user_id", user_id, 64)?;
        validate_non_negative("actual_cash", actual_cash_cents)?;

        let mut tx = self.db.begin_exclusive().await?;

        let shift = sqlx::query_as::<_, CashShift>(
            "SELECT * FROM cash_shifts WHERE id = ?1 AND deleted = 0",
        )
        .bind(shift_id)
        .fetch_optional(tx.conn())
        .await?
        .filter(CashShift::is_open)
        .ok_or_else(|| CoreError::ShiftNotOpen(shift_id.to_string()))?;

        let now = now_millis();
        let cash_taken: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0) FROM transactions
            WHERE business_id = ?1
              AND payment_method = 'CASH'
              AND deleted = 0
              AND created_at >= ?2 AND created_at <= ?3
            "#,
        )
        .bind(&shift.business_id)
        .bind(shift.opened_at)
        .bind(now)
        .fetch_one(tx.conn())
        .await?;

        let expected = shift.opening_float_cents + cash_taken;
        let variance = actual_cash_cents - expected;

        sqlx::query(
            r#"
            UPDATE cash_shifts
            SET closed_by = ?2, closed_at = ?3, expected_cash_cents = ?4,
                actual_cash_cents = ?5, variance_cents = ?6, notes = ?7,
                updated_at = ?3, sync_status = 'PENDING'
            WHERE id = ?1
            "#,
        )
        .bind(shift_id)
        .bind(user_id)
        .bind(now)
        .bind(expected)
        .bind(actual_cash_cents)
        .bind(variance)
        .bind(&notes)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &shift.business_id,
                entry_type::SHIFT,
                "CLOSE",
                json!({
                    "shift_id": shift_id,
                    "expected_cash_cents": expected,
                    "actual_cash_cents": actual_cash_cents,
                    "variance_cents": variance,
                }),
            )
            .by(user_id),
        )
        .await?;

        let closed = sqlx::query_as::<_, CashShift>("SELECT * FROM cash_shifts WHERE id = ?1")
            .bind(shift_id)
            .fetch_one(tx.conn())
            .await?;
        tx.commit().await?;

        if variance != 0 {
            warn!(shift_id = %shift_id, variance, "Shift closed with cash variance");
        } else {
            info!(shift_id = %shift_id, expected, "Shift closed");
        }
        Ok(closed)
    }

    /// The open shift, if any.
    pub async fn current_shift(&self, business_id: &str) -> DbResult<Option<CashShift>> {
        let shift = sqlx::query_as::<_, CashShift>(
            r#"
            SELECT * FROM cash_shifts
            WHERE business_id = ?1 AND closed_at IS NULL AND deleted = 0
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(shift)
    }

    pub async fn get(&self, shift_id: &str) -> DbResult<Option<CashShift>> {
        let shift = sqlx::query_as::<_, CashShift>("SELECT * FROM cash_shifts WHERE id = ?1")
            .bind(shift_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::setup;
    use tally_core::PaymentMethod;

    #[tokio::test]
    async fn test_shift_reconciles() {
        let fx = setup().await;
        let product = fx.product("Zesa Token", 2550, 100).await;

        let shift = fx
            .db
            .shifts()
            .open_shift(&fx.business.id, 10_000, &fx.cashier.id)
            .await
            .unwrap();
        assert!(shift.is_open());

        let mut cash = fx.sale(&[(&product, 1)], PaymentMethod::Cash);
        cash.amount_tendered_cents = 3000;
        fx.db.sales().create_sale(cash).await.unwrap();

        // Card sales never reach the till
        fx.db
            .sales()
            .create_sale(fx.sale(&[(&product, 1)], PaymentMethod::Card))
            .await
            .unwrap();

        let closed = fx
            .db
            .shifts()
            .close_shift(&shift.id, 12_550, &fx.manager.id, None)
            .await
            .unwrap();

        assert!(!closed.is_open());
        assert_eq!(closed.expected_cash_cents, Some(12_550));
        assert_eq!(closed.actual_cash_cents, Some(12_550));
        assert_eq!(closed.variance_cents, Some(0));
        assert_eq!(closed.closed_by.as_deref(), Some(fx.manager.id.as_str()));

        let logs = fx
            .db
            .activity()
            .list_by_type(&fx.business.id, entry_type::SHIFT, 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_cash_refund_reduces_expected() {
        let fx = setup().await;
        let product = fx.product("Zesa Token", 2000, 100).await;

        let shift = fx
            .db
            .shifts()
            .open_shift(&fx.business.id, 5_000, &fx.cashier.id)
            .await
            .unwrap();

        let mut cash = fx.sale(&[(&product, 1)], PaymentMethod::Cash);
        cash.amount_tendered_cents = 2000;
        let sale = fx.db.sales().create_sale(cash).await.unwrap();
        fx.db
            .refunds()
            .create_refund(tally_core::CreateRefundInput {
                original_transaction_id: sale.transaction.id,
                cashier_id: fx.cashier.id.clone(),
                approved_by: Some(fx.manager.id.clone()),
                reason: None,
            })
            .await
            .unwrap();

        let closed = fx
            .db
            .shifts()
            .close_shift(&shift.id, 4_900, &fx.cashier.id, Some("Short 1.00".to_string()))
            .await
            .unwrap();

        assert_eq!(closed.expected_cash_cents, Some(5_000));
        assert_eq!(closed.variance_cents, Some(-100));
        assert_eq!(closed.notes.as_deref(), Some("Short 1.00"));
    }

    #[tokio::test]
    async fn test_only_one_open_shift() {
        let fx = setup().await;
        let repo = fx.db.shifts();

        let first = repo.open_shift(&fx.business.id, 0, &fx.cashier.id).await.unwrap();
        let err = repo
            .open_shift(&fx.business.id, 0, &fx.manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftAlreadyOpen(id)) if id == first.id));

        let current = repo.current_shift(&fx.business.id).await.unwrap().unwrap();
        assert_eq!(current.id, first.id);

        repo.close_shift(&first.id, 0, &fx.cashier.id, None).await.unwrap();
        assert!(repo.current_shift(&fx.business.id).await.unwrap().is_none());

        // Reopening after close is fine
        repo.open_shift(&fx.business.id, 0, &fx.cashier.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_rejects_non_open() {
        let fx = setup().await;
        let repo = fx.db.shifts();

        let err = repo
            .close_shift("no-such-shift", 0, &fx.cashier.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftNotOpen(_))));

        let shift = repo.open_shift(&fx.business.id, 0, &fx.cashier.id).await.unwrap();
        repo.close_shift(&shift.id, 0, &fx.cashier.id, None).await.unwrap();

        let err = repo
            .close_shift(&shift.id, 0, &fx.cashier.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftNotOpen(_))));

        let stored = repo.get(&shift.id).await.unwrap().unwrap();
        assert_eq!(stored.actual_cash_cents, Some(0));
    }
}
