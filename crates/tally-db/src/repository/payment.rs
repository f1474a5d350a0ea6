//! # Payment Repository
//!
//! Local bookkeeping for gateway payments awaiting their callback. These
//! rows never sync; the gateway is the source of truth for their status.

use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_positive_amount, validate_reference};
use tally_core::{Gateway, PaymentStatus, PendingPayment};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

#[derive(Debug, Clone)]
pub struct NewPendingPayment {
    pub business_id: String,
    pub gateway: Gateway,
    pub reference: String,
    pub amount_cents: i64,
    pub poll_url: Option<String>,
    pub browser_url: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: Database,
}

impl PaymentRepository {
    pub fn new(db: Database) -> Self {
        PaymentRepository { db }
    }

    /// Stores a new PENDING payment. The reference must be unused.
    pub async fn insert(&self, new_payment: NewPendingPayment) -> DbResult<PendingPayment> {
        validate_reference(&new_payment.reference)?;
        validate_positive_amount("amount", new_payment.amount_cents)?;

        let now = now_millis();
        let payment = PendingPayment {
            id: new_id(),
            business_id: new_payment.business_id,
            gateway: new_payment.gateway,
            reference: new_payment.reference,
            amount_cents: new_payment.amount_cents,
            status: PaymentStatus::Pending,
            external_id: None,
            poll_url: new_payment.poll_url,
            browser_url: new_payment.browser_url,
            transaction_id: new_payment.transaction_id,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO pending_payments (
                id, business_id, gateway, reference, amount_cents, status,
                poll_url, browser_url, transaction_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.business_id)
        .bind(payment.gateway)
        .bind(&payment.reference)
        .bind(payment.amount_cents)
        .bind(payment.status)
        .bind(&payment.poll_url)
        .bind(&payment.browser_url)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(tx.conn())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("reference", &payment.reference),
            other => other,
        })?;
        tx.commit().await?;

        info!(reference = %payment.reference, amount = payment.amount_cents, gateway = ?payment.gateway, "Pending payment stored");
        Ok(payment)
    }

    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<PendingPayment>> {
        let payment = sqlx::query_as::<_, PendingPayment>(
            "SELECT * FROM pending_payments WHERE reference = ?1",
        )
        .bind(reference)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(payment)
    }

    /// Applies a gateway status to the payment with `reference`.
    ///
    /// COMPLETED and FAILED are terminal: once reached, later updates are
    /// ignored and the stored row is returned unchanged. The external id is
    /// recorded the first time one is supplied.
    pub async fn update_status(
        &self,
        reference: &str,
        status: PaymentStatus,
        external_id: Option<&str>,
    ) -> DbResult<PendingPayment> {
        let mut tx = self.db.begin_exclusive().await?;

        let current = sqlx::query_as::<_, PendingPayment>(
            "SELECT * FROM pending_payments WHERE reference = ?1",
        )
        .bind(reference)
        .fetch_optional(tx.conn())
        .await?
        .ok_or_else(|| DbError::not_found("PendingPayment", reference))?;

        if current.status.is_terminal() {
            debug!(reference = %reference, status = ?current.status, "Ignoring update to settled payment");
            tx.rollback().await?;
            return Ok(current);
        }

        sqlx::query(
            r#"
            UPDATE pending_payments
            SET status = ?2, external_id = COALESCE(external_id, ?3), updated_at = ?4
            WHERE reference = ?1
            "#,
        )
        .bind(reference)
        .bind(status)
        .bind(external_id)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        let updated = sqlx::query_as::<_, PendingPayment>(
            "SELECT * FROM pending_payments WHERE reference = ?1",
        )
        .bind(reference)
        .fetch_one(tx.conn())
        .await?;
        tx.commit().await?;

        info!(reference = %reference, status = ?updated.status, "Payment status updated");
        Ok(updated)
    }

    /// Payments still awaiting a terminal status, oldest first.
    pub async fn list_pending(&self, business_id: &str) -> DbResult<Vec<PendingPayment>> {
        let payments = sqlx::query_as::<_, PendingPayment>(
            r#"
            SELECT * FROM pending_payments
            WHERE business_id = ?1 AND status = 'PENDING'
            ORDER BY created_at
            "#,
        )
        .bind(business_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(payments)
    }
}
