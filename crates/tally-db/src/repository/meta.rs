//! # Meta Repository
//!
//! The single-row `app_meta` table: receipt counter, device id and the
//! timestamp of the last completed sync.
//!
//! ## Receipt Numbers
//! ```text
//! UPDATE app_meta SET receipt_counter = receipt_counter + 1 ... RETURNING
//!        │
//!        └── runs inside the sale/refund unit: if the unit rolls back the
//!            number is rolled back with it, and the UNIQUE index on
//!            transactions.receipt_no catches anything that slips through
//! ```

use sqlx::SqliteConnection;
use tally_core::clock::new_id;
use tally_core::AppMeta;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

/// Increments the receipt counter and returns the new value.
///
/// Must run inside the unit that inserts the transaction.
pub(crate) async fn next_receipt_no(conn: &mut SqliteConnection) -> DbResult<i64> {
    let receipt_no: i64 = sqlx::query_scalar(
        "UPDATE app_meta SET receipt_counter = receipt_counter + 1 WHERE id = 1 RETURNING receipt_counter",
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::Internal("app_meta row is missing".to_string()))?;

    debug!(receipt_no, "Allocated receipt number");
    Ok(receipt_no)
}

#[derive(Debug, Clone)]
pub struct MetaRepository {
    db: Database,
}

impl MetaRepository {
    pub fn new(db: Database) -> Self {
        MetaRepository { db }
    }

    pub async fn get(&self) -> DbResult<AppMeta> {
        let meta = sqlx::query_as::<_, AppMeta>(
            "SELECT receipt_counter, device_id, last_sync_at FROM app_meta WHERE id = 1",
        )
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| DbError::Internal("app_meta row is missing".to_string()))?;

        Ok(meta)
    }

    /// Returns this device's id, generating and storing one on first use.
    pub async fn ensure_device_id(&self) -> DbResult<String> {
        if let Some(id) = self.get().await?.device_id {
            return Ok(id);
        }

        let mut tx = self.db.begin_exclusive().await?;
        let candidate = new_id();
        // Another unit may have won the race before we took the lock
        sqlx::query("UPDATE app_meta SET device_id = ?1 WHERE id = 1 AND device_id IS NULL")
            .bind(&candidate)
            .execute(tx.conn())
            .await?;
        let device_id: String = sqlx::query_scalar("SELECT device_id FROM app_meta WHERE id = 1")
            .fetch_one(tx.conn())
            .await?;
        tx.commit().await?;

        info!(device_id = %device_id, "Device id assigned");
        Ok(device_id)
    }

    /// Records the end of a completed sync cycle.
    pub async fn record_sync_completed(&self, at: i64) -> DbResult<()> {
        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query("UPDATE app_meta SET last_sync_at = ?1 WHERE id = 1")
            .bind(at)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    #[tokio::test]
    async fn test_receipt_numbers_increase() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_exclusive().await.unwrap();
        let first = next_receipt_no(tx.conn()).await.unwrap();
        let second = next_receipt_no(tx.conn()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(db.meta().get().await.unwrap().receipt_counter, 2);
    }

    #[tokio::test]
    async fn test_device_id_is_stable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = db.meta().ensure_device_id().await.unwrap();
        let second = db.meta().ensure_device_id().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_record_sync_completed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.meta().get().await.unwrap().last_sync_at.is_none());

        db.meta().record_sync_completed(42).await.unwrap();
        assert_eq!(db.meta().get().await.unwrap().last_sync_at, Some(42));
    }
}
