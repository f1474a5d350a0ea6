//! # Activity Repository
//!
//! Append-only audit trail. Every ledger-mutating operation writes exactly
//! one entry through [`append_in`], inside its own unit, so the audit row
//! commits or rolls back together with the change it describes.

use serde_json::Value;
use sqlx::SqliteConnection;
use tally_core::clock::{new_id, now_millis};
use tally_core::{ActivityLog, SyncStatus};
use tracing::debug;

use crate::error::DbResult;
use crate::pool::Database;

/// Entry types written by the ledger.
pub mod entry_type {
    pub const BUSINESS: &str = "BUSINESS";
    pub const USER: &str = "USER";
    pub const PRODUCT: &str = "PRODUCT";
    pub const CUSTOMER: &str = "CUSTOMER";
    pub const SUBSCRIPTION: &str = "SUBSCRIPTION";
    pub const SALE: &str = "SALE";
    pub const REFUND: &str = "REFUND";
    pub const STOCK: &str = "STOCK";
    pub const SHIFT: &str = "SHIFT";
}

/// A new audit entry.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub business_id: &'a str,
    pub entry_type: &'a str,
    pub action: &'a str,
    pub details: Value,
    pub user_id: Option<&'a str>,
    pub approved_by: Option<&'a str>,
}

impl<'a> NewActivity<'a> {
    pub fn new(business_id: &'a str, entry_type: &'a str, action: &'a str, details: Value) -> Self {
        NewActivity {
            business_id,
            entry_type,
            action,
            details,
            user_id: None,
            approved_by: None,
        }
    }

    pub fn by(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn approved_by(mut self, approver: Option<&'a str>) -> Self {
        self.approved_by = approver;
        self
    }
}

/// Appends an entry inside the caller's unit.
pub(crate) async fn append_in(
    conn: &mut SqliteConnection,
    entry: NewActivity<'_>,
) -> DbResult<ActivityLog> {
    let now = now_millis();
    let log = ActivityLog {
        id: new_id(),
        business_id: entry.business_id.to_string(),
        entry_type: entry.entry_type.to_string(),
        action: entry.action.to_string(),
        details: serde_json::to_string(&entry.details)?,
        user_id: entry.user_id.map(str::to_string),
        approved_by: entry.approved_by.map(str::to_string),
        created_at: now,
        updated_at: now,
        sync_status: SyncStatus::Pending,
        remote_id: None,
        deleted: false,
    };

    sqlx::query(
        r#"
        INSERT INTO activity_logs (
            id, business_id, entry_type, action, details, user_id, approved_by,
            created_at, updated_at, sync_status, deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
        "#,
    )
    .bind(&log.id)
    .bind(&log.business_id)
    .bind(&log.entry_type)
    .bind(&log.action)
    .bind(&log.details)
    .bind(&log.user_id)
    .bind(&log.approved_by)
    .bind(log.created_at)
    .bind(log.updated_at)
    .bind(log.sync_status)
    .execute(&mut *conn)
    .await?;

    debug!(
        entry_type = %log.entry_type,
        action = %log.action,
        "Activity recorded"
    );
    Ok(log)
}

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    db: Database,
}

impl ActivityRepository {
    pub fn new(db: Database) -> Self {
        ActivityRepository { db }
    }

    /// Records an event that has no ledger change of its own (sign-ins,
    /// drawer opens, printed reports).
    pub async fn record(&self, entry: NewActivity<'_>) -> DbResult<ActivityLog> {
        let mut tx = self.db.begin_exclusive().await?;
        let log = append_in(tx.conn(), entry).await?;
        tx.commit().await?;
        Ok(log)
    }

    /// Newest entries first.
    pub async fn list_recent(&self, business_id: &str, limit: u32) -> DbResult<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT * FROM activity_logs
            WHERE business_id = ?1 AND deleted = 0
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(logs)
    }

    pub async fn list_by_type(
        &self,
        business_id: &str,
        entry_type: &str,
        limit: u32,
    ) -> DbResult<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT * FROM activity_logs
            WHERE business_id = ?1 AND entry_type = ?2 AND deleted = 0
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
        )
        .bind(business_id)
        .bind(entry_type)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(logs)
    }

    pub async fn count(&self, business_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs WHERE business_id = ?1")
                .bind(business_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_list() {
        let fx = setup().await;

        fx.db
            .activity()
            .record(
                NewActivity::new(&fx.business.id, "AUTH", "LOGIN", json!({ "device": "till-1" }))
                    .by(&fx.cashier.id),
            )
            .await
            .unwrap();

        let logs = fx
            .db
            .activity()
            .list_by_type(&fx.business.id, "AUTH", 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "LOGIN");
        assert_eq!(logs[0].user_id.as_deref(), Some(fx.cashier.id.as_str()));
        assert_eq!(logs[0].details_json()["device"], "till-1");
        assert_eq!(logs[0].sync_status, SyncStatus::Pending);
    }
}
