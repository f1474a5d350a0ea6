//! # Sync Bookkeeping Repository
//!
//! PENDING/SYNCED bookkeeping for the sync engine. Every synchronizable row
//! carries its own flag; there is no separate outbox.
//!
//! ## Row State
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Per-row sync state                                   │
//! │                                                                         │
//! │  local write ──► sync_status = PENDING, updated_at = now               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fetch_pending(table)        rows read with their updated_at           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  remote upsert ok                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mark_synced(table, id, updated_at)                                    │
//! │       UPDATE ... SET sync_status = 'SYNCED'                            │
//! │       WHERE id = ? AND updated_at = ?   ◄── a write that raced the     │
//! │                                             upload keeps it PENDING    │
//! │                                                                         │
//! │  Offline? Rows stay PENDING. Back online? The next cycle picks them up │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Table names are never user input: they come from [`SyncTable`].

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tally_core::{SyncStatus, SyncTable};
use tracing::debug;

use crate::error::DbResult;
use crate::pool::Database;

/// Rows awaiting upload in one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCount {
    pub table: SyncTable,
    pub live: i64,
    pub tombstones: i64,
}

/// Restricts a table to one business. Child tables have no business column
/// and are scoped through their parent.
fn scope_clause(table: SyncTable) -> String {
    match (table, table.parent()) {
        (SyncTable::Businesses, _) => "id = ?1".to_string(),
        (_, Some((parent, fk))) => format!(
            "{fk} IN (SELECT id FROM {} WHERE business_id = ?1)",
            parent.table_name()
        ),
        _ => "business_id = ?1".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SyncRepository {
    db: Database,
}

impl SyncRepository {
    pub fn new(db: Database) -> Self {
        SyncRepository { db }
    }

    /// PENDING rows of `table`, oldest write first.
    ///
    /// `tombstones` selects deleted rows instead of live ones.
    pub async fn fetch_pending<T>(
        &self,
        table: SyncTable,
        business_id: &str,
        tombstones: bool,
        limit: u32,
    ) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let sql = format!(
            r#"
            SELECT * FROM {}
            WHERE sync_status = 'PENDING' AND deleted = ?2 AND {}
            ORDER BY updated_at, rowid
            LIMIT ?3
            "#,
            table.table_name(),
            scope_clause(table)
        );

        let rows = sqlx::query_as::<_, T>(&sql)
            .bind(business_id)
            .bind(tombstones)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        debug!(table = %table, tombstones, count = rows.len(), "Fetched pending rows");
        Ok(rows)
    }

    /// Live PENDING children of exactly the given parents.
    pub async fn fetch_pending_children<T>(
        &self,
        child: SyncTable,
        parent_ids: &[String],
    ) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let Some((_, fk)) = child.parent() else {
            return Ok(Vec::new());
        };
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT * FROM {} WHERE sync_status = 'PENDING' AND deleted = 0 AND {fk} IN (",
            child.table_name()
        ));
        let mut separated = builder.separated(", ");
        for id in parent_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY updated_at, rowid");

        let rows = builder
            .build_query_as::<T>()
            .fetch_all(self.db.pool())
            .await?;

        debug!(table = %child, parents = parent_ids.len(), count = rows.len(), "Fetched pending children");
        Ok(rows)
    }

    /// Marks a row SYNCED if it has not been written since it was read.
    ///
    /// Returns `false` when a newer local write left the row PENDING. A
    /// remote id, once stored, is never replaced.
    pub async fn mark_synced(
        &self,
        table: SyncTable,
        id: &str,
        read_updated_at: i64,
        remote_id: Option<&str>,
    ) -> DbResult<bool> {
        let sql = format!(
            r#"
            UPDATE {}
            SET sync_status = ?3, remote_id = COALESCE(remote_id, ?4)
            WHERE id = ?1 AND updated_at = ?2
            "#,
            table.table_name()
        );

        let mut tx = self.db.begin_exclusive().await?;
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(read_updated_at)
            .bind(SyncStatus::Synced)
            .bind(remote_id)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;

        let marked = result.rows_affected() == 1;
        if !marked {
            debug!(table = %table, id = %id, "Row changed during upload, left pending");
        }
        Ok(marked)
    }

    pub async fn count_pending(&self, table: SyncTable, tombstones: bool) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE sync_status = 'PENDING' AND deleted = ?1",
            table.table_name()
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(tombstones)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    /// Pending counts for every table, in upload order.
    pub async fn pending_summary(&self) -> DbResult<Vec<PendingCount>> {
        let mut summary = Vec::with_capacity(SyncTable::UPLOAD_ORDER.len());
        for table in SyncTable::UPLOAD_ORDER {
            summary.push(PendingCount {
                table,
                live: self.count_pending(table, false).await?,
                tombstones: self.count_pending(table, true).await?,
            });
        }

        Ok(summary)
    }
}
