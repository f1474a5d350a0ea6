//! # Subscription Repository
//!
//! The business's current plan. One live subscription per business; an
//! upsert replaces its fields in place so the remote store sees one record.

use serde_json::json;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::validate_required;
use tally_core::{Subscription, SubscriptionStatus, SyncStatus};
use tracing::info;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    db: Database,
}

impl SubscriptionRepository {
    pub fn new(db: Database) -> Self {
        SubscriptionRepository { db }
    }

    /// Creates or replaces the business's subscription.
    pub async fn upsert_current(
        &self,
        business_id: &str,
        plan: &str,
        status: SubscriptionStatus,
        starts_at: i64,
        expires_at: Option<i64>,
    ) -> DbResult<Subscription> {
        let plan = validate_required("plan", plan, 50)?;
        let now = now_millis();

        let mut tx = self.db.begin_exclusive().await?;
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM subscriptions WHERE business_id = ?1 AND deleted = 0 LIMIT 1",
        )
        .bind(business_id)
        .fetch_optional(tx.conn())
        .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE subscriptions
                    SET plan = ?2, status = ?3, starts_at = ?4, expires_at = ?5,
                        updated_at = ?6, sync_status = 'PENDING'
                    WHERE id = ?1
                    "#,
                )
                .bind(&id)
                .bind(&plan)
                .bind(status)
                .bind(starts_at)
                .bind(expires_at)
                .bind(now)
                .execute(tx.conn())
                .await?;
                id
            }
            None => {
                let id = new_id();
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions (
                        id, business_id, plan, status, starts_at, expires_at,
                        created_at, updated_at, sync_status, deleted
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, 0)
                    "#,
                )
                .bind(&id)
                .bind(business_id)
                .bind(&plan)
                .bind(status)
                .bind(starts_at)
                .bind(expires_at)
                .bind(now)
                .bind(SyncStatus::Pending)
                .execute(tx.conn())
                .await?;
                id
            }
        };

        append_in(
            tx.conn(),
            NewActivity::new(
                business_id,
                entry_type::SUBSCRIPTION,
                "UPSERT",
                json!({ "plan": plan, "status": status, "expires_at": expires_at }),
            ),
        )
        .await?;

        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = ?1")
                .bind(&id)
                .fetch_one(tx.conn())
                .await?;
        tx.commit().await?;

        info!(business_id = %business_id, plan = %subscription.plan, status = ?status, "Subscription updated");
        Ok(subscription)
    }

    pub async fn current(&self, business_id: &str) -> DbResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE business_id = ?1 AND deleted = 0 LIMIT 1",
        )
        .bind(business_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let fx = setup().await;
        let repo = fx.db.subscriptions();

        assert!(repo.current(&fx.business.id).await.unwrap().is_none());

        let trial = repo
            .upsert_current(&fx.business.id, "starter", SubscriptionStatus::Trial, 0, Some(1_000))
            .await
            .unwrap();
        let active = repo
            .upsert_current(&fx.business.id, "pro", SubscriptionStatus::Active, 0, None)
            .await
            .unwrap();

        assert_eq!(trial.id, active.id);
        assert_eq!(active.plan, "pro");
        assert!(active.is_current(i64::MAX));

        let current = repo.current(&fx.business.id).await.unwrap().unwrap();
        assert_eq!(current.status, SubscriptionStatus::Active);
    }
}
