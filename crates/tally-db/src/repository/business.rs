//! # Business Repository
//!
//! The shop profile and its payment gateway credentials.
//!
//! ## Local-Only Columns
//! ```text
//! businesses
//! ├── name, currency, address, ... tax_rate_bps   → synced
//! ├── paynow_integration_id                        → local
//! └── paynow_integration_key                       → local, never loaded
//!                                                    into `Business`
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_currency, validate_name, validate_tax_rate_bps};
use tally_core::{Business, SyncStatus, ValidationError};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

/// Editable profile fields, used for both create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub currency: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub tax_rate_bps: u32,
}

impl BusinessProfile {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_currency(&self.currency)?;
        validate_tax_rate_bps(self.tax_rate_bps)?;
        Ok(())
    }
}

/// Paynow integration credentials for one business.
#[derive(Clone, sqlx::FromRow)]
pub struct GatewayCredentials {
    pub integration_id: String,
    pub integration_key: String,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("integration_id", &self.integration_id)
            .field("integration_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BusinessRepository {
    db: Database,
}

impl BusinessRepository {
    pub fn new(db: Database) -> Self {
        BusinessRepository { db }
    }

    pub async fn create(&self, profile: BusinessProfile) -> DbResult<Business> {
        profile.validate()?;

        let now = now_millis();
        let business = Business {
            id: new_id(),
            name: profile.name.trim().to_string(),
            currency: profile.currency,
            address: profile.address,
            phone: profile.phone,
            email: profile.email,
            tax_rate_bps: profile.tax_rate_bps,
            paynow_integration_id: None,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO businesses (
                id, name, currency, address, phone, email, tax_rate_bps,
                created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
            "#,
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(&business.currency)
        .bind(&business.address)
        .bind(&business.phone)
        .bind(&business.email)
        .bind(business.tax_rate_bps)
        .bind(business.created_at)
        .bind(business.updated_at)
        .bind(business.sync_status)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &business.id,
                entry_type::BUSINESS,
                "CREATE",
                json!({ "name": business.name, "currency": business.currency }),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(business_id = %business.id, name = %business.name, "Business created");
        Ok(business)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(business)
    }

    pub async fn update_profile(
        &self,
        id: &str,
        profile: BusinessProfile,
        user_id: &str,
    ) -> DbResult<Business> {
        profile.validate()?;

        let mut tx = self.db.begin_exclusive().await?;
        let result = sqlx::query(
            r#"
            UPDATE businesses
            SET name = ?2, currency = ?3, address = ?4, phone = ?5, email = ?6,
                tax_rate_bps = ?7, updated_at = ?8, sync_status = 'PENDING'
            WHERE id = ?1 AND deleted = 0
            "#,
        )
        .bind(id)
        .bind(profile.name.trim())
        .bind(&profile.currency)
        .bind(&profile.address)
        .bind(&profile.phone)
        .bind(&profile.email)
        .bind(profile.tax_rate_bps)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Business", id));
        }

        append_in(
            tx.conn(),
            NewActivity::new(
                id,
                entry_type::BUSINESS,
                "UPDATE",
                json!({ "name": profile.name.trim(), "tax_rate_bps": profile.tax_rate_bps }),
            )
            .by(user_id),
        )
        .await?;

        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?1")
            .bind(id)
            .fetch_one(tx.conn())
            .await?;
        tx.commit().await?;

        Ok(business)
    }

    /// Stores the Paynow integration credentials.
    ///
    /// Credentials are local-only, so the row's sync status is untouched.
    pub async fn set_gateway_credentials(
        &self,
        id: &str,
        integration_id: &str,
        integration_key: &str,
    ) -> DbResult<()> {
        if integration_id.trim().is_empty() {
            return Err(ValidationError::required("integration_id").into());
        }
        if integration_key.trim().is_empty() {
            return Err(ValidationError::required("integration_key").into());
        }

        let mut tx = self.db.begin_exclusive().await?;
        let result = sqlx::query(
            "UPDATE businesses SET paynow_integration_id = ?2, paynow_integration_key = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(integration_id.trim())
        .bind(integration_key.trim())
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Business", id));
        }

        // The key itself is never written to the audit trail
        append_in(
            tx.conn(),
            NewActivity::new(
                id,
                entry_type::BUSINESS,
                "SET_GATEWAY_CREDENTIALS",
                json!({ "integration_id": integration_id.trim() }),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(business_id = %id, "Gateway credentials updated");
        Ok(())
    }

    /// Reads the Paynow credentials; `None` until both are configured.
    pub async fn gateway_credentials(&self, id: &str) -> DbResult<Option<GatewayCredentials>> {
        let credentials = sqlx::query_as::<_, GatewayCredentials>(
            r#"
            SELECT paynow_integration_id AS integration_id,
                   paynow_integration_key AS integration_key
            FROM businesses
            WHERE id = ?1
              AND paynow_integration_id IS NOT NULL
              AND paynow_integration_key IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;

    #[tokio::test]
    async fn test_create_and_get() {
        let fx = setup().await;

        let business = fx.db.businesses().get(&fx.business.id).await.unwrap().unwrap();
        assert_eq!(business.name, "Mbare Grocers");
        assert_eq!(business.sync_status, SyncStatus::Pending);
        assert!(business.paynow_integration_id.is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_currency() {
        let fx = setup().await;

        let err = fx
            .db
            .businesses()
            .create(BusinessProfile {
                name: "Shop".to_string(),
                currency: "dollars".to_string(),
                address: None,
                phone: None,
                email: None,
                tax_rate_bps: 0,
            })
            .await
            .unwrap_err();
        assert!(err.is_domain());
    }

    #[tokio::test]
    async fn test_gateway_credentials_round_trip() {
        let fx = setup().await;
        let repo = fx.db.businesses();

        assert!(repo.gateway_credentials(&fx.business.id).await.unwrap().is_none());

        repo.set_gateway_credentials(&fx.business.id, "1201", "secret-key")
            .await
            .unwrap();

        let credentials = repo.gateway_credentials(&fx.business.id).await.unwrap().unwrap();
        assert_eq!(credentials.integration_id, "1201");
        assert_eq!(credentials.integration_key, "secret-key");
        assert!(!format!("{credentials:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn test_update_profile_resets_sync_status() {
        let fx = setup().await;
        sqlx::query("UPDATE businesses SET sync_status = 'SYNCED'")
            .execute(fx.db.pool())
            .await
            .unwrap();

        let updated = fx
            .db
            .businesses()
            .update_profile(
                &fx.business.id,
                BusinessProfile {
                    name: "Mbare Grocers & Hardware".to_string(),
                    currency: "USD".to_string(),
                    address: None,
                    phone: None,
                    email: None,
                    tax_rate_bps: 1500,
                },
                &fx.owner.id,
            )
            .await
            .unwrap();

        assert_eq!(updated.sync_status, SyncStatus::Pending);
        assert_eq!(updated.tax_rate_bps, 1500);
        assert!(updated.updated_at > fx.business.updated_at);
    }
}
