//! # User Repository
//!
//! Staff accounts. PINs are stored as argon2 PHC strings and verified
//! locally; the hash never leaves the device.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::Deserialize;
use serde_json::json;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_name, validate_pin};
use tally_core::{SyncStatus, User, UserRole};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub business_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub pin: String,
}

/// Hashes a PIN for storage.
pub fn hash_pin(pin: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash PIN: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a PIN against its stored hash. Corrupt hashes never verify.
fn verify_pin_hash(pin: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed_hash)
        .is_ok()
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    pub async fn create(&self, new_user: NewUser) -> DbResult<User> {
        let name = validate_name(&new_user.name)?;
        validate_pin(&new_user.pin)?;

        let now = now_millis();
        let user = User {
            id: new_id(),
            business_id: new_user.business_id,
            name,
            email: new_user.email,
            role: new_user.role,
            pin_hash: hash_pin(&new_user.pin)?,
            active: true,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO users (
                id, business_id, name, email, role, pin_hash, active,
                created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, 0)
            "#,
        )
        .bind(&user.id)
        .bind(&user.business_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(&user.pin_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.sync_status)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &user.business_id,
                entry_type::USER,
                "CREATE",
                json!({ "user_id": user.id, "name": user.name, "role": user.role }),
            ),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = %user.id, role = ?user.role, "User created");
        Ok(user)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(user)
    }

    /// Active, non-deleted staff ordered by name.
    pub async fn list(&self, business_id: &str) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE business_id = ?1 AND deleted = 0 AND active = 1 ORDER BY name",
        )
        .bind(business_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    /// Checks a PIN at sign-in. Inactive or unknown users never verify.
    pub async fn verify_pin(&self, user_id: &str, pin: &str) -> DbResult<bool> {
        let Some(user) = self.get(user_id).await? else {
            return Ok(false);
        };

        if !user.active || user.deleted {
            warn!(user_id = %user_id, "PIN check for inactive user");
            return Ok(false);
        }

        let verified = verify_pin_hash(pin, &user.pin_hash);
        if !verified {
            warn!(user_id = %user_id, "PIN verification failed");
        }
        Ok(verified)
    }

    /// Deactivates a user and tombstones the row so the removal syncs.
    pub async fn deactivate(&self, user_id: &str, by: &str) -> DbResult<()> {
        let mut tx = self.db.begin_exclusive().await?;

        let business_id: Option<String> =
            sqlx::query_scalar("SELECT business_id FROM users WHERE id = ?1 AND deleted = 0")
                .bind(user_id)
                .fetch_optional(tx.conn())
                .await?;
        let business_id = business_id.ok_or_else(|| DbError::not_found("User", user_id))?;

        sqlx::query(
            r#"
            UPDATE users
            SET active = 0, deleted = 1, updated_at = ?2, sync_status = 'PENDING'
            WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &business_id,
                entry_type::USER,
                "DEACTIVATE",
                json!({ "user_id": user_id }),
            )
            .by(by),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = %user_id, "User deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;

    #[tokio::test]
    async fn test_create_and_verify_pin() {
        let fx = setup().await;

        let user = fx
            .db
            .users()
            .create(NewUser {
                business_id: fx.business.id.clone(),
                name: "Nyasha".to_string(),
                email: None,
                role: UserRole::Cashier,
                pin: "4821".to_string(),
            })
            .await
            .unwrap();

        assert!(user.pin_hash.starts_with("$argon2"));
        assert!(fx.db.users().verify_pin(&user.id, "4821").await.unwrap());
        assert!(!fx.db.users().verify_pin(&user.id, "0000").await.unwrap());

        // The hash is never serialized
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("pin_hash").is_none());
    }

    #[tokio::test]
    async fn test_rejects_short_pin() {
        let fx = setup().await;

        let err = fx
            .db
            .users()
            .create(NewUser {
                business_id: fx.business.id.clone(),
                name: "Nyasha".to_string(),
                email: None,
                role: UserRole::Cashier,
                pin: "12".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_domain());
    }

    #[tokio::test]
    async fn test_deactivate_tombstones_user() {
        let fx = setup().await;

        fx.db
            .users()
            .deactivate(&fx.cashier.id, &fx.owner.id)
            .await
            .unwrap();

        let user = fx.db.users().get(&fx.cashier.id).await.unwrap().unwrap();
        assert!(!user.active);
        assert!(user.deleted);
        assert_eq!(user.sync_status, SyncStatus::Pending);

        let listed = fx.db.users().list(&fx.business.id).await.unwrap();
        assert!(listed.iter().all(|u| u.id != fx.cashier.id));
        assert!(!fx.db.users().verify_pin(&fx.cashier.id, "1234").await.unwrap());

        let err = fx
            .db
            .users()
            .deactivate(&fx.cashier.id, &fx.owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
