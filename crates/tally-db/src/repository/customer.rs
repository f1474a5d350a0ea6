//! # Customer Repository
//!
//! Customer records for receipts and account sales.

use serde::Deserialize;
use serde_json::json;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{validate_name, validate_search_query};
use tally_core::{Customer, SyncStatus};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

/// Customer fields for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: Database,
}

impl CustomerRepository {
    pub fn new(db: Database) -> Self {
        CustomerRepository { db }
    }

    pub async fn create(
        &self,
        business_id: &str,
        details: CustomerDetails,
        user_id: &str,
    ) -> DbResult<Customer> {
        let name = validate_name(&details.name)?;

        let now = now_millis();
        let customer = Customer {
            id: new_id(),
            business_id: business_id.to_string(),
            name,
            phone: details.phone,
            email: details.email,
            address: details.address,
            notes: details.notes,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, business_id, name, phone, email, address, notes,
                created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.business_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .bind(customer.sync_status)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                business_id,
                entry_type::CUSTOMER,
                "CREATE",
                json!({ "customer_id": customer.id, "name": customer.name }),
            )
            .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(customer)
    }

    pub async fn list(&self, business_id: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE business_id = ?1 AND deleted = 0 ORDER BY name LIMIT ?2",
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(customers)
    }

    /// Matches name, phone or email.
    pub async fn search(&self, business_id: &str, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return self.list(business_id, limit).await;
        }

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE business_id = ?1 AND deleted = 0
              AND (name LIKE '%' || ?2 || '%'
                   OR phone LIKE '%' || ?2 || '%'
                   OR email LIKE '%' || ?2 || '%')
            ORDER BY name
            LIMIT ?3
            "#,
        )
        .bind(business_id)
        .bind(&query)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(customers)
    }

    pub async fn update(&self, id: &str, details: CustomerDetails, user_id: &str) -> DbResult<Customer> {
        let name = validate_name(&details.name)?;

        let mut tx = self.db.begin_exclusive().await?;
        let business_id: Option<String> =
            sqlx::query_scalar("SELECT business_id FROM customers WHERE id = ?1 AND deleted = 0")
                .bind(id)
                .fetch_optional(tx.conn())
                .await?;
        let business_id = business_id.ok_or_else(|| DbError::not_found("Customer", id))?;

        sqlx::query(
            r#"
            UPDATE customers
            SET name = ?2, phone = ?3, email = ?4, address = ?5, notes = ?6,
                updated_at = ?7, sync_status = 'PENDING'
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.address)
        .bind(&details.notes)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &business_id,
                entry_type::CUSTOMER,
                "UPDATE",
                json!({ "customer_id": id, "name": name }),
            )
            .by(user_id),
        )
        .await?;

        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_one(tx.conn())
            .await?;
        tx.commit().await?;

        Ok(customer)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        let mut tx = self.db.begin_exclusive().await?;
        let business_id: Option<String> =
            sqlx::query_scalar("SELECT business_id FROM customers WHERE id = ?1 AND deleted = 0")
                .bind(id)
                .fetch_optional(tx.conn())
                .await?;
        let business_id = business_id.ok_or_else(|| DbError::not_found("Customer", id))?;

        sqlx::query(
            "UPDATE customers SET deleted = 1, updated_at = ?2, sync_status = 'PENDING' WHERE id = ?1",
        )
        .bind(id)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &business_id,
                entry_type::CUSTOMER,
                "DELETE",
                json!({ "customer_id": id }),
            )
            .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn count(&self, business_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers WHERE business_id = ?1 AND deleted = 0",
        )
        .bind(business_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }
}
