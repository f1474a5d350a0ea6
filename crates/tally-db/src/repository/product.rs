//! # Product Repository
//!
//! Catalogue CRUD, search and the stock helpers every ledger unit shares.
//!
//! ## Stock Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Who changes products.stock                             │
//! │                                                                         │
//! │  create_sale      ──► apply_stock_delta(-qty)   + SALE log             │
//! │  create_refund    ──► return_stock_in(+qty)     + REFUND log           │
//! │  receive_stock    ──► apply_stock_delta(+qty)   + STOCK/RECEIVE log    │
//! │  adjust_stock     ──► apply_stock_delta(±qty)   + STOCK/ADJUST log     │
//! │                                                                         │
//! │  `update` never touches stock: every change is paired with its         │
//! │  ledger row and audit entry in the same exclusive unit.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Deserialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tally_core::clock::{new_id, now_millis};
use tally_core::validation::{
    validate_name, validate_non_negative, validate_price_cents, validate_required,
    validate_search_query, validate_sku, validate_unit_amount,
};
use tally_core::{CoreError, Product, SyncStatus, ValidationError};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::activity::{append_in, entry_type, NewActivity};

// =============================================================================
// In-Unit Helpers
// =============================================================================

/// Loads a live (non-deleted) product inside the caller's unit.
pub(crate) async fn fetch_live_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1 AND deleted = 0")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

/// Adds `delta` to a product's stock inside the caller's unit and marks the
/// row PENDING.
pub(crate) async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3, sync_status = 'PENDING'
        WHERE id = ?1 AND deleted = 0
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    debug!(product_id = %product_id, delta, "Stock updated");
    Ok(())
}

/// Puts refunded units back on a product, tombstoned or not.
///
/// A sale of a product that was later deleted stays refundable, so this
/// update does not filter on `deleted`.
pub(crate) async fn return_stock_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3, sync_status = 'PENDING'
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    debug!(product_id = %product_id, quantity, "Refunded stock returned");
    Ok(())
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub business_id: String,
    pub name: String,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: i64,
    /// Opening stock.
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

/// Editable catalogue fields. Stock is deliberately absent.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub low_stock_threshold: i64,
}

fn validate_catalogue_fields(
    name: &str,
    sku: Option<&str>,
    price_cents: i64,
    cost_cents: i64,
) -> Result<String, ValidationError> {
    let name = validate_name(name)?;
    if let Some(sku) = sku {
        validate_sku(sku)?;
    }
    validate_price_cents(price_cents)?;
    validate_unit_amount("cost", cost_cents)?;
    Ok(name)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let results = repo.search(&business_id, "mazoe", 20).await?;
/// let product = repo.get(&id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    pub fn new(db: Database) -> Self {
        ProductRepository { db }
    }

    pub async fn create(&self, new_product: NewProduct, user_id: &str) -> DbResult<Product> {
        let name = validate_catalogue_fields(
            &new_product.name,
            new_product.sku.as_deref(),
            new_product.price_cents,
            new_product.cost_cents,
        )?;
        validate_non_negative("stock", new_product.stock)?;
        validate_non_negative("low_stock_threshold", new_product.low_stock_threshold)?;

        let now = now_millis();
        let product = Product {
            id: new_id(),
            business_id: new_product.business_id,
            name,
            category: new_product.category,
            sku: new_product.sku.map(|s| s.trim().to_string()),
            barcode: new_product.barcode,
            price_cents: new_product.price_cents,
            cost_cents: new_product.cost_cents,
            stock: new_product.stock,
            low_stock_threshold: new_product.low_stock_threshold,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            remote_id: None,
            deleted: false,
        };

        let mut tx = self.db.begin_exclusive().await?;
        sqlx::query(
            r#"
            INSERT INTO products (
                id, business_id, name, category, sku, barcode, price_cents, cost_cents,
                stock, low_stock_threshold, created_at, updated_at, sync_status, deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)
            "#,
        )
        .bind(&product.id)
        .bind(&product.business_id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.sync_status)
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &product.business_id,
                entry_type::PRODUCT,
                "CREATE",
                json!({
                    "product_id": product.id,
                    "name": product.name,
                    "price_cents": product.price_cents,
                    "opening_stock": product.stock,
                }),
            )
            .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Gets a product by id, tombstones included.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(product)
    }

    /// Live products ordered by name.
    pub async fn list(&self, business_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE business_id = ?1 AND deleted = 0
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(products)
    }

    /// Searches name, SKU and barcode. An empty query lists products.
    ///
    /// Exact barcode matches come first so a scanner hit is always the top
    /// result.
    pub async fn search(&self, business_id: &str, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit, "Searching products");

        if query.is_empty() {
            return self.list(business_id, limit).await;
        }

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE business_id = ?1 AND deleted = 0
              AND (name LIKE '%' || ?2 || '%'
                   OR sku LIKE '%' || ?2 || '%'
                   OR barcode LIKE '%' || ?2 || '%')
            ORDER BY (barcode = ?2) DESC, name
            LIMIT ?3
            "#,
        )
        .bind(business_id)
        .bind(&query)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    pub async fn update(&self, id: &str, update: ProductUpdate, user_id: &str) -> DbResult<Product> {
        let name = validate_catalogue_fields(
            &update.name,
            update.sku.as_deref(),
            update.price_cents,
            update.cost_cents,
        )?;
        validate_non_negative("low_stock_threshold", update.low_stock_threshold)?;

        let mut tx = self.db.begin_exclusive().await?;
        let before = fetch_live_in(tx.conn(), id).await?;

        sqlx::query(
            r#"
            UPDATE products
            SET name = ?2, category = ?3, sku = ?4, barcode = ?5, price_cents = ?6,
                cost_cents = ?7, low_stock_threshold = ?8, updated_at = ?9,
                sync_status = 'PENDING'
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&update.category)
        .bind(update.sku.as_deref().map(str::trim))
        .bind(&update.barcode)
        .bind(update.price_cents)
        .bind(update.cost_cents)
        .bind(update.low_stock_threshold)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &before.business_id,
                entry_type::PRODUCT,
                "UPDATE",
                json!({
                    "product_id": id,
                    "name": name,
                    "old_price_cents": before.price_cents,
                    "new_price_cents": update.price_cents,
                }),
            )
            .by(user_id),
        )
        .await?;

        let product = fetch_live_in(tx.conn(), id).await?;
        tx.commit().await?;

        Ok(product)
    }

    /// Tombstones a product. Past transaction lines keep their snapshots.
    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        let mut tx = self.db.begin_exclusive().await?;
        let product = fetch_live_in(tx.conn(), id).await?;

        sqlx::query(
            "UPDATE products SET deleted = 1, updated_at = ?2, sync_status = 'PENDING' WHERE id = ?1",
        )
        .bind(id)
        .bind(now_millis())
        .execute(tx.conn())
        .await?;

        append_in(
            tx.conn(),
            NewActivity::new(
                &product.business_id,
                entry_type::PRODUCT,
                "DELETE",
                json!({ "product_id": id, "name": product.name }),
            )
            .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Manual stock correction (breakage, stock take).
    ///
    /// Rejected if it would take stock below zero.
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        reason: &str,
        user_id: &str,
    ) -> DbResult<Product> {
        let reason = validate_required("reason", reason, 500)?;
        if delta == 0 {
            return Err(ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            }
            .into());
        }

        let mut tx = self.db.begin_exclusive().await?;
        let product = fetch_live_in(tx.conn(), id).await?;

        if product.stock + delta < 0 {
            return Err(CoreError::InsufficientStock {
                product: product.name,
                available: product.stock,
                requested: -delta,
            }
            .into());
        }

        apply_stock_delta(tx.conn(), id, delta).await?;
        append_in(
            tx.conn(),
            NewActivity::new(
                &product.business_id,
                entry_type::STOCK,
                "ADJUST",
                json!({
                    "product_id": id,
                    "delta": delta,
                    "stock_before": product.stock,
                    "stock_after": product.stock + delta,
                    "reason": reason,
                }),
            )
            .by(user_id),
        )
        .await?;

        let product = fetch_live_in(tx.conn(), id).await?;
        tx.commit().await?;

        info!(product_id = %id, delta, stock = product.stock, "Stock adjusted");
        Ok(product)
    }

    /// Live products at or below their low-stock threshold.
    pub async fn low_stock(&self, business_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE business_id = ?1 AND deleted = 0 AND stock <= low_stock_threshold
            ORDER BY stock, name
            "#,
        )
        .bind(business_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(products)
    }

    /// Counts live products.
    pub async fn count(&self, business_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE business_id = ?1 AND deleted = 0",
        )
        .bind(business_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;

    #[tokio::test]
    async fn test_create_and_search() {
        let fx = setup().await;
        let repo = fx.db.products();

        repo.create(
            NewProduct {
                business_id: fx.business.id.clone(),
                name: "Mazoe Orange 2L".to_string(),
                category: Some("Drinks".to_string()),
                sku: Some("MAZOE-2L".to_string()),
                barcode: Some("6001240100011".to_string()),
                price_cents: 450,
                cost_cents: 320,
                stock: 24,
                low_stock_threshold: 6,
            },
            &fx.owner.id,
        )
        .await
        .unwrap();
        fx.product("Bread White 700g", 110, 40).await;

        let by_name = repo.search(&fx.business.id, "mazoe", 10).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].sku.as_deref(), Some("MAZOE-2L"));

        let by_barcode = repo.search(&fx.business.id, "6001240100011", 10).await.unwrap();
        assert_eq!(by_barcode.len(), 1);

        let all = repo.search(&fx.business.id, "  ", 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(repo.count(&fx.business.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_product() {
        let fx = setup().await;

        let err = fx
            .db
            .products()
            .create(
                NewProduct {
                    business_id: fx.business.id.clone(),
                    name: "Sugar 2kg".to_string(),
                    category: None,
                    sku: Some("bad sku".to_string()),
                    barcode: None,
                    price_cents: 300,
                    cost_cents: 0,
                    stock: 0,
                    low_stock_threshold: 0,
                },
                &fx.owner.id,
            )
            .await
            .unwrap_err();
        assert!(err.is_domain());
        assert_eq!(fx.db.products().count(&fx.business.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let fx = setup().await;
        let product = fx.product("Cooking Oil 2L", 420, 12).await;

        let updated = fx
            .db
            .products()
            .update(
                &product.id,
                ProductUpdate {
                    name: "Cooking Oil 2L".to_string(),
                    category: Some("Groceries".to_string()),
                    sku: None,
                    barcode: None,
                    price_cents: 450,
                    cost_cents: 380,
                    low_stock_threshold: 3,
                },
                &fx.manager.id,
            )
            .await
            .unwrap();

        assert_eq!(updated.price_cents, 450);
        assert_eq!(updated.stock, 12);
        assert!(updated.updated_at > product.updated_at);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_product() {
        let fx = setup().await;
        let product = fx.product("Candles", 50, 10).await;

        fx.db
            .products()
            .soft_delete(&product.id, &fx.owner.id)
            .await
            .unwrap();

        let stored = fx.db.products().get(&product.id).await.unwrap().unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.sync_status, SyncStatus::Pending);
        assert_eq!(fx.db.products().count(&fx.business.id).await.unwrap(), 0);

        let err = fx
            .db
            .products()
            .soft_delete(&product.id, &fx.owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let fx = setup().await;
        let product = fx.product("Eggs (tray)", 500, 3).await;
        let repo = fx.db.products();

        let adjusted = repo
            .adjust_stock(&product.id, -2, "Broken in storeroom", &fx.manager.id)
            .await
            .unwrap();
        assert_eq!(adjusted.stock, 1);

        let err = repo
            .adjust_stock(&product.id, -5, "Stock take", &fx.manager.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 1, requested: 5, .. })
        ));
        assert_eq!(fx.stock_of(&product).await, 1);

        let logs = fx
            .db
            .activity()
            .list_by_type(&fx.business.id, entry_type::STOCK, 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "ADJUST");
        assert_eq!(logs[0].details_json()["stock_after"], 1);
    }

    #[tokio::test]
    async fn test_low_stock() {
        let fx = setup().await;
        fx.product("Matches", 10, 2).await;
        fx.product("Rice 2kg", 250, 30).await;

        let low = fx.db.products().low_stock(&fx.business.id).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Matches");
    }
}
