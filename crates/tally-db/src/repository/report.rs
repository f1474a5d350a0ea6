//! # Report Repository
//!
//! Read-only aggregations over committed ledger rows. Ranges are
//! `[from, to)` in epoch milliseconds; days are UTC calendar days.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::DbResult;

/// Headline figures for a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Σ totals of sales (refunds excluded).
    pub gross_sales_cents: i64,
    /// Σ refunded amounts, as a positive number.
    pub refunds_cents: i64,
    pub net_sales_cents: i64,
    pub sale_count: i64,
    /// Gross sales / sale count, truncated; zero with no sales.
    pub average_sale_cents: i64,
    pub low_stock_count: i64,
    pub product_count: i64,
    pub customer_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    /// Sales minus refunds.
    pub net_cents: i64,
    /// Sales only.
    pub sale_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    /// Units sold net of refunds.
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, FromRow)]
struct SalesTotals {
    gross: i64,
    refunds: i64,
    sale_count: i64,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    pub async fn dashboard_stats(
        &self,
        business_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<DashboardStats> {
        let totals = sqlx::query_as::<_, SalesTotals>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN is_refund = 0 THEN total_cents ELSE 0 END), 0) AS gross,
                COALESCE(SUM(CASE WHEN is_refund = 1 THEN -total_cents ELSE 0 END), 0) AS refunds,
                COALESCE(SUM(CASE WHEN is_refund = 0 THEN 1 ELSE 0 END), 0) AS sale_count
            FROM transactions
            WHERE business_id = ?1 AND deleted = 0
              AND created_at >= ?2 AND created_at < ?3
            "#,
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let low_stock_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products
            WHERE business_id = ?1 AND deleted = 0 AND stock <= low_stock_threshold
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        let product_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE business_id = ?1 AND deleted = 0",
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        let customer_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers WHERE business_id = ?1 AND deleted = 0",
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        let average_sale_cents = if totals.sale_count > 0 {
            totals.gross / totals.sale_count
        } else {
            0
        };

        Ok(DashboardStats {
            gross_sales_cents: totals.gross,
            refunds_cents: totals.refunds,
            net_sales_cents: totals.gross - totals.refunds,
            sale_count: totals.sale_count,
            average_sale_cents,
            low_stock_count,
            product_count,
            customer_count,
        })
    }

    /// Net takings per UTC day, oldest first. Days without activity are
    /// omitted.
    pub async fn sales_by_day(
        &self,
        business_id: &str,
        from: i64,
        to: i64,
    ) -> DbResult<Vec<DailySales>> {
        let days = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT
                date(created_at / 1000, 'unixepoch') AS day,
                COALESCE(SUM(total_cents), 0) AS net_cents,
                COALESCE(SUM(CASE WHEN is_refund = 0 THEN 1 ELSE 0 END), 0) AS sale_count
            FROM transactions
            WHERE business_id = ?1 AND deleted = 0
              AND created_at >= ?2 AND created_at < ?3
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(days)
    }

    /// Best sellers by units, net of refunds.
    pub async fn top_products(
        &self,
        business_id: &str,
        from: i64,
        to: i64,
        limit: u32,
    ) -> DbResult<Vec<TopProduct>> {
        let products = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                ti.product_id AS product_id,
                MAX(ti.name) AS name,
                SUM(ti.quantity) AS quantity,
                SUM(ti.line_total_cents) AS revenue_cents
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            WHERE t.business_id = ?1 AND t.deleted = 0 AND ti.deleted = 0
              AND t.created_at >= ?2 AND t.created_at < ?3
            GROUP BY ti.product_id
            HAVING SUM(ti.quantity) > 0
            ORDER BY quantity DESC, revenue_cents DESC
            LIMIT ?4
            "#,
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;
    use tally_core::clock::{now_millis, to_datetime};
    use tally_core::{CreateRefundInput, PaymentMethod};

    #[tokio::test]
    async fn test_reports_net_out_refunds() {
        let fx = setup().await;
        let start = now_millis();

        let tea = fx.product("Tanganda Tea 100g", 300, 50).await;
        let sugar = fx.product("Sugar 2kg", 250, 2).await;

        let first = fx
            .db
            .sales()
            .create_sale(fx.sale(&[(&tea, 2), (&sugar, 1)], PaymentMethod::Card))
            .await
            .unwrap();
        fx.db
            .sales()
            .create_sale(fx.sale(&[(&tea, 1)], PaymentMethod::MobileMoney))
            .await
            .unwrap();
        let refunded = fx
            .db
            .sales()
            .create_sale(fx.sale(&[(&sugar, 1)], PaymentMethod::Card))
            .await
            .unwrap();
        fx.db
            .refunds()
            .create_refund(CreateRefundInput {
                original_transaction_id: refunded.transaction.id.clone(),
                cashier_id: fx.cashier.id.clone(),
                approved_by: None,
                reason: None,
            })
            .await
            .unwrap();

        let end = now_millis() + 1;
        let reports = fx.db.reports();

        let stats = reports.dashboard_stats(&fx.business.id, start, end).await.unwrap();
        assert_eq!(stats.gross_sales_cents, 850 + 300 + 250);
        assert_eq!(stats.refunds_cents, 250);
        assert_eq!(stats.net_sales_cents, 1150);
        assert_eq!(stats.sale_count, 3);
        assert_eq!(stats.average_sale_cents, 1400 / 3);
        assert_eq!(stats.product_count, 2);
        // Sugar: 2 − 1 − 1 + 1 = 1, under the threshold of 5
        assert_eq!(stats.low_stock_count, 1);
        assert_eq!(stats.customer_count, 0);

        let days = reports.sales_by_day(&fx.business.id, start, end).await.unwrap();
        let today = to_datetime(first.transaction.created_at).unwrap().date_naive();
        let total_net: i64 = days.iter().map(|d| d.net_cents).sum();
        let total_count: i64 = days.iter().map(|d| d.sale_count).sum();
        assert_eq!(total_net, 1150);
        assert_eq!(total_count, 3);
        assert!(days.iter().any(|d| d.day == today));

        let top = reports.top_products(&fx.business.id, start, end, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, tea.id);
        assert_eq!(top[0].quantity, 3);
        assert_eq!(top[0].revenue_cents, 900);
        assert_eq!(top[1].quantity, 1);
    }

    #[tokio::test]
    async fn test_empty_period() {
        let fx = setup().await;
        let stats = fx.db.reports().dashboard_stats(&fx.business.id, 0, 1).await.unwrap();

        assert_eq!(stats.sale_count, 0);
        assert_eq!(stats.average_sale_cents, 0);
        assert!(fx
            .db
            .reports()
            .sales_by_day(&fx.business.id, 0, 1)
            .await
            .unwrap()
            .is_empty());
    }
}
