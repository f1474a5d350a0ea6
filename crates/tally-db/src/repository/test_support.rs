//! Shared fixtures for repository tests.

use tally_core::clock::{new_id, now_millis};
use tally_core::{Business, PaymentMethod, Product, SaleLine, User, UserRole, CreateSaleInput};

use crate::pool::{Database, DbConfig};
use crate::repository::business::BusinessProfile;
use crate::repository::product::NewProduct;

pub(crate) struct Fixture {
    pub db: Database,
    pub business: Business,
    pub owner: User,
    pub manager: User,
    pub cashier: User,
}

pub(crate) async fn setup() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let business = db
        .businesses()
        .create(BusinessProfile {
            name: "Mbare Grocers".to_string(),
            currency: "USD".to_string(),
            address: Some("12 Mbare Musika, Harare".to_string()),
            phone: None,
            email: None,
            tax_rate_bps: 0,
        })
        .await
        .unwrap();

    let owner = insert_user(&db, &business.id, "Tariro", UserRole::Owner).await;
    let manager = insert_user(&db, &business.id, "Farai", UserRole::Manager).await;
    let cashier = insert_user(&db, &business.id, "Chipo", UserRole::Cashier).await;

    Fixture {
        db,
        business,
        owner,
        manager,
        cashier,
    }
}

/// Inserts a user without hashing a PIN (argon2 is slow in debug builds).
async fn insert_user(db: &Database, business_id: &str, name: &str, role: UserRole) -> User {
    let now = now_millis();
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO users (id, business_id, name, role, pin_hash, active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 'unhashed', 1, ?5, ?5)
        "#,
    )
    .bind(&id)
    .bind(business_id)
    .bind(name)
    .bind(role)
    .bind(now)
    .execute(db.pool())
    .await
    .unwrap();

    db.users().get(&id).await.unwrap().unwrap()
}

impl Fixture {
    pub async fn product(&self, name: &str, price_cents: i64, stock: i64) -> Product {
        self.db
            .products()
            .create(
                NewProduct {
                    business_id: self.business.id.clone(),
                    name: name.to_string(),
                    category: None,
                    sku: None,
                    barcode: None,
                    price_cents,
                    cost_cents: 0,
                    stock,
                    low_stock_threshold: 5,
                },
                &self.owner.id,
            )
            .await
            .unwrap()
    }

    pub fn sale(&self, lines: &[(&Product, i64)], method: PaymentMethod) -> CreateSaleInput {
        CreateSaleInput {
            business_id: self.business.id.clone(),
            lines: lines
                .iter()
                .map(|(product, quantity)| SaleLine {
                    product_id: product.id.clone(),
                    unit_price_cents: product.price_cents,
                    quantity: *quantity,
                })
                .collect(),
            discount_cents: 0,
            payment_method: method,
            amount_tendered_cents: 0,
            cashier_id: self.cashier.id.clone(),
            customer_id: None,
            tax_rate_bps: 0,
            enforce_stock: false,
        }
    }

    pub async fn stock_of(&self, product: &Product) -> i64 {
        self.db
            .products()
            .get(&product.id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }
}
