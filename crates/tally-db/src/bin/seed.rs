//! # Seed Data Generator
//!
//! Populates a database with a demo shop for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - One business ("Demo Tuckshop", USD, 15% VAT included in prices)
//! - An owner (PIN 1234) and a cashier (PIN 0000)
//! - A catalogue across groceries, drinks and household goods
//! - A few walk-in customers

use std::env;

use chrono::Utc;
use tally_core::UserRole;
use tally_db::{BusinessProfile, CustomerDetails, Database, DbConfig, NewProduct, NewUser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, name, price in cents, stock)
const CATALOGUE: &[(&str, &str, i64, i64)] = &[
    ("Groceries", "Roller Meal 10kg", 850, 40),
    ("Groceries", "Rice 2kg", 320, 60),
    ("Groceries", "Sugar 2kg", 250, 50),
    ("Groceries", "Cooking Oil 2L", 450, 30),
    ("Groceries", "Kapenta 250g", 180, 25),
    ("Groceries", "Bread Loaf", 100, 20),
    ("Drinks", "Mazoe Orange 2L", 350, 24),
    ("Drinks", "Coca-Cola 500ml", 80, 96),
    ("Drinks", "Fanta 500ml", 80, 72),
    ("Drinks", "Tanganda Tea 100g", 300, 18),
    ("Drinks", "Chibuku Super 1.25L", 120, 48),
    ("Household", "Sunlight Bar Soap", 75, 36),
    ("Household", "Matches (10 box)", 60, 50),
    ("Household", "Candles 6 pack", 150, 20),
    ("Household", "Paraffin 1L", 130, 3),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Rudo Moyo", "0772123456"),
    ("Tendai Banda", "0712987654"),
    ("Blessing Ncube", "0733555123"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM businesses")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        warn!(businesses = existing, "Database already seeded; delete the file to regenerate");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let business = db
        .businesses()
        .create(BusinessProfile {
            name: "Demo Tuckshop".to_string(),
            currency: "USD".to_string(),
            address: Some("45 Samora Machel Ave, Harare".to_string()),
            phone: Some("+263 24 2700000".to_string()),
            email: None,
            tax_rate_bps: 1500,
        })
        .await?;

    let owner = db
        .users()
        .create(NewUser {
            business_id: business.id.clone(),
            name: "Demo Owner".to_string(),
            email: Some("owner@example.com".to_string()),
            role: UserRole::Owner,
            pin: "1234".to_string(),
        })
        .await?;
    db.users()
        .create(NewUser {
            business_id: business.id.clone(),
            name: "Demo Cashier".to_string(),
            email: None,
            role: UserRole::Cashier,
            pin: "0000".to_string(),
        })
        .await?;

    for (index, (category, name, price_cents, stock)) in CATALOGUE.iter().enumerate() {
        let product = NewProduct {
            business_id: business.id.clone(),
            name: name.to_string(),
            category: Some(category.to_string()),
            sku: Some(format!("{}-{:03}", &category[..3].to_uppercase(), index + 1)),
            barcode: Some(format!("600{:010}", index + 1)),
            price_cents: *price_cents,
            // Cost at roughly 70% of shelf price
            cost_cents: price_cents * 70 / 100,
            stock: *stock,
            low_stock_threshold: 5,
        };

        if let Err(e) = db.products().create(product, &owner.id).await {
            warn!(name = %name, error = %e, "Failed to insert product");
        }
    }

    for (name, phone) in CUSTOMERS {
        db.customers()
            .create(
                &business.id,
                CustomerDetails {
                    name: name.to_string(),
                    phone: Some(phone.to_string()),
                    ..Default::default()
                },
                &owner.id,
            )
            .await?;
    }

    let device_id = db.meta().ensure_device_id().await?;
    let low_stock = db.products().low_stock(&business.id).await?;

    info!(
        business_id = %business.id,
        device_id = %device_id,
        products = db.products().count(&business.id).await?,
        customers = db.customers().count(&business.id).await?,
        low_stock = low_stock.len(),
        elapsed = ?start.elapsed(),
        seeded_at = %Utc::now().to_rfc3339(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
