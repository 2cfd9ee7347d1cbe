//! # Seed Data Generator
//!
//! Populates the database with sample coupons for development and QA.
//!
//! ## Usage
//! ```bash
//! # Seed ./sprig_dev.db
//! cargo run -p sprig-db --bin seed
//!
//! # Specify database path
//! cargo run -p sprig-db --bin seed -- --db ./data/sprig.db
//! ```
//!
//! ## Generated Coupons
//! | Code        | Discount         | Rules                               |
//! |-------------|------------------|-------------------------------------|
//! | SAVE10      | 10%              | storewide                           |
//! | WELCOME5    | $5.00 off        | $25.00 minimum, once per customer   |
//! | SHIPFREE    | free shipping    | storewide                           |
//! | TEATIME20   | 20%              | tea blends only, 100 uses           |
//! | SUMMER15    | 15%              | expired                             |
//! | HOLIDAY25   | 25%              | deactivated                         |

use chrono::{Duration, Utc};
use std::env;

use sprig_core::{Discount, Money};
use sprig_db::{Database, DbConfig, NewCoupon};

fn sample_coupons() -> Vec<NewCoupon> {
    let now = Utc::now();
    vec![
        NewCoupon::new("SAVE10", Discount::Percentage { bps: 1000 }),
        NewCoupon::new(
            "WELCOME5",
            Discount::FixedAmount {
                amount: Money::from_cents(500),
            },
        )
        .min_order_total(Money::from_cents(2500))
        .per_customer_limit(1),
        NewCoupon::new("SHIPFREE", Discount::FreeShipping),
        NewCoupon::new("TEATIME20", Discount::Percentage { bps: 2000 })
            .products(&["calm-blend", "morning-ritual", "sleepy-chamomile"])
            .max_uses(100),
        NewCoupon::new("SUMMER15", Discount::Percentage { bps: 1500 })
            .window(Some(now - Duration::days(120)), Some(now - Duration::days(30))),
        NewCoupon::new("HOLIDAY25", Discount::Percentage { bps: 2500 }).inactive(),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./sprig_dev.db");

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
                println!("Sprig Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./sprig_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Sprig Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.coupons().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} coupons", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut created = 0;
    for coupon in sample_coupons() {
        match db.coupons().insert(&coupon).await {
            Ok(record) => {
                println!("  + {:<10} {:?}", record.code, coupon.discount);
                created += 1;
            }
            Err(e) => eprintln!("Failed to insert {}: {}", coupon.code, e),
        }
    }

    println!();
    println!("✓ Created {} coupons", created);

    db.close().await;
    Ok(())
}
