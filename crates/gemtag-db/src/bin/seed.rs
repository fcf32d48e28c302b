//! # Seed Data Generator
//!
//! Populates the database with tagged items for development, going through
//! the allocator the same way batch generation does, then deletes some items
//! so the streams have gaps to reuse.
//!
//! ## Usage
//! ```bash
//! # 200 items per category for brand MG (default)
//! cargo run -p gemtag-db --bin seed
//!
//! # Custom amount, brand and gap spacing
//! cargo run -p gemtag-db --bin seed -- --count 1000 --brand KJ --gap-every 5
//!
//! # Specify database path
//! cargo run -p gemtag-db --bin seed -- --db ./data/gemtag.db
//! ```
//!
//! ## Generated Data
//! For each category (rings, bangles, necklaces, earrings, pendants):
//! - `count` items saved in batches of up to 50
//! - every `gap-every`-th item deleted afterwards, leaving a gap

use chrono::{Datelike, Utc};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gemtag_core::CounterKey;
use gemtag_db::{AllocatorConfig, Database, DbConfig};

/// Category codes for realistic test data
const CATEGORIES: &[(&str, &str)] = &[
    ("RNG", "Rings"),
    ("BNG", "Bangles"),
    ("NKL", "Necklaces"),
    ("ERG", "Earrings"),
    ("PDT", "Pendants"),
];

/// Largest batch printed in one go
const BATCH_SIZE: u32 = 50;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gemtag=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: u32 = 200;
    let mut gap_every: u32 = 7;
    let mut db_path = String::from("./gemtag_dev.db");
    let mut brand = String::from("MG");
    let mut location = String::from("WH1");
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--count" | "-c", Some(v)) => {
                count = v.parse().unwrap_or(200);
                i += 1;
            }
            ("--gap-every" | "-g", Some(v)) => {
                gap_every = v.parse().unwrap_or(7);
                i += 1;
            }
            ("--db" | "-d", Some(v)) => {
                db_path = v;
                i += 1;
            }
            ("--brand" | "-b", Some(v)) => {
                brand = v.to_uppercase();
                i += 1;
            }
            ("--location" | "-l", Some(v)) => {
                location = v.to_uppercase();
                i += 1;
            }
            ("--config", Some(v)) => {
                config_path = Some(v.into());
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!("Gemtag Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>        Items per category (default: 200)");
                println!("  -g, --gap-every <N>    Delete every Nth item, 0 for none (default: 7)");
                println!("  -b, --brand <CODE>     Brand code (default: MG)");
                println!("  -l, --location <CODE>  Location code (default: WH1)");
                println!("  -d, --db <PATH>        Database file path (default: ./gemtag_dev.db)");
                println!("      --config <PATH>    Allocator config file");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let allocator_config = AllocatorConfig::load_or_default(config_path);
    let year = Utc::now().year();

    println!("Gemtag Seed Data Generator");
    println!("==========================");
    println!("Database:  {}", db_path);
    println!("Brand:     {}", brand);
    println!("Location:  {}", location);
    println!("Per class: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let allocator = db.allocator(allocator_config);

    let existing = db.items().count(None).await?;
    if existing > 0 {
        println!("Database already has {} tagged items", existing);
        println!("  Skipping seed to avoid mixing runs.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut saved = 0usize;
    let mut deleted = 0usize;

    for (category_code, label) in CATEGORIES {
        let key = CounterKey::new(&brand, category_code, year)?.to_string();
        info!(counter_key = %key, label, "Seeding category");

        let mut remaining = count;
        while remaining > 0 {
            let batch = remaining.min(BATCH_SIZE);
            let reservation = allocator.reserve_serials(&key, batch).await?;
            let items = allocator
                .commit_batch(&reservation, reservation.new_items(&location)?)
                .await?;

            saved += items.len();
            remaining -= batch;
        }

        if gap_every > 0 {
            for item in db.items().list_for_category_year(category_code, year).await? {
                if item.serial % gap_every == 0 {
                    if let Err(e) = db.items().delete(&item.id).await {
                        warn!(barcode = %item.barcode, error = %e, "Failed to delete item");
                        continue;
                    }
                    deleted += 1;
                }
            }
        }

        let status = allocator.counter_status(&key).await?;
        println!(
            "  {:<10} {}  counter={:<5} live={:<5} gaps={}",
            label,
            key,
            status.value(),
            status.live_items,
            status.gaps.len()
        );
    }

    let elapsed = start.elapsed();
    println!();
    println!("Saved {} items, deleted {} in {:?}", saved, deleted, elapsed);

    db.close().await;
    Ok(())
}
