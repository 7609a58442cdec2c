//! Demo data
//!
//! Two verified origins and two products whose complete Farm to Retail
//! chains are backfilled at fixed historical timestamps.

use chrono::{NaiveDate, TimeZone, Utc};
use tracing::info;

use crate::catalog::ProductInput;
use crate::error::LedgerError;
use crate::ledger::{CustodyEventInput, Stage};
use crate::origin::{Coordinates, Location, OriginInput};
use crate::services::Services;

/// What the seed created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub origins: usize,
    pub products: usize,
    pub events: usize,
}

struct DemoProduct {
    product_id: &'static str,
    name: &'static str,
    category: &'static str,
    origin_id: &'static str,
    quality_score: f64,
    harvest: (i32, u32, u32),
    expiry: (i32, u32, u32),
    /// (stage, location, month, day, hour, minute)
    chain: &'static [(Stage, &'static str, u32, u32, u32, u32)],
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        product_id: "PRD-1001",
        name: "Organic Tomatoes",
        category: "Vegetables",
        origin_id: "GVF-001",
        quality_score: 9.2,
        harvest: (2025, 8, 15),
        expiry: (2025, 9, 15),
        chain: &[
            (Stage::Farm, "Green Valley Farms, CA", 8, 15, 8, 0),
            (Stage::Processing, "Fresh Pack Facility, CA", 8, 16, 14, 30),
            (Stage::Distribution, "Regional Hub, CA", 8, 18, 9, 15),
            (Stage::Retail, "SuperMart Store #123", 8, 20, 11, 45),
        ],
    },
    DemoProduct {
        product_id: "PRD-1002",
        name: "Organic Apples",
        category: "Fruit",
        origin_id: "WAO-002",
        quality_score: 9.2,
        harvest: (2025, 8, 15),
        expiry: (2025, 10, 15),
        chain: &[
            (Stage::Farm, "Green Valley Farm, Washington", 8, 15, 7, 0),
            (Stage::Processing, "Pacific Processing Center", 8, 17, 10, 0),
            (Stage::Distribution, "Regional Distribution Hub", 8, 20, 6, 30),
            (Stage::Retail, "FreshMart Store #123", 8, 22, 9, 0),
        ],
    },
];

fn origins() -> Vec<OriginInput> {
    vec![
        OriginInput {
            origin_id: "GVF-001".to_string(),
            farm_name: "Green Valley Farms".to_string(),
            location: Location {
                country: "United States".to_string(),
                region: "Fresno County, California".to_string(),
                coordinates: Some(Coordinates {
                    latitude: 36.7378,
                    longitude: -119.7871,
                }),
            },
            owner_identity: "0x742d35Cc6634C0532925a3b8D5432".to_string(),
            certifications: vec![
                "USDA Organic".to_string(),
                "Fair Trade".to_string(),
                "Non-GMO".to_string(),
            ],
        },
        OriginInput {
            origin_id: "WAO-002".to_string(),
            farm_name: "Green Valley Orchards".to_string(),
            location: Location {
                country: "USA".to_string(),
                region: "Washington State".to_string(),
                coordinates: None,
            },
            owner_identity: "0x9a3f12Bb7741D0642a15c4e2F8801".to_string(),
            certifications: vec!["USDA Organic".to_string(), "Fair Trade".to_string()],
        },
    ]
}

fn date((y, m, d): (i32, u32, u32)) -> Result<NaiveDate, LedgerError> {
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| LedgerError::Internal(format!("invalid demo date {}-{}-{}", y, m, d)))
}

/// Load the demo data set into empty registries
pub fn seed(services: &Services) -> Result<SeedSummary, LedgerError> {
    let mut summary = SeedSummary {
        origins: 0,
        products: 0,
        events: 0,
    };

    for origin in origins() {
        let id = origin.origin_id.clone();
        services.origins.register(origin)?;
        services.origins.verify(&id)?;
        summary.origins += 1;
    }

    for product in PRODUCTS {
        services.catalog.register(ProductInput {
            product_id: product.product_id.to_string(),
            name: product.name.to_string(),
            category: product.category.to_string(),
            origin_id: product.origin_id.to_string(),
            is_organic: true,
            quality_score: product.quality_score,
            harvest_date: date(product.harvest)?,
            expiry_date: date(product.expiry)?,
        })?;
        summary.products += 1;

        let year = product.harvest.0;
        for &(stage, location, month, day, hour, minute) in product.chain {
            let at = Utc
                .with_ymd_and_hms(year, month, day, hour, minute, 0)
                .single()
                .ok_or_else(|| LedgerError::Internal("invalid demo timestamp".to_string()))?;
            services
                .ledger
                .append_event_at(product.product_id, CustodyEventInput::new(stage, location), at)?;
            summary.events += 1;
        }
    }

    info!(
        origins = summary.origins,
        products = summary.products,
        events = summary.events,
        "Demo data seeded"
    );
    Ok(summary)
}
