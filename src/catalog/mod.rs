//! Product catalog
//!
//! Registers products against a known origin and projects each product's
//! static attributes together with its custody chain. The chain itself lives
//! in the [`ProvenanceLedger`]; the catalog never mutates it.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{check_identifier, check_required, LedgerError};
use crate::events::{EventBus, LedgerEvent};
use crate::ledger::{ChainEntry, CustodyEvent, ProvenanceLedger};
use crate::origin::OriginRegistry;

/// Status of a product with an empty chain
pub const STATUS_REGISTERED: &str = "Registered";

pub const MIN_QUALITY_SCORE: f64 = 0.0;
pub const MAX_QUALITY_SCORE: f64 = 10.0;

/// Caller-supplied fields for a new product
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductInput {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub origin_id: String,
    #[serde(default)]
    pub is_organic: bool,
    pub quality_score: f64,
    pub harvest_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

/// Static product attributes, fixed at registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProfile {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub origin_id: String,
    pub is_organic: bool,
    pub quality_score: f64,
    pub harvest_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub registered_at: DateTime<Utc>,
}

/// A product with its derived status and full chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(flatten)]
    pub profile: ProductProfile,
    pub status: String,
    pub chain: Vec<CustodyEvent>,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub origin_id: String,
    pub status: String,
    pub event_count: usize,
}

/// Stage name of the last event, or `Registered`
pub fn derive_status(chain: &[CustodyEvent]) -> String {
    chain
        .last()
        .map(|e| e.stage.to_string())
        .unwrap_or_else(|| STATUS_REGISTERED.to_string())
}

impl ProductRecord {
    fn from_entries(profile: &ProductProfile, entries: &[ChainEntry]) -> Self {
        let chain: Vec<CustodyEvent> = entries.iter().map(|e| e.event.clone()).collect();
        Self {
            profile: profile.clone(),
            status: derive_status(&chain),
            chain,
        }
    }
}

impl ProductInput {
    fn validate(&self) -> Result<(), String> {
        check_identifier("productId", &self.product_id)?;
        check_identifier("originId", &self.origin_id)?;
        check_required("name", &self.name)?;
        check_required("category", &self.category)?;

        if !self.quality_score.is_finite()
            || self.quality_score < MIN_QUALITY_SCORE
            || self.quality_score > MAX_QUALITY_SCORE
        {
            return Err(format!(
                "qualityScore must be between {} and {}, got {}",
                MIN_QUALITY_SCORE, MAX_QUALITY_SCORE, self.quality_score
            ));
        }
        if self.expiry_date < self.harvest_date {
            return Err(format!(
                "expiryDate {} is before harvestDate {}",
                self.expiry_date, self.harvest_date
            ));
        }
        Ok(())
    }

    fn into_profile(self, now: DateTime<Utc>) -> ProductProfile {
        ProductProfile {
            product_id: self.product_id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            origin_id: self.origin_id,
            is_organic: self.is_organic,
            quality_score: self.quality_score,
            harvest_date: self.harvest_date,
            expiry_date: self.expiry_date,
            registered_at: now,
        }
    }
}

pub struct ProductCatalog {
    ledger: Arc<ProvenanceLedger>,
    origins: Arc<OriginRegistry>,
    events: Option<Arc<EventBus>>,
}

impl ProductCatalog {
    pub fn new(ledger: Arc<ProvenanceLedger>) -> Self {
        let origins = Arc::clone(ledger.origins());
        Self {
            ledger,
            origins,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a product. Its origin must exist but need not be verified yet.
    pub fn register(&self, input: ProductInput) -> Result<ProductRecord, LedgerError> {
        input.validate().map_err(LedgerError::InvalidProduct)?;
        if self.ledger.contains_product(&input.product_id) {
            return Err(LedgerError::DuplicateProduct(input.product_id));
        }
        if !self.origins.contains(&input.origin_id) {
            return Err(LedgerError::OriginNotFound(input.origin_id));
        }

        let profile = input.into_profile(Utc::now());
        // The ledger's insert is the authoritative duplicate check
        self.ledger.open_product(profile.clone())?;

        info!(
            product_id = %profile.product_id,
            origin_id = %profile.origin_id,
            "Product registered"
        );
        if let Some(events) = &self.events {
            events.emit(LedgerEvent::ProductRegistered {
                product_id: profile.product_id.clone(),
                origin_id: profile.origin_id.clone(),
            });
        }

        Ok(ProductRecord {
            profile,
            status: STATUS_REGISTERED.to_string(),
            chain: Vec::new(),
        })
    }

    /// Product with current status and a snapshot of its chain
    pub fn get(&self, product_id: &str) -> Result<ProductRecord, LedgerError> {
        self.ledger.read_product(product_id, ProductRecord::from_entries)
    }

    /// All products, ordered by id
    pub fn list(&self) -> Vec<ProductSummary> {
        self.ledger
            .product_ids()
            .into_iter()
            .filter_map(|id| {
                self.ledger
                    .read_product(&id, |profile, entries| ProductSummary {
                        product_id: profile.product_id.clone(),
                        name: profile.name.clone(),
                        category: profile.category.clone(),
                        origin_id: profile.origin_id.clone(),
                        status: entries
                            .last()
                            .map(|e| e.event.stage.to_string())
                            .unwrap_or_else(|| STATUS_REGISTERED.to_string()),
                        event_count: entries.len(),
                    })
                    .ok()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ledger.product_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
