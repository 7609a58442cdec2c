//! Origin registry - verified production sources
//!
//! An origin (farm or facility) is registered once and may later be verified.
//! Verification is one-way: `verified` only moves from false to true.
//! Products reference origins by id; records are never copied into products.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{check_identifier, check_required, LedgerError};
use crate::events::{EventBus, LedgerEvent};

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Structured origin location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.region, self.country)
    }
}

/// Caller-supplied fields for a new origin
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OriginInput {
    pub origin_id: String,
    pub farm_name: String,
    pub location: Location,
    pub owner_identity: String,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// A registered origin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRecord {
    pub origin_id: String,
    pub farm_name: String,
    pub location: Location,
    /// Opaque reference to an externally verified identity
    pub owner_identity: String,
    pub certifications: Vec<String>,
    pub verified: bool,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl OriginInput {
    fn validate(&self) -> Result<(), String> {
        check_identifier("originId", &self.origin_id)?;
        check_required("farmName", &self.farm_name)?;
        check_required("ownerIdentity", &self.owner_identity)?;
        check_required("location.country", &self.location.country)?;
        check_required("location.region", &self.location.region)?;

        if let Some(coords) = self.location.coordinates {
            if !(-90.0..=90.0).contains(&coords.latitude) {
                return Err(format!("latitude out of range: {}", coords.latitude));
            }
            if !(-180.0..=180.0).contains(&coords.longitude) {
                return Err(format!("longitude out of range: {}", coords.longitude));
            }
        }

        let mut seen = HashSet::new();
        for cert in &self.certifications {
            let cert = cert.trim();
            if cert.is_empty() {
                return Err("certifications must not contain blank entries".to_string());
            }
            if !seen.insert(cert) {
                return Err(format!("duplicate certification: {}", cert));
            }
        }
        Ok(())
    }

    fn into_record(self, now: DateTime<Utc>) -> OriginRecord {
        OriginRecord {
            origin_id: self.origin_id,
            farm_name: self.farm_name.trim().to_string(),
            location: Location {
                country: self.location.country.trim().to_string(),
                region: self.location.region.trim().to_string(),
                coordinates: self.location.coordinates,
            },
            owner_identity: self.owner_identity.trim().to_string(),
            certifications: self
                .certifications
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect(),
            verified: false,
            registered_at: now,
            verified_at: None,
        }
    }
}

/// Registry of production origins
///
/// Writes are serialized per `origin_id` by the map's entry locking; writes to
/// different origins do not contend beyond a shard.
pub struct OriginRegistry {
    origins: DashMap<String, OriginRecord>,
    events: Option<Arc<EventBus>>,
}

impl OriginRegistry {
    pub fn new() -> Self {
        Self {
            origins: DashMap::new(),
            events: None,
        }
    }

    /// Attach an event bus for audit notifications
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a new, unverified origin
    pub fn register(&self, input: OriginInput) -> Result<OriginRecord, LedgerError> {
        input.validate().map_err(LedgerError::InvalidOrigin)?;

        let record = match self.origins.entry(input.origin_id.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateOrigin(input.origin_id)),
            Entry::Vacant(slot) => slot.insert(input.into_record(Utc::now())).clone(),
        };

        info!(origin_id = %record.origin_id, farm_name = %record.farm_name, "Origin registered");
        self.emit(LedgerEvent::OriginRegistered {
            origin_id: record.origin_id.clone(),
            farm_name: record.farm_name.clone(),
        });
        Ok(record)
    }

    /// Mark an origin verified. Verifying twice is a successful no-op.
    pub fn verify(&self, origin_id: &str) -> Result<OriginRecord, LedgerError> {
        let (record, changed) = {
            let mut entry = self
                .origins
                .get_mut(origin_id)
                .ok_or_else(|| LedgerError::OriginNotFound(origin_id.to_string()))?;
            let changed = !entry.verified;
            if changed {
                entry.verified = true;
                entry.verified_at = Some(Utc::now());
            }
            (entry.clone(), changed)
        };

        if changed {
            info!(origin_id = %origin_id, "Origin verified");
            self.emit(LedgerEvent::OriginVerified {
                origin_id: origin_id.to_string(),
            });
        } else {
            debug!(origin_id = %origin_id, "Origin already verified");
        }
        Ok(record)
    }

    pub fn get(&self, origin_id: &str) -> Result<OriginRecord, LedgerError> {
        self.origins
            .get(origin_id)
            .map(|r| r.clone())
            .ok_or_else(|| LedgerError::OriginNotFound(origin_id.to_string()))
    }

    pub fn contains(&self, origin_id: &str) -> bool {
        self.origins.contains_key(origin_id)
    }

    /// All origins, ordered by id
    pub fn list(&self) -> Vec<OriginRecord> {
        let mut all: Vec<OriginRecord> = self.origins.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.origin_id.cmp(&b.origin_id));
        all
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    fn emit(&self, event: LedgerEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl Default for OriginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
