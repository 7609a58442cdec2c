//! Provenance ledger - append-only custody chains
//!
//! Each product owns an ordered chain of [`CustodyEvent`]s. Appends are the
//! only mutation; there is no update or delete.
//!
//! ## Concurrency
//!
//! Every product sits behind its own `RwLock`. Appends to one product are
//! serialized, appends to different products run in parallel, and readers copy
//! the chain under a read lock so they never observe a half-written event.
//! All checks run before the single `push`, so a failed append leaves the
//! chain untouched.
//!
//! ## Append rules
//!
//! 1. Unknown product: `ProductNotFound`
//! 2. Same `contentRef` already in the chain: success, stored event returned
//! 3. Chain ended at `Retail` (post-retail disabled): `ChainComplete`
//! 4. First event and origin unverified: `OriginNotVerified`
//! 5. Timestamp before the last event: `OutOfOrderEvent` (ties allowed)
//! 6. Stage before the current stage: `StageRegression`

pub mod content_ref;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::ProductProfile;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::events::{EventBus, LedgerEvent};
use crate::origin::OriginRegistry;

pub use content_ref::{audit_events, ChainAudit, GENESIS_REF};

const MAX_TEXT_LEN: usize = 512;

/// Supply-chain stage, in custody order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Farm,
    Processing,
    Distribution,
    Retail,
    /// Returns, recalls and other handling after sale
    PostSale,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Farm,
        Stage::Processing,
        Stage::Distribution,
        Stage::Retail,
        Stage::PostSale,
    ];

    /// Position in the custody order
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Farm => 0,
            Stage::Processing => 1,
            Stage::Distribution => 2,
            Stage::Retail => 3,
            Stage::PostSale => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Farm => "Farm",
            Stage::Processing => "Processing",
            Stage::Distribution => "Distribution",
            Stage::Retail => "Retail",
            Stage::PostSale => "PostSale",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage: {}", s))
    }
}

/// Caller-supplied custody event. Server-assigned fields are rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustodyEventInput {
    pub stage: Stage,
    pub location: String,
    /// Party taking custody
    #[serde(default)]
    pub handler: Option<String>,
    /// External reference such as a lot or shipment number
    #[serde(default)]
    pub reference: Option<String>,
}

impl CustodyEventInput {
    pub fn new(stage: Stage, location: impl Into<String>) -> Self {
        Self {
            stage,
            location: location.into(),
            handler: None,
            reference: None,
        }
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    fn normalize(self) -> Result<Self, LedgerError> {
        let location = self.location.trim().to_string();
        if location.is_empty() {
            return Err(LedgerError::InvalidEvent("location is required".to_string()));
        }
        let trim_opt = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        let normalized = Self {
            stage: self.stage,
            location,
            handler: trim_opt(self.handler),
            reference: trim_opt(self.reference),
        };
        for (field, value) in [
            ("location", Some(&normalized.location)),
            ("handler", normalized.handler.as_ref()),
            ("reference", normalized.reference.as_ref()),
        ] {
            if value.map_or(false, |v| v.chars().count() > MAX_TEXT_LEN) {
                return Err(LedgerError::InvalidEvent(format!(
                    "{} exceeds {} characters",
                    field, MAX_TEXT_LEN
                )));
            }
        }
        Ok(normalized)
    }
}

/// A stored custody event. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyEvent {
    pub sequence_index: u64,
    pub stage: Stage,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Timestamp was supplied by the caller and is hashed into `content_ref`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backfilled: bool,
    pub content_ref: String,
    pub prev_ref: String,
    pub chain_ref: String,
}

/// Result of an append
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub event: CustodyEvent,
    /// False when an identical event was already recorded
    pub created: bool,
}

/// A chain entry with its position in the ledger-wide write order
#[derive(Debug, Clone)]
pub(crate) struct ChainEntry {
    pub event: CustodyEvent,
    pub ledger_seq: u64,
    pub recorded_at: DateTime<Utc>,
}

/// One recently written event, for activity feeds
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub product_id: String,
    pub product_name: String,
    pub event: CustodyEvent,
    pub recorded_at: DateTime<Utc>,
    pub ledger_seq: u64,
}

struct ProductState {
    profile: ProductProfile,
    chain: Vec<ChainEntry>,
    by_content: HashMap<String, usize>,
}

struct ProductSlot {
    state: RwLock<ProductState>,
}

/// The ledger of custody chains
pub struct ProvenanceLedger {
    origins: Arc<OriginRegistry>,
    products: DashMap<String, Arc<ProductSlot>>,
    config: LedgerConfig,
    ledger_seq: AtomicU64,
    event_count: AtomicUsize,
    events: Option<Arc<EventBus>>,
}

impl ProvenanceLedger {
    pub fn new(origins: Arc<OriginRegistry>, config: LedgerConfig) -> Self {
        Self {
            origins,
            products: DashMap::new(),
            config,
            ledger_seq: AtomicU64::new(0),
            event_count: AtomicUsize::new(0),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn origins(&self) -> &Arc<OriginRegistry> {
        &self.origins
    }

    /// Append an event stamped with the server clock.
    ///
    /// The clock is read after the product lock is taken, so concurrent
    /// appends to one product receive non-decreasing timestamps.
    pub fn append_event(
        &self,
        product_id: &str,
        input: CustodyEventInput,
    ) -> Result<AppendOutcome, LedgerError> {
        self.append(product_id, input, None)
    }

    /// Append a historical event with an explicit timestamp.
    pub fn append_event_at(
        &self,
        product_id: &str,
        input: CustodyEventInput,
        timestamp: DateTime<Utc>,
    ) -> Result<AppendOutcome, LedgerError> {
        self.append(product_id, input, Some(timestamp))
    }

    fn append(
        &self,
        product_id: &str,
        input: CustodyEventInput,
        at: Option<DateTime<Utc>>,
    ) -> Result<AppendOutcome, LedgerError> {
        let slot = self.slot(product_id)?;
        let input = input.normalize()?;
        let content_ref = content_ref::content_ref(
            product_id,
            input.stage,
            &input.location,
            input.handler.as_deref(),
            input.reference.as_deref(),
            at.as_ref(),
        );

        let mut guard = slot
            .state
            .write()
            .map_err(|_| poisoned(product_id))?;
        let state = &mut *guard;

        if let Some(&idx) = state.by_content.get(&content_ref) {
            let existing = state.chain[idx].event.clone();
            drop(guard);
            debug!(
                product_id = %product_id,
                sequence_index = existing.sequence_index,
                "Duplicate custody event absorbed"
            );
            self.emit(LedgerEvent::DuplicateSuppressed {
                product_id: product_id.to_string(),
                content_ref,
            });
            return Ok(AppendOutcome {
                event: existing,
                created: false,
            });
        }

        let last = state
            .chain
            .last()
            .map(|e| (e.event.stage, e.event.timestamp, e.event.chain_ref.clone()));

        match &last {
            Some((stage, _, _)) => {
                if *stage == Stage::Retail && !self.config.allow_post_retail_events {
                    return Err(LedgerError::ChainComplete(product_id.to_string()));
                }
            }
            None => {
                let origin = self.origins.get(&state.profile.origin_id)?;
                if !origin.verified {
                    return Err(LedgerError::OriginNotVerified(origin.origin_id));
                }
            }
        }

        if input.stage == Stage::PostSale && !self.config.allow_post_retail_events {
            return Err(LedgerError::InvalidEvent(
                "post-sale events are disabled".to_string(),
            ));
        }

        let timestamp = at.unwrap_or_else(Utc::now);
        if let Some((current, last_ts, _)) = &last {
            if timestamp < *last_ts {
                return Err(LedgerError::OutOfOrderEvent {
                    product_id: product_id.to_string(),
                    last: *last_ts,
                    attempted: timestamp,
                });
            }
            if input.stage.ordinal() < current.ordinal() {
                return Err(LedgerError::StageRegression {
                    product_id: product_id.to_string(),
                    current: *current,
                    attempted: input.stage,
                });
            }
        }

        let idx = state.chain.len();
        let sequence_index = idx as u64;
        let prev_ref = last
            .map(|(_, _, chain_ref)| chain_ref)
            .unwrap_or_else(|| GENESIS_REF.to_string());
        let chain_ref = content_ref::chain_ref(&prev_ref, &content_ref, sequence_index, &timestamp);

        let event = CustodyEvent {
            sequence_index,
            stage: input.stage,
            location: input.location,
            handler: input.handler,
            reference: input.reference,
            timestamp,
            backfilled: at.is_some(),
            content_ref,
            prev_ref,
            chain_ref,
        };

        state.by_content.insert(event.content_ref.clone(), idx);
        state.chain.push(ChainEntry {
            event: event.clone(),
            ledger_seq: self.ledger_seq.fetch_add(1, Ordering::SeqCst),
            recorded_at: Utc::now(),
        });
        drop(guard);

        self.event_count.fetch_add(1, Ordering::Relaxed);
        info!(
            product_id = %product_id,
            sequence_index = sequence_index,
            stage = %event.stage,
            "Custody event appended"
        );
        self.emit(LedgerEvent::CustodyRecorded {
            product_id: product_id.to_string(),
            sequence_index,
            stage: event.stage,
            content_ref: event.content_ref.clone(),
        });

        Ok(AppendOutcome {
            event,
            created: true,
        })
    }

    /// Snapshot of a product's chain, detached from later appends
    pub fn get_chain(&self, product_id: &str) -> Result<Vec<CustodyEvent>, LedgerError> {
        self.read_product(product_id, |_, chain| {
            chain.iter().map(|e| e.event.clone()).collect()
        })
    }

    /// Recompute every reference in a product's chain
    pub fn verify_chain(&self, product_id: &str) -> Result<ChainAudit, LedgerError> {
        let chain = self.get_chain(product_id)?;
        let audit = audit_events(product_id, &chain);
        if !audit.valid {
            warn!(product_id = %product_id, reason = ?audit.reason, "Chain audit failed");
        }
        Ok(audit)
    }

    /// The most recent `limit` events across all products, newest first
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, LedgerError> {
        // Collect slots first so no map shard is held while product locks are taken
        let slots: Vec<Arc<ProductSlot>> =
            self.products.iter().map(|e| Arc::clone(e.value())).collect();

        let mut entries = Vec::new();
        for slot in slots {
            let state = read_slot(&slot)?;
            for entry in state.chain.iter().rev().take(limit) {
                entries.push(ActivityEntry {
                    product_id: state.profile.product_id.clone(),
                    product_name: state.profile.name.clone(),
                    event: entry.event.clone(),
                    recorded_at: entry.recorded_at,
                    ledger_seq: entry.ledger_seq,
                });
            }
        }

        entries.sort_by(|a, b| b.ledger_seq.cmp(&a.ledger_seq));
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn contains_product(&self, product_id: &str) -> bool {
        self.products.contains_key(product_id)
    }

    /// Product ids, sorted
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.products.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Open an empty chain for a newly registered product
    pub(crate) fn open_product(&self, profile: ProductProfile) -> Result<(), LedgerError> {
        match self.products.entry(profile.product_id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateProduct(profile.product_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(ProductSlot {
                    state: RwLock::new(ProductState {
                        profile,
                        chain: Vec::new(),
                        by_content: HashMap::new(),
                    }),
                }));
                Ok(())
            }
        }
    }

    /// Run `f` against a consistent view of one product
    pub(crate) fn read_product<R>(
        &self,
        product_id: &str,
        f: impl FnOnce(&ProductProfile, &[ChainEntry]) -> R,
    ) -> Result<R, LedgerError> {
        let slot = self.slot(product_id)?;
        let state = read_slot(&slot)?;
        Ok(f(&state.profile, &state.chain))
    }

    fn slot(&self, product_id: &str) -> Result<Arc<ProductSlot>, LedgerError> {
        self.products
            .get(product_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| LedgerError::ProductNotFound(product_id.to_string()))
    }

    fn emit(&self, event: LedgerEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

fn read_slot(slot: &ProductSlot) -> Result<RwLockReadGuard<'_, ProductState>, LedgerError> {
    slot.state
        .read()
        .map_err(|_| LedgerError::Internal("product lock poisoned".to_string()))
}

fn poisoned(product_id: &str) -> LedgerError {
    LedgerError::Internal(format!("product lock poisoned: {}", product_id))
}
