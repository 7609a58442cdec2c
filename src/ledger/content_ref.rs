//! Content and chain references
//!
//! `contentRef` identifies the logical event: a SHA-256 digest over the
//! canonical JSON of the caller-visible payload. A server-stamped timestamp is
//! excluded so a retried submission hashes the same as the original. A
//! caller-supplied (backfilled) timestamp is part of the payload, so two
//! historical legs with the same stage and location stay distinct.
//!
//! `chainRef` links an event to its predecessor:
//!
//! ```text
//! chainRef = sha256(prevRef \n contentRef \n sequenceIndex \n timestamp)
//! ```
//!
//! with the all-zero [`GENESIS_REF`] standing in for the predecessor of
//! index 0. Anyone holding a product's chain can recompute both.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{CustodyEvent, Stage};

/// Predecessor reference of the first event in every chain
pub const GENESIS_REF: &str =
    "sha256-0000000000000000000000000000000000000000000000000000000000000000";

const PREFIX: &str = "sha256-";

/// Field order here is the canonical order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalEvent<'a> {
    product_id: &'a str,
    stage: Stage,
    location: &'a str,
    handler: Option<&'a str>,
    reference: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{}", PREFIX, hex::encode(hasher.finalize()))
}

/// Deterministic reference for a normalized event payload
pub fn content_ref(
    product_id: &str,
    stage: Stage,
    location: &str,
    handler: Option<&str>,
    reference: Option<&str>,
    backfilled_at: Option<&DateTime<Utc>>,
) -> String {
    let canonical = CanonicalEvent {
        product_id,
        stage,
        location,
        handler,
        reference,
        timestamp: backfilled_at.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    };
    // Serializing a struct of strings and a unit enum cannot fail
    let json = serde_json::to_vec(&canonical).unwrap_or_default();
    digest(&json)
}

/// Link reference for the event at `sequence_index`
pub fn chain_ref(
    prev_ref: &str,
    content_ref: &str,
    sequence_index: u64,
    timestamp: &DateTime<Utc>,
) -> String {
    let material = format!(
        "{}\n{}\n{}\n{}",
        prev_ref,
        content_ref,
        sequence_index,
        timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    digest(material.as_bytes())
}

/// Result of re-deriving every reference in a chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAudit {
    pub product_id: String,
    pub length: usize,
    pub valid: bool,
    /// `chainRef` of the last event, or the genesis reference
    pub head_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verify a chain obtained from the ledger or from any export of it.
pub fn audit_events(product_id: &str, events: &[CustodyEvent]) -> ChainAudit {
    let mut prev = GENESIS_REF.to_string();
    let mut last_ts: Option<DateTime<Utc>> = None;

    for (i, event) in events.iter().enumerate() {
        let broken = |reason: String| ChainAudit {
            product_id: product_id.to_string(),
            length: events.len(),
            valid: false,
            head_ref: events
                .last()
                .map(|e| e.chain_ref.clone())
                .unwrap_or_else(|| GENESIS_REF.to_string()),
            broken_at: Some(i as u64),
            reason: Some(reason),
        };

        if event.sequence_index != i as u64 {
            return broken(format!("expected sequence index {}, found {}", i, event.sequence_index));
        }
        if let Some(last) = last_ts {
            if event.timestamp < last {
                return broken("timestamp earlier than predecessor".to_string());
            }
        }
        let expected_content = content_ref(
            product_id,
            event.stage,
            &event.location,
            event.handler.as_deref(),
            event.reference.as_deref(),
            event.backfilled.then_some(&event.timestamp),
        );
        if event.content_ref != expected_content {
            return broken("content reference does not match payload".to_string());
        }
        if event.prev_ref != prev {
            return broken("previous reference does not match predecessor".to_string());
        }
        let expected_chain = chain_ref(&prev, &event.content_ref, event.sequence_index, &event.timestamp);
        if event.chain_ref != expected_chain {
            return broken("chain reference mismatch".to_string());
        }

        prev = event.chain_ref.clone();
        last_ts = Some(event.timestamp);
    }

    ChainAudit {
        product_id: product_id.to_string(),
        length: events.len(),
        valid: true,
        head_ref: prev,
        broken_at: None,
        reason: None,
    }
}
