//! Provenance Ledger - custody history for supply-chain products
//!
//! Tracks where a product came from and every hand it passed through.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`OriginRegistry`] | Verified farms and facilities |
//! | [`ProvenanceLedger`] | Append-only, hash-linked custody chain per product |
//! | [`ProductCatalog`] | Product attributes and derived status |
//! | [`StatusAggregator`] | Health and recent activity snapshot |
//!
//! ## Chain layout
//!
//! ```text
//! GENESIS ─▶ event 0 (Farm) ─▶ event 1 (Processing) ─▶ ... ─▶ event n (Retail)
//!            contentRef         contentRef                    contentRef
//!            chainRef           chainRef                      chainRef
//! ```
//!
//! `contentRef` identifies the event payload and makes retries idempotent;
//! `chainRef` links each event to its predecessor so an exported chain can be
//! audited with [`audit_events`].

pub mod api;
pub mod catalog;
pub mod config;
pub mod demo;
pub mod error;
pub mod events;
pub mod journey;
pub mod ledger;
pub mod origin;
pub mod services;
pub mod status;

// Re-exports
pub use catalog::{ProductCatalog, ProductInput, ProductRecord};
pub use config::Config;
pub use error::{ErrorKind, LedgerError};
pub use events::{EventBus, LedgerEvent};
pub use ledger::{
    audit_events, AppendOutcome, ChainAudit, CustodyEvent, CustodyEventInput, ProvenanceLedger,
    Stage,
};
pub use origin::{OriginInput, OriginRecord, OriginRegistry};
pub use services::Services;
pub use status::{NetworkSnapshot, StatusAggregator};
