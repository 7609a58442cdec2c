//! Error types for the provenance ledger

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ledger::Stage;

/// Broad classes of ledger failure, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown identifier
    NotFound,
    /// Malformed or out-of-range input
    Validation,
    /// Ordering or state conflict; never retried by the core
    Conflict,
    /// A dependency did not answer in time; the caller may retry
    Unavailable,
    /// Broken internal state
    Internal,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Origin not found: {0}")]
    OriginNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Origin already registered: {0}")]
    DuplicateOrigin(String),

    #[error("Product already registered: {0}")]
    DuplicateProduct(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error("Invalid custody event: {0}")]
    InvalidEvent(String),

    #[error("Origin {0} is not verified")]
    OriginNotVerified(String),

    #[error("Out-of-order event for {product_id}: {attempted} is earlier than last event at {last}")]
    OutOfOrderEvent {
        product_id: String,
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("Stage regression for {product_id}: cannot record {attempted} after {current}")]
    StageRegression {
        product_id: String,
        current: Stage,
        attempted: Stage,
    },

    #[error("Custody chain for {0} is complete")]
    ChainComplete(String),

    #[error("Aggregation timeout: {dependency} did not respond within {bound_ms}ms")]
    AggregationTimeout { dependency: String, bound_ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::OriginNotFound(_) | LedgerError::ProductNotFound(_) => ErrorKind::NotFound,
            LedgerError::InvalidOrigin(_)
            | LedgerError::InvalidProduct(_)
            | LedgerError::InvalidEvent(_) => ErrorKind::Validation,
            LedgerError::DuplicateOrigin(_)
            | LedgerError::DuplicateProduct(_)
            | LedgerError::OriginNotVerified(_)
            | LedgerError::OutOfOrderEvent { .. }
            | LedgerError::StageRegression { .. }
            | LedgerError::ChainComplete(_) => ErrorKind::Conflict,
            LedgerError::AggregationTimeout { .. } => ErrorKind::Unavailable,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only dependency timeouts are transient.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::OriginNotFound(_) => "ORIGIN_NOT_FOUND",
            LedgerError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            LedgerError::DuplicateOrigin(_) => "DUPLICATE_ORIGIN",
            LedgerError::DuplicateProduct(_) => "DUPLICATE_PRODUCT",
            LedgerError::InvalidOrigin(_) => "INVALID_ORIGIN",
            LedgerError::InvalidProduct(_) => "INVALID_PRODUCT",
            LedgerError::InvalidEvent(_) => "INVALID_EVENT",
            LedgerError::OriginNotVerified(_) => "ORIGIN_NOT_VERIFIED",
            LedgerError::OutOfOrderEvent { .. } => "OUT_OF_ORDER_EVENT",
            LedgerError::StageRegression { .. } => "STAGE_REGRESSION",
            LedgerError::ChainComplete(_) => "CHAIN_COMPLETE",
            LedgerError::AggregationTimeout { .. } => "AGGREGATION_TIMEOUT",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Check that an identifier is usable as a registry key and a URL path segment.
pub(crate) fn check_identifier(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    if value.len() > 128 {
        return Err(format!("{} exceeds 128 characters", field));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '?' || c == '#' || c.is_control())
    {
        return Err(format!("{} contains reserved characters: {:?}", field, value));
    }
    Ok(())
}

/// Check that a free-text field is present.
pub(crate) fn check_required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(())
    }
}
