//! Ledger event bus
//!
//! Every committed mutation is announced here. Subscribers use it for:
//! - Audit logging
//! - Cache invalidation in front-ends
//! - Tests that want to observe writes

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::ledger::Stage;

/// Events emitted after a mutation commits
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    OriginRegistered {
        origin_id: String,
        farm_name: String,
    },
    OriginVerified {
        origin_id: String,
    },
    ProductRegistered {
        product_id: String,
        origin_id: String,
    },
    CustodyRecorded {
        product_id: String,
        sequence_index: u64,
        stage: Stage,
        content_ref: String,
    },
    /// A re-submitted event was absorbed without changing the chain
    DuplicateSuppressed {
        product_id: String,
        content_ref: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}

/// Broadcast bus for ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit trail listener
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::OriginRegistered { origin_id, farm_name } => {
                debug!(origin_id = %origin_id, farm_name = %farm_name, "Origin registered");
            }
            LedgerEvent::OriginVerified { origin_id } => {
                debug!(origin_id = %origin_id, "Origin verified");
            }
            LedgerEvent::ProductRegistered { product_id, origin_id } => {
                debug!(product_id = %product_id, origin_id = %origin_id, "Product registered");
            }
            LedgerEvent::CustodyRecorded {
                product_id,
                sequence_index,
                stage,
                content_ref,
            } => {
                debug!(
                    product_id = %product_id,
                    sequence_index = sequence_index,
                    stage = %stage,
                    content_ref = %content_ref,
                    "Custody recorded"
                );
            }
            LedgerEvent::DuplicateSuppressed { .. } => {
                trace!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
