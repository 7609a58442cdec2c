//! Service graph
//!
//! Registries are constructed in dependency order (origins, then the ledger,
//! then the catalog and the status aggregator) and handed to the HTTP layer
//! as explicit state. A fresh `Services` is a fresh, empty ledger.

use std::sync::Arc;

use crate::catalog::ProductCatalog;
use crate::config::Config;
use crate::events::EventBus;
use crate::ledger::ProvenanceLedger;
use crate::origin::OriginRegistry;
use crate::status::StatusAggregator;

#[derive(Clone)]
pub struct Services {
    pub events: Arc<EventBus>,
    pub origins: Arc<OriginRegistry>,
    pub ledger: Arc<ProvenanceLedger>,
    pub catalog: Arc<ProductCatalog>,
    pub status: Arc<StatusAggregator>,
}

impl Services {
    pub fn new(config: &Config) -> Self {
        let events = Arc::new(EventBus::new());

        let origins = Arc::new(OriginRegistry::new().with_events(Arc::clone(&events)));

        let ledger = Arc::new(
            ProvenanceLedger::new(Arc::clone(&origins), config.ledger.clone())
                .with_events(Arc::clone(&events)),
        );

        let catalog = Arc::new(
            ProductCatalog::new(Arc::clone(&ledger)).with_events(Arc::clone(&events)),
        );

        let status = Arc::new(StatusAggregator::new(
            origins.clone(),
            ledger.clone(),
            config.status.clone(),
        ));

        Self {
            events,
            origins,
            ledger,
            catalog,
            status,
        }
    }
}
