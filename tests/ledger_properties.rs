//! Ledger property tests
//!
//! Exercises the chain invariants through the public API:
//! - Contiguous zero-based sequence indexes
//! - Non-decreasing timestamps
//! - Idempotent re-submission
//! - Per-product serialization under concurrent appends

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use provenance_ledger::origin::Location;
use provenance_ledger::{
    Config, CustodyEventInput, LedgerError, OriginInput, ProductInput, Services, Stage,
};

fn services() -> Services {
    Services::new(&Config::default())
}

fn origin(id: &str) -> OriginInput {
    OriginInput {
        origin_id: id.to_string(),
        farm_name: "Hillside Dairy".to_string(),
        location: Location {
            country: "New Zealand".to_string(),
            region: "Waikato".to_string(),
            coordinates: None,
        },
        owner_identity: "did:example:hillside".to_string(),
        certifications: vec!["BioGro".to_string()],
    }
}

fn product(id: &str, origin_id: &str) -> ProductInput {
    ProductInput {
        product_id: id.to_string(),
        name: "Raw Milk".to_string(),
        category: "Dairy".to_string(),
        origin_id: origin_id.to_string(),
        is_organic: true,
        quality_score: 8.5,
        harvest_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        expiry_date: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
    }
}

fn verified_setup(products: &[&str]) -> Services {
    let services = services();
    services.origins.register(origin("O1")).unwrap();
    services.origins.verify("O1").unwrap();
    for id in products {
        services.catalog.register(product(id, "O1")).unwrap();
    }
    services
}

fn assert_chain_invariants(services: &Services, product_id: &str) {
    let chain = services.ledger.get_chain(product_id).unwrap();
    for (i, event) in chain.iter().enumerate() {
        assert_eq!(event.sequence_index, i as u64);
    }
    for pair in chain.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
        assert!(pair[0].stage <= pair[1].stage);
        assert_eq!(pair[1].prev_ref, pair[0].chain_ref);
    }
    assert!(services.ledger.verify_chain(product_id).unwrap().valid);
}

#[test]
fn test_unverified_origin_then_verify() {
    let services = services();
    services.origins.register(origin("O1")).unwrap();
    services.catalog.register(product("P1", "O1")).unwrap();

    let input = CustodyEventInput::new(Stage::Farm, "Hillside Dairy milking shed");
    let err = services.ledger.append_event("P1", input.clone()).unwrap_err();
    assert!(matches!(err, LedgerError::OriginNotVerified(_)));
    assert!(services.ledger.get_chain("P1").unwrap().is_empty());

    services.origins.verify("O1").unwrap();
    let outcome = services.ledger.append_event("P1", input).unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.event.sequence_index, 0);
}

#[test]
fn test_full_lifecycle() {
    let services = verified_setup(&["P1"]);
    assert_eq!(services.catalog.get("P1").unwrap().status, "Registered");

    for (stage, location) in [
        (Stage::Farm, "Milking shed"),
        (Stage::Processing, "Pasteurisation plant"),
        (Stage::Distribution, "Cold chain depot"),
        (Stage::Retail, "Corner grocer"),
    ] {
        services
            .ledger
            .append_event("P1", CustodyEventInput::new(stage, location))
            .unwrap();
    }

    assert_eq!(services.catalog.get("P1").unwrap().status, "Retail");
    let err = services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Retail, "Second grocer"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::ChainComplete(_)));
    assert_chain_invariants(&services, "P1");
}

#[test]
fn test_regression_after_processing() {
    let services = verified_setup(&["P1"]);
    services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Farm, "Shed"))
        .unwrap();
    services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Processing, "Plant"))
        .unwrap();

    let err = services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Farm, "Other shed"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::StageRegression { .. }));
    assert_eq!(services.ledger.get_chain("P1").unwrap().len(), 2);
}

#[test]
fn test_resubmission_is_idempotent() {
    let services = verified_setup(&["P1"]);
    let input = CustodyEventInput::new(Stage::Farm, "Shed").with_reference("batch-42");

    let first = services.ledger.append_event("P1", input.clone()).unwrap();
    for _ in 0..3 {
        let again = services.ledger.append_event("P1", input.clone()).unwrap();
        assert!(!again.created);
        assert_eq!(again.event, first.event);
    }
    assert_eq!(services.ledger.get_chain("P1").unwrap().len(), 1);
}

#[test]
fn test_chain_snapshot_is_detached() {
    let services = verified_setup(&["P1"]);
    services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Farm, "Shed"))
        .unwrap();

    let snapshot = services.ledger.get_chain("P1").unwrap();
    services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Processing, "Plant"))
        .unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(services.ledger.get_chain("P1").unwrap().len(), 2);
}

#[test]
fn test_concurrent_appends_same_product() {
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 25;

    let services = verified_setup(&["P1"]);
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let services = services.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_WRITER {
                    let input = CustodyEventInput::new(Stage::Farm, "Shed")
                        .with_reference(format!("w{}-{}", w, i));
                    services.ledger.append_event("P1", input).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let chain = services.ledger.get_chain("P1").unwrap();
    assert_eq!(chain.len(), WRITERS * PER_WRITER);
    assert_chain_invariants(&services, "P1");
}

#[test]
fn test_concurrent_appends_different_products() {
    let ids: Vec<String> = (0..6).map(|i| format!("P{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let services = verified_setup(&id_refs);

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let services = services.clone();
            thread::spawn(move || {
                for stage in [Stage::Farm, Stage::Processing, Stage::Distribution, Stage::Retail] {
                    services
                        .ledger
                        .append_event(&id, CustodyEventInput::new(stage, stage.as_str()))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in &ids {
        assert_eq!(services.catalog.get(id).unwrap().status, "Retail");
        assert_chain_invariants(&services, id);
    }
    assert_eq!(services.ledger.event_count(), ids.len() * 4);
}

#[test]
fn test_failed_appends_leave_no_trace() {
    let services = verified_setup(&["P1"]);
    services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Processing, "Plant"))
        .unwrap();
    let before = services.ledger.verify_chain("P1").unwrap();

    let _ = services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Farm, "Shed"));
    let _ = services
        .ledger
        .append_event("P1", CustodyEventInput::new(Stage::Farm, ""));
    let _ = services.ledger.append_event("missing", CustodyEventInput::new(Stage::Farm, "x"));

    let after = services.ledger.verify_chain("P1").unwrap();
    assert_eq!(before, after);
    assert_eq!(services.ledger.event_count(), 1);
}
