//! HTTP surface tests, driven through the router with `oneshot`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use provenance_ledger::api::create_router;
use provenance_ledger::config::StatusConfig;
use provenance_ledger::status::RegistryProbe;
use provenance_ledger::{demo, Config, LedgerError, Services, StatusAggregator};
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn app() -> (Router, Services) {
    let config = Config::default();
    let services = Services::new(&config);
    (create_router(services.clone(), &config.server), services)
}

fn seeded_app() -> Router {
    let (app, services) = app();
    demo::seed(&services).unwrap();
    app
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn origin_body(id: &str) -> Value {
    json!({
        "originId": id,
        "farmName": "Sunrise Orchard",
        "location": { "country": "Chile", "region": "Maule" },
        "ownerIdentity": "did:example:sunrise",
        "certifications": ["GlobalG.A.P."]
    })
}

fn product_body(id: &str, origin_id: &str) -> Value {
    json!({
        "productId": id,
        "name": "Cherries",
        "category": "Fruit",
        "originId": origin_id,
        "isOrganic": false,
        "qualityScore": 7.5,
        "harvestDate": "2025-12-01",
        "expiryDate": "2025-12-20"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_seeded_product() {
    let app = seeded_app();
    let (status, body) = send(&app, get("/products/PRD-1001")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["productId"], "PRD-1001");
    assert_eq!(body["name"], "Organic Tomatoes");
    assert_eq!(body["status"], "Retail");
    assert_eq!(body["origin"]["farmName"], "Green Valley Farms");
    assert_eq!(body["origin"]["verified"], true);

    let chain = body["chain"].as_array().unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0]["sequenceIndex"], 0);
    assert_eq!(chain[0]["stage"], "Farm");
    assert_eq!(chain[3]["stage"], "Retail");
    assert!(chain[0]["contentRef"].as_str().unwrap().starts_with("sha256-"));
}

#[tokio::test]
async fn test_api_prefix_is_served() {
    let app = seeded_app();
    let (status, body) = send(&app, get("/api/origins/GVF-001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["certifications"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let (app, _) = app();

    let (status, body) = send(&app, get("/products/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");

    let (status, body) = send(&app, get("/origins/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ORIGIN_NOT_FOUND");

    let (status, _) = send(&app, post("/products/nope/events", json!({"stage": "Farm", "location": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_verify_append_flow() {
    let (app, _) = app();

    let (status, body) = send(&app, post("/origins", origin_body("O1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["verified"], false);

    let (status, _) = send(&app, post("/origins", origin_body("O1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, post("/products", product_body("P1", "O1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Registered");

    let event = json!({ "stage": "Farm", "location": "Maule orchard block 3" });
    let (status, body) = send(&app, post("/products/P1/events", event.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ORIGIN_NOT_VERIFIED");

    let (status, _) = send(&app, post("/origins/O1/verify", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = send(&app, post("/products/P1/events", event.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["sequenceIndex"], 0);

    // Retry is absorbed
    let (status, retry) = send(&app, post("/products/P1/events", event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retry, first);

    let (_, chain) = send(&app, get("/products/P1/chain")).await;
    assert_eq!(chain.as_array().unwrap().len(), 1);

    let (status, audit) = send(&app, get("/products/P1/audit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["valid"], true);
    assert_eq!(audit["headRef"], first["chainRef"]);
}

#[tokio::test]
async fn test_ordering_conflicts() {
    let app = seeded_app();

    let (status, body) = send(
        &app,
        post("/products/PRD-1001/events", json!({"stage": "PostSale", "location": "Returns"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CHAIN_COMPLETE");
}

#[tokio::test]
async fn test_server_assigned_fields_rejected() {
    let (app, services) = app();
    demo::seed(&services).unwrap();
    services
        .catalog
        .register(serde_json::from_value(product_body("P9", "GVF-001")).unwrap())
        .unwrap();

    let (status, body) = send(
        &app,
        post(
            "/products/P9/events",
            json!({"stage": "Farm", "location": "Field", "sequenceIndex": 7}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send(
        &app,
        post(
            "/products/P9/events",
            json!({"stage": "Farm", "location": "Field", "timestamp": "2025-01-01T00:00:00Z"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(services.ledger.get_chain("P9").unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_product_is_400() {
    let app = seeded_app();
    let mut body = product_body("P2", "GVF-001");
    body["qualityScore"] = json!(11.0);

    let (status, response) = send(&app, post("/products", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], "INVALID_PRODUCT");
}

#[tokio::test]
async fn test_status_snapshot() {
    let app = seeded_app();
    let (status, body) = send(&app, get("/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"]["status"], "online");
    assert_eq!(body["counts"]["origins"], 2);
    assert_eq!(body["counts"]["products"], 2);
    assert_eq!(body["counts"]["events"], 8);

    let activity = body["recentActivity"].as_array().unwrap();
    assert_eq!(activity.len(), 8);
    // Last seeded write comes first
    assert_eq!(activity[0]["productId"], "PRD-1002");
    assert_eq!(activity[0]["stage"], "Retail");
    assert_eq!(activity[0]["age"], "just now");
}

/// Origin registry stand-in that holds its thread past the status bound
struct StalledRegistry;

#[async_trait]
impl RegistryProbe for StalledRegistry {
    fn name(&self) -> &'static str {
        "originRegistry"
    }

    async fn probe(&self) -> Result<usize, LedgerError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(0)
    }
}

#[tokio::test]
async fn test_status_timeout_is_503() {
    let config = Config::default();
    let mut services = Services::new(&config);
    services.status = Arc::new(StatusAggregator::new(
        Arc::new(StalledRegistry),
        services.ledger.clone(),
        StatusConfig {
            healthy_within_ms: 10,
            timeout_ms: 50,
            ..StatusConfig::default()
        },
    ));
    let app = create_router(services, &config.server);

    let (status, body) = send(&app, get("/status")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "AGGREGATION_TIMEOUT");
}

#[tokio::test]
async fn test_legacy_track_view() {
    let app = seeded_app();
    let (status, body) = send(&app, get("/api/track/PRD-1002")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Organic Apples");
    assert_eq!(body["origin"], "Washington State, USA");
    assert_eq!(body["organic"], true);

    let journey = body["journey"].as_array().unwrap();
    assert_eq!(journey.len(), 4);
    assert_eq!(journey[0]["stage"], "Farm Origin");
    assert_eq!(journey[0]["date"], "2025-08-15");
    assert_eq!(journey[3]["statusText"], "Available for Sale");
}

#[tokio::test]
async fn test_listings() {
    let app = seeded_app();

    let (_, origins) = send(&app, get("/origins")).await;
    let ids: Vec<&str> = origins
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["originId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["GVF-001", "WAO-002"]);

    let (_, products) = send(&app, get("/products")).await;
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["eventCount"], 4);
}
