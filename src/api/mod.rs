//! HTTP API
//!
//! Endpoints (also served under `/api`):
//! - `GET /health` - Liveness check
//! - `GET /status` - Network snapshot
//! - `GET|POST /origins`, `GET /origins/:id`, `POST /origins/:id/verify`
//! - `GET|POST /products`, `GET /products/:id`
//! - `GET /products/:id/chain`, `GET /products/:id/audit`
//! - `POST /products/:id/events` - Append a custody event
//! - `GET /track/:id` - Legacy journey view

pub mod error;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::services::Services;

pub use error::{ApiError, ApiResult, ErrorResponse};

fn api_routes() -> Router<Services> {
    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        .route("/origins", get(routes::list_origins).post(routes::register_origin))
        .route("/origins/:origin_id", get(routes::get_origin))
        .route("/origins/:origin_id/verify", post(routes::verify_origin))
        .route("/products", get(routes::list_products).post(routes::register_product))
        .route("/products/:product_id", get(routes::get_product))
        .route("/products/:product_id/chain", get(routes::get_chain))
        .route("/products/:product_id/events", post(routes::append_event))
        .route("/products/:product_id/audit", get(routes::audit_chain))
        .route("/track/:product_id", get(routes::track_product))
}

/// Create the application router
pub fn create_router(services: Services, server: &ServerConfig) -> Router {
    let api = api_routes();
    let mut router = Router::new().merge(api.clone()).nest("/api", api);

    // Static files
    if let Some(dir) = &server.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    let router = router
        .with_state(services)
        .layer(TraceLayer::new_for_http());

    if server.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
