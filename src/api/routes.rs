//! HTTP handlers
//!
//! Thin adapters over the registries; all rules live in the core.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use crate::catalog::{ProductInput, ProductRecord, ProductSummary};
use crate::journey::{tracking_view, TrackingView};
use crate::ledger::{ChainAudit, CustodyEvent, CustodyEventInput};
use crate::origin::{Location, OriginInput, OriginRecord};
use crate::services::Services;
use crate::status::NetworkSnapshot;

/// Origin fields shown alongside a product, resolved at read time
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginSummary {
    pub origin_id: String,
    pub farm_name: String,
    pub location: Location,
    pub owner_identity: String,
    pub verified: bool,
}

#[derive(Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub origin: OriginSummary,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// GET /status
pub async fn status(State(services): State<Services>) -> ApiResult<Json<NetworkSnapshot>> {
    Ok(Json(services.status.snapshot().await?))
}

/// GET /origins
pub async fn list_origins(State(services): State<Services>) -> Json<Vec<OriginRecord>> {
    Json(services.origins.list())
}

/// POST /origins
pub async fn register_origin(
    State(services): State<Services>,
    payload: Result<Json<OriginInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OriginRecord>)> {
    let record = services.origins.register(body(payload)?)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /origins/:origin_id
pub async fn get_origin(
    State(services): State<Services>,
    Path(origin_id): Path<String>,
) -> ApiResult<Json<OriginRecord>> {
    Ok(Json(services.origins.get(&origin_id)?))
}

/// POST /origins/:origin_id/verify
pub async fn verify_origin(
    State(services): State<Services>,
    Path(origin_id): Path<String>,
) -> ApiResult<Json<OriginRecord>> {
    Ok(Json(services.origins.verify(&origin_id)?))
}

/// GET /products
pub async fn list_products(State(services): State<Services>) -> Json<Vec<ProductSummary>> {
    Json(services.catalog.list())
}

/// POST /products
pub async fn register_product(
    State(services): State<Services>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProductRecord>)> {
    let record = services.catalog.register(body(payload)?)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /products/:product_id
pub async fn get_product(
    State(services): State<Services>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ProductDetail>> {
    let product = services.catalog.get(&product_id)?;
    let origin = services.origins.get(&product.profile.origin_id)?;

    Ok(Json(ProductDetail {
        product,
        origin: OriginSummary {
            origin_id: origin.origin_id,
            farm_name: origin.farm_name,
            location: origin.location,
            owner_identity: origin.owner_identity,
            verified: origin.verified,
        },
    }))
}

/// GET /products/:product_id/chain
pub async fn get_chain(
    State(services): State<Services>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Vec<CustodyEvent>>> {
    Ok(Json(services.ledger.get_chain(&product_id)?))
}

/// POST /products/:product_id/events
///
/// 201 for a newly stored event, 200 when the event was already recorded.
pub async fn append_event(
    State(services): State<Services>,
    Path(product_id): Path<String>,
    payload: Result<Json<CustodyEventInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CustodyEvent>)> {
    let outcome = services.ledger.append_event(&product_id, body(payload)?)?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.event)))
}

/// GET /products/:product_id/audit
pub async fn audit_chain(
    State(services): State<Services>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ChainAudit>> {
    Ok(Json(services.ledger.verify_chain(&product_id)?))
}

/// GET /track/:product_id
pub async fn track_product(
    State(services): State<Services>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<TrackingView>> {
    let product = services.catalog.get(&product_id)?;
    let origin = services.origins.get(&product.profile.origin_id)?;
    Ok(Json(tracking_view(&product, &origin)))
}
