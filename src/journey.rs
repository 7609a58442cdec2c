//! Legacy "journey" projection
//!
//! Older consumers read a flattened tracking document: one entry per stage
//! with a display label, a calendar date and a short status text. It is built
//! on read from the product record and its origin; nothing here is stored.

use serde::Serialize;

use crate::catalog::ProductRecord;
use crate::ledger::Stage;
use crate::origin::OriginRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStep {
    pub stage: String,
    pub location: String,
    /// YYYY-MM-DD
    pub date: String,
    pub status: String,
    pub status_text: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub product_id: String,
    pub name: String,
    pub origin: String,
    pub organic: bool,
    pub quality_score: f64,
    pub certifications: Vec<String>,
    pub journey: Vec<JourneyStep>,
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Farm => "Farm Origin",
        Stage::Processing => "Processing",
        Stage::Distribution => "Distribution",
        Stage::Retail => "Retail",
        Stage::PostSale => "Post-Sale",
    }
}

fn stage_status_text(stage: Stage) -> &'static str {
    match stage {
        Stage::Farm => "Harvested",
        Stage::Processing => "Cleaned & Packed",
        Stage::Distribution => "In Transit",
        Stage::Retail => "Available for Sale",
        Stage::PostSale => "Returned to Chain",
    }
}

pub fn tracking_view(product: &ProductRecord, origin: &OriginRecord) -> TrackingView {
    TrackingView {
        product_id: product.profile.product_id.clone(),
        name: product.profile.name.clone(),
        origin: origin.location.to_string(),
        organic: product.profile.is_organic,
        quality_score: product.profile.quality_score,
        certifications: origin.certifications.clone(),
        journey: product
            .chain
            .iter()
            .map(|event| JourneyStep {
                stage: stage_label(event.stage).to_string(),
                location: event.location.clone(),
                date: event.timestamp.format("%Y-%m-%d").to_string(),
                // Every recorded step is final
                status: "completed".to_string(),
                status_text: stage_status_text(event.stage).to_string(),
                hash: event.content_ref.clone(),
            })
            .collect(),
    }
}
