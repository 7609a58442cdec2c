//! Status aggregation
//!
//! Builds a point-in-time [`NetworkSnapshot`] from the registries: health of
//! each dependency, record counts, and the most recent custody events with a
//! human-readable age. Read-only; recomputed on every call.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::StatusConfig;
use crate::error::LedgerError;
use crate::ledger::{ActivityEntry, ProvenanceLedger, Stage};
use crate::origin::OriginRegistry;

/// Health label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Online,
    Degraded,
}

/// A registry the aggregator can probe
#[async_trait]
pub trait RegistryProbe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of records held
    async fn probe(&self) -> Result<usize, LedgerError>;
}

/// Recent events plus the total they were drawn from
#[derive(Debug, Clone)]
pub struct ActivityReport {
    pub total_events: usize,
    pub entries: Vec<ActivityEntry>,
}

/// A registry that also serves the activity feed
#[async_trait]
pub trait ActivitySource: RegistryProbe {
    async fn recent_activity(&self, limit: usize) -> Result<ActivityReport, LedgerError>;
}

#[async_trait]
impl RegistryProbe for OriginRegistry {
    fn name(&self) -> &'static str {
        "originRegistry"
    }

    async fn probe(&self) -> Result<usize, LedgerError> {
        Ok(self.len())
    }
}

#[async_trait]
impl RegistryProbe for ProvenanceLedger {
    fn name(&self) -> &'static str {
        "provenanceLedger"
    }

    async fn probe(&self) -> Result<usize, LedgerError> {
        Ok(self.product_count())
    }
}

#[async_trait]
impl ActivitySource for ProvenanceLedger {
    async fn recent_activity(&self, limit: usize) -> Result<ActivityReport, LedgerError> {
        Ok(ActivityReport {
            total_events: self.event_count(),
            entries: ProvenanceLedger::recent_activity(self, limit)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub name: String,
    pub status: Health,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub name: String,
    pub status: Health,
    pub records: usize,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub origins: usize,
    pub products: usize,
    pub events: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub product_id: String,
    pub product_name: String,
    pub stage: Stage,
    pub sequence_index: u64,
    pub content_ref: String,
    pub recorded_at: DateTime<Utc>,
    pub age: String,
}

/// Aggregated view of ledger health and activity. Not persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub generated_at: DateTime<Utc>,
    pub network: NetworkStatus,
    pub registries: Vec<RegistryStatus>,
    pub counts: RecordCounts,
    pub recent_activity: Vec<ActivityView>,
}

pub struct StatusAggregator {
    origins: Arc<dyn RegistryProbe>,
    ledger: Arc<dyn ActivitySource>,
    config: StatusConfig,
}

impl StatusAggregator {
    pub fn new(
        origins: Arc<dyn RegistryProbe>,
        ledger: Arc<dyn ActivitySource>,
        config: StatusConfig,
    ) -> Self {
        Self {
            origins,
            ledger,
            config,
        }
    }

    pub async fn snapshot(&self) -> Result<NetworkSnapshot, LedgerError> {
        self.snapshot_at(Utc::now()).await
    }

    /// Snapshot with ages computed relative to `now`
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<NetworkSnapshot, LedgerError> {
        let limit = self.config.recent_activity_limit;
        let (origin_probe, ledger_probe, feed) = (
            Arc::clone(&self.origins),
            Arc::clone(&self.ledger),
            Arc::clone(&self.ledger),
        );
        let (origins, ledger, activity) = tokio::join!(
            self.timed(self.origins.name(), move || async move { origin_probe.probe().await }),
            self.timed(self.ledger.name(), move || async move { ledger_probe.probe().await }),
            self.timed(self.ledger.name(), move || async move {
                feed.recent_activity(limit).await
            }),
        );
        let (origins, ledger) = (origins?, ledger?);
        let (activity, activity_latency) = activity?;

        let registries = vec![
            self.registry_status(self.origins.name(), origins),
            self.registry_status(self.ledger.name(), ledger),
        ];

        let activity = match activity {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Activity feed unavailable");
                None
            }
        };
        let activity_healthy =
            activity.is_some() && activity_latency <= self.config.healthy_within_ms;

        let degraded: Vec<&str> = registries
            .iter()
            .filter(|r| r.status == Health::Degraded)
            .map(|r| r.name.as_str())
            .collect();

        let (status, message) = if degraded.is_empty() && activity_healthy {
            (Health::Online, "All registries responding".to_string())
        } else if degraded.is_empty() {
            (Health::Degraded, "Activity feed slow or unavailable".to_string())
        } else {
            (Health::Degraded, format!("Slow or failing: {}", degraded.join(", ")))
        };

        let counts = RecordCounts {
            origins: registries[0].records,
            products: registries[1].records,
            events: activity.as_ref().map(|a| a.total_events).unwrap_or(0),
        };

        let recent_activity = activity
            .map(|a| a.entries)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| ActivityView {
                age: relative_age(now, entry.recorded_at),
                product_id: entry.product_id,
                product_name: entry.product_name,
                stage: entry.event.stage,
                sequence_index: entry.event.sequence_index,
                content_ref: entry.event.content_ref,
                recorded_at: entry.recorded_at,
            })
            .collect();

        debug!(status = ?status, events = counts.events, "Status snapshot built");

        Ok(NetworkSnapshot {
            generated_at: now,
            network: NetworkStatus {
                name: self.config.network_name.clone(),
                status,
                message,
            },
            registries,
            counts,
            recent_activity,
        })
    }

    /// Run one probe on the blocking pool under the hard bound, returning its
    /// result and latency. A probe that blocks its thread still times out.
    async fn timed<T, F, Fut>(
        &self,
        dependency: &str,
        probe: F,
    ) -> Result<(Result<T, LedgerError>, u64), LedgerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, LedgerError>>,
        T: Send + 'static,
    {
        let handle = Handle::current();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || handle.block_on(probe()));

        match timeout(self.config.timeout(), task).await {
            Ok(Ok(result)) => Ok((result, started.elapsed().as_millis() as u64)),
            Ok(Err(e)) => Ok((
                Err(LedgerError::Internal(format!("{} probe failed: {}", dependency, e))),
                started.elapsed().as_millis() as u64,
            )),
            Err(_) => {
                warn!(dependency = %dependency, bound_ms = self.config.timeout_ms, "Dependency timed out");
                Err(LedgerError::AggregationTimeout {
                    dependency: dependency.to_string(),
                    bound_ms: self.config.timeout_ms,
                })
            }
        }
    }

    fn registry_status(&self, name: &str, probed: (Result<usize, LedgerError>, u64)) -> RegistryStatus {
        let (result, latency_ms) = probed;
        match result {
            Ok(records) => RegistryStatus {
                name: name.to_string(),
                status: if latency_ms <= self.config.healthy_within_ms {
                    Health::Online
                } else {
                    Health::Degraded
                },
                records,
                latency_ms,
                error: None,
            },
            Err(e) => RegistryStatus {
                name: name.to_string(),
                status: Health::Degraded,
                records: 0,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

/// "just now", "1 minute ago", "3 hours ago", ...
pub fn relative_age(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 5 {
        return "just now".to_string();
    }

    let (value, unit) = match secs {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s => (s / 86_400, "day"),
    };
    if value == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", value, unit)
    }
}
