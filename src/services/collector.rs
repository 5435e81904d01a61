//! Batch collection: fetch and derive every target of one cycle.
//!
//! Targets are processed sequentially in catalog order. The fetcher's pacing
//! delay is what keeps the request rate within the third-party limits, so
//! fetches must not be parallelized without adding an equivalent shared limiter.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::future::Future;
use utoipa::ToSchema;

use crate::errors::FetchError;
use crate::services::catalog::Target;
use crate::services::open_meteo::RawReading;
use crate::services::risk::{derive, RiskThresholds};
use crate::store::models::{Batch, Record};

/// A source of per-target telemetry.
pub trait TelemetrySource {
    fn fetch(&self, target: &Target) -> impl Future<Output = Result<RawReading, FetchError>> + Send;
}

/// Source of capture timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A target left out of a batch, and why.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SkippedTarget {
    pub target_name: String,
    /// "network", "response_shape" or "target_invalid"
    pub kind: String,
    pub error: String,
}

/// The result of collecting one cycle.
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    pub batch: Batch,
    pub skipped: Vec<SkippedTarget>,
}

/// Runs fetch + derive over a cycle's targets.
#[derive(Debug, Clone)]
pub struct BatchCollector<S, C> {
    source: S,
    clock: C,
    thresholds: RiskThresholds,
}

impl<S, C> BatchCollector<S, C>
where
    S: TelemetrySource,
    C: Clock,
{
    pub fn new(source: S, clock: C, thresholds: RiskThresholds) -> Self {
        Self {
            source,
            clock,
            thresholds,
        }
    }

    /// Build the batch for `targets`.
    ///
    /// A target whose fetch fails yields no record and is reported in
    /// `skipped`; it never aborts or shortens the cycle. An empty batch is a
    /// valid result.
    pub async fn collect(&self, targets: &[Target]) -> CollectOutcome {
        let mut outcome = CollectOutcome {
            batch: Batch::new(),
            skipped: Vec::new(),
        };

        for target in targets {
            match self.source.fetch(target).await {
                Ok(raw) => {
                    let derived = derive(raw, &self.thresholds);
                    tracing::debug!(
                        "Ingested {}: wet-bulb {:?}, AQI {:?} → {:?}",
                        target.name,
                        derived.wet_bulb_c,
                        derived.raw.aqi_us,
                        derived.risk_tier,
                    );
                    outcome
                        .batch
                        .push(Record::new(self.clock.now(), &target.name, derived));
                }
                Err(e) => {
                    tracing::warn!("Ingestion failed for {}: {}", target.name, e);
                    outcome.skipped.push(SkippedTarget {
                        target_name: target.name.clone(),
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome
    }
}
