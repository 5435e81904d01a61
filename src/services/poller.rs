//! Background poller: the fixed-interval scheduling loop.
//!
//! Each cycle resolves the catalog, collects a batch and appends it to the
//! store once. Then the poller sleeps for the configured interval, so the
//! real cadence is `interval + cycle duration` (no wall-clock alignment).
//!
//! Architecture:
//! - Every failure is contained in the unit it affects: a target (skipped),
//!   the catalog or the store (that cycle only). Nothing but cancellation
//!   stops the loop.
//! - Cancellation is only observed at the sleep between cycles; a running
//!   cycle always finishes and persists at most once.
//! - State is in-memory (`Arc<RwLock<PollerState>>`), published for the
//!   status endpoint after every cycle.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::catalog::TargetCatalog;
use crate::services::collector::{BatchCollector, Clock, SkippedTarget, TelemetrySource};
use crate::store::models::Record;
use crate::store::sink::CsvSink;

// ---------------------------------------------------------------------------
// Poller state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

/// Global poller state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollerState {
    pub active: bool,
    pub total_cycles: u64,
    pub last_cycle_id: Option<Uuid>,
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    pub last_cycle_completed_at: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: Option<u64>,
    pub next_wakeup_at: Option<DateTime<Utc>>,
    /// Targets resolved from the catalog in the last cycle.
    pub last_target_count: usize,
    /// Records produced (and appended, unless `last_store_error` is set).
    pub last_batch_size: usize,
    pub last_skipped: Vec<SkippedTarget>,
    pub last_catalog_error: Option<String>,
    pub last_store_error: Option<String>,
    /// Most recent non-empty batch, served by the readings endpoint.
    #[serde(skip)]
    pub latest_records: Vec<Record>,
}

impl PollerState {
    pub fn new() -> Self {
        Self {
            active: true,
            total_cycles: 0,
            last_cycle_id: None,
            last_cycle_started_at: None,
            last_cycle_completed_at: None,
            last_cycle_duration_ms: None,
            next_wakeup_at: None,
            last_target_count: 0,
            last_batch_size: 0,
            last_skipped: Vec::new(),
            last_catalog_error: None,
            last_store_error: None,
            latest_records: Vec::new(),
        }
    }
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared poller state handle.
pub type SharedPollerState = Arc<RwLock<PollerState>>;

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// What one cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub target_count: usize,
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedTarget>,
    pub catalog_error: Option<String>,
    pub store_error: Option<String>,
}

/// Drives recurring cycles until cancelled.
pub struct Poller<S, C> {
    catalog: TargetCatalog,
    collector: BatchCollector<S, C>,
    sink: CsvSink,
    interval: Duration,
    state: SharedPollerState,
}

impl<S, C> Poller<S, C>
where
    S: TelemetrySource,
    C: Clock,
{
    pub fn new(
        catalog: TargetCatalog,
        collector: BatchCollector<S, C>,
        sink: CsvSink,
        interval: Duration,
        state: SharedPollerState,
    ) -> Self {
        Self {
            catalog,
            collector,
            sink,
            interval,
            state,
        }
    }

    /// Run cycles forever: resolve → collect → persist → sleep, until `cancel`
    /// fires. Should be spawned via `tokio::spawn(poller.run(token))`.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Background poller started, interval {}s, store {}",
            self.interval.as_secs(),
            self.sink.path().display()
        );

        loop {
            let report = self.run_cycle().await;
            self.publish(report).await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        {
            let mut s = self.state.write().await;
            s.active = false;
            s.next_wakeup_at = None;
        }
        tracing::info!("Background poller stopped");
    }

    /// Run exactly one cycle. Never fails: every error is recorded in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut report = CycleReport {
            cycle_id,
            started_at,
            duration_ms: 0,
            target_count: 0,
            records: Vec::new(),
            skipped: Vec::new(),
            catalog_error: None,
            store_error: None,
        };

        // 1. Resolve the catalog (re-read every cycle)
        let targets = match self.catalog.resolve() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Poller: {}; cycle produces an empty batch", e);
                report.catalog_error = Some(e.to_string());
                report.duration_ms = elapsed_ms(clock);
                return report;
            }
        };
        report.target_count = targets.len();
        tracing::info!("Poller: querying {} targets", targets.len());

        // 2. Fetch + derive every target
        let outcome = self.collector.collect(&targets).await;
        report.skipped = outcome.skipped;

        // 3. Persist once
        match self.sink.append(&outcome.batch) {
            Ok(0) => tracing::warn!("Poller: no records this cycle, store untouched"),
            Ok(n) => tracing::info!("Poller: committed {} records to {}", n, self.sink.path().display()),
            Err(e) => {
                tracing::error!("Poller: {}; batch dropped", e);
                report.store_error = Some(e.to_string());
            }
        }
        report.records = outcome.batch.into_records();
        report.duration_ms = elapsed_ms(clock);

        tracing::info!(
            "Poller: cycle complete in {}ms: {} targets, {} recorded, {} skipped",
            report.duration_ms,
            report.target_count,
            report.records.len(),
            report.skipped.len(),
        );

        report
    }

    async fn publish(&self, report: CycleReport) {
        let completed_at = Utc::now();
        let next_wakeup = completed_at
            + ChronoDuration::from_std(self.interval).unwrap_or_else(|_| ChronoDuration::zero());

        let mut s = self.state.write().await;
        s.total_cycles += 1;
        s.last_cycle_id = Some(report.cycle_id);
        s.last_cycle_started_at = Some(report.started_at);
        s.last_cycle_completed_at = Some(completed_at);
        s.last_cycle_duration_ms = Some(report.duration_ms);
        s.next_wakeup_at = Some(next_wakeup);
        s.last_target_count = report.target_count;
        s.last_batch_size = report.records.len();
        s.last_skipped = report.skipped;
        s.last_catalog_error = report.catalog_error;
        s.last_store_error = report.store_error;
        if !report.records.is_empty() {
            s.latest_records = report.records;
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis().min(u64::MAX as u128) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
