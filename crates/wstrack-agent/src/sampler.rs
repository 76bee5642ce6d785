use crate::config::TrackerConfig;
use crate::display::DisplaySink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wstrack_common::{Snapshot, TrackingSeries};
use wstrack_fetcher::{Credentials, FetchError, MetricsFetcher};
use wstrack_storage::SnapshotStore;

/// Where the sampler is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Fetching,
    Persisting,
    Publishing,
    Waiting,
}

/// Result of one fetch → persist → publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A snapshot was recorded and published; `persisted` is false when the
    /// log append failed.
    Recorded { persisted: bool },
    /// The fetch failed; nothing was recorded.
    Skipped { kind: &'static str },
}

/// Everything the sampler needs to know about what it tracks.
#[derive(Debug, Clone)]
pub struct SamplerContext {
    pub entity_id: String,
    pub credentials: Credentials,
    pub interval: Duration,
    /// Consecutive failures after which fetch errors are logged as errors
    /// instead of warnings.
    pub failure_alert_threshold: u32,
}

impl SamplerContext {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            entity_id: config.entity_id.clone(),
            credentials: Credentials::new(config.api_key.clone()),
            interval: Duration::from_secs(config.interval_secs),
            failure_alert_threshold: config.failure_alert_threshold,
        }
    }
}

/// The background sampling loop for one tracked item.
///
/// Owns the only writer to the log store and the tracking series.
pub struct Sampler {
    ctx: SamplerContext,
    fetcher: Arc<dyn MetricsFetcher>,
    store: Box<dyn SnapshotStore>,
    sink: Arc<dyn DisplaySink>,
    series: TrackingSeries,
    state: SamplerState,
    consecutive_failures: u32,
}

impl Sampler {
    pub fn new(
        ctx: SamplerContext,
        fetcher: Arc<dyn MetricsFetcher>,
        store: Box<dyn SnapshotStore>,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            ctx,
            fetcher,
            store,
            sink,
            series: TrackingSeries::new(),
            state: SamplerState::Idle,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn series(&self) -> &TrackingSeries {
        &self.series
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Runs one cycle: fetch, then on success record, persist and publish.
    ///
    /// The only await point is the fetch, so dropping this future can never
    /// interrupt an append.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.state = SamplerState::Fetching;
        let fetched = self
            .fetcher
            .fetch(&self.ctx.entity_id, &self.ctx.credentials)
            .await;

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_failure(&e);
                self.state = SamplerState::Waiting;
                return CycleOutcome::Skipped { kind: e.kind() };
            }
        };

        if self.consecutive_failures > 0 {
            tracing::info!(
                entity_id = %self.ctx.entity_id,
                failures = self.consecutive_failures,
                "Fetching recovered"
            );
            self.consecutive_failures = 0;
        }

        self.series.push(snapshot.clone());

        self.state = SamplerState::Persisting;
        let persisted = self.persist(&snapshot);

        self.state = SamplerState::Publishing;
        self.sink.on_snapshot(&snapshot);

        tracing::info!(
            entity_id = %self.ctx.entity_id,
            timestamp = %snapshot.timestamp_string(),
            subscriptions = snapshot.subscriptions,
            persisted,
            "Snapshot recorded"
        );

        self.state = SamplerState::Waiting;
        CycleOutcome::Recorded { persisted }
    }

    fn persist(&mut self, snapshot: &Snapshot) -> bool {
        match self.store.append(snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    entity_id = %self.ctx.entity_id,
                    timestamp = %snapshot.timestamp_string(),
                    error = %e,
                    "Failed to persist snapshot, continuing"
                );
                false
            }
        }
    }

    fn record_failure(&mut self, e: &FetchError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.ctx.failure_alert_threshold {
            tracing::error!(
                entity_id = %self.ctx.entity_id,
                fetcher = self.fetcher.name(),
                kind = e.kind(),
                status = e.status(),
                consecutive = self.consecutive_failures,
                error = %e,
                "Fetch keeps failing"
            );
        } else {
            tracing::warn!(
                entity_id = %self.ctx.entity_id,
                fetcher = self.fetcher.name(),
                kind = e.kind(),
                status = e.status(),
                consecutive = self.consecutive_failures,
                error = %e,
                "Fetch failed, skipping cycle"
            );
        }
    }

    /// Samples until `shutdown` is cancelled, then returns the series.
    ///
    /// The first cycle starts immediately; each following one starts one
    /// interval after the previous cycle finished.
    pub async fn run(mut self, shutdown: CancellationToken) -> TrackingSeries {
        tracing::info!(
            entity_id = %self.ctx.entity_id,
            interval_secs = self.ctx.interval.as_secs(),
            fetcher = self.fetcher.name(),
            "Sampler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.run_cycle() => {}
            }

            self.state = SamplerState::Waiting;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.ctx.interval) => {}
            }
        }

        tracing::info!(
            entity_id = %self.ctx.entity_id,
            samples = self.series.len(),
            "Sampler stopped"
        );
        self.series
    }
}
