#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wstrack_agent::display::DisplaySink;
use wstrack_agent::sampler::{Sampler, SamplerContext};
use wstrack_common::Snapshot;
use wstrack_fetcher::{error, Credentials, FetchError, MetricsFetcher};
use wstrack_storage::{LogStore, SnapshotStore, StoreError};

pub const ENTITY_ID: &str = "2503622437";

/// Plays back a fixed list of fetch outcomes, then fails with a transport
/// error once the script runs out.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<error::Result<Snapshot>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<error::Result<Snapshot>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, entity_id: &str, credentials: &Credentials) -> error::Result<Snapshot> {
        assert_eq!(entity_id, ENTITY_ID);
        assert_eq!(credentials.api_key, "test-key");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(FetchError::Transport {
                    reason: "script exhausted".to_string(),
                })
            })
    }
}

/// Remembers every snapshot it is handed.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Snapshot>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<Snapshot> {
        self.received.lock().unwrap().clone()
    }
}

impl DisplaySink for RecordingSink {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        self.received.lock().unwrap().push(snapshot.clone());
    }
}

/// Store whose appends always fail.
pub struct BrokenStore;

impl SnapshotStore for BrokenStore {
    fn append(&mut self, _snapshot: &Snapshot) -> wstrack_storage::error::Result<()> {
        Err(StoreError::CorruptPartition {
            path: PathBuf::from("broken.csv"),
            reason: "always fails".to_string(),
        })
    }
}

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(14, 5, 0)
        .unwrap()
}

pub fn snap_at(ts: NaiveDateTime, subscriptions: u64) -> Snapshot {
    let mut s = Snapshot::new(ts, "Hover Bikes");
    s.views = 1000 + subscriptions;
    s.subscriptions = subscriptions;
    s
}

/// Snapshot `offset_secs` after [`t0`].
pub fn snap(offset_secs: i64, subscriptions: u64) -> Snapshot {
    snap_at(t0() + Duration::seconds(offset_secs), subscriptions)
}

pub fn upstream(status: u16) -> FetchError {
    FetchError::Upstream {
        status,
        body: String::new(),
    }
}

pub fn context(interval: std::time::Duration) -> SamplerContext {
    SamplerContext {
        entity_id: ENTITY_ID.to_string(),
        credentials: Credentials::new("test-key"),
        interval,
        failure_alert_threshold: 3,
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub fetcher: Arc<ScriptedFetcher>,
    pub sink: Arc<RecordingSink>,
    pub sampler: Sampler,
}

impl Harness {
    pub fn log_template(&self) -> PathBuf {
        self.dir.path().join("workshop_data.csv")
    }

    /// A fresh store over the same directory, for reading back rows.
    pub fn reader(&self) -> LogStore {
        LogStore::new(&self.log_template())
    }
}

pub fn harness(script: Vec<error::Result<Snapshot>>) -> Harness {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(script));
    let sink = Arc::new(RecordingSink::default());
    let store = LogStore::new(&dir.path().join("workshop_data.csv"));
    let sampler = Sampler::new(
        context(std::time::Duration::from_secs(1)),
        fetcher.clone(),
        Box::new(store),
        sink.clone(),
    );
    Harness {
        dir,
        fetcher,
        sink,
        sampler,
    }
}
