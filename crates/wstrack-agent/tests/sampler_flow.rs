mod common;

use chrono::{NaiveDate, NaiveDateTime};
use common::{harness, snap, snap_at, upstream, BrokenStore, RecordingSink, ScriptedFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wstrack_agent::display::ChannelSink;
use wstrack_agent::sampler::{CycleOutcome, Sampler, SamplerState};
use wstrack_fetcher::FetchError;
use wstrack_storage::{PartitionKey, SnapshotStore};

const MARCH_2024: PartitionKey = PartitionKey {
    year: 2024,
    month: 3,
};

#[tokio::test]
async fn three_successes_give_three_rows_and_three_updates() {
    let mut h = harness(vec![Ok(snap(0, 10)), Ok(snap(1, 12)), Ok(snap(2, 12))]);
    assert_eq!(h.sampler.state(), SamplerState::Idle);

    for _ in 0..3 {
        let outcome = h.sampler.run_cycle().await;
        assert_eq!(outcome, CycleOutcome::Recorded { persisted: true });
        assert_eq!(h.sampler.state(), SamplerState::Waiting);
    }

    let rows = h.reader().read_partition(MARCH_2024).unwrap();
    let subs: Vec<u64> = rows.iter().map(|s| s.subscriptions).collect();
    assert_eq!(subs, vec![10, 12, 12]);
    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let shown = h.sink.received();
    assert_eq!(shown, rows);
    assert_eq!(h.sampler.series().len(), 3);
}

#[tokio::test]
async fn upstream_failure_leaves_no_trace() {
    let mut h = harness(vec![Ok(snap(0, 10)), Err(upstream(500)), Ok(snap(2, 12))]);

    assert_eq!(
        h.sampler.run_cycle().await,
        CycleOutcome::Recorded { persisted: true }
    );
    assert_eq!(
        h.sampler.run_cycle().await,
        CycleOutcome::Skipped { kind: "upstream" }
    );
    assert_eq!(h.sampler.consecutive_failures(), 1);
    assert_eq!(
        h.sampler.run_cycle().await,
        CycleOutcome::Recorded { persisted: true }
    );
    assert_eq!(h.sampler.consecutive_failures(), 0);

    let rows = h.reader().read_partition(MARCH_2024).unwrap();
    assert_eq!(rows, vec![snap(0, 10), snap(2, 12)]);
    assert_eq!(h.sink.received(), rows);
    assert!(rows.iter().all(|r| r.timestamp != snap(1, 0).timestamp));
}

#[tokio::test]
async fn malformed_and_transport_failures_keep_series_length() {
    let mut h = harness(vec![
        Ok(snap(0, 10)),
        Err(FetchError::malformed("views is not a number")),
        Err(FetchError::Transport {
            reason: "connection refused".to_string(),
        }),
        Ok(snap(3, 11)),
    ]);

    h.sampler.run_cycle().await;
    assert_eq!(h.sampler.series().len(), 1);

    assert_eq!(
        h.sampler.run_cycle().await,
        CycleOutcome::Skipped { kind: "malformed" }
    );
    assert_eq!(h.sampler.series().len(), 1);

    assert_eq!(
        h.sampler.run_cycle().await,
        CycleOutcome::Skipped { kind: "transport" }
    );
    assert_eq!(h.sampler.series().len(), 1);
    assert_eq!(h.sampler.state(), SamplerState::Waiting);

    // the next cycle still runs
    h.sampler.run_cycle().await;
    assert_eq!(h.sampler.series().len(), 2);
    assert_eq!(h.fetcher.calls(), 4);
}

#[tokio::test]
async fn rows_always_match_successful_fetches() {
    // every success/failure pattern over five cycles
    for pattern in 0u32..32 {
        let script = (0..5)
            .map(|i: u32| {
                if pattern & (1 << i) != 0 {
                    Ok(snap(i64::from(i), u64::from(i)))
                } else {
                    Err(upstream(503))
                }
            })
            .collect();
        let mut h = harness(script);
        for _ in 0..5 {
            h.sampler.run_cycle().await;
        }

        let successes = pattern.count_ones() as usize;
        let rows = h.reader().read_partition(MARCH_2024).unwrap();
        assert_eq!(rows.len(), successes, "pattern {pattern:05b}");
        assert_eq!(h.sink.received().len(), successes, "pattern {pattern:05b}");
        assert_eq!(h.sampler.series().len(), successes, "pattern {pattern:05b}");
    }
}

#[tokio::test]
async fn persistence_failure_does_not_stop_observation() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(snap(0, 1)), Ok(snap(1, 2))]));
    let sink = Arc::new(RecordingSink::default());
    let mut sampler = Sampler::new(
        common::context(Duration::from_secs(1)),
        fetcher.clone(),
        Box::new(BrokenStore),
        sink.clone(),
    );

    assert_eq!(
        sampler.run_cycle().await,
        CycleOutcome::Recorded { persisted: false }
    );
    assert_eq!(
        sampler.run_cycle().await,
        CycleOutcome::Recorded { persisted: false }
    );
    assert_eq!(sink.received().len(), 2);
    assert_eq!(sampler.series().len(), 2);
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

#[tokio::test]
async fn month_boundary_rolls_without_losing_samples() {
    let mut h = harness(vec![
        Ok(snap_at(at(2024, 1, 31, 23, 59, 58), 5)),
        Ok(snap_at(at(2024, 1, 31, 23, 59, 59), 6)),
        Ok(snap_at(at(2024, 2, 1, 0, 0, 0), 7)),
    ]);
    for _ in 0..3 {
        h.sampler.run_cycle().await;
    }

    let reader = h.reader();
    let jan = reader
        .read_partition(PartitionKey {
            year: 2024,
            month: 1,
        })
        .unwrap();
    let feb = reader
        .read_partition(PartitionKey {
            year: 2024,
            month: 2,
        })
        .unwrap();
    assert_eq!(jan.iter().map(|s| s.subscriptions).collect::<Vec<_>>(), vec![5, 6]);
    assert_eq!(feb.iter().map(|s| s.subscriptions).collect::<Vec<_>>(), vec![7]);
    assert_eq!(reader.list_partitions().unwrap().len(), 2);
}

#[tokio::test]
async fn restart_mid_month_appends_after_existing_rows() {
    let mut h = harness(vec![]);
    let mut earlier = h.reader();
    earlier.append(&snap(-120, 3)).unwrap();
    earlier.append(&snap(-60, 4)).unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![Ok(snap(0, 5))]));
    h.sampler = Sampler::new(
        common::context(Duration::from_secs(1)),
        fetcher,
        Box::new(h.reader()),
        h.sink.clone(),
    );
    h.sampler.run_cycle().await;

    let rows = h.reader().read_partition(MARCH_2024).unwrap();
    assert_eq!(
        rows.iter().map(|s| s.subscriptions).collect::<Vec<_>>(),
        vec![3, 4, 5]
    );
}

#[tokio::test(start_paused = true)]
async fn run_ticks_once_per_interval_until_cancelled() {
    let h = harness(vec![Ok(snap(0, 10)), Err(upstream(500)), Ok(snap(2, 12))]);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(h.sampler.run(shutdown.clone()));

    // cycles start at 0s, 1s and 2s; cancel while waiting for the 3s tick
    tokio::time::sleep(Duration::from_millis(2500)).await;
    shutdown.cancel();
    let series = task.await.unwrap();

    assert_eq!(h.fetcher.calls(), 3);
    assert_eq!(series.len(), 2);
    assert_eq!(h.sink.received().len(), 2);
    assert_eq!(march_rows(&h.dir).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_display_never_blocks_sampling() {
    let dir = tempfile::TempDir::new().unwrap();
    let script = (0..5).map(|i| Ok(snap(i, i as u64))).collect();
    let fetcher = Arc::new(ScriptedFetcher::new(script));
    // room for one update and nobody reading
    let (sink, mut rx) = ChannelSink::new(1);
    let sampler = Sampler::new(
        common::context(Duration::from_secs(1)),
        fetcher.clone(),
        Box::new(wstrack_storage::LogStore::new(&dir.path().join("w.csv"))),
        Arc::new(sink),
    );

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(sampler.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(4500)).await;
    shutdown.cancel();
    let series = task.await.unwrap();

    assert_eq!(fetcher.calls(), 5);
    assert_eq!(series.len(), 5);
    assert_eq!(rx.recv().await.unwrap().subscriptions, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn cancelled_before_start_runs_no_cycle() {
    let h = harness(vec![Ok(snap(0, 1))]);
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let series = h.sampler.run(shutdown).await;
    assert!(series.is_empty());
    assert_eq!(h.fetcher.calls(), 0);
}

fn march_rows(dir: &tempfile::TempDir) -> Vec<wstrack_common::Snapshot> {
    wstrack_storage::LogStore::new(&dir.path().join("workshop_data.csv"))
        .read_partition(MARCH_2024)
        .unwrap()
}
