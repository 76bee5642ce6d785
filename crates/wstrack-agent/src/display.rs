//! Handoff from the sampler to the foreground display.
//!
//! The sampler only ever calls [`DisplaySink::on_snapshot`]. [`ChannelSink`]
//! turns that into a non-blocking send on a bounded channel whose receiver is
//! owned by the [`ConsoleRenderer`] running on the foreground task, so the
//! display state is only ever touched from its own context.

use chrono::NaiveDateTime;
use std::io::{self, Write};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use wstrack_common::types::TIMESTAMP_FORMAT;
use wstrack_common::Snapshot;

/// Consumer of freshly recorded snapshots.
///
/// Called from the sampler task. Implementations must return promptly and
/// must cope with snapshots arriving at irregular intervals.
pub trait DisplaySink: Send + Sync {
    fn on_snapshot(&self, snapshot: &Snapshot);
}

/// Posts snapshots onto a bounded channel without ever waiting.
pub struct ChannelSink {
    tx: mpsc::Sender<Snapshot>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Snapshot>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl DisplaySink for ChannelSink {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    timestamp = %dropped.timestamp_string(),
                    "Display is behind, dropping update"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Display closed, update discarded");
            }
        }
    }
}

/// What the display currently shows: the latest snapshot's fields and the
/// subscriptions time axis.
#[derive(Debug, Default)]
pub struct DisplayState {
    latest: Option<Snapshot>,
    subscriptions: Vec<(NaiveDateTime, u64)>,
}

impl DisplayState {
    pub fn apply(&mut self, snapshot: Snapshot) {
        self.subscriptions
            .push((snapshot.timestamp, snapshot.subscriptions));
        self.latest = Some(snapshot);
    }

    pub fn updates(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn subscriptions(&self) -> &[(NaiveDateTime, u64)] {
        &self.subscriptions
    }

    /// Label/value pairs for the latest snapshot, in log column order.
    pub fn labels(&self) -> Vec<(&'static str, String)> {
        let Some(s) = &self.latest else {
            return Vec::new();
        };
        vec![
            ("Timestamp", s.timestamp_string()),
            ("Title", s.title.clone()),
            ("Views", s.views.to_string()),
            ("Subscriptions", s.subscriptions.to_string()),
            ("Favorites", s.favorites.to_string()),
            ("Lifetime Subscriptions", s.lifetime_subscriptions.to_string()),
            ("Lifetime Favorited", s.lifetime_favorited.to_string()),
        ]
    }

    /// One-line summary of the subscriptions series.
    pub fn trend(&self) -> Option<String> {
        let (first_ts, first) = *self.subscriptions.first()?;
        let (last_ts, last) = *self.subscriptions.last()?;
        let min = self.subscriptions.iter().map(|(_, v)| *v).min()?;
        let max = self.subscriptions.iter().map(|(_, v)| *v).max()?;
        let change = last as i128 - first as i128;
        Some(format!(
            "{} points, {} .. {}, min {min}, max {max}, change {change:+}",
            self.subscriptions.len(),
            first_ts.format(TIMESTAMP_FORMAT),
            last_ts.format(TIMESTAMP_FORMAT),
        ))
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let labels = self.labels();
        let width = labels.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        writeln!(out)?;
        for (label, value) in &labels {
            writeln!(out, "{label:>width$}: {value}")?;
        }
        if let Some(trend) = self.trend() {
            writeln!(out, "{:>width$}: {trend}", "Trend")?;
        }
        out.flush()
    }
}

/// Foreground consumer: drains the channel and redraws after each snapshot.
pub struct ConsoleRenderer<W: Write> {
    rx: mpsc::Receiver<Snapshot>,
    state: DisplayState,
    out: W,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(rx: mpsc::Receiver<Snapshot>, out: W) -> Self {
        Self {
            rx,
            state: DisplayState::default(),
            out,
        }
    }

    /// Renders until shutdown or until every sender is gone.
    pub async fn run(mut self, shutdown: CancellationToken) -> DisplayState {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(snapshot) => {
                        self.state.apply(snapshot);
                        if let Err(e) = self.state.render(&mut self.out) {
                            tracing::warn!(error = %e, "Failed to render snapshot");
                        }
                    }
                    None => break,
                },
            }
        }
        self.state
    }
}
