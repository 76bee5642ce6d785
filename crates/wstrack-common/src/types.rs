use crate::error::{ModelError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Rendering of [`Snapshot::timestamp`] in logs and on screen.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Title recorded when the upstream record carries none.
pub const UNKNOWN_TITLE: &str = "unknown";

/// Column names of a log partition, in row order.
pub const LOG_HEADER: [&str; 7] = [
    "Timestamp",
    "Title",
    "Views",
    "Subscriptions",
    "Favorites",
    "Lifetime Subscriptions",
    "Lifetime Favorites",
];

/// One observation of the tracked item at one point in time.
///
/// Snapshots are built once by the fetcher and never mutated afterwards; the
/// series, the log store and the display each hold their own copy.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use wstrack_common::Snapshot;
///
/// let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
///     .unwrap()
///     .and_hms_opt(14, 5, 0)
///     .unwrap();
/// let snap = Snapshot::new(ts, "Better Maps");
/// assert_eq!(snap.timestamp_string(), "2024-03-09 14:05:00");
/// assert_eq!(snap.to_row()[1], "Better Maps");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub title: String,
    pub views: u64,
    pub subscriptions: u64,
    pub favorites: u64,
    pub lifetime_subscriptions: u64,
    pub lifetime_favorited: u64,
}

impl Snapshot {
    /// A snapshot with every counter at zero.
    pub fn new(timestamp: NaiveDateTime, title: impl Into<String>) -> Self {
        Self {
            timestamp,
            title: title.into(),
            views: 0,
            subscriptions: 0,
            favorites: 0,
            lifetime_subscriptions: 0,
            lifetime_favorited: 0,
        }
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Encodes the snapshot as one log row, columns ordered as [`LOG_HEADER`].
    pub fn to_row(&self) -> [String; 7] {
        [
            self.timestamp_string(),
            self.title.clone(),
            self.views.to_string(),
            self.subscriptions.to_string(),
            self.favorites.to_string(),
            self.lifetime_subscriptions.to_string(),
            self.lifetime_favorited.to_string(),
        ]
    }

    /// Decodes a log row written by [`Snapshot::to_row`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ColumnCount`] if the row does not have exactly
    /// seven columns, or [`ModelError::InvalidColumn`] if a timestamp or
    /// counter column does not parse.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self> {
        if row.len() != LOG_HEADER.len() {
            return Err(ModelError::ColumnCount {
                expected: LOG_HEADER.len(),
                found: row.len(),
            });
        }

        let raw_ts = row[0].as_ref();
        let timestamp = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).map_err(|_| {
            ModelError::InvalidColumn {
                column: LOG_HEADER[0],
                value: raw_ts.to_string(),
            }
        })?;

        let count = |idx: usize| -> Result<u64> {
            let raw = row[idx].as_ref();
            raw.parse::<u64>().map_err(|_| ModelError::InvalidColumn {
                column: LOG_HEADER[idx],
                value: raw.to_string(),
            })
        };

        Ok(Self {
            timestamp,
            title: row[1].as_ref().to_string(),
            views: count(2)?,
            subscriptions: count(3)?,
            favorites: count(4)?,
            lifetime_subscriptions: count(5)?,
            lifetime_favorited: count(6)?,
        })
    }
}

/// Every snapshot observed since process start, in arrival order.
///
/// Only the sampler appends to the series, so insertion order is time order.
#[derive(Debug, Clone, Default)]
pub struct TrackingSeries {
    points: Vec<Snapshot>,
}

impl TrackingSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.points.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.points.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.points.iter()
    }

    /// Time axis of the subscriptions chart.
    pub fn subscription_points(&self) -> Vec<(NaiveDateTime, u64)> {
        self.points
            .iter()
            .map(|s| (s.timestamp, s.subscriptions))
            .collect()
    }
}
