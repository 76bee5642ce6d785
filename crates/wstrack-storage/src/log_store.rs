use crate::error::{Result, StoreError};
use crate::partition::{PartitionKey, PartitionLayout};
use crate::{PartitionInfo, SnapshotStore};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use wstrack_common::types::LOG_HEADER;
use wstrack_common::Snapshot;

/// Append-only CSV log, one file per calendar month.
///
/// Every append writes one complete row with a single `write` call and
/// syncs it to disk before returning. A failed write is rolled back, and a
/// torn trailing row left by a crash is cut off the next time the partition
/// is opened, so a failure can lose at most the row being written.
pub struct LogStore {
    layout: PartitionLayout,
    /// Length of each partition after this process last wrote it. A
    /// partition whose size differs is checked again before the next append.
    known_len: HashMap<PartitionKey, u64>,
}

enum PartitionState {
    Missing,
    Empty,
    Ready { len: u64 },
}

impl PartitionState {
    fn len(&self) -> u64 {
        match self {
            PartitionState::Missing | PartitionState::Empty => 0,
            PartitionState::Ready { len } => *len,
        }
    }
}

impl LogStore {
    pub fn new(template: &Path) -> Self {
        Self {
            layout: PartitionLayout::from_template(template),
            known_len: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    fn state_of(&self, key: PartitionKey, path: &Path) -> Result<PartitionState> {
        let len = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PartitionState::Missing)
            }
            Err(e) => return Err(StoreError::io(path)(e)),
        };

        if len == 0 {
            // created but never written, e.g. a crash right after creation
            return Ok(PartitionState::Empty);
        }
        if self.known_len.get(&key) == Some(&len) {
            return Ok(PartitionState::Ready { len });
        }

        let bytes = fs::read(path).map_err(StoreError::io(path))?;
        let complete = complete_prefix(path, &bytes)? as u64;
        if complete < len {
            truncate_torn_tail(path, len, complete)?;
        }
        if complete == 0 {
            return Ok(PartitionState::Empty);
        }
        Ok(PartitionState::Ready { len: complete })
    }

    /// Reads every snapshot of one partition. A missing partition reads as
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptPartition`] if the header or any row does
    /// not decode.
    pub fn read_partition(&self, key: PartitionKey) -> Result<Vec<Snapshot>> {
        let path = self.layout.path_for(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_path(&path)
    }

    /// Returns information about all partitions on disk, oldest first.
    pub fn list_partitions(&self) -> Result<Vec<PartitionInfo>> {
        let dir = self.layout.dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir)(e)),
        };

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io(dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(key) = self.layout.key_of_file_name(&name) {
                let metadata = entry.metadata().map_err(StoreError::io(entry.path()))?;
                infos.push(PartitionInfo {
                    key,
                    path: entry.path(),
                    size_bytes: metadata.len(),
                });
            }
        }
        infos.sort_by_key(|info| info.key);
        Ok(infos)
    }
}

impl SnapshotStore for LogStore {
    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        let key = PartitionKey::of(&snapshot.timestamp);
        let path = self.layout.path_for(key);
        let state = self.state_of(key, &path)?;

        let mut buf = Vec::new();
        {
            let mut writer = csv_writer(&mut buf);
            if !matches!(state, PartitionState::Ready { .. }) {
                writer.write_record(LOG_HEADER)?;
            }
            writer.write_record(snapshot.to_row())?;
            writer.flush().map_err(StoreError::io(&path))?;
        }

        let mut file = match state {
            PartitionState::Missing => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
                }
                let file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(StoreError::io(&path))?;
                tracing::info!(partition = %key, path = %path.display(), "Created new partition");
                file
            }
            PartitionState::Empty | PartitionState::Ready { .. } => OpenOptions::new()
                .append(true)
                .open(&path)
                .map_err(StoreError::io(&path))?,
        };

        let before = state.len();
        if let Err(e) = file.write_all(&buf).and_then(|()| file.sync_all()) {
            self.known_len.remove(&key);
            roll_back(&file, &path, before);
            return Err(StoreError::io(&path)(e));
        }
        self.known_len.insert(key, before + buf.len() as u64);

        tracing::debug!(
            partition = %key,
            timestamp = %snapshot.timestamp_string(),
            "Appended snapshot"
        );
        Ok(())
    }
}

/// Cuts a partially written row back off the end of a partition.
fn roll_back(file: &File, path: &Path, len: u64) {
    if let Err(e) = file.set_len(len).and_then(|()| file.sync_all()) {
        // the size check on the next append repairs the tail instead
        tracing::warn!(path = %path.display(), error = %e, "Failed to roll back partial write");
    }
}

fn truncate_torn_tail(path: &Path, len: u64, complete: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(StoreError::io(path))?;
    file.set_len(complete).map_err(StoreError::io(path))?;
    file.sync_all().map_err(StoreError::io(path))?;
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = len - complete,
        "Dropped incomplete trailing row"
    );
    Ok(())
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

/// Returns how many leading bytes of a partition hold the header and
/// complete rows.
///
/// Only the final row may be incomplete; it is the one a crash or failed
/// write interrupted. An unexpected header, or an incomplete row followed by
/// more data, is reported as [`StoreError::CorruptPartition`].
fn complete_prefix(path: &Path, bytes: &[u8]) -> Result<usize> {
    let corrupt = |reason: String| StoreError::CorruptPartition {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut record = csv::ByteRecord::new();
    let mut end = 0;
    let mut row = 0;

    while reader.read_byte_record(&mut record)? {
        row += 1;
        let pos = reader.position().byte() as usize;
        let terminated = bytes[..pos].ends_with(b"\n");

        if row == 1
            && terminated
            && !record.iter().eq(LOG_HEADER.iter().map(|h| h.as_bytes()))
        {
            return Err(corrupt("unexpected header".to_string()));
        }
        if row == 1 && !terminated && !LOG_HEADER.join(",").as_bytes().starts_with(bytes) {
            return Err(corrupt("unexpected header".to_string()));
        }
        if !terminated || record.len() != LOG_HEADER.len() {
            if pos == bytes.len() {
                break;
            }
            return Err(corrupt(format!("row {row} is incomplete")));
        }
        end = pos;
    }
    Ok(end)
}

/// Reads every snapshot from a partition file.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be read and
/// [`StoreError::CorruptPartition`] if the header or a row does not decode.
/// An incomplete final row is skipped.
pub fn read_path(path: &Path) -> Result<Vec<Snapshot>> {
    let bytes = fs::read(path).map_err(StoreError::io(path))?;
    // a torn final row was never acknowledged to the caller
    let complete = complete_prefix(path, &bytes)?;
    if complete == 0 {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(&bytes[..complete]);

    let mut snapshots = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();
        let snapshot = Snapshot::from_row(&fields).map_err(|e| StoreError::CorruptPartition {
            path: path.to_path_buf(),
            reason: format!("row {}: {e}", idx + 2),
        })?;
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}
