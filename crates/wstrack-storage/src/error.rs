use std::path::PathBuf;

/// Errors that can occur while persisting snapshots to the monthly log.
///
/// None of these stop sampling: the sampler logs them and moves on.
///
/// # Examples
///
/// ```rust
/// use std::path::PathBuf;
/// use wstrack_storage::error::StoreError;
///
/// let err = StoreError::CorruptPartition {
///     path: PathBuf::from("data_03-2024.csv"),
///     reason: "unexpected header".to_string(),
/// };
/// assert!(err.to_string().contains("data_03-2024.csv"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The partition file or its directory could not be created, opened,
    /// written or synced.
    #[error("Store: I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An existing partition does not look like one this store wrote.
    #[error("Store: corrupt partition {}: {reason}", .path.display())]
    CorruptPartition { path: PathBuf, reason: String },

    /// CSV encoding or decoding failure.
    #[error("Store: CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
