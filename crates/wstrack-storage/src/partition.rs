use chrono::{Datelike, NaiveDateTime};
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_BASE: &str = "wstrack";
const DEFAULT_EXT: &str = "csv";

/// Calendar month a snapshot belongs to. Ordered by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    /// The partition of a sample, taken from the sample's own timestamp.
    pub fn of(ts: &NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// Parses the `MM-YYYY` form used in file names.
    pub fn parse(s: &str) -> Option<Self> {
        let (month, year) = s.split_once('-')?;
        if month.len() != 2 || year.len() != 4 {
            return None;
        }
        let month: u32 = month.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

/// Maps partition keys to file paths.
///
/// A template of `logs/workshop_data.csv` yields
/// `logs/workshop_data_03-2024.csv` for March 2024.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use wstrack_storage::partition::{PartitionKey, PartitionLayout};
///
/// let layout = PartitionLayout::from_template(Path::new("logs/workshop_data.csv"));
/// let key = PartitionKey { year: 2024, month: 3 };
/// assert_eq!(layout.path_for(key), Path::new("logs/workshop_data_03-2024.csv"));
/// assert_eq!(layout.key_of_file_name("workshop_data_03-2024.csv"), Some(key));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    dir: PathBuf,
    base: String,
    ext: String,
}

impl PartitionLayout {
    pub fn from_template(template: &Path) -> Self {
        let dir = template.parent().map(Path::to_path_buf).unwrap_or_default();
        let base = template
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_BASE.to_string());
        let ext = template
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_EXT.to_string());
        Self { dir, base, ext }
    }

    /// Directory holding the partitions; the current directory when the
    /// template has no parent.
    pub fn dir(&self) -> &Path {
        if self.dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            &self.dir
        }
    }

    pub fn file_name(&self, key: PartitionKey) -> String {
        format!("{}_{}.{}", self.base, key, self.ext)
    }

    pub fn path_for(&self, key: PartitionKey) -> PathBuf {
        self.dir.join(self.file_name(key))
    }

    /// Recovers the key from a file name produced by [`Self::file_name`].
    pub fn key_of_file_name(&self, name: &str) -> Option<PartitionKey> {
        let rest = name.strip_prefix(&self.base)?.strip_prefix('_')?;
        let key = rest.strip_suffix(&self.ext)?.strip_suffix('.')?;
        PartitionKey::parse(key)
    }
}
