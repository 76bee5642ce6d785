use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wstrack_fetcher::steam::DEFAULT_ENDPOINT;

/// Contents written by `wstrack init-config`.
pub const STARTER_CONFIG: &str = r#"# Steam Web API key
api_key = ""
# Workshop item (published file) id to track
entity_id = ""
# Seconds between samples
interval_secs = 60
# Monthly logs are written next to this path as <name>_<MM>-<YYYY>.<ext>
log_path_template = "workshop_data.csv"
# request_timeout_secs = 30
# display_buffer = 64
# failure_alert_threshold = 5
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, alias = "workshop_item_id")]
    pub entity_id: String,
    #[serde(default = "default_interval_secs", alias = "interval")]
    pub interval_secs: u64,
    #[serde(default = "default_log_path_template", alias = "excel_file_path")]
    pub log_path_template: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Upper bound on one fetch, connection included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Snapshots queued for the display before new ones are dropped.
    #[serde(default = "default_display_buffer")]
    pub display_buffer: usize,
    /// Consecutive failed fetches before failures are logged as errors.
    #[serde(default = "default_failure_alert_threshold")]
    pub failure_alert_threshold: u32,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_log_path_template() -> String {
    "workshop_data.csv".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_display_buffer() -> usize {
    64
}

fn default_failure_alert_threshold() -> u32 {
    5
}

impl TrackerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the sampler cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api_key is required");
        }
        if self.entity_id.trim().is_empty() {
            bail!("entity_id is required");
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be greater than 0");
        }
        if self.log_path_template.trim().is_empty() {
            bail!("log_path_template must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }
        if self.display_buffer == 0 {
            bail!("display_buffer must be greater than 0");
        }
        Ok(())
    }
}

/// Writes [`STARTER_CONFIG`] to `path`, refusing to overwrite an existing file.
pub fn write_starter(path: &str) -> anyhow::Result<()> {
    let path = Path::new(path);
    if path.exists() {
        bail!("'{}' already exists, not overwriting", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    std::fs::write(path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}
