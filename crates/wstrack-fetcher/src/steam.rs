use crate::error::{FetchError, Result};
use crate::{Credentials, MetricsFetcher};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wstrack_common::{normalize, Clock, Snapshot};

pub const DEFAULT_ENDPOINT: &str =
    "https://api.steampowered.com/IPublishedFileService/GetDetails/v1/";

/// Steam marks a found item with `result = 1`; anything else means the
/// record is missing or hidden.
const RESULT_OK: i64 = 1;

const STATUS_OK: u16 = 200;

/// Maximum number of bytes of an error body kept in [`FetchError::Upstream`].
const MAX_ERROR_BODY: usize = 200;

/// Fetches Workshop item details from the Steam Web API.
pub struct SteamFetcher {
    endpoint: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl SteamFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(endpoint: &str, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::builder().use_rustls_tls().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
            clock,
        })
    }
}

#[async_trait]
impl MetricsFetcher for SteamFetcher {
    fn name(&self) -> &str {
        "steam"
    }

    async fn fetch(&self, entity_id: &str, credentials: &Credentials) -> Result<Snapshot> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", credentials.api_key.as_str()),
                ("publishedfileids[0]", entity_id),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let observed_at = self.clock.now();

        tracing::debug!(
            entity_id,
            status = status.as_u16(),
            bytes = body.len(),
            "Fetched item details"
        );

        parse_details_response(status.as_u16(), &body, observed_at)
    }
}

/// Classifies a GetDetails response and normalizes the item record.
///
/// Only `200 OK` counts as success.
pub fn parse_details_response(
    status: u16,
    body: &str,
    observed_at: NaiveDateTime,
) -> Result<Snapshot> {
    if status != STATUS_OK {
        return Err(FetchError::Upstream {
            status,
            body: truncate(body, MAX_ERROR_BODY),
        });
    }

    let json: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("invalid JSON: {e}")))?;

    let details = json
        .get("response")
        .and_then(|r| r.get("publishedfiledetails"))
        .and_then(|d| d.get(0))
        .ok_or_else(|| FetchError::malformed("missing response.publishedfiledetails[0]"))?;

    if let Some(result) = details.get("result").and_then(Value::as_i64) {
        if result != RESULT_OK {
            return Err(FetchError::malformed(format!(
                "item lookup returned result={result}"
            )));
        }
    }

    Ok(normalize(details, observed_at)?)
}

/// Truncates to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
