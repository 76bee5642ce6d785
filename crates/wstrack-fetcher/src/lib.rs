//! Remote metrics fetching for a tracked Workshop item.
//!
//! [`MetricsFetcher`] is the seam the sampler calls once per cycle;
//! [`SteamFetcher`] implements it against the Steam Web API.

pub mod error;
pub mod steam;

use async_trait::async_trait;
use wstrack_common::Snapshot;

pub use error::FetchError;
pub use steam::SteamFetcher;

/// API credentials sent with every request.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Remote source of item metrics.
///
/// One call is one network round trip. Implementations never retry; the
/// sampler decides what happens after a failure.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    /// Fetcher name (e.g. `"steam"`), used for logging.
    fn name(&self) -> &str;

    /// Fetches the current metrics of `entity_id` and normalizes them.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] when no response arrives,
    /// [`FetchError::Upstream`] for a non-success status, and
    /// [`FetchError::MalformedResponse`] when the payload cannot be turned
    /// into a [`Snapshot`].
    async fn fetch(&self, entity_id: &str, credentials: &Credentials) -> error::Result<Snapshot>;
}
