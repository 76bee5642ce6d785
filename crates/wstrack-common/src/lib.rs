//! Shared data model for the wstrack sampler.
//!
//! [`types::Snapshot`] is the single observation record passed between the
//! fetcher, the log store and the display. [`normalize::normalize`] turns an
//! upstream details record into a snapshot, and [`clock::Clock`] supplies the
//! local second-precision timestamps every snapshot carries.

pub mod clock;
pub mod error;
pub mod normalize;
pub mod types;

pub use clock::{Clock, LocalClock, ManualClock};
pub use error::ModelError;
pub use normalize::normalize;
pub use types::{Snapshot, TrackingSeries};
