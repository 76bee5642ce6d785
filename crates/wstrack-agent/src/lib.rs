//! Sampler and display handoff for tracking one Steam Workshop item.
//!
//! [`sampler::Sampler`] is the background loop (fetch → persist → publish →
//! wait); [`display`] carries each recorded snapshot to the foreground
//! renderer; [`config`] loads the tracker settings.

pub mod config;
pub mod display;
pub mod sampler;
