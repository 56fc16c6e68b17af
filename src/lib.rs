//! Signed, cached client for an issue-tracking web API.
//!
//! [`tracker::Issues`] pages through the remote issue collection and
//! resolves single issues by reference, sharing a [`cache::CacheLayer`]
//! that memoizes records, ref/id linkages and whole-collection walks.

pub mod cache;
pub mod config;
pub mod error;
pub mod tracker;

pub use error::{Result, TrackerError};
