//! # vfeed Common Library
//!
//! Shared code for the vfeed crates including:
//! - Stable unit identifiers (`UnitId`)
//! - Event types (`FeedEvent`) and the broadcast `EventBus`
//! - TOML configuration loading and config file resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use ids::UnitId;
