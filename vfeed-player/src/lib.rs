//! # vfeed Player Library (vfeed-player)
//!
//! Playback coordination for a vertically scrolling short-video feed.
//!
//! **Purpose:** Keep at most one feed item playing, turn noisy scroll and
//! viewability signals into a single active-item decision, and release native
//! decoder resources in a platform-appropriate way when items go inactive.
//!
//! **Architecture:** `playback` (coordinator, resolver, feed controller) on top
//! of `reclaim` (per-unit activate/deactivate strategies over bounded native
//! calls). Observers follow along on the `vfeed_common::events::EventBus`.

pub mod config;
pub mod error;
pub mod playback;
pub mod reclaim;
pub mod simulation;

pub use error::{Error, Result};
pub use playback::{FeedController, PlaybackCoordinator};
