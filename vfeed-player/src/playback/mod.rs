//! Feed playback coordination
//!
//! - `registration`: what a mounted unit hands to the coordinator
//! - `coordinator`: single-active invariant and serialized transitions
//! - `resolver`: scroll/viewability noise suppression, active index decision
//! - `feed`: wires resolver output into the coordinator

pub mod coordinator;
pub mod feed;
pub mod registration;
pub mod resolver;

pub use coordinator::PlaybackCoordinator;
pub use feed::FeedController;
pub use registration::{Playable, Registration};
pub use resolver::{ActiveIndexCell, ActiveIndexResolver, ResolverSignal, ViewableItem};
