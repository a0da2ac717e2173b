//! Platform resource reclaim
//!
//! **Responsibilities:**
//! - `PlayerHandle`: the only seam that touches a concrete media API
//! - `ReclaimStrategy`: activate/deactivate policy, chosen once per unit
//! - `PlatformProfile`: the externally supplied capability flag that picks it
//! - `PlayerUnit`: a playable unit built from a handle plus a strategy
//!
//! Low-memory platforms cap how many decoders may be held at once, so there the
//! aggressive strategy unloads on every deactivate and reloads on the next
//! activate. Elsewhere the lightweight strategy only stops and rewinds.
//! Every native call goes through [`bounded`](bounded::bounded) so a call that
//! hangs on a recycled view cannot wedge the coordinator.

pub mod aggressive;
pub mod bounded;
pub mod lightweight;
pub mod unit;

pub use aggressive::AggressiveReclaim;
pub use bounded::{bounded, CallOutcome};
pub use lightweight::LightweightReclaim;
pub use unit::PlayerUnit;

use crate::config::ReclaimSettings;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vfeed_common::config::ReclaimMode;
use vfeed_common::UnitId;

/// Opaque native player handle
///
/// Owned by the view layer. Implementations report native failures as
/// `Error::from_native(message)` so recycled handles are recognisable.
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    async fn set_muted(&self, muted: bool) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Reset playback position to the start of the source
    async fn seek_to_start(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    /// Release the decoder and its native resources
    async fn unload(&self) -> Result<()>;

    /// Load the source again after `unload`
    async fn reload(&self) -> Result<()>;
}

/// Activate/deactivate policy for one unit
#[async_trait]
pub trait ReclaimStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    async fn activate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle, muted: bool) -> Result<()>;

    async fn deactivate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle) -> Result<()>;

    /// Whether the handle's decoder is currently released
    fn is_unloaded(&self) -> bool {
        false
    }
}

/// Platform capability flag deciding the reclaim strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Decoder handles are scarce and must be released when not playing
    pub aggressive_reclaim: bool,
}

impl PlatformProfile {
    /// Profile for the current build target
    pub fn detect() -> Self {
        Self {
            aggressive_reclaim: cfg!(target_os = "android"),
        }
    }

    /// Resolve a configured mode, falling back to detection for `Auto`
    pub fn from_mode(mode: ReclaimMode) -> Self {
        match mode {
            ReclaimMode::Auto => Self::detect(),
            ReclaimMode::Lightweight => Self {
                aggressive_reclaim: false,
            },
            ReclaimMode::Aggressive => Self {
                aggressive_reclaim: true,
            },
        }
    }
}

/// Build the strategy for a new unit
pub fn select_strategy(profile: PlatformProfile, settings: &ReclaimSettings) -> Box<dyn ReclaimStrategy> {
    if profile.aggressive_reclaim {
        Box::new(AggressiveReclaim::new(settings.native_call_timeout, settings.reload_timeout))
    } else {
        Box::new(LightweightReclaim::new(settings.native_call_timeout))
    }
}

/// Feed-wide mute preference shared by every unit
#[derive(Debug, Clone, Default)]
pub struct MutePreference(Arc<AtomicBool>);

impl MutePreference {
    pub fn new(muted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(muted)))
    }

    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.0.store(muted, Ordering::Release);
    }

    /// Flip the preference, returning the new value
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}
