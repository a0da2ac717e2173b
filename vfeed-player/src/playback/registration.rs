//! Unit registrations

use crate::error::Result;
use crate::reclaim::PlayerHandle;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use vfeed_common::UnitId;

/// Activate/deactivate capabilities of a playable unit
#[async_trait]
pub trait Playable: Send + Sync {
    /// Start playing; an error leaves the unit inactive
    async fn activate(&self) -> Result<()>;

    /// Stop playing and release whatever the unit's policy releases
    async fn deactivate(&self) -> Result<()>;
}

/// A mounted unit as known to the coordinator
///
/// The coordinator never owns the handle's lifecycle. It mutes the handle
/// directly for fast audio cut-off and otherwise only calls `unit`.
#[derive(Clone)]
pub struct Registration {
    pub id: UnitId,
    pub handle: Arc<dyn PlayerHandle>,
    pub unit: Arc<dyn Playable>,
}

impl Registration {
    pub fn new(id: UnitId, handle: Arc<dyn PlayerHandle>, unit: Arc<dyn Playable>) -> Self {
        Self { id, handle, unit }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish_non_exhaustive()
    }
}
