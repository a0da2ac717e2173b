//! Playable unit backed by a native handle and a reclaim strategy

use super::{select_strategy, MutePreference, PlatformProfile, PlayerHandle, ReclaimStrategy};
use crate::config::ReclaimSettings;
use crate::error::Result;
use crate::playback::registration::{Playable, Registration};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use vfeed_common::UnitId;

/// One feed item's player
///
/// The strategy is fixed at construction; the coordinator never asks which
/// platform it is running on.
pub struct PlayerUnit {
    id: UnitId,
    handle: Arc<dyn PlayerHandle>,
    strategy: Box<dyn ReclaimStrategy>,
    mute: MutePreference,
    loaded: AtomicBool,
}

impl PlayerUnit {
    pub fn new(
        id: UnitId,
        handle: Arc<dyn PlayerHandle>,
        profile: PlatformProfile,
        settings: &ReclaimSettings,
        mute: MutePreference,
    ) -> Self {
        let strategy = select_strategy(profile, settings);
        debug!("Created unit {} with {} reclaim", id, strategy.name());
        Self {
            id,
            handle,
            strategy,
            mute,
            // Sources are loaded when the view mounts
            loaded: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn handle(&self) -> Arc<dyn PlayerHandle> {
        Arc::clone(&self.handle)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// False after an unload, or after a reload that failed
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Registration for the coordinator
    pub fn registration(self: &Arc<Self>) -> Registration {
        Registration::new(self.id.clone(), self.handle(), Arc::clone(self) as Arc<dyn Playable>)
    }
}

#[async_trait]
impl Playable for PlayerUnit {
    async fn activate(&self) -> Result<()> {
        let result = self
            .strategy
            .activate(&self.id, self.handle.as_ref(), self.mute.is_muted())
            .await;
        // A successful reload stays loaded even if play then fails
        self.loaded.store(!self.strategy.is_unloaded(), Ordering::Release);
        result
    }

    async fn deactivate(&self) -> Result<()> {
        let result = self.strategy.deactivate(&self.id, self.handle.as_ref()).await;
        if self.strategy.is_unloaded() {
            self.loaded.store(false, Ordering::Release);
        }
        result
    }
}
