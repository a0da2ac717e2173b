//! Aggressive reclaim: release the decoder on every deactivate
//!
//! Used where the OS imposes a hard ceiling on concurrently held decoders and
//! leaked handles get the hosting process killed. The strategy instance is
//! per unit and remembers whether its handle is currently unloaded.

use super::bounded::{bounded, soft_call, CallOutcome};
use super::lightweight::{first_real_failure, LightweightReclaim};
use super::{PlayerHandle, ReclaimStrategy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use vfeed_common::UnitId;

/// Strategy for decoder-constrained platforms
///
/// - deactivate: stop (bounded) → unload (bounded); no-op when already unloaded
/// - activate: reload first if unloaded, then the lightweight start sequence
#[derive(Debug)]
pub struct AggressiveReclaim {
    start: LightweightReclaim,
    call_timeout: Duration,
    reload_timeout: Duration,
    unloaded: AtomicBool,
}

impl AggressiveReclaim {
    pub fn new(call_timeout: Duration, reload_timeout: Duration) -> Self {
        Self {
            start: LightweightReclaim::new(call_timeout),
            call_timeout,
            reload_timeout,
            unloaded: AtomicBool::new(false),
        }
    }

    async fn reload(&self, unit_id: &UnitId, handle: &dyn PlayerHandle) -> Result<()> {
        debug!("Reloading previously unloaded source for {}", unit_id);
        match bounded("reload", self.reload_timeout, handle.reload()).await {
            CallOutcome::Completed(Ok(())) => {
                self.unloaded.store(false, Ordering::Release);
                Ok(())
            }
            CallOutcome::Completed(Err(e)) => Err(Error::ReloadFailed {
                unit_id: unit_id.clone(),
                reason: e.to_string(),
            }),
            // A source that may or may not have loaded must not be played
            CallOutcome::TimedOut => Err(Error::ReloadFailed {
                unit_id: unit_id.clone(),
                reason: format!("timed out after {}ms", self.reload_timeout.as_millis()),
            }),
        }
    }
}

#[async_trait]
impl ReclaimStrategy for AggressiveReclaim {
    fn name(&self) -> &'static str {
        "aggressive"
    }

    async fn activate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle, muted: bool) -> Result<()> {
        if self.is_unloaded() {
            if let Err(e) = self.reload(unit_id, handle).await {
                warn!("{}; not starting playback", e);
                return Err(e);
            }
        }
        self.start.start_from_beginning(unit_id, handle, muted).await
    }

    async fn deactivate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle) -> Result<()> {
        if self.is_unloaded() {
            debug!("{} already unloaded, nothing to reclaim", unit_id);
            return Ok(());
        }

        let stopped = soft_call(unit_id, "stop", self.call_timeout, handle.stop()).await;
        let unloaded = soft_call(unit_id, "unload", self.call_timeout, handle.unload()).await;

        // Even a failed or abandoned unload is followed by a reload next time
        self.unloaded.store(true, Ordering::Release);
        info!("Reclaimed decoder for {}", unit_id);

        first_real_failure([stopped, unloaded])
    }

    fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }
}
