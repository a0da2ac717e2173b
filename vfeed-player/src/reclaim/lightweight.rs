//! Lightweight reclaim: keep the decoder, stop and rewind

use super::bounded::soft_call;
use super::{PlayerHandle, ReclaimStrategy};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use vfeed_common::UnitId;

/// Strategy for platforms where holding several decoders is cheap
///
/// - activate: stop → seek to start → apply mute preference → play
/// - deactivate: mute → stop → seek to start
#[derive(Debug, Clone)]
pub struct LightweightReclaim {
    call_timeout: Duration,
}

impl LightweightReclaim {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    /// Start playback from the beginning
    ///
    /// Only a failing `play` aborts; the preparatory calls are best effort.
    pub(crate) async fn start_from_beginning(
        &self,
        unit_id: &UnitId,
        handle: &dyn PlayerHandle,
        muted: bool,
    ) -> Result<()> {
        let limit = self.call_timeout;
        let _ = soft_call(unit_id, "stop", limit, handle.stop()).await;
        let _ = soft_call(unit_id, "seek_to_start", limit, handle.seek_to_start()).await;
        let _ = soft_call(unit_id, "set_muted", limit, handle.set_muted(muted)).await;
        soft_call(unit_id, "play", limit, handle.play()).await
    }
}

#[async_trait]
impl ReclaimStrategy for LightweightReclaim {
    fn name(&self) -> &'static str {
        "lightweight"
    }

    async fn activate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle, muted: bool) -> Result<()> {
        debug!("Activating {} (lightweight, muted: {})", unit_id, muted);
        self.start_from_beginning(unit_id, handle, muted).await
    }

    async fn deactivate(&self, unit_id: &UnitId, handle: &dyn PlayerHandle) -> Result<()> {
        debug!("Deactivating {} (lightweight)", unit_id);
        let limit = self.call_timeout;
        let muted = soft_call(unit_id, "set_muted", limit, handle.set_muted(true)).await;
        let stopped = soft_call(unit_id, "stop", limit, handle.stop()).await;
        let rewound = soft_call(unit_id, "seek_to_start", limit, handle.seek_to_start()).await;

        // All three steps always run; report the first real failure
        first_real_failure([muted, stopped, rewound])
    }
}

/// First non-benign error among step results
pub(crate) fn first_real_failure<const N: usize>(results: [Result<()>; N]) -> Result<()> {
    for result in results {
        if let Err(e) = result {
            if !e.is_benign() {
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_first_real_failure_skips_benign() {
        let result = first_real_failure([
            Err(Error::InvalidHandle("invalid view".to_string())),
            Ok(()),
            Err(Error::Native("boom".to_string())),
        ]);
        assert_eq!(result, Err(Error::Native("boom".to_string())));
    }

    #[test]
    fn test_first_real_failure_all_benign() {
        let result = first_real_failure([Ok(()), Err(Error::InvalidHandle("not loaded".to_string()))]);
        assert!(result.is_ok());
    }
}
