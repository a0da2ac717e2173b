//! Simulated native player
//!
//! Stands in for a platform video view when running the scripted session
//! from the command line. Every call is logged; stop and unload can be made to
//! hang and play can be made to fail, which is how the CLI reproduces wedged
//! decoders and rejecting units.

use crate::error::{Error, Result};
use crate::reclaim::PlayerHandle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;
use vfeed_common::UnitId;

/// Logging player handle with injectable misbehaviour
#[derive(Debug)]
pub struct SimulatedPlayer {
    unit_id: UnitId,
    /// Extra latency on stop and unload
    hang: Option<Duration>,
    fail_play: bool,
    muted: AtomicBool,
    playing: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
}

impl SimulatedPlayer {
    pub fn new(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            hang: None,
            fail_play: false,
            muted: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make stop and unload take `hang` before returning
    pub fn with_hang(mut self, hang: Duration) -> Self {
        self.hang = Some(hang);
        self
    }

    /// Make every play call fail
    pub fn failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Native calls received so far, oldest first
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: &'static str) {
        debug!("[{}] {}", self.unit_id, call);
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    async fn maybe_hang(&self) {
        if let Some(hang) = self.hang {
            tokio::time::sleep(hang).await;
        }
    }
}

#[async_trait]
impl PlayerHandle for SimulatedPlayer {
    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.record(if muted { "mute" } else { "unmute" });
        self.muted.store(muted, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        self.maybe_hang().await;
        self.playing.store(false, Ordering::Release);
        Ok(())
    }

    async fn seek_to_start(&self) -> Result<()> {
        self.record("seek_to_start");
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play");
        if self.fail_play {
            return Err(Error::from_native(format!("decoder for {} refused to start", self.unit_id)));
        }
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        self.record("unload");
        self.maybe_hang().await;
        self.playing.store(false, Ordering::Release);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record("reload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let player = SimulatedPlayer::new(UnitId::new("clip-1"));
        player.set_muted(true).await.unwrap();
        player.play().await.unwrap();
        player.stop().await.unwrap();

        assert_eq!(player.calls(), vec!["mute", "play", "stop"]);
        assert!(player.is_muted());
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_failing_play_is_native_error() {
        let player = SimulatedPlayer::new(UnitId::new("clip-2")).failing_play();
        let err = player.play().await.unwrap_err();
        assert!(matches!(err, Error::Native(_)));
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_delays_stop() {
        let player = SimulatedPlayer::new(UnitId::new("clip-3")).with_hang(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        player.stop().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
