//! Test helpers for vfeed-player integration tests
//!
//! Provides recording doubles that share one call-order log:
//! - RecordingUnit: `Playable` with optional latency and rejection
//! - RecordingHandle: `PlayerHandle` with optional hangs and failures
//! - drain_events: collect whatever the event bus has buffered

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use vfeed_common::events::FeedEvent;
use vfeed_common::UnitId;
use vfeed_player::playback::{Playable, Registration};
use vfeed_player::reclaim::PlayerHandle;
use vfeed_player::{Error, Result};

/// Shared, ordered log of `"<id>.<call>"` entries
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: &UnitId, call: &str) {
        self.0.lock().unwrap().push(format!("{}.{}", id, call));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries for one unit, without the id prefix
    pub fn calls_for(&self, id: &str) -> Vec<String> {
        let prefix = format!("{}.", id);
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Playable double logging `activate.begin/end` and `deactivate.begin/end`
pub struct RecordingUnit {
    id: UnitId,
    log: CallLog,
    activate_delay: Duration,
    deactivate_delay: Duration,
    reject_activate: AtomicBool,
    reject_deactivate: AtomicBool,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
}

impl RecordingUnit {
    pub fn new(id: &str, log: &CallLog) -> Self {
        Self {
            id: UnitId::new(id),
            log: log.clone(),
            activate_delay: Duration::ZERO,
            deactivate_delay: Duration::ZERO,
            reject_activate: AtomicBool::new(false),
            reject_deactivate: AtomicBool::new(false),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
        }
    }

    pub fn with_activate_delay(mut self, delay: Duration) -> Self {
        self.activate_delay = delay;
        self
    }

    pub fn with_deactivate_delay(mut self, delay: Duration) -> Self {
        self.deactivate_delay = delay;
        self
    }

    pub fn rejecting_activate(self) -> Self {
        self.reject_activate.store(true, Ordering::SeqCst);
        self
    }

    pub fn rejecting_deactivate(self) -> Self {
        self.reject_deactivate.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_reject_activate(&self, reject: bool) {
        self.reject_activate.store(reject, Ordering::SeqCst);
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Playable for RecordingUnit {
    async fn activate(&self) -> Result<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.log.push(&self.id, "activate.begin");
        if !self.activate_delay.is_zero() {
            tokio::time::sleep(self.activate_delay).await;
        }
        self.log.push(&self.id, "activate.end");
        if self.reject_activate.load(Ordering::SeqCst) {
            return Err(Error::Native(format!("{} refused to play", self.id)));
        }
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        self.log.push(&self.id, "deactivate.begin");
        if !self.deactivate_delay.is_zero() {
            tokio::time::sleep(self.deactivate_delay).await;
        }
        self.log.push(&self.id, "deactivate.end");
        if self.reject_deactivate.load(Ordering::SeqCst) {
            return Err(Error::from_native("View does not exist"));
        }
        Ok(())
    }
}

/// PlayerHandle double logging every native call by name
pub struct RecordingHandle {
    id: UnitId,
    log: CallLog,
    /// Latency applied to stop and unload
    hang: Option<Duration>,
    /// Latency applied to reload
    reload_hang: Option<Duration>,
    fail_reload: bool,
    fail_mute: Option<String>,
    fail_play: Option<String>,
}

impl RecordingHandle {
    pub fn new(id: &str, log: &CallLog) -> Self {
        Self {
            id: UnitId::new(id),
            log: log.clone(),
            hang: None,
            reload_hang: None,
            fail_reload: false,
            fail_mute: None,
            fail_play: None,
        }
    }

    pub fn hanging(mut self, hang: Duration) -> Self {
        self.hang = Some(hang);
        self
    }

    pub fn hanging_reload(mut self, hang: Duration) -> Self {
        self.reload_hang = Some(hang);
        self
    }

    pub fn failing_reload(mut self) -> Self {
        self.fail_reload = true;
        self
    }

    /// Make set_muted fail with a native message
    pub fn failing_mute(mut self, message: &str) -> Self {
        self.fail_mute = Some(message.to_string());
        self
    }

    pub fn failing_play(mut self, message: &str) -> Self {
        self.fail_play = Some(message.to_string());
        self
    }
}

#[async_trait]
impl PlayerHandle for RecordingHandle {
    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.log.push(&self.id, if muted { "mute" } else { "unmute" });
        match &self.fail_mute {
            Some(message) => Err(Error::from_native(message.clone())),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<()> {
        self.log.push(&self.id, "stop");
        if let Some(hang) = self.hang {
            tokio::time::sleep(hang).await;
        }
        Ok(())
    }

    async fn seek_to_start(&self) -> Result<()> {
        self.log.push(&self.id, "seek");
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.log.push(&self.id, "play");
        match &self.fail_play {
            Some(message) => Err(Error::from_native(message.clone())),
            None => Ok(()),
        }
    }

    async fn unload(&self) -> Result<()> {
        self.log.push(&self.id, "unload");
        if let Some(hang) = self.hang {
            tokio::time::sleep(hang).await;
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.log.push(&self.id, "reload");
        if let Some(hang) = self.reload_hang {
            tokio::time::sleep(hang).await;
        }
        if self.fail_reload {
            return Err(Error::Native("source unavailable".to_string()));
        }
        Ok(())
    }
}

/// Registration wiring a recording unit to a recording handle
pub fn registration(unit: &Arc<RecordingUnit>, handle: Arc<RecordingHandle>) -> Registration {
    Registration::new(unit.id.clone(), handle, Arc::clone(unit) as Arc<dyn Playable>)
}

/// Registration for `id` with fresh doubles; returns the unit for assertions
pub fn recording(id: &str, log: &CallLog) -> (Arc<RecordingUnit>, Registration) {
    let unit = Arc::new(RecordingUnit::new(id, log));
    let reg = registration(&unit, Arc::new(RecordingHandle::new(id, log)));
    (unit, reg)
}

/// Everything currently buffered on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<FeedEvent>) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Event type names, for compact assertions
pub fn event_types(events: &[FeedEvent]) -> Vec<&'static str> {
    events.iter().map(FeedEvent::event_type).collect()
}
