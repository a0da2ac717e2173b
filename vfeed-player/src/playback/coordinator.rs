//! Playback coordinator - single active unit across the feed
//!
//! **Responsibilities:**
//! - Registry of mounted units (idempotent upsert on recycle)
//! - At most one active unit at any instant
//! - Serialized transitions: the outgoing unit's deactivation is fully awaited
//!   before the incoming unit's activation begins
//! - Crash-proof boundary: no operation returns an error or panics; capability
//!   failures are logged and absorbed
//!
//! Two flags serialize transitions: `activating` (one activation at a time) and
//! the per-id `deactivating` set (no duplicate deactivation when set_active,
//! deactivate_all and a navigate-away hook race). State sits behind a
//! `std::sync::Mutex` that is never held across an `.await`.

use crate::config::CoordinatorSettings;
use crate::error::Error;
use crate::playback::registration::Registration;
use crate::reclaim::bounded::soft_call;
use crate::reclaim::PlayerHandle;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use vfeed_common::events::{EventBus, FeedEvent};
use vfeed_common::UnitId;

/// Mutable coordinator state
#[derive(Default)]
struct CoordinatorState {
    registry: HashMap<UnitId, Registration>,

    active_id: Option<UnitId>,

    /// The active unit was deactivated by a transition whose activation then
    /// failed. `active_id` still names it, but it is not playing; a later
    /// `set_active` for it must activate again instead of no-op.
    active_suspended: bool,

    /// In-flight deactivations; the receiver turns true when one finishes
    deactivating: HashMap<UnitId, watch::Receiver<bool>>,

    activating: bool,

    /// Most recent `set_active` target; deferred requests for older targets give up
    requested_id: Option<UnitId>,

    /// Bumped by `cleanup`; transitions started before it leave state alone
    epoch: u64,

    /// Bumped by `deactivate_all`; an activation that started before it is
    /// wound down again instead of recorded
    generation: u64,
}

struct CoordinatorInner {
    state: Mutex<CoordinatorState>,
    settings: CoordinatorSettings,
    events: EventBus,
}

/// Playback coordinator for one feed screen
///
/// Cheap to clone; clones share state. Construct at feed-screen mount and call
/// [`cleanup`](Self::cleanup) at unmount.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<CoordinatorInner>,
}

/// Releases the activation lock when a transition ends, however it ends
struct ActivationGuard<'a> {
    inner: &'a CoordinatorInner,
    epoch: u64,
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if state.epoch == self.epoch {
            state.activating = false;
        }
    }
}

/// Removes an id from the deactivating set when its deactivation ends and
/// wakes callers waiting on it
///
/// An entry is only removed by the deactivation that inserted it; after a
/// `cleanup` the id may belong to a newer deactivation.
struct DeactivatingGuard<'a> {
    inner: &'a CoordinatorInner,
    unit_id: UnitId,
    epoch: u64,
    done: watch::Sender<bool>,
}

impl Drop for DeactivatingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock_state();
            if state.epoch == self.epoch {
                state.deactivating.remove(&self.unit_id);
            }
        }
        let _ = self.done.send(true);
    }
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort immediate mute; never fails
    async fn mute_now(&self, unit_id: &UnitId, handle: &dyn PlayerHandle) {
        let _ = soft_call(
            unit_id,
            "set_muted",
            self.settings.immediate_mute_timeout,
            handle.set_muted(true),
        )
        .await;
    }

    /// Shared deactivation sub-procedure
    ///
    /// Returns false when another caller was already deactivating this id; the
    /// duplicate does not deactivate again but waits for that one to finish.
    async fn deactivate_registration(&self, registration: &Registration) -> bool {
        let unit_id = &registration.id;
        let done = {
            let mut state = self.lock_state();
            if let Some(in_flight) = state.deactivating.get(unit_id) {
                Err(in_flight.clone())
            } else {
                let (tx, rx) = watch::channel(false);
                state.deactivating.insert(unit_id.clone(), rx);
                Ok((tx, state.epoch))
            }
        };

        let (done, epoch) = match done {
            Ok(owned) => owned,
            Err(mut in_flight) => {
                debug!("Deactivation of {} already in flight, waiting for it", unit_id);
                // A closed channel also means the other deactivation is over
                let _ = in_flight.wait_for(|finished| *finished).await;
                return false;
            }
        };
        let _guard = DeactivatingGuard {
            inner: self,
            unit_id: unit_id.clone(),
            epoch,
            done,
        };

        // Audible overlap is the worst failure, so cut audio before the slow path
        self.mute_now(unit_id, registration.handle.as_ref()).await;

        match registration.unit.deactivate().await {
            Ok(()) => debug!("Deactivated {}", unit_id),
            Err(e) => log_rejection(unit_id, "deactivate", &e),
        }

        self.events.emit_lossy(FeedEvent::player_unloaded(unit_id.clone()));
        true
    }
}

/// What a finished activation turns into once the lock is re-taken
enum LateActivation {
    Recorded,
    /// `deactivate_all` ran while it was in flight
    Silenced,
    /// Cleaned up or unregistered meanwhile
    Stale,
}

fn log_rejection(unit_id: &UnitId, action: &str, err: &Error) {
    let rejected = Error::CapabilityRejected {
        unit_id: unit_id.clone(),
        reason: format!("{} failed: {}", action, err),
    };
    if err.is_benign() {
        debug!("{}", rejected);
    } else {
        warn!("{}", rejected);
    }
}

impl PlaybackCoordinator {
    /// Create a coordinator publishing to `events`
    pub fn new(settings: CoordinatorSettings, events: EventBus) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                state: Mutex::new(CoordinatorState::default()),
                settings,
                events,
            }),
        }
    }

    /// Coordinator with default settings and its own event bus
    pub fn with_defaults() -> Self {
        let settings = CoordinatorSettings::default();
        let events = EventBus::new(settings.event_capacity);
        Self::new(settings, events)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    /// Register a unit, replacing any registration with the same id
    pub fn register(&self, registration: Registration) {
        let unit_id = registration.id.clone();
        let replaced = self
            .inner
            .lock_state()
            .registry
            .insert(unit_id.clone(), registration)
            .is_some();

        if replaced {
            debug!("Replaced registration for {}", unit_id);
        } else {
            debug!("Registered {}", unit_id);
        }
    }

    /// Remove a unit's registration
    ///
    /// The handle is assumed to be gone already, so `deactivate` is not
    /// invoked; if the unit was active this is bookkeeping only.
    pub fn unregister(&self, unit_id: &UnitId) {
        let was_active = {
            let mut state = self.inner.lock_state();
            if state.registry.remove(unit_id).is_none() {
                trace!("unregister({}): not registered", unit_id);
                return;
            }
            if state.active_id.as_ref() == Some(unit_id) {
                state.active_id = None;
                state.active_suspended = false;
                true
            } else {
                false
            }
        };

        debug!("Unregistered {}", unit_id);
        if was_active {
            info!("Active unit {} unregistered, no unit active", unit_id);
            self.inner.events.emit_lossy(FeedEvent::active_changed(None));
        }
    }

    /// Make `unit_id` the single active unit
    ///
    /// Unregistered ids and the already-active id are no-ops. While another
    /// transition is in flight the request is deferred and retried, up to
    /// `max_activation_retries` times, and dropped once a newer request
    /// supersedes it.
    pub async fn set_active(&self, unit_id: &UnitId) {
        let inner = &*self.inner;
        let mut attempts: u32 = 0;

        let (previous, epoch, generation) = loop {
            {
                let mut state = inner.lock_state();
                if !state.registry.contains_key(unit_id) {
                    debug!("set_active ignored: {}", Error::UnregisteredTarget(unit_id.clone()));
                    return;
                }

                if attempts == 0 {
                    state.requested_id = Some(unit_id.clone());
                } else if state.requested_id.as_ref() != Some(unit_id) {
                    debug!(
                        "set_active({}): superseded by {:?}, dropping deferred request",
                        unit_id, state.requested_id
                    );
                    return;
                }

                if !state.activating {
                    if state.active_id.as_ref() == Some(unit_id) && !state.active_suspended {
                        trace!("set_active({}): already active", unit_id);
                        return;
                    }

                    state.activating = true;
                    let previous = match (&state.active_id, state.active_suspended) {
                        (Some(active), false) if active != unit_id => state.registry.get(active).cloned(),
                        _ => None,
                    };
                    break (previous, state.epoch, state.generation);
                }
            }

            if attempts >= inner.settings.max_activation_retries {
                warn!(
                    "set_active({}): transition still in flight after {} retries, giving up",
                    unit_id, attempts
                );
                return;
            }
            attempts += 1;
            trace!("set_active({}): transition in flight, retry {}", unit_id, attempts);
            tokio::time::sleep(inner.settings.activation_retry_delay).await;
        };

        let _guard = ActivationGuard { inner, epoch };

        if let Some(previous) = previous {
            debug!("Deactivating {} before activating {}", previous.id, unit_id);
            inner.deactivate_registration(&previous).await;

            let mut state = inner.lock_state();
            if state.epoch == epoch && state.active_id.as_ref() == Some(&previous.id) {
                state.active_suspended = true;
            }
        }

        // The target may have been recycled away while the previous unit wound down
        let target = {
            let state = inner.lock_state();
            if state.epoch != epoch {
                debug!("set_active({}): coordinator cleaned up mid-transition", unit_id);
                return;
            }
            if state.generation != generation {
                debug!("set_active({}): everything deactivated mid-transition", unit_id);
                return;
            }
            match state.registry.get(unit_id) {
                Some(registration) => registration.clone(),
                None => {
                    debug!("set_active({}): unregistered mid-transition", unit_id);
                    return;
                }
            }
        };

        debug!("Activating {}", unit_id);
        match target.unit.activate().await {
            Ok(()) => {
                let outcome = {
                    let mut state = inner.lock_state();
                    if state.epoch != epoch || !state.registry.contains_key(unit_id) {
                        LateActivation::Stale
                    } else if state.generation != generation {
                        LateActivation::Silenced
                    } else {
                        state.active_id = Some(unit_id.clone());
                        state.active_suspended = false;
                        LateActivation::Recorded
                    }
                };

                match outcome {
                    LateActivation::Recorded => {
                        info!("{} is now active", unit_id);
                        inner.events.emit_lossy(FeedEvent::active_changed(Some(unit_id.clone())));
                        inner.events.emit_lossy(FeedEvent::player_loaded(unit_id.clone()));
                    }
                    LateActivation::Silenced => {
                        debug!("{} finished activating after deactivate_all, winding it down", unit_id);
                        inner.deactivate_registration(&target).await;
                    }
                    LateActivation::Stale => {
                        debug!("{} activated after cleanup or unregister, not recording", unit_id);
                    }
                }
            }
            Err(e) => log_rejection(unit_id, "activate", &e),
        }
    }

    /// Silence everything and deactivate the active unit
    ///
    /// Every registered handle gets a concurrent best-effort mute first so
    /// audio stops immediately (e.g. when a drag begins).
    pub async fn deactivate_all(&self) {
        let inner = &*self.inner;
        let (handles, active) = {
            let mut state = inner.lock_state();
            // In-flight and deferred activations must not outlive this call
            state.generation = state.generation.wrapping_add(1);
            state.requested_id = None;

            let handles: Vec<(UnitId, Arc<dyn PlayerHandle>)> = state
                .registry
                .values()
                .map(|r| (r.id.clone(), Arc::clone(&r.handle)))
                .collect();
            let active = state.active_id.clone().map(|id| {
                let registration = if state.active_suspended {
                    None
                } else {
                    state.registry.get(&id).cloned()
                };
                (id, registration)
            });
            (handles, active)
        };

        join_all(
            handles
                .iter()
                .map(|(unit_id, handle)| inner.mute_now(unit_id, handle.as_ref())),
        )
        .await;

        let Some((active_id, registration)) = active else {
            trace!("deactivate_all: no active unit");
            return;
        };

        if let Some(registration) = registration {
            inner.deactivate_registration(&registration).await;
        }

        let cleared = {
            let mut state = inner.lock_state();
            if state.active_id.as_ref() == Some(&active_id) {
                state.active_id = None;
                state.active_suspended = false;
                true
            } else {
                false
            }
        };

        if cleared {
            debug!("deactivate_all: {} deactivated, no unit active", active_id);
            inner.events.emit_lossy(FeedEvent::active_changed(None));
        }
    }

    /// Tear down at screen unmount
    ///
    /// The active unit's deactivation is spawned and not awaited; the
    /// returned handle may be awaited by callers that care. Registry and all
    /// transition bookkeeping are reset immediately.
    pub fn cleanup(&self) -> Option<JoinHandle<()>> {
        let (registration, had_active, count) = {
            let mut state = self.inner.lock_state();
            let active_id = state.active_id.take();
            let registration = match &active_id {
                Some(id) if !state.active_suspended => state.registry.get(id).cloned(),
                _ => None,
            };
            let count = state.registry.len();

            state.registry.clear();
            state.deactivating.clear();
            state.activating = false;
            state.active_suspended = false;
            state.requested_id = None;
            state.epoch = state.epoch.wrapping_add(1);
            (registration, active_id.is_some(), count)
        };

        info!("Coordinator cleanup: dropped {} registrations", count);
        if had_active {
            self.inner.events.emit_lossy(FeedEvent::active_changed(None));
        }

        let registration = registration?;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                Some(runtime.spawn(async move {
                    inner.deactivate_registration(&registration).await;
                }))
            }
            Err(_) => {
                warn!(
                    "No async runtime during cleanup, {} left to its owner",
                    registration.id
                );
                None
            }
        }
    }

    pub fn active_id(&self) -> Option<UnitId> {
        self.inner.lock_state().active_id.clone()
    }

    pub fn is_active(&self, unit_id: &UnitId) -> bool {
        self.inner.lock_state().active_id.as_ref() == Some(unit_id)
    }

    pub fn registration_count(&self) -> usize {
        self.inner.lock_state().registry.len()
    }

    pub fn is_registered(&self, unit_id: &UnitId) -> bool {
        self.inner.lock_state().registry.contains_key(unit_id)
    }

    /// Registration of the active unit, if one is active and playing
    pub fn active_registration(&self) -> Option<Registration> {
        let state = self.inner.lock_state();
        if state.active_suspended {
            return None;
        }
        state
            .active_id
            .as_ref()
            .and_then(|id| state.registry.get(id).cloned())
    }

    /// Whether an activation is currently in flight
    pub fn is_transitioning(&self) -> bool {
        self.inner.lock_state().activating
    }
}

impl Default for PlaybackCoordinator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::playback::registration::Playable;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullHandle;

    #[async_trait]
    impl PlayerHandle for NullHandle {
        async fn set_muted(&self, _muted: bool) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn seek_to_start(&self) -> Result<()> {
            Ok(())
        }
        async fn play(&self) -> Result<()> {
            Ok(())
        }
        async fn unload(&self) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingUnit {
        activations: AtomicUsize,
        deactivations: AtomicUsize,
        deactivate_delay: Duration,
    }

    #[async_trait]
    impl Playable for CountingUnit {
        async fn activate(&self) -> Result<()> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn deactivate(&self) -> Result<()> {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.deactivate_delay).await;
            Ok(())
        }
    }

    fn register(coordinator: &PlaybackCoordinator, id: &str) -> Arc<CountingUnit> {
        let unit = Arc::new(CountingUnit::default());
        coordinator.register(Registration::new(
            UnitId::new(id),
            Arc::new(NullHandle),
            Arc::clone(&unit) as Arc<dyn Playable>,
        ));
        unit
    }

    #[tokio::test]
    async fn test_register_is_idempotent_upsert() {
        let coordinator = PlaybackCoordinator::with_defaults();
        register(&coordinator, "a");
        register(&coordinator, "a");
        assert_eq!(coordinator.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_set_active_unregistered_is_noop() {
        let coordinator = PlaybackCoordinator::with_defaults();
        coordinator.set_active(&UnitId::new("ghost")).await;
        assert_eq!(coordinator.active_id(), None);
        assert!(!coordinator.is_transitioning());
    }

    #[tokio::test]
    async fn test_lock_released_after_transition() {
        let coordinator = PlaybackCoordinator::with_defaults();
        let a = register(&coordinator, "a");
        coordinator.set_active(&UnitId::new("a")).await;

        assert!(!coordinator.is_transitioning());
        assert_eq!(a.activations.load(Ordering::SeqCst), 1);
        assert!(coordinator.active_registration().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_resets_everything() {
        let coordinator = PlaybackCoordinator::with_defaults();
        let a = register(&coordinator, "a");
        register(&coordinator, "b");
        coordinator.set_active(&UnitId::new("a")).await;

        let task = coordinator.cleanup().expect("active unit deactivation spawned");
        task.await.unwrap();

        assert_eq!(coordinator.registration_count(), 0);
        assert_eq!(coordinator.active_id(), None);
        assert_eq!(a.deactivations.load(Ordering::SeqCst), 1);

        // Usable again after cleanup
        register(&coordinator, "c");
        coordinator.set_active(&UnitId::new("c")).await;
        assert!(coordinator.is_active(&UnitId::new("c")));
    }

    #[test]
    fn test_cleanup_with_nothing_active_spawns_nothing() {
        let coordinator = PlaybackCoordinator::with_defaults();
        assert!(coordinator.cleanup().is_none());
        assert_eq!(coordinator.registration_count(), 0);
    }

    fn spawn_deactivation(
        coordinator: &PlaybackCoordinator,
        registration: &Registration,
    ) -> JoinHandle<bool> {
        let inner = Arc::clone(&coordinator.inner);
        let registration = registration.clone();
        tokio::spawn(async move { inner.deactivate_registration(&registration).await })
    }

    /// A deactivation that outlives `cleanup` must not clear the entry of a
    /// newer deactivation of the same id
    #[tokio::test(start_paused = true)]
    async fn test_stale_deactivation_leaves_newer_entry() {
        let coordinator = PlaybackCoordinator::with_defaults();
        let unit = Arc::new(CountingUnit {
            deactivate_delay: Duration::from_millis(200),
            ..CountingUnit::default()
        });
        let id = UnitId::new("a");
        let registration =
            Registration::new(id.clone(), Arc::new(NullHandle), Arc::clone(&unit) as Arc<dyn Playable>);

        let first = spawn_deactivation(&coordinator, &registration);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.cleanup().is_none());
        let second = spawn_deactivation(&coordinator, &registration);

        // The first one finishes at 200ms, the second at 210ms
        tokio::time::sleep(Duration::from_millis(195)).await;
        assert!(first.is_finished());
        assert!(coordinator.inner.lock_state().deactivating.contains_key(&id));

        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert!(coordinator.inner.lock_state().deactivating.is_empty());
        assert_eq!(unit.deactivations.load(Ordering::SeqCst), 2);
    }
}
