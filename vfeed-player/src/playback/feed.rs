//! Feed controller
//!
//! **Responsibilities:**
//! - Map resolver indices onto unit ids of the current item list
//! - Forward scroll-begin and navigate-away hooks as `deactivate_all`
//! - Reset the resolver whenever the item list is replaced
//! - Own the feed-wide mute preference and apply it to the active unit
//!
//! One controller per feed screen. Dropping the screen means calling
//! [`FeedController::on_unmount`].

use super::coordinator::PlaybackCoordinator;
use super::resolver::{ActiveIndexResolver, ResolverSignal, ViewableItem};
use crate::config::{ReclaimSettings, Settings};
use crate::reclaim::bounded::soft_call;
use crate::reclaim::{MutePreference, PlatformProfile, PlayerHandle, PlayerUnit};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use vfeed_common::events::EventBus;
use vfeed_common::UnitId;

pub struct FeedController {
    coordinator: PlaybackCoordinator,
    resolver: ActiveIndexResolver,
    items: RwLock<Vec<UnitId>>,
    mute: MutePreference,
    profile: PlatformProfile,
    reclaim: ReclaimSettings,
}

impl FeedController {
    /// Build a controller, its coordinator and resolver sharing one event bus
    pub fn new(settings: &Settings) -> Self {
        let events = EventBus::new(settings.coordinator.event_capacity);
        let coordinator = PlaybackCoordinator::new(settings.coordinator.clone(), events.clone());
        let resolver = ActiveIndexResolver::new(settings.resolver.clone(), events);
        Self::from_parts(coordinator, resolver, settings.reclaim.clone())
    }

    pub fn from_parts(
        coordinator: PlaybackCoordinator,
        resolver: ActiveIndexResolver,
        reclaim: ReclaimSettings,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            items: RwLock::new(Vec::new()),
            mute: MutePreference::new(reclaim.start_muted),
            profile: PlatformProfile::from_mode(reclaim.mode),
            reclaim,
        }
    }

    /// Override the platform profile units are built with
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn resolver(&self) -> &ActiveIndexResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventBus {
        self.coordinator.events()
    }

    pub fn mute_preference(&self) -> &MutePreference {
        &self.mute
    }

    pub fn active_index(&self) -> usize {
        self.resolver.current_index()
    }

    pub fn item_count(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn item_at(&self, index: usize) -> Option<UnitId> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    fn index_of(&self, unit_id: &UnitId) -> Option<usize> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|id| id == unit_id)
    }

    /// Replace the item list (refresh or first page)
    ///
    /// The resolver starts over at index 0 and the first item is activated if
    /// its unit is already mounted. Pagination appends go through
    /// [`append_items`](Self::append_items) instead.
    pub async fn replace_items(&self, items: Vec<UnitId>) {
        info!("Feed items replaced ({} items)", items.len());
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
        self.resolver.reset();
        self.activate_index(0).await;
    }

    /// Append a further page; the active index is kept
    pub fn append_items(&self, more: impl IntoIterator<Item = UnitId>) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.extend(more);
        debug!("Appended {} items to feed", items.len() - before);
    }

    /// Mount a unit for `unit_id` on `handle` and register it
    ///
    /// If the unit sits at the current active index it starts playing.
    pub async fn mount_unit(&self, unit_id: UnitId, handle: Arc<dyn PlayerHandle>) -> Arc<PlayerUnit> {
        let unit = Arc::new(PlayerUnit::new(
            unit_id.clone(),
            handle,
            self.profile,
            &self.reclaim,
            self.mute.clone(),
        ));
        self.coordinator.register(unit.registration());

        if self.index_of(&unit_id) == Some(self.active_index()) {
            self.coordinator.set_active(&unit_id).await;
        }
        unit
    }

    /// View recycled out or removed
    pub fn unmount_unit(&self, unit_id: &UnitId) {
        self.coordinator.unregister(unit_id);
    }

    pub async fn on_viewability_changed(&self, candidate: usize) {
        if !self.in_range(candidate) {
            return;
        }
        let signal = self.resolver.on_viewability_changed(candidate);
        self.apply(signal).await;
    }

    pub async fn on_viewable_items(&self, items: &[ViewableItem]) {
        let Some(candidate) = self.resolver.pick_candidate(items) else {
            return;
        };
        self.on_viewability_changed(candidate).await;
    }

    pub async fn on_scroll_offset(&self, offset: f64, item_extent: f64) {
        let Some(candidate) = ActiveIndexResolver::index_for_offset(offset, item_extent) else {
            return;
        };
        self.on_viewability_changed(candidate).await;
    }

    pub async fn on_scroll_begin(&self) {
        let signal = self.resolver.on_scroll_begin();
        self.apply(signal).await;
    }

    /// Drag released; resume the settled item if nothing else took over
    pub async fn on_scroll_end(&self) {
        self.resolver.on_scroll_end();
        self.activate_index(self.active_index()).await;
    }

    pub async fn on_momentum_end(&self) {
        self.resolver.on_momentum_end();
        self.activate_index(self.active_index()).await;
    }

    /// Another screen was pushed on top of the feed
    pub async fn on_navigate_away(&self) {
        debug!("Navigated away from feed, silencing all units");
        self.coordinator.deactivate_all().await;
    }

    /// Feed screen regained focus
    pub async fn on_focus_regained(&self) {
        self.activate_index(self.active_index()).await;
    }

    /// Feed screen unmounted
    pub fn on_unmount(&self) -> Option<JoinHandle<()>> {
        info!("Feed screen unmounted");
        self.coordinator.cleanup()
    }

    /// Set the feed-wide mute preference and apply it to the playing unit
    pub async fn set_muted(&self, muted: bool) {
        self.mute.set_muted(muted);
        self.apply_mute(muted).await;
    }

    /// Flip the mute preference; returns the new value
    pub async fn toggle_mute(&self) -> bool {
        let muted = self.mute.toggle();
        self.apply_mute(muted).await;
        muted
    }

    async fn apply_mute(&self, muted: bool) {
        let Some(active) = self.coordinator.active_registration() else {
            return;
        };
        let _ = soft_call(
            &active.id,
            "set_muted",
            self.reclaim.native_call_timeout,
            active.handle.set_muted(muted),
        )
        .await;
    }

    fn in_range(&self, index: usize) -> bool {
        let count = self.item_count();
        if index >= count {
            trace!("Ignoring candidate {} outside feed of {} items", index, count);
            return false;
        }
        true
    }

    async fn activate_index(&self, index: usize) {
        if let Some(unit_id) = self.item_at(index) {
            self.coordinator.set_active(&unit_id).await;
        }
    }

    async fn apply(&self, signal: Option<ResolverSignal>) {
        match signal {
            Some(ResolverSignal::Activate(index)) => self.activate_index(index).await,
            Some(ResolverSignal::DeactivateAll) => self.coordinator.deactivate_all().await,
            None => {}
        }
    }
}
