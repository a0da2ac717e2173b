//! Active-index resolver
//!
//! Turns two independent, racy signal sources (viewability callbacks and
//! scroll-offset sampling) into one debounced "index N is now active" decision.
//!
//! The last-known active index lives in an [`ActiveIndexCell`] that every
//! event reads fresh. Capturing it once when the callbacks are wired up leaves
//! the resolver comparing against a stale 0 forever, after which returning to
//! the first item looks like "no change" and is never emitted.

use crate::config::ResolverSettings;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, trace};
use vfeed_common::events::{EventBus, FeedEvent};

/// One entry of a viewability callback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewableItem {
    pub index: usize,
    /// Visible share of the item, 0.0..=100.0
    pub percent_visible: f32,
}

/// What the feed controller should do in response to an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverSignal {
    /// The item at this index became the active one
    Activate(usize),
    /// A drag started; silence everything now
    DeactivateAll,
}

/// Resolver bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverState {
    pub last_active_index: usize,
    pub last_emitted_at: Option<Instant>,
    pub scrolling: bool,
    pub scroll_started_at: Option<Instant>,
    /// Candidates dropped as scroll noise since the last reset
    pub suppressed: u64,
}

/// Shared mutable holder for the resolver state
///
/// Clones refer to the same state.
#[derive(Debug, Clone, Default)]
pub struct ActiveIndexCell(Arc<Mutex<ResolverState>>);

impl ActiveIndexCell {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_index(&self) -> usize {
        self.lock().last_active_index
    }

    pub fn snapshot(&self) -> ResolverState {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = ResolverState::default();
    }
}

/// Debounces candidate indices into active-index transitions
pub struct ActiveIndexResolver {
    cell: ActiveIndexCell,
    settings: ResolverSettings,
    events: EventBus,
}

impl ActiveIndexResolver {
    pub fn new(settings: ResolverSettings, events: EventBus) -> Self {
        Self::with_cell(ActiveIndexCell::new(), settings, events)
    }

    /// Resolver over an existing cell, e.g. one also read by a UI layer
    pub fn with_cell(cell: ActiveIndexCell, settings: ResolverSettings, events: EventBus) -> Self {
        Self { cell, settings, events }
    }

    pub fn cell(&self) -> &ActiveIndexCell {
        &self.cell
    }

    pub fn current_index(&self) -> usize {
        self.cell.current_index()
    }

    pub fn is_scrolling(&self) -> bool {
        self.cell.snapshot().scrolling
    }

    /// Discrete viewability callback naming a candidate index
    pub fn on_viewability_changed(&self, candidate: usize) -> Option<ResolverSignal> {
        self.evaluate_at(candidate, Instant::now())
    }

    /// Viewability callback carrying visibility percentages
    pub fn on_viewable_items(&self, items: &[ViewableItem]) -> Option<ResolverSignal> {
        let candidate = self.pick_candidate(items)?;
        self.evaluate_at(candidate, Instant::now())
    }

    /// Continuous scroll-position sample
    pub fn on_scroll_offset(&self, offset: f64, item_extent: f64) -> Option<ResolverSignal> {
        let candidate = Self::index_for_offset(offset, item_extent)?;
        self.evaluate_at(candidate, Instant::now())
    }

    /// Drag started: request deactivate-all regardless of debounce state
    pub fn on_scroll_begin(&self) -> Option<ResolverSignal> {
        {
            let mut state = self.cell.lock();
            state.scrolling = true;
            state.scroll_started_at = Some(Instant::now());
        }
        trace!("Scroll began, requesting deactivate-all");
        Some(ResolverSignal::DeactivateAll)
    }

    pub fn on_scroll_end(&self) {
        self.clear_scroll();
    }

    pub fn on_momentum_end(&self) {
        self.clear_scroll();
    }

    fn clear_scroll(&self) {
        let mut state = self.cell.lock();
        state.scrolling = false;
        state.scroll_started_at = None;
    }

    /// Forget the last-known index; used when the item list is replaced
    pub fn reset(&self) {
        self.cell.reset();
        debug!("Resolver reset, active index back to 0");
    }

    /// Most visible item at or above the viewability threshold
    ///
    /// Ties go to the lower index.
    pub fn pick_candidate(&self, items: &[ViewableItem]) -> Option<usize> {
        let threshold = f32::from(self.settings.viewability_threshold_percent);
        items
            .iter()
            .filter(|item| item.percent_visible.is_finite() && item.percent_visible >= threshold)
            .fold(None::<ViewableItem>, |best, item| match best {
                Some(b)
                    if b.percent_visible > item.percent_visible
                        || (b.percent_visible == item.percent_visible && b.index <= item.index) =>
                {
                    Some(b)
                }
                _ => Some(*item),
            })
            .map(|item| item.index)
    }

    /// Index whose slot is nearest to a scroll offset
    pub fn index_for_offset(offset: f64, item_extent: f64) -> Option<usize> {
        if !offset.is_finite() || !item_extent.is_finite() || item_extent <= 0.0 {
            return None;
        }
        Some((offset.max(0.0) / item_extent).round() as usize)
    }

    /// Core decision for one candidate observed at `now`
    pub fn evaluate_at(&self, candidate: usize, now: Instant) -> Option<ResolverSignal> {
        {
            let mut state = self.cell.lock();

            if candidate == state.last_active_index {
                return None;
            }

            if let Some(last) = state.last_emitted_at {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.settings.suppression_window {
                    state.suppressed += 1;
                    trace!(
                        "Suppressed candidate {} ({}ms after last change)",
                        candidate,
                        elapsed.as_millis()
                    );
                    return None;
                }
            }

            state.last_active_index = candidate;
            state.last_emitted_at = Some(now);
        }

        debug!("Index {} became active", candidate);
        self.events.emit_lossy(FeedEvent::index_activated(candidate));
        Some(ResolverSignal::Activate(candidate))
    }
}
