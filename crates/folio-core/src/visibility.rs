#![forbid(unsafe_code)]

//! Viewport visibility tracking for reveal animations.
//!
//! The host owns the actual intersection observer and forwards what it sees:
//! either a boolean crossing ([`VisibilityTracker::record`]) or the current
//! intersection ratio ([`VisibilityTracker::record_ratio`]). The tracker keeps
//! one boolean per region and queues [`VisibilityEvent`]s that the
//! presentation layer drains to start or reset reveal animations.
//!
//! # Invariants
//!
//! 1. The state is level-triggered: [`is_visible`](VisibilityTracker::is_visible)
//!    always answers with the last observation.
//! 2. A hidden → visible flip queues exactly one `Revealed` event and one
//!    pending reveal; a visible → hidden flip queues one `Hidden` event.
//!    Re-entering the viewport replays the reveal.
//! 3. Repeated observations with the same value are not flips.
//! 4. Observations for unknown or unregistered regions are ignored.
//! 5. [`unregister`](VisibilityTracker::unregister) stops observation but the
//!    last value stays readable until [`clear`](VisibilityTracker::clear).

use std::collections::BTreeMap;
use std::fmt;

/// Fraction of a region that must be on screen to count as visible.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Clamp a threshold into `[0, 1]`; non-finite values fall back to the default.
#[must_use]
pub fn normalize_threshold(threshold: f64) -> f64 {
    if threshold.is_finite() {
        threshold.clamp(0.0, 1.0)
    } else {
        DEFAULT_THRESHOLD
    }
}

/// Tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityConfig {
    /// Threshold used by [`VisibilityTracker::register_default`]. Default: 0.5.
    pub default_threshold: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl VisibilityConfig {
    /// Set the default threshold.
    #[must_use]
    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = normalize_threshold(threshold);
        self
    }
}

/// A visibility flip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityEvent {
    /// The region crossed the threshold upward; its reveal should (re)play.
    Revealed(String),
    /// The region dropped below the threshold.
    Hidden(String),
}

type ChangeCallback = Box<dyn FnMut(bool)>;

struct Region<E> {
    element: Option<E>,
    threshold: f64,
    visible: bool,
    pending_reveals: u32,
    callbacks: Vec<ChangeCallback>,
}

/// Per-region visibility state.
///
/// `E` is the host's element handle (a DOM element in the browser, `()` in
/// tests). It is stored so the host can unobserve it later and so observer
/// entries that arrive by element can be mapped back to a region.
pub struct VisibilityTracker<E = ()> {
    config: VisibilityConfig,
    regions: BTreeMap<String, Region<E>>,
    events: Vec<VisibilityEvent>,
}

impl<E> Default for VisibilityTracker<E> {
    fn default() -> Self {
        Self::new(VisibilityConfig::default())
    }
}

impl<E> VisibilityTracker<E> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            regions: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Start observing `element` as `region_id`.
    ///
    /// Registering an existing id swaps in the new element and threshold and
    /// keeps its current value and callbacks.
    pub fn register(&mut self, region_id: impl Into<String>, element: E, threshold: f64) {
        let region_id = region_id.into();
        let threshold = normalize_threshold(threshold);
        crate::debug!(region = %region_id, threshold, "region registered");
        let region = self.regions.entry(region_id).or_insert_with(|| Region {
            element: None,
            threshold,
            visible: false,
            pending_reveals: 0,
            callbacks: Vec::new(),
        });
        region.element = Some(element);
        region.threshold = threshold;
    }

    /// Register with the configured default threshold.
    pub fn register_default(&mut self, region_id: impl Into<String>, element: E) {
        let threshold = self.config.default_threshold;
        self.register(region_id, element, threshold);
    }

    /// Stop observing a region, returning its element.
    ///
    /// Unknown or already unregistered ids are a no-op returning `None`. The
    /// region's callbacks are dropped; its last value stays readable.
    pub fn unregister(&mut self, region_id: &str) -> Option<E> {
        let region = self.regions.get_mut(region_id)?;
        let element = region.element.take()?;
        region.callbacks.clear();
        region.pending_reveals = 0;
        crate::debug!(region = %region_id, "region unregistered");
        Some(element)
    }

    /// Record a boolean threshold crossing.
    ///
    /// Returns `true` when the region's value flipped.
    pub fn record(&mut self, region_id: &str, visible: bool) -> bool {
        let Some(region) = self.regions.get_mut(region_id) else {
            crate::trace!(region = %region_id, "observation for unknown region");
            return false;
        };
        if region.element.is_none() || region.visible == visible {
            return false;
        }
        region.visible = visible;
        if visible {
            region.pending_reveals = region.pending_reveals.saturating_add(1);
            self.events.push(VisibilityEvent::Revealed(region_id.to_string()));
        } else {
            self.events.push(VisibilityEvent::Hidden(region_id.to_string()));
        }
        for callback in &mut region.callbacks {
            callback(visible);
        }
        crate::trace!(region = %region_id, visible, "region visibility flipped");
        true
    }

    /// Record the fraction of the region inside the viewport.
    ///
    /// The region is visible iff `ratio >= threshold`. A non-finite ratio
    /// counts as `0`.
    pub fn record_ratio(&mut self, region_id: &str, ratio: f64) -> bool {
        let Some(threshold) = self.regions.get(region_id).map(|r| r.threshold) else {
            return false;
        };
        let ratio = if ratio.is_finite() { ratio } else { 0.0 };
        self.record(region_id, ratio >= threshold)
    }

    /// Call `callback` with the new value whenever `region_id` flips.
    ///
    /// Returns `false` (and drops the callback) when the region is not
    /// currently registered.
    pub fn on_change(&mut self, region_id: &str, callback: impl FnMut(bool) + 'static) -> bool {
        match self.regions.get_mut(region_id) {
            Some(region) if region.element.is_some() => {
                region.callbacks.push(Box::new(callback));
                true
            }
            _ => false,
        }
    }

    /// Current value; unknown regions are not visible.
    #[must_use]
    pub fn is_visible(&self, region_id: &str) -> bool {
        self.regions.get(region_id).is_some_and(|r| r.visible)
    }

    /// Whether `region_id` is currently observed.
    #[must_use]
    pub fn is_registered(&self, region_id: &str) -> bool {
        self.regions
            .get(region_id)
            .is_some_and(|r| r.element.is_some())
    }

    /// Threshold of a registered region.
    #[must_use]
    pub fn threshold(&self, region_id: &str) -> Option<f64> {
        self.regions.get(region_id).map(|r| r.threshold)
    }

    /// Consume one pending reveal for `region_id`.
    pub fn take_reveal(&mut self, region_id: &str) -> bool {
        match self.regions.get_mut(region_id) {
            Some(region) if region.pending_reveals > 0 => {
                region.pending_reveals -= 1;
                true
            }
            _ => false,
        }
    }

    /// Drain queued flips in arrival order.
    pub fn drain_events(&mut self) -> Vec<VisibilityEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every known region with its current value, ordered by id.
    pub fn states(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.regions
            .iter()
            .map(|(id, region)| (id.as_str(), region.visible))
    }

    /// Ids of regions currently observed.
    pub fn registered_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.regions
            .iter()
            .filter(|(_, region)| region.element.is_some())
            .map(|(id, _)| id.as_str())
    }

    /// Number of known regions, registered or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no region is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Forget every region and queued event.
    pub fn clear(&mut self) {
        self.regions.clear();
        self.events.clear();
    }
}

impl<E> fmt::Debug for VisibilityTracker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityTracker")
            .field("regions", &self.regions.len())
            .field("pending_events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tracker() -> VisibilityTracker {
        let mut t = VisibilityTracker::default();
        t.register_default("project-1", ());
        t
    }

    #[test]
    fn starts_hidden() {
        let t = tracker();
        assert!(!t.is_visible("project-1"));
        assert!(!t.is_visible("nope"));
        assert_eq!(t.threshold("project-1"), Some(DEFAULT_THRESHOLD));
    }

    #[test]
    fn reveal_replays_on_reentry() {
        let mut t = tracker();
        assert!(t.record_ratio("project-1", 0.6));
        assert!(t.is_visible("project-1"));
        assert!(t.record_ratio("project-1", 0.2));
        assert!(!t.is_visible("project-1"));
        assert!(t.record_ratio("project-1", 0.9));
        assert!(t.is_visible("project-1"));

        assert_eq!(
            t.drain_events(),
            vec![
                VisibilityEvent::Revealed("project-1".into()),
                VisibilityEvent::Hidden("project-1".into()),
                VisibilityEvent::Revealed("project-1".into()),
            ]
        );
        assert!(t.drain_events().is_empty());
        assert!(t.take_reveal("project-1"));
        assert!(t.take_reveal("project-1"));
        assert!(!t.take_reveal("project-1"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut t = tracker();
        assert!(t.record_ratio("project-1", 0.5));
        assert!(!t.record_ratio("project-1", 0.75));
        assert!(t.record_ratio("project-1", 0.499));
    }

    #[test]
    fn same_value_is_not_a_flip() {
        let mut t = tracker();
        assert!(!t.record("project-1", false));
        assert!(t.record("project-1", true));
        assert!(!t.record("project-1", true));
        assert_eq!(t.drain_events().len(), 1);
    }

    #[test]
    fn unknown_regions_are_ignored() {
        let mut t = tracker();
        assert!(!t.record("ghost", true));
        assert!(!t.record_ratio("ghost", 1.0));
        assert!(t.drain_events().is_empty());
        assert!(t.unregister("ghost").is_none());
    }

    #[test]
    fn unregister_keeps_last_value_and_stops_updates() {
        let mut t = tracker();
        t.record("project-1", true);
        assert_eq!(t.unregister("project-1"), Some(()));
        assert!(t.unregister("project-1").is_none());
        assert!(t.is_visible("project-1"));
        assert!(!t.is_registered("project-1"));
        assert!(!t.record("project-1", false));
        assert!(t.is_visible("project-1"));
    }

    #[test]
    fn callbacks_see_every_flip() {
        let mut t = tracker();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        assert!(t.on_change("project-1", move |v| sink.borrow_mut().push(v)));
        assert!(!t.on_change("ghost", |_| {}));

        t.record("project-1", true);
        t.record("project-1", true);
        t.record("project-1", false);
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn thresholds_are_normalized() {
        let mut t: VisibilityTracker<u32> = VisibilityTracker::default();
        t.register("a", 1, 4.0);
        t.register("b", 2, f64::NAN);
        t.register("c", 3, -1.0);
        assert_eq!(t.threshold("a"), Some(1.0));
        assert_eq!(t.threshold("b"), Some(DEFAULT_THRESHOLD));
        assert_eq!(t.threshold("c"), Some(0.0));
        assert!(!t.record_ratio("a", f64::INFINITY));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut t = tracker();
        t.record("project-1", true);
        t.clear();
        assert!(t.is_empty());
        assert!(!t.is_visible("project-1"));
        assert!(t.drain_events().is_empty());
    }
}
