#![forbid(unsafe_code)]

//! Step-based host for the portfolio page.
//!
//! [`PortfolioHost`] drives the typewriter, the visibility tracker and the
//! theme resolver without threads or wall-clock reads. The embedder controls
//! the loop:
//!
//! 1. Push observer and preference events via [`PortfolioHost::push_event`].
//! 2. Advance time via [`PortfolioHost::advance_time`].
//! 3. Call [`PortfolioHost::step`] to apply queued events.
//! 4. Read [`PortfolioHost::snapshot`] when [`StepResult::rendered`] is set.
//!
//! # Example
//!
//! ```
//! use folio_core::PortfolioContent;
//! use folio_runtime::MemoryStorage;
//! use folio_web::{HostConfig, HostEvent, PortfolioHost};
//! use std::time::Duration;
//!
//! let content = PortfolioContent::default();
//! let mut host = PortfolioHost::new(content, MemoryStorage::new(), false, HostConfig::default());
//! host.init().unwrap();
//!
//! host.push_event(HostEvent::ColorSchemeChanged(true));
//! host.advance_time(Duration::from_millis(100));
//! let result = host.step().unwrap();
//! assert!(result.rendered);
//! assert!(host.snapshot().dark);
//! ```

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use folio_core::{
    CaretBlink, DEFAULT_COMMAND, DEFAULT_PROMPT, PortfolioContent, TimerScheduler,
    TypewriterAnimator, TypewriterConfig, VisibilityConfig, VisibilityEvent, VisibilityTracker,
};
use folio_runtime::{Preference, StorageBackend, ThemeConfig, ThemeResolver, ThemeSubscription};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for [`PortfolioHost`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Typewriter delays and reduced-motion flag.
    pub typewriter: TypewriterConfig,
    /// Default visibility threshold for skill-group regions.
    pub visibility: VisibilityConfig,
    /// Theme storage key.
    pub theme: ThemeConfig,
    /// Caret blink period.
    pub caret: CaretBlink,
    /// Prompt shown before the typed command.
    pub prompt: String,
    /// Command typed and deleted in a loop.
    pub command: String,
    /// Treat every region as visible when no observer facility exists.
    pub reveal_without_observer: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            typewriter: TypewriterConfig::default(),
            visibility: VisibilityConfig::default(),
            theme: ThemeConfig::default(),
            caret: CaretBlink::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            command: DEFAULT_COMMAND.to_string(),
            reveal_without_observer: false,
        }
    }
}

impl HostConfig {
    /// Set the typewriter configuration.
    #[must_use]
    pub fn with_typewriter(mut self, typewriter: TypewriterConfig) -> Self {
        self.typewriter = typewriter;
        self
    }

    /// Set the visibility configuration.
    #[must_use]
    pub fn with_visibility(mut self, visibility: VisibilityConfig) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the theme configuration.
    #[must_use]
    pub fn with_theme(mut self, theme: ThemeConfig) -> Self {
        self.theme = theme;
        self
    }

    /// Set the prompt and command.
    #[must_use]
    pub fn with_script(mut self, prompt: impl Into<String>, command: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self.command = command.into();
        self
    }

    /// Request the static typewriter presentation.
    #[must_use]
    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.typewriter = self.typewriter.with_reduced_motion(reduced);
        self
    }

    /// Reveal every region at init when no observer exists.
    #[must_use]
    pub fn with_reveal_without_observer(mut self, reveal: bool) -> Self {
        self.reveal_without_observer = reveal;
        self
    }
}

// ---------------------------------------------------------------------------
// Events / results
// ---------------------------------------------------------------------------

/// Input delivered by the embedder.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Observer reported an intersection ratio for a region.
    Intersection { region: String, ratio: f64 },
    /// Observer reported a plain crossing for a region.
    Crossing { region: String, visible: bool },
    /// The OS color scheme changed.
    ColorSchemeChanged(bool),
    /// The user picked a theme preference.
    SetPreference(Preference),
}

/// Result of a single [`PortfolioHost::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Whether the host is still running (false after dispose).
    pub running: bool,
    /// Whether anything visible changed since the previous step.
    pub rendered: bool,
    /// Number of events processed during this step.
    pub events_processed: u32,
    /// Typewriter text changed since the previous step.
    pub text_changed: bool,
    /// Effective theme or preference changed during this step.
    pub theme_changed: bool,
    /// At least one region flipped during this step.
    pub visibility_changed: bool,
    /// Caret visibility differs from the last step.
    pub caret_changed: bool,
    /// Number of rendered steps so far.
    pub frame_idx: u64,
}

/// Errors from driving a [`PortfolioHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// `init` was called twice.
    AlreadyInitialized,
    /// `step` was called before `init`.
    NotInitialized,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::AlreadyInitialized => write!(f, "portfolio host already initialized"),
            HostError::NotInitialized => write!(f, "portfolio host stepped before init"),
        }
    }
}

impl std::error::Error for HostError {}

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSnapshot {
    /// Prompt plus the currently typed part of the command.
    pub displayed_text: String,
    /// Whether the caret is in its visible half-period.
    pub caret_visible: bool,
    /// Effective dark mode.
    pub dark: bool,
    /// Stored preference.
    #[serde(serialize_with = "serialize_preference")]
    pub preference: Preference,
    /// Regions currently in view, in id order.
    pub visible_regions: Vec<String>,
    /// Regions whose reveal animation fired during the last step.
    pub reveals: Vec<String>,
}

fn serialize_preference<S: Serializer>(p: &Preference, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(p.as_str())
}

impl PresentationSnapshot {
    /// Serialize for a JavaScript consumer.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostTimer {
    Typewriter,
}

/// Host-driven, non-blocking page runner.
///
/// # Lifecycle
///
/// 1. [`PortfolioHost::new`] reads the stored theme preference.
/// 2. [`PortfolioHost::init`] starts the typewriter and registers regions.
/// 3. [`PortfolioHost::step`] is called from the embedder's loop.
/// 4. [`PortfolioHost::dispose`] (or drop) releases the timer, the regions
///    and the theme subscription.
pub struct PortfolioHost {
    config: HostConfig,
    content: PortfolioContent,
    timers: TimerScheduler<HostTimer>,
    typewriter: TypewriterAnimator,
    visibility: VisibilityTracker,
    theme: ThemeResolver,
    theme_subscription: Option<ThemeSubscription>,
    theme_dirty: Rc<Cell<bool>>,
    events: VecDeque<HostEvent>,
    reveals: Vec<String>,
    text_dirty: bool,
    last_caret: Option<bool>,
    initialized: bool,
    running: bool,
    dirty: bool,
    frame_idx: u64,
}

impl PortfolioHost {
    /// Create a host. No timers run until [`init`](Self::init).
    pub fn new(
        content: PortfolioContent,
        storage: impl StorageBackend + 'static,
        os_prefers_dark: bool,
        config: HostConfig,
    ) -> Self {
        Self::with_boxed_storage(content, Box::new(storage), os_prefers_dark, config)
    }

    /// Create a host over an already boxed storage backend.
    pub fn with_boxed_storage(
        content: PortfolioContent,
        storage: Box<dyn StorageBackend>,
        os_prefers_dark: bool,
        config: HostConfig,
    ) -> Self {
        let theme = ThemeResolver::with_config(storage, os_prefers_dark, config.theme.clone());
        let theme_dirty = Rc::new(Cell::new(false));
        let subscription = {
            let dirty = Rc::clone(&theme_dirty);
            theme.subscribe(move |_| dirty.set(true))
        };
        Self {
            typewriter: TypewriterAnimator::new(config.typewriter),
            visibility: VisibilityTracker::new(config.visibility),
            timers: TimerScheduler::new(),
            theme,
            theme_subscription: Some(subscription),
            theme_dirty,
            content,
            config,
            events: VecDeque::new(),
            reveals: Vec::new(),
            text_dirty: false,
            last_caret: None,
            initialized: false,
            running: true,
            dirty: true,
            frame_idx: 0,
        }
    }

    /// Start the typewriter and register one region per renderable group.
    pub fn init(&mut self) -> Result<(), HostError> {
        if self.initialized {
            return Err(HostError::AlreadyInitialized);
        }
        self.initialized = true;

        let prompt = self.config.prompt.clone();
        let command = self.config.command.clone();
        self.typewriter
            .start(&prompt, &command, &mut self.timers, HostTimer::Typewriter);

        let threshold = self.config.visibility.default_threshold;
        for group in self.content.renderable_groups() {
            self.visibility.register(group.region_id(), (), threshold);
        }
        if self.config.reveal_without_observer {
            let ids: Vec<String> = self.visibility.registered_ids().map(str::to_owned).collect();
            for id in ids {
                self.visibility.record(&id, true);
            }
        }

        tracing::debug!(
            regions = self.visibility.len(),
            dark = self.theme.is_dark(),
            reduced_motion = self.config.typewriter.reduced_motion,
            "portfolio host initialized"
        );
        self.dirty = true;
        Ok(())
    }

    /// Apply queued events and report what changed.
    pub fn step(&mut self) -> Result<StepResult, HostError> {
        if !self.initialized {
            return Err(HostError::NotInitialized);
        }
        if !self.running {
            return Ok(StepResult {
                running: false,
                rendered: false,
                events_processed: 0,
                text_changed: false,
                theme_changed: false,
                visibility_changed: false,
                caret_changed: false,
                frame_idx: self.frame_idx,
            });
        }

        let mut events_processed: u32 = 0;
        while let Some(event) = self.events.pop_front() {
            events_processed += 1;
            self.handle_event(event);
        }

        self.reveals.clear();
        let mut visibility_changed = false;
        for event in self.visibility.drain_events() {
            visibility_changed = true;
            if let VisibilityEvent::Revealed(id) = event {
                self.visibility.take_reveal(&id);
                self.reveals.push(id);
            }
        }

        let text_changed = std::mem::take(&mut self.text_dirty);
        let theme_changed = self.theme_dirty.replace(false);
        let caret = self.caret_visible();
        let caret_changed = self.last_caret.replace(caret) != Some(caret);
        let rendered =
            self.dirty || text_changed || theme_changed || visibility_changed || caret_changed;
        if rendered {
            self.frame_idx += 1;
            self.dirty = false;
        }

        tracing::trace!(
            events_processed,
            text_changed,
            theme_changed,
            visibility_changed,
            caret_changed,
            frame_idx = self.frame_idx,
            "portfolio host step"
        );

        Ok(StepResult {
            running: true,
            rendered,
            events_processed,
            text_changed,
            theme_changed,
            visibility_changed,
            caret_changed,
            frame_idx: self.frame_idx,
        })
    }

    /// Queue an event for the next [`step`](Self::step).
    pub fn push_event(&mut self, event: HostEvent) {
        if !self.running {
            tracing::trace!(?event, "dropping event after dispose");
            return;
        }
        self.events.push_back(event);
    }

    /// Advance the clock by `dt`, firing due typewriter ticks.
    pub fn advance_time(&mut self, dt: Duration) {
        let typewriter = &mut self.typewriter;
        let mut text_changed = false;
        self.timers.advance(dt, |timers, handle, timer| match timer {
            HostTimer::Typewriter => {
                if let Some(outcome) = typewriter.on_timer(handle, timers, HostTimer::Typewriter) {
                    text_changed |= outcome.text_changed;
                }
            }
        });
        self.text_dirty |= text_changed;
    }

    /// Current presentation state.
    #[must_use]
    pub fn snapshot(&self) -> PresentationSnapshot {
        PresentationSnapshot {
            displayed_text: self.typewriter.displayed_text().to_string(),
            caret_visible: self.caret_visible(),
            dark: self.theme.is_dark(),
            preference: self.theme.preference(),
            visible_regions: self
                .visibility
                .states()
                .filter(|(_, visible)| *visible)
                .map(|(id, _)| id.to_string())
                .collect(),
            reveals: self.reveals.clone(),
        }
    }

    /// Release the typewriter timer, every region and the theme subscription.
    ///
    /// Idempotent. After dispose, time advances fire nothing and steps
    /// report `running == false`.
    pub fn dispose(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.typewriter.dispose(&mut self.timers);
        self.timers.clear();
        let ids: Vec<String> = self.visibility.registered_ids().map(str::to_owned).collect();
        for id in &ids {
            self.visibility.unregister(id);
        }
        self.events.clear();
        self.theme_subscription = None;
        tracing::debug!(regions = ids.len(), "portfolio host disposed");
    }

    /// Current host time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Deadline of the next scheduled tick, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Earliest instant at which a step could render something new:
    /// the next typewriter tick or the next caret flip.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        if !self.running {
            return None;
        }
        let caret = if self.config.typewriter.reduced_motion {
            None
        } else {
            self.config.caret.next_toggle(self.now())
        };
        match (self.next_deadline(), caret) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Page content.
    #[must_use]
    pub fn content(&self) -> &PortfolioContent {
        &self.content
    }

    /// Theme resolver.
    #[must_use]
    pub fn theme(&self) -> &ThemeResolver {
        &self.theme
    }

    /// Visibility tracker.
    #[must_use]
    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    /// Typewriter animator.
    #[must_use]
    pub fn typewriter(&self) -> &TypewriterAnimator {
        &self.typewriter
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Whether [`init`](Self::init) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the host has not been disposed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of rendered steps so far.
    #[must_use]
    pub fn frame_idx(&self) -> u64 {
        self.frame_idx
    }

    // --- Private helpers ---

    fn caret_visible(&self) -> bool {
        self.config.typewriter.reduced_motion || self.config.caret.is_visible(self.now())
    }

    fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Intersection { region, ratio } => {
                self.visibility.record_ratio(&region, ratio);
            }
            HostEvent::Crossing { region, visible } => {
                self.visibility.record(&region, visible);
            }
            HostEvent::ColorSchemeChanged(prefers_dark) => {
                self.theme.system_changed(prefers_dark);
            }
            HostEvent::SetPreference(preference) => {
                self.theme.set_preference(preference);
            }
        }
    }
}

impl Drop for PortfolioHost {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PortfolioHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortfolioHost")
            .field("now", &self.now())
            .field("initialized", &self.initialized)
            .field("running", &self.running)
            .field("frame_idx", &self.frame_idx)
            .field("queued_events", &self.events.len())
            .field("theme", &self.theme)
            .field("visibility", &self.visibility)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_runtime::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn content() -> PortfolioContent {
        PortfolioContent::from_json(
            r#"{
                "name": "Ada",
                "projects": [
                    {
                        "id": 1,
                        "title": "Systems",
                        "technologies": [{"name": "Rust", "logo": "rust.svg"}]
                    },
                    {"id": 2, "title": "Web"},
                    {"id": 3}
                ]
            }"#,
        )
        .unwrap()
    }

    fn host(config: HostConfig) -> PortfolioHost {
        let mut host = PortfolioHost::new(content(), MemoryStorage::new(), false, config);
        host.init().unwrap();
        host
    }

    #[test]
    fn init_registers_renderable_groups() {
        let host = host(HostConfig::default());
        let ids: Vec<&str> = host.visibility().registered_ids().collect();
        assert_eq!(ids, vec!["project-1", "project-2"]);
        assert_eq!(host.snapshot().displayed_text, DEFAULT_PROMPT);
    }

    #[test]
    fn init_twice_and_step_before_init_are_errors() {
        let mut fresh =
            PortfolioHost::new(content(), MemoryStorage::new(), false, HostConfig::default());
        assert_eq!(fresh.step(), Err(HostError::NotInitialized));
        fresh.init().unwrap();
        assert_eq!(fresh.init(), Err(HostError::AlreadyInitialized));
    }

    #[test]
    fn first_step_renders_then_idles() {
        let mut host = host(HostConfig::default());
        assert!(host.step().unwrap().rendered);
        let idle = host.step().unwrap();
        assert!(!idle.rendered);
        assert_eq!(idle.frame_idx, 1);
    }

    #[test]
    fn typing_marks_text_changed() {
        let mut host = host(HostConfig::default().with_script("$ ", "abc"));
        host.step().unwrap();
        host.advance_time(Duration::from_millis(100));
        let result = host.step().unwrap();
        assert!(result.text_changed);
        assert_eq!(host.snapshot().displayed_text, "$ a");
    }

    #[test]
    fn reveals_are_reported_once_per_crossing() {
        let mut host = host(HostConfig::default());
        host.step().unwrap();

        host.push_event(HostEvent::Intersection {
            region: "project-1".into(),
            ratio: 0.75,
        });
        let result = host.step().unwrap();
        assert!(result.visibility_changed);
        assert_eq!(result.events_processed, 1);
        assert_eq!(host.snapshot().reveals, vec!["project-1".to_string()]);

        host.step().unwrap();
        let snap = host.snapshot();
        assert!(snap.reveals.is_empty());
        assert_eq!(snap.visible_regions, vec!["project-1".to_string()]);
    }

    #[test]
    fn unknown_regions_are_ignored() {
        let mut host = host(HostConfig::default());
        host.step().unwrap();
        host.push_event(HostEvent::Crossing {
            region: "project-3".into(),
            visible: true,
        });
        let result = host.step().unwrap();
        assert_eq!(result.events_processed, 1);
        assert!(!result.visibility_changed);
        assert!(!result.rendered);
    }

    #[test]
    fn theme_changes_flow_through_subscription() {
        let mut host = host(HostConfig::default());
        host.step().unwrap();

        host.push_event(HostEvent::ColorSchemeChanged(true));
        let result = host.step().unwrap();
        assert!(result.theme_changed);
        assert!(host.snapshot().dark);

        host.push_event(HostEvent::SetPreference(Preference::Light));
        host.push_event(HostEvent::ColorSchemeChanged(false));
        host.push_event(HostEvent::ColorSchemeChanged(true));
        let result = host.step().unwrap();
        assert_eq!(result.events_processed, 3);
        assert!(result.theme_changed);
        let snap = host.snapshot();
        assert!(!snap.dark);
        assert_eq!(snap.preference, Preference::Light);
    }

    #[test]
    fn reveal_without_observer_shows_everything() {
        let mut host = host(HostConfig::default().with_reveal_without_observer(true));
        host.step().unwrap();
        let snap = host.snapshot();
        assert_eq!(snap.visible_regions, vec!["project-1".to_string(), "project-2".to_string()]);
        assert_eq!(snap.reveals, snap.visible_regions);
    }

    #[test]
    fn reduced_motion_is_static() {
        let mut host = host(HostConfig::default().with_reduced_motion(true));
        assert_eq!(host.next_deadline(), None);
        host.advance_time(Duration::from_millis(1500));
        let snap = host.snapshot();
        assert_eq!(snap.displayed_text, format!("{DEFAULT_PROMPT}{DEFAULT_COMMAND}"));
        assert!(snap.caret_visible);
    }

    #[test]
    fn caret_blinks_with_host_time() {
        let mut host = host(HostConfig::default());
        assert!(host.snapshot().caret_visible);
        host.advance_time(Duration::from_millis(500));
        assert!(!host.snapshot().caret_visible);
        host.advance_time(Duration::from_millis(500));
        assert!(host.snapshot().caret_visible);
    }

    #[test]
    fn caret_flip_renders_during_pause() {
        let mut host = host(HostConfig::default().with_script("$ ", "a"));
        host.step().unwrap();

        // The only grapheme is typed at 100 ms; the 3 s pause follows.
        host.advance_time(Duration::from_millis(100));
        let typed = host.step().unwrap();
        assert!(typed.text_changed);
        assert!(host.snapshot().caret_visible);
        assert_eq!(host.next_wakeup(), Some(Duration::from_millis(500)));

        host.advance_time(Duration::from_millis(500));
        let paused = host.step().unwrap();
        assert!(!paused.text_changed);
        assert!(paused.caret_changed);
        assert!(paused.rendered);
        assert!(!host.snapshot().caret_visible);

        let idle = host.step().unwrap();
        assert!(!idle.caret_changed);
        assert!(!idle.rendered);
    }

    #[test]
    fn reduced_motion_caret_never_wakes() {
        let mut host = host(HostConfig::default().with_reduced_motion(true));
        host.step().unwrap();
        assert_eq!(host.next_wakeup(), None);
        host.advance_time(Duration::from_millis(500));
        assert!(!host.step().unwrap().rendered);
    }

    #[test]
    fn dispose_stops_everything() {
        let mut host = host(HostConfig::default());
        host.push_event(HostEvent::Crossing {
            region: "project-1".into(),
            visible: true,
        });
        host.step().unwrap();
        host.dispose();

        assert_eq!(host.theme().subscriber_count(), 0);
        assert!(host.visibility().registered_ids().next().is_none());
        let text = host.snapshot().displayed_text;
        host.advance_time(Duration::from_secs(60));
        assert_eq!(host.snapshot().displayed_text, text);
        assert_eq!(host.typewriter().tick_count(), 0);

        host.push_event(HostEvent::ColorSchemeChanged(true));
        let result = host.step().unwrap();
        assert!(!result.running);
        assert_eq!(result.events_processed, 0);
        assert_eq!(host.next_wakeup(), None);
    }

    #[test]
    fn snapshot_json_shape() {
        let host = host(HostConfig::default().with_script("$ ", "ls"));
        let encoded = host.snapshot().to_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(json["displayedText"], "$ ");
        assert_eq!(json["preference"], "system");
        assert_eq!(json["dark"], false);
        assert_eq!(json["visibleRegions"], serde_json::json!([]));
    }
}
