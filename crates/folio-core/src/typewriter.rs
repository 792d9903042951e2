#![forbid(unsafe_code)]

//! Looping typewriter animation for the hero terminal.
//!
//! The animator types a command after a fixed prompt, pauses, deletes it,
//! pauses again, and starts over. Time comes from a [`TimerScheduler`]; the
//! animator keeps at most one pending timer and schedules tick `n + 1` from
//! inside tick `n`, so ticks never overlap.
//!
//! # Cycle
//!
//! | Phase | On tick | Next delay |
//! |-------|---------|------------|
//! | `Typing` | cursor += 1 | 100 ms, or 3000 ms once the command is complete |
//! | `PausedAfterTyping` | start deleting | 50 ms |
//! | `Deleting` | cursor -= 1 | 50 ms, or 5000 ms once the command is gone |
//! | `PausedAfterDeleting` | start typing | 100 ms |
//!
//! # Invariants
//!
//! 1. `displayed_text == prompt + command[..cursor]` after every tick, where
//!    `cursor` counts grapheme clusters.
//! 2. A tick is a pure transform of one [`TypewriterState`] snapshot
//!    ([`TypewriterState::step`]); the boundary checks and the next delay are
//!    derived from the updated cursor.
//! 3. After [`dispose`](TypewriterAnimator::dispose) no tick fires.
//! 4. One full cycle over a command of `n > 0` graphemes is `2n + 2` ticks.

use std::time::Duration;

use unicode_segmentation::UnicodeSegmentation;

use crate::timer::{TimerHandle, TimerScheduler};

/// Prompt shown before the animated command on the portfolio hero.
pub const DEFAULT_PROMPT: &str = "ubuntu@Ubuntu:~ # ";

/// Command typed by the hero terminal.
pub const DEFAULT_COMMAND: &str = "sudo rm -rf / --no-preserve-root";

/// Lower bound applied to every configured delay.
const MIN_DELAY: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing for the typewriter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypewriterConfig {
    /// Delay between typed characters. Default: 100 ms.
    pub type_delay: Duration,
    /// Delay between deleted characters. Default: 50 ms.
    pub delete_delay: Duration,
    /// Pause once the command is fully typed. Default: 3 s.
    pub pause_after_typing: Duration,
    /// Pause once the command is fully deleted. Default: 5 s.
    pub pause_after_deleting: Duration,
    /// Show the full command without animating. Default: false.
    pub reduced_motion: bool,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            type_delay: Duration::from_millis(100),
            delete_delay: Duration::from_millis(50),
            pause_after_typing: Duration::from_millis(3000),
            pause_after_deleting: Duration::from_millis(5000),
            reduced_motion: false,
        }
    }
}

impl TypewriterConfig {
    /// Set the per-character typing delay.
    #[must_use]
    pub fn with_type_delay(mut self, delay: Duration) -> Self {
        self.type_delay = delay.max(MIN_DELAY);
        self
    }

    /// Set the per-character deletion delay.
    #[must_use]
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay.max(MIN_DELAY);
        self
    }

    /// Set both pauses.
    #[must_use]
    pub fn with_pauses(mut self, after_typing: Duration, after_deleting: Duration) -> Self {
        self.pause_after_typing = after_typing.max(MIN_DELAY);
        self.pause_after_deleting = after_deleting.max(MIN_DELAY);
        self
    }

    /// Copy with every delay raised to the 1 ms floor.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            type_delay: self.type_delay.max(MIN_DELAY),
            delete_delay: self.delete_delay.max(MIN_DELAY),
            pause_after_typing: self.pause_after_typing.max(MIN_DELAY),
            pause_after_deleting: self.pause_after_deleting.max(MIN_DELAY),
            ..self
        }
    }

    /// Request the static presentation.
    #[must_use]
    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = reduced;
        self
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Prompt and command with precomputed grapheme boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    prompt: String,
    command: String,
    /// `boundaries[i]` is the byte offset after `i` graphemes.
    boundaries: Vec<usize>,
}

impl Script {
    /// Build a script from a prompt and the command to animate.
    #[must_use]
    pub fn new(prompt: impl Into<String>, command: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let command = command.into();
        let mut boundaries = Vec::with_capacity(command.len() + 1);
        boundaries.push(0);
        boundaries.extend(
            command
                .grapheme_indices(true)
                .map(|(offset, grapheme)| offset + grapheme.len()),
        );
        Self {
            prompt,
            command,
            boundaries,
        }
    }

    /// The static prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The animated command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command length in grapheme clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Whether the command is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `prompt + command[..cursor]`, with `cursor` clamped to the length.
    #[must_use]
    pub fn render(&self, cursor: usize) -> String {
        let end = self.boundaries[cursor.min(self.len())];
        let mut text = String::with_capacity(self.prompt.len() + end);
        text.push_str(&self.prompt);
        text.push_str(&self.command[..end]);
        text
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Named state in the typewriter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Adding one character per tick.
    Typing,
    /// Holding the fully typed command.
    PausedAfterTyping,
    /// Removing one character per tick.
    Deleting,
    /// Holding the bare prompt.
    PausedAfterDeleting,
}

/// Snapshot of the animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypewriterState {
    displayed_text: String,
    phase: Phase,
    cursor: usize,
    interval: Duration,
}

impl TypewriterState {
    /// State on start: bare prompt, typing, first tick after `type_delay`.
    #[must_use]
    pub fn initial(script: &Script, config: &TypewriterConfig) -> Self {
        Self {
            displayed_text: script.render(0),
            phase: Phase::Typing,
            cursor: 0,
            interval: config.type_delay,
        }
    }

    /// Fully typed command that never advances.
    #[must_use]
    pub fn complete(script: &Script) -> Self {
        Self {
            displayed_text: script.render(script.len()),
            phase: Phase::PausedAfterTyping,
            cursor: script.len(),
            interval: Duration::ZERO,
        }
    }

    /// Compute the next state from this one.
    #[must_use]
    pub fn step(&self, script: &Script, config: &TypewriterConfig) -> Self {
        let len = script.len();
        let (cursor, phase, interval) = match self.phase {
            Phase::Typing => {
                let cursor = (self.cursor + 1).min(len);
                if cursor == len {
                    (cursor, Phase::PausedAfterTyping, config.pause_after_typing)
                } else {
                    (cursor, Phase::Typing, config.type_delay)
                }
            }
            Phase::PausedAfterTyping => (self.cursor, Phase::Deleting, config.delete_delay),
            Phase::Deleting => {
                let cursor = self.cursor.saturating_sub(1);
                if cursor == 0 {
                    (cursor, Phase::PausedAfterDeleting, config.pause_after_deleting)
                } else {
                    (cursor, Phase::Deleting, config.delete_delay)
                }
            }
            Phase::PausedAfterDeleting => (self.cursor, Phase::Typing, config.type_delay),
        };
        let displayed_text = if cursor == self.cursor {
            self.displayed_text.clone()
        } else {
            script.render(cursor)
        };
        Self {
            displayed_text,
            phase,
            cursor,
            interval,
        }
    }

    /// Text to display.
    #[must_use]
    pub fn displayed_text(&self) -> &str {
        &self.displayed_text
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of command graphemes shown.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Delay until the next tick.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Whether `displayed_text` changed.
    pub text_changed: bool,
    /// Phase after the tick.
    pub phase: Phase,
    /// Delay until the following tick.
    pub next_delay: Duration,
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

/// Drives a [`TypewriterState`] from a [`TimerScheduler`].
///
/// The scheduler payload is chosen by the caller, so one scheduler can serve
/// several components: the host passes the payload that routes back to
/// [`on_timer`](Self::on_timer).
#[derive(Debug, Default)]
pub struct TypewriterAnimator {
    config: TypewriterConfig,
    script: Option<Script>,
    state: Option<TypewriterState>,
    pending: Option<TimerHandle>,
    ticks: u64,
}

impl TypewriterAnimator {
    /// Create an idle animator. Delays below 1 ms are raised to 1 ms.
    #[must_use]
    pub fn new(config: TypewriterConfig) -> Self {
        Self {
            config: config.clamped(),
            ..Self::default()
        }
    }

    /// Start (or restart) the cycle from the bare prompt.
    ///
    /// Any pending tick from a previous run is cancelled. With
    /// `reduced_motion` set this behaves like [`show_static`](Self::show_static).
    pub fn start<T>(
        &mut self,
        prompt: &str,
        command: &str,
        timers: &mut TimerScheduler<T>,
        payload: T,
    ) {
        if self.config.reduced_motion {
            self.show_static(prompt, command, timers);
            return;
        }
        self.cancel_pending(timers);
        let script = Script::new(prompt, command);
        let state = TypewriterState::initial(&script, &self.config);
        self.pending = Some(timers.schedule(state.interval, payload));
        crate::debug!(graphemes = script.len(), "typewriter started");
        self.script = Some(script);
        self.state = Some(state);
        self.ticks = 0;
    }

    /// Show the whole command without animating.
    pub fn show_static<T>(&mut self, prompt: &str, command: &str, timers: &mut TimerScheduler<T>) {
        self.cancel_pending(timers);
        let script = Script::new(prompt, command);
        self.state = Some(TypewriterState::complete(&script));
        self.script = Some(script);
        self.ticks = 0;
        crate::debug!("typewriter showing static command");
    }

    /// Handle a fired timer.
    ///
    /// Returns `None` when `handle` is not the animator's pending timer (a
    /// stale tick from before a restart or after dispose).
    pub fn on_timer<T>(
        &mut self,
        handle: TimerHandle,
        timers: &mut TimerScheduler<T>,
        payload: T,
    ) -> Option<TickOutcome> {
        if self.pending != Some(handle) {
            crate::trace!(timer = handle.id(), "ignoring stale typewriter tick");
            return None;
        }
        self.pending = None;
        let script = self.script.as_ref()?;
        let current = self.state.as_ref()?;
        let next = current.step(script, &self.config);
        let outcome = TickOutcome {
            text_changed: next.displayed_text != current.displayed_text,
            phase: next.phase,
            next_delay: next.interval,
        };
        self.pending = Some(timers.schedule(next.interval, payload));
        self.state = Some(next);
        self.ticks += 1;
        crate::trace!(tick = self.ticks, phase = ?outcome.phase, "typewriter tick");
        Some(outcome)
    }

    /// Stop the animation and release its timer. The last text stays visible.
    pub fn dispose<T>(&mut self, timers: &mut TimerScheduler<T>) {
        self.cancel_pending(timers);
        crate::debug!(ticks = self.ticks, "typewriter disposed");
    }

    /// Current text, empty before the first start.
    #[must_use]
    pub fn displayed_text(&self) -> &str {
        self.state
            .as_ref()
            .map_or("", TypewriterState::displayed_text)
    }

    /// Current state, if started.
    #[must_use]
    pub fn state(&self) -> Option<&TypewriterState> {
        self.state.as_ref()
    }

    /// Whether a tick is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Ticks processed since the last start.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TypewriterConfig {
        &self.config
    }

    fn cancel_pending<T>(&mut self, timers: &mut TimerScheduler<T>) {
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Caret
// ---------------------------------------------------------------------------

/// Step-end blinking caret: visible for the first half of every period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretBlink {
    period: Duration,
}

impl Default for CaretBlink {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl CaretBlink {
    /// Blink with the given full period. A zero period never blinks.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Whether the caret is drawn at `now`.
    #[must_use]
    pub fn is_visible(&self, now: Duration) -> bool {
        let period = self.period.as_nanos();
        if period == 0 {
            return true;
        }
        now.as_nanos() % period < period / 2
    }

    /// First instant after `now` at which visibility flips.
    ///
    /// `None` for a period too short to blink.
    #[must_use]
    pub fn next_toggle(&self, now: Duration) -> Option<Duration> {
        let half = self.period.as_nanos() / 2;
        if half == 0 {
            return None;
        }
        let next = (now.as_nanos() / half + 1) * half;
        u64::try_from(next).ok().map(Duration::from_nanos)
    }
}
