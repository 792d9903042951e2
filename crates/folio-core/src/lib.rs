#![forbid(unsafe_code)]

//! Core: host-driven timers, the typewriter cycle, visibility tracking, and
//! the read-only content model.
//!
//! Nothing in this crate blocks, spawns threads, or reads wall-clock time.
//! The embedding host advances time and forwards observer callbacks; the
//! components answer with plain data for the presentation layer.

pub mod anchor;
pub mod content;
pub mod logging;
pub mod timer;
pub mod typewriter;
pub mod visibility;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, trace, trace_span, warn};

pub use content::{ContactLinks, ContentError, PortfolioContent, SkillGroup, Technology};
pub use timer::{DeterministicClock, TimerHandle, TimerScheduler};
pub use typewriter::{
    CaretBlink, DEFAULT_COMMAND, DEFAULT_PROMPT, Phase, Script, TickOutcome, TypewriterAnimator,
    TypewriterConfig, TypewriterState,
};
pub use visibility::{
    DEFAULT_THRESHOLD, VisibilityConfig, VisibilityEvent, VisibilityTracker, normalize_threshold,
};
