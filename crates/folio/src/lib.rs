#![forbid(unsafe_code)]

//! folio public facade crate.
//!
//! Re-exports the types a page embedder needs from the internal crates and
//! offers a small prelude.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use folio_core::anchor::anchor_offset;
pub use folio_core::{
    CaretBlink, ContactLinks, ContentError, DEFAULT_COMMAND, DEFAULT_PROMPT, DEFAULT_THRESHOLD,
    DeterministicClock, Phase, PortfolioContent, Script, SkillGroup, Technology, TimerHandle,
    TimerScheduler, TypewriterAnimator, TypewriterConfig, TypewriterState, VisibilityConfig,
    VisibilityEvent, VisibilityTracker,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "state-persistence")]
pub use folio_runtime::FileStorage;
pub use folio_runtime::{
    MemoryStorage, PREFERENCE_KEY, Preference, StorageBackend, StorageError, ThemeConfig,
    ThemeResolver, ThemeState, ThemeSubscription, UnavailableStorage,
};

// --- Web re-exports --------------------------------------------------------

pub use folio_web::{
    HostConfig, HostError, HostEvent, PortfolioHost, PresentationSnapshot, StepResult,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for folio embedders.
#[derive(Debug)]
pub enum Error {
    /// Content JSON failed to parse.
    Content(ContentError),
    /// Preference storage failed.
    Storage(StorageError),
    /// Host driven out of order.
    Host(HostError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Content(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Host(err) => Some(err),
        }
    }
}

impl From<ContentError> for Error {
    fn from(err: ContentError) -> Self {
        Self::Content(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

/// Standard result type for folio APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Parse content and start a host in one call.
///
/// Unlike the browser binding, which renders an empty page for unparseable
/// content, this surfaces the parse error.
pub fn start_host(
    content_json: &str,
    storage: impl StorageBackend + 'static,
    os_prefers_dark: bool,
    config: HostConfig,
) -> Result<PortfolioHost> {
    let content = PortfolioContent::from_json(content_json)?;
    let mut host = PortfolioHost::new(content, storage, os_prefers_dark, config);
    host.init()?;
    Ok(host)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, HostConfig, HostEvent, MemoryStorage, PortfolioContent, PortfolioHost, Preference,
        PresentationSnapshot, Result, StorageBackend, ThemeResolver, TypewriterConfig,
    };

    pub use crate::{core, runtime, web};
}

pub use folio_core as core;
pub use folio_runtime as runtime;
pub use folio_web as web;
