#![forbid(unsafe_code)]

//! Folio Runtime
//!
//! Theme preference resolution and the storage it persists through.
//!
//! # Key Components
//!
//! - [`ThemeResolver`] - Stored preference plus OS scheme to effective light/dark
//! - [`Preference`] - `light`, `dark` or `system`
//! - [`StorageBackend`] - Pluggable best-effort key-value storage
//! - [`MemoryStorage`] / [`UnavailableStorage`] - Always-compiled backends
//! - `FileStorage` - JSON state file (feature `state-persistence`)
//!
//! # How it fits in the system
//! `folio-web` owns one resolver per page, forwards OS color scheme changes
//! into it and reads `is_dark()` when building a snapshot. Browser
//! `localStorage` is adapted to [`StorageBackend`] there.

pub mod state_persistence;
pub mod theme;

#[cfg(feature = "state-persistence")]
pub use state_persistence::FileStorage;
pub use state_persistence::{
    MemoryStorage, StorageBackend, StorageError, StorageResult, UnavailableStorage,
};
pub use theme::{
    PREFERENCE_KEY, ParsePreferenceError, Preference, ThemeConfig, ThemeResolver, ThemeState,
    ThemeSubscription,
};
