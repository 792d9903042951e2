#![forbid(unsafe_code)]

//! Theme preference resolution.
//!
//! [`ThemeResolver`] owns the user's stored [`Preference`] and the operating
//! system's last reported color scheme, and derives the effective
//! light/dark flag from the two. Subscribers are notified synchronously.
//!
//! # Invariants
//!
//! 1. `is_dark()` is always `preference.is_dark(os_prefers_dark)`.
//! 2. Exactly one of the three preference tokens is persisted after a
//!    successful `set_preference`.
//! 3. An unreadable or unknown stored value resolves to [`Preference::System`].
//!
//! # Failure Modes
//!
//! | Scenario                     | Behavior                                   |
//! |-----------------------------|--------------------------------------------|
//! | Storage read fails          | Logged, preference defaults to `System`    |
//! | Storage write fails         | Logged, in-memory preference still applies |
//! | Subscriber drops its guard  | Listener detached, never called again      |
//! | Subscribe from a listener   | New listener joins from the next change    |

use crate::state_persistence::{StorageBackend, StorageError};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

/// Storage key holding the serialized preference.
pub const PREFERENCE_KEY: &str = "themePreference";

// ---------------------------------------------------------------------------
// Preference
// ---------------------------------------------------------------------------

/// The user's explicit theme choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preference {
    /// Always light.
    Light,
    /// Always dark.
    Dark,
    /// Follow the operating system color scheme.
    #[default]
    System,
}

impl Preference {
    /// All preferences, in selector order.
    pub const ALL: [Preference; 3] = [Preference::Light, Preference::Dark, Preference::System];

    /// Storage token for this preference.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Preference::Light => "light",
            Preference::Dark => "dark",
            Preference::System => "system",
        }
    }

    /// Parse a storage token. Unknown tokens yield `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "light" => Some(Preference::Light),
            "dark" => Some(Preference::Dark),
            "system" => Some(Preference::System),
            _ => None,
        }
    }

    /// Effective darkness given the OS color scheme.
    #[must_use]
    pub const fn is_dark(self, os_prefers_dark: bool) -> bool {
        match self {
            Preference::Light => false,
            Preference::Dark => true,
            Preference::System => os_prefers_dark,
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown preference token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePreferenceError {
    token: String,
}

impl fmt::Display for ParsePreferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown theme preference {:?} (expected light, dark or system)",
            self.token
        )
    }
}

impl std::error::Error for ParsePreferenceError {}

impl FromStr for Preference {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preference::parse(s).ok_or_else(|| ParsePreferenceError {
            token: s.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config / state
// ---------------------------------------------------------------------------

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    /// Key under which the preference is stored.
    pub storage_key: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            storage_key: PREFERENCE_KEY.to_string(),
        }
    }
}

impl ThemeConfig {
    /// Use a different storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

/// Snapshot passed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeState {
    /// Stored preference.
    pub preference: Preference,
    /// Effective darkness.
    pub dark: bool,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

type Listener = Rc<dyn Fn(&ThemeState)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Guard for a theme listener. Dropping it detaches the listener.
#[must_use = "dropping this guard unsubscribes the listener"]
pub struct ThemeSubscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl ThemeSubscription {
    /// Detach now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}

    /// Whether the resolver this guard belongs to is still alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listeners
            .upgrade()
            .is_some_and(|l| l.borrow().entries.iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for ThemeSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade()
            && let Ok(mut guard) = listeners.try_borrow_mut()
        {
            guard.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for ThemeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeSubscription")
            .field("id", &self.id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves the effective theme from a stored preference and the OS scheme.
pub struct ThemeResolver {
    backend: Box<dyn StorageBackend>,
    key: String,
    preference: Preference,
    os_prefers_dark: bool,
    dark: bool,
    listeners: Rc<RefCell<Listeners>>,
    last_storage_error: Option<String>,
}

impl ThemeResolver {
    /// Create a resolver with the default storage key.
    ///
    /// The stored preference is read once here. A missing, unknown or
    /// unreadable value resolves to [`Preference::System`].
    pub fn new(backend: impl StorageBackend + 'static, os_prefers_dark: bool) -> Self {
        Self::with_config(Box::new(backend), os_prefers_dark, ThemeConfig::default())
    }

    /// Create a resolver over a boxed backend with explicit config.
    pub fn with_config(
        backend: Box<dyn StorageBackend>,
        os_prefers_dark: bool,
        config: ThemeConfig,
    ) -> Self {
        let key = config.storage_key;
        let mut last_storage_error = None;
        let preference = match backend.get(&key) {
            Ok(Some(token)) => Preference::parse(&token).unwrap_or_else(|| {
                tracing::warn!(
                    backend = backend.name(),
                    key = %key,
                    token = %token,
                    "ignoring unknown stored theme preference"
                );
                Preference::System
            }),
            Ok(None) => Preference::System,
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    key = %key,
                    error = %e,
                    "failed to read theme preference"
                );
                last_storage_error = Some(e.to_string());
                Preference::System
            }
        };

        let dark = preference.is_dark(os_prefers_dark);
        tracing::debug!(%preference, dark, os_prefers_dark, "theme resolved");

        Self {
            backend,
            key,
            preference,
            os_prefers_dark,
            dark,
            listeners: Rc::new(RefCell::new(Listeners::default())),
            last_storage_error,
        }
    }

    /// The stored preference.
    #[inline]
    #[must_use]
    pub fn preference(&self) -> Preference {
        self.preference
    }

    /// Effective darkness.
    #[inline]
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.dark
    }

    /// Last OS color scheme reported.
    #[inline]
    #[must_use]
    pub fn os_prefers_dark(&self) -> bool {
        self.os_prefers_dark
    }

    /// Whether OS changes currently affect the effective theme.
    #[inline]
    #[must_use]
    pub fn follows_system(&self) -> bool {
        self.preference == Preference::System
    }

    /// Current preference and effective darkness.
    #[must_use]
    pub fn state(&self) -> ThemeState {
        ThemeState {
            preference: self.preference,
            dark: self.dark,
        }
    }

    /// Message of the most recent storage failure, if any.
    #[must_use]
    pub fn last_storage_error(&self) -> Option<&str> {
        self.last_storage_error.as_deref()
    }

    /// Name of the storage backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Store a new preference and recompute the effective theme.
    ///
    /// Persistence is best-effort: a failed write is logged and recorded in
    /// [`last_storage_error`](Self::last_storage_error) while the in-memory
    /// preference still takes effect. Subscribers are always notified.
    pub fn set_preference(&mut self, preference: Preference) {
        match self.backend.set(&self.key, preference.as_str()) {
            Ok(()) => self.last_storage_error = None,
            Err(e) => self.record_write_error(&e),
        }
        self.preference = preference;
        self.dark = preference.is_dark(self.os_prefers_dark);
        tracing::debug!(%preference, dark = self.dark, "theme preference set");
        self.notify();
    }

    /// Record a new OS color scheme.
    ///
    /// Returns `true` (and notifies) only when following the system and the
    /// effective theme changed.
    pub fn system_changed(&mut self, os_prefers_dark: bool) -> bool {
        self.os_prefers_dark = os_prefers_dark;
        if !self.follows_system() {
            return false;
        }
        let dark = self.preference.is_dark(os_prefers_dark);
        if dark == self.dark {
            return false;
        }
        self.dark = dark;
        tracing::debug!(dark, "theme follows system color scheme change");
        self.notify();
        true
    }

    /// Register a listener for theme changes.
    ///
    /// The listener is not called with the current state; read
    /// [`state`](Self::state) for that.
    pub fn subscribe(&self, listener: impl Fn(&ThemeState) + 'static) -> ThemeSubscription {
        let mut guard = self.listeners.borrow_mut();
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push((id, Rc::new(listener)));
        ThemeSubscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    fn record_write_error(&mut self, e: &StorageError) {
        tracing::warn!(
            backend = self.backend.name(),
            key = %self.key,
            error = %e,
            "failed to persist theme preference"
        );
        self.last_storage_error = Some(e.to_string());
    }

    fn notify(&self) {
        // Snapshot so listeners may subscribe or drop guards while running.
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        let state = self.state();
        for listener in snapshot {
            listener(&state);
        }
    }
}

impl fmt::Debug for ThemeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeResolver")
            .field("backend", &self.backend.name())
            .field("key", &self.key)
            .field("preference", &self.preference)
            .field("os_prefers_dark", &self.os_prefers_dark)
            .field("dark", &self.dark)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
