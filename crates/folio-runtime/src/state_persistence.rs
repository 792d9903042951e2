#![forbid(unsafe_code)]

//! Best-effort key-value storage for user preferences.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ThemeResolver                           │
//! │   - reads its key once at startup                             │
//! │   - writes synchronously on every preference change           │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                            │
//! │   - MemoryStorage: in-memory (testing, ephemeral)             │
//! │   - UnavailableStorage: sandboxed hosts, always fails         │
//! │   - FileStorage: JSON file (requires state-persistence)       │
//! │   - LocalStorage: window.localStorage (folio-web, wasm32)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: Storage failures never panic; operations return `Result`.
//! 2. **Atomic writes**: File storage uses write-rename pattern to prevent corruption.
//! 3. **Values are opaque strings**: callers own parsing and validation.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, caller keeps in-memory value |
//! | `StorageError::Serialization` | JSON encode/decode | Returns error, file left untouched |
//! | `StorageError::Corruption` | Poisoned lock | Returns error |
//! | `StorageError::Unavailable` | No durable storage in this context | Returns error |
//! | Missing entry | First run | `Ok(None)` |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    #[cfg(feature = "state-persistence")]
    Serialization(String),
    /// Storage is corrupted or a lock was poisoned.
    Corruption(String),
    /// Backend is not available (sandboxed context, storage disabled).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(_) => None,
            StorageError::Corruption(_) => None,
            StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable durable key-value storage.
///
/// Backends are used from a single thread; browser storage handles are not
/// `Send`, so no thread-safety bound is imposed.
pub trait StorageBackend {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the value stored under `key`, `Ok(None)` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage backend for testing and ephemeral state.
///
/// Clones made with [`shared`](Self::shared) see the same map, which lets a
/// test drop one resolver and build another over the "same" storage to
/// simulate a page reload.
#[derive(Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with one entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        if let Ok(mut guard) = storage.data.write() {
            guard.insert(key.into(), value.into());
        }
        storage
    }

    /// Another handle onto the same map.
    #[must_use]
    pub fn shared(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unavailable Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Backend for contexts without durable storage.
///
/// Every operation fails with [`StorageError::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableStorage {
    reason: String,
}

impl UnavailableStorage {
    /// Create with a reason used in errors and logs.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

impl Default for UnavailableStorage {
    fn default() -> Self {
        Self::new("no durable storage in this context")
    }
}

impl StorageBackend for UnavailableStorage {
    fn name(&self) -> &str {
        "UnavailableStorage"
    }

    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(self.error())
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(self.error())
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires state-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "state-persistence")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// File format for stored preferences (JSON).
    #[derive(Serialize, Deserialize)]
    struct StateFile {
        /// Format version for future migrations.
        format_version: u32,
        /// Map of key -> value.
        entries: HashMap<String, String>,
    }

    impl StateFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                entries: HashMap::new(),
            }
        }
    }

    /// File-based storage backend using JSON.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": {
    ///     "themePreference": "dark"
    ///   }
    /// }
    /// ```
    ///
    /// # Atomic Writes
    ///
    /// 1. Write to `{path}.tmp`
    /// 2. Flush and sync
    /// 3. Rename `{path}.tmp` -> `{path}`
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it will be created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        /// Create storage at the default location for the application.
        ///
        /// Uses `$XDG_STATE_HOME/folio/{app_name}/state.json`, falling back to
        /// `~/.local/state` and finally the current directory.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let base = state_dir_or_fallback();
            let path = base.join("folio").join(app_name).join("state.json");
            Self { path }
        }

        /// Path of the state file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn load(&self) -> StorageResult<StateFile> {
            if !self.path.exists() {
                return Ok(StateFile::new());
            }

            let file = File::open(&self.path)?;
            let reader = BufReader::new(file);
            let state_file: StateFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse state file: {e}"))
            })?;

            if state_file.format_version != StateFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = state_file.format_version,
                    expected = StateFile::FORMAT_VERSION,
                    "state file format version mismatch, ignoring stored preferences"
                );
                return Ok(StateFile::new());
            }
            Ok(state_file)
        }

        fn store(&self, state_file: &StateFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, state_file).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize preferences: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = state_file.entries.len(),
                "saved preferences"
            );
            Ok(())
        }
    }

    /// Get state directory, falling back to current dir if unavailable.
    fn state_dir_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.load()?.entries.get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            // A corrupt file is replaced rather than blocking every later write.
            let mut state_file = self.load().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable state file");
                StateFile::new()
            });
            state_file
                .entries
                .insert(key.to_string(), value.to_string());
            self.store(&state_file)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            let mut state_file = self.load()?;
            if state_file.entries.remove(key).is_some() {
                self.store(&state_file)?;
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            if let Some(parent) = self.path.parent() {
                if !parent.exists() {
                    return fs::create_dir_all(parent).is_ok();
                }
                let test_path = parent.join(".folio_test_write");
                if fs::write(&test_path, b"test").is_ok() {
                    let _ = fs::remove_file(&test_path);
                    return true;
                }
            }
            false
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v1").unwrap();
        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(storage.len(), 1);

        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_shared_handles() {
        let first = MemoryStorage::with_entry("themePreference", "dark");
        let second = first.shared();
        second.set("themePreference", "light").unwrap();
        assert_eq!(first.get("themePreference").unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn unavailable_storage_always_fails() {
        let storage = UnavailableStorage::default();
        assert!(!storage.is_available());
        assert!(matches!(storage.get("k"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.set("k", "v"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.remove("k"), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn storage_error_display() {
        let io_err = StorageError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(io_err.to_string().contains("I/O error"));

        let corrupt = StorageError::Corruption("bad data".into());
        assert!(corrupt.to_string().contains("corruption"));

        let unavail = StorageError::Unavailable("sandboxed".into());
        assert!(unavail.to_string().contains("unavailable"));
    }
}

#[cfg(all(test, feature = "state-persistence"))]
mod file_storage_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        let storage = FileStorage::new(&path);

        storage.set("themePreference", "dark").unwrap();
        assert!(path.exists());

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get("themePreference").unwrap().as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn file_storage_load_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("does_not_exist.json"));
        assert_eq!(storage.get("themePreference").unwrap(), None);
    }

    #[test]
    fn file_storage_remove() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("state.json"));
        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();
        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
        assert_eq!(storage.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dirs").join("state.json");
        let storage = FileStorage::new(&path);
        storage.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_storage_rejects_corrupt_file_on_read_and_replaces_on_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get("themePreference"),
            Err(StorageError::Serialization(_))
        ));

        storage.set("themePreference", "light").unwrap();
        assert_eq!(
            storage.get("themePreference").unwrap().as_deref(),
            Some("light")
        );
    }

    #[test]
    fn file_storage_ignores_unknown_format_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"format_version":99,"entries":{"themePreference":"dark"}}"#,
        )
        .unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("themePreference").unwrap(), None);
    }
}
