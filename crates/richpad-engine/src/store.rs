//! Local persistence: a single-key content store holding the serialized
//! document body, plus the debounce scheduler that coalesces saves.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Storage key for the document body, kept from the original deployment
/// so existing saved pads keep loading.
pub const CONTENT_KEY: &str = "wordpad-content-pm";

/// Quiet period before an edited document is persisted.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(800);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),
}

/// Key-value persistence for serialized document bodies.
pub trait ContentStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self, key: &str) -> Result<(), StoreError>;
}

/// File-backed store: one `<key>.html` file per key under a root
/// directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> FileStore {
        FileStore { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.html"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_content(key: &str, value: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.entries.insert(key.to_string(), value.to_string());
        store
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl ContentStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Reset-able debounce timer modeled on injected instants, so the session
/// never reads the clock and tests drive time explicitly. Only the newest
/// state is ever saved per quiet window; intermediate revisions are
/// dropped on purpose.
#[derive(Debug)]
pub struct SaveScheduler {
    window: Duration,
    due: Option<Instant>,
}

impl SaveScheduler {
    pub fn new(window: Duration) -> SaveScheduler {
        SaveScheduler { window, due: None }
    }

    /// An edit happened: restart the quiet window.
    pub fn note_edit(&mut self, now: Instant) {
        self.due = Some(now + self.window);
    }

    /// Whether a save is due; consumes the deadline when it is.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> bool {
        self.due.is_some()
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }
}
