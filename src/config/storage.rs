/*!
 * Where configuration documents live
 *
 * Three slots: the primary document, a single rotating backup, and the
 * shipped template. `FsStorage` maps them to files; `MemoryStorage` keeps
 * them in memory and records every write, which is what the tests use to
 * check backup ordering.
 */

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Storage slot for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Primary,
    Backup,
    Template,
}

pub trait DocumentStorage {
    /// Raw contents of a slot, `None` if it does not exist
    fn read(&self, slot: Slot) -> io::Result<Option<String>>;

    /// Replace the contents of a slot
    fn write(&self, slot: Slot, contents: &str) -> io::Result<()>;

    /// Human-readable location, used in log lines and errors
    fn location(&self, slot: Slot) -> PathBuf;
}

fn read_only_template() -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        "the template document is never written",
    )
}

/// File-backed storage
#[derive(Debug, Clone)]
pub struct FsStorage {
    primary: PathBuf,
    backup: PathBuf,
    template: PathBuf,
}

impl FsStorage {
    pub fn new(
        primary: impl Into<PathBuf>,
        backup: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            template: template.into(),
        }
    }

    fn path(&self, slot: Slot) -> &Path {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Backup => &self.backup,
            Slot::Template => &self.template,
        }
    }
}

impl DocumentStorage for FsStorage {
    fn read(&self, slot: Slot) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write to a temp file next to the target, then rename over it
    fn write(&self, slot: Slot, contents: &str) -> io::Result<()> {
        if slot == Slot::Template {
            return Err(read_only_template());
        }
        let target = self.path(slot);
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn location(&self, slot: Slot) -> PathBuf {
        self.path(slot).to_path_buf()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<Slot, String>,
    writes: Vec<Slot>,
    failing: HashSet<Slot>,
}

/// In-memory storage; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot without recording a write
    pub fn with(self, slot: Slot, contents: impl Into<String>) -> Self {
        self.lock().files.insert(slot, contents.into());
        self
    }

    pub fn contents(&self, slot: Slot) -> Option<String> {
        self.lock().files.get(&slot).cloned()
    }

    /// Every write in order, including failed attempts
    pub fn writes(&self) -> Vec<Slot> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self, slot: Slot) -> usize {
        self.lock().writes.iter().filter(|s| **s == slot).count()
    }

    /// Make writes to `slot` fail (or succeed again)
    pub fn set_failing(&self, slot: Slot, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(slot);
        } else {
            state.failing.remove(&slot);
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStorage for MemoryStorage {
    fn read(&self, slot: Slot) -> io::Result<Option<String>> {
        Ok(self.contents(slot))
    }

    fn write(&self, slot: Slot, contents: &str) -> io::Result<()> {
        if slot == Slot::Template {
            return Err(read_only_template());
        }
        let mut state = self.lock();
        state.writes.push(slot);
        if state.failing.contains(&slot) {
            return Err(io::Error::other(format!("simulated write failure on {:?}", slot)));
        }
        state.files.insert(slot, contents.to_string());
        Ok(())
    }

    fn location(&self, slot: Slot) -> PathBuf {
        PathBuf::from(format!("memory://{:?}", slot).to_lowercase())
    }
}
