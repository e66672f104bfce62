// src/cache/store.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::{BobError, Result};
use crate::fs::FileSystem;
use crate::types::TaskName;

/// File name of the store inside the state directory.
pub const CHECKSUM_FILE_NAME: &str = "checksum.json";

/// Persisted incremental-build state of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumEntry {
    /// Digest of the task's inputs at its last successful run; empty if the
    /// task never succeeded.
    pub hash: String,
    /// Set before a task starts and cleared only on success.
    pub dirty: bool,
}

impl ChecksumEntry {
    /// Entry for a task that has never been built.
    pub fn fresh() -> Self {
        Self {
            hash: String::new(),
            dirty: true,
        }
    }
}

/// Whole store contents, keyed (and persisted) in task-name order.
pub type Checksums = BTreeMap<TaskName, ChecksumEntry>;

/// `true` unless the stored hash equals `fresh_hash` and the entry is clean.
pub fn should_rebuild(entry: Option<&ChecksumEntry>, fresh_hash: &str) -> bool {
    match entry {
        Some(entry) => entry.dirty || entry.hash != fresh_hash,
        None => true,
    }
}

/// JSON-backed checksum store at `<state_dir>/checksum.json`.
///
/// Every mutation is a read-modify-write of the whole file. The mutating
/// methods take `&mut self`; concurrent users must share the store behind a
/// single lock held across each call.
#[derive(Debug, Clone)]
pub struct ChecksumStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    known_tasks: Vec<TaskName>,
}

impl ChecksumStore {
    pub fn new(fs: Arc<dyn FileSystem>, state_dir: &Path, known_tasks: Vec<TaskName>) -> Self {
        Self {
            fs,
            path: state_dir.join(CHECKSUM_FILE_NAME),
            known_tasks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.fs.exists(&self.path)
    }

    fn initial_entries<'a, I>(tasks: I) -> Checksums
    where
        I: IntoIterator<Item = &'a TaskName>,
    {
        tasks
            .into_iter()
            .map(|t| (t.clone(), ChecksumEntry::fresh()))
            .collect()
    }

    fn parse(&self, content: &str) -> Result<Checksums> {
        let entries: Checksums =
            serde_json::from_str(content).map_err(|e| BobError::ChecksumCorruption {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if entries.is_empty() {
            return Err(BobError::ChecksumCorruption {
                path: self.path.clone(),
                reason: "store contains no entries".to_string(),
            });
        }
        Ok(entries)
    }

    /// Read the persisted store.
    ///
    /// A missing file is an error: create it with [`ChecksumStore::ensure`]
    /// first. Unparsable content is not: the store is reinitialised with every
    /// known task dirty and the fresh contents are returned.
    pub fn load(&mut self) -> Result<Checksums> {
        if !self.exists() {
            return Err(BobError::ChecksumStoreMissing(self.path.clone()));
        }

        let content = self.fs.read_to_string(&self.path)?;
        match self.parse(&content) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                error!(error = %err, "checksum store unreadable; reinitialising with all tasks dirty");
                let entries = Self::initial_entries(self.known_tasks.iter());
                self.save(&entries)?;
                Ok(entries)
            }
        }
    }

    /// Current contents without creating, repairing or writing the store.
    ///
    /// A missing or unreadable store reads as empty.
    pub fn snapshot(&self) -> Checksums {
        if !self.exists() {
            return Checksums::new();
        }
        match self
            .fs
            .read_to_string(&self.path)
            .map_err(BobError::from)
            .and_then(|content| self.parse(&content))
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "checksum store unreadable; treating every task as stale");
                Checksums::new()
            }
        }
    }

    /// Make sure the store exists and holds an entry for each of `tasks`.
    ///
    /// Existing entries are never overwritten; only missing tasks are added,
    /// as dirty entries with an empty hash.
    pub fn ensure(&mut self, tasks: &[TaskName]) -> Result<Checksums> {
        for task in tasks {
            if !self.known_tasks.contains(task) {
                self.known_tasks.push(task.clone());
            }
        }

        if !self.exists() {
            let entries = Self::initial_entries(tasks.iter());
            self.save(&entries)?;
            info!(path = ?self.path, tasks = entries.len(), "created checksum store");
            return Ok(entries);
        }

        let mut entries = self.load()?;
        let mut added = 0usize;
        for task in tasks {
            if !entries.contains_key(task) {
                entries.insert(task.clone(), ChecksumEntry::fresh());
                added += 1;
            }
        }
        if added > 0 {
            self.save(&entries)?;
            info!(added, "added new tasks to checksum store");
        }
        Ok(entries)
    }

    fn validate(entries: &Checksums) -> Result<()> {
        if entries.is_empty() {
            return Err(BobError::ChecksumValidation(
                "refusing to write an empty checksum store".to_string(),
            ));
        }
        for task in entries.keys() {
            if task.trim().is_empty() {
                return Err(BobError::ChecksumValidation(
                    "entry with an empty task name".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn render(entries: &Checksums) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Validate and persist `entries`, replacing the whole store.
    ///
    /// A rejected write leaves the file on disk untouched.
    pub fn save(&mut self, entries: &Checksums) -> Result<()> {
        if let Err(err) = Self::validate(entries) {
            error!(error = %err, path = ?self.path, "checksum store write rejected");
            return Err(err);
        }

        let bytes = Self::render(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        self.fs.write(&tmp, &bytes)?;
        self.fs.rename(&tmp, &self.path)?;
        debug!(path = ?self.path, entries = entries.len(), "saved checksum store");
        Ok(())
    }

    /// Current entry for `task`, if any.
    pub fn entry(&mut self, task: &str) -> Result<Option<ChecksumEntry>> {
        Ok(self.load()?.get(task).cloned())
    }

    fn update_entry<F>(&mut self, task: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ChecksumEntry),
    {
        let mut entries = self.load()?;
        let entry = entries
            .get_mut(task)
            .ok_or_else(|| BobError::TaskNotFound(task.to_string()))?;
        f(entry);
        self.save(&entries)
    }

    /// Flag `task` for re-execution; its stored hash is kept.
    pub fn mark_dirty(&mut self, task: &str) -> Result<()> {
        self.update_entry(task, |entry| entry.dirty = true)?;
        debug!(task = %task, "marked dirty");
        Ok(())
    }

    /// Record a successful run of `task` with input digest `hash`.
    pub fn mark_clean(&mut self, task: &str, hash: &str) -> Result<()> {
        self.update_entry(task, |entry| {
            entry.hash = hash.to_string();
            entry.dirty = false;
        })?;
        debug!(task = %task, hash = %hash, "marked clean");
        Ok(())
    }

    /// Mark several tasks dirty in a single write. Unknown names are skipped.
    pub fn mark_all_dirty(&mut self, tasks: &[TaskName]) -> Result<usize> {
        let mut entries = self.load()?;
        let mut marked = 0usize;
        for task in tasks {
            match entries.get_mut(task) {
                Some(entry) => {
                    entry.dirty = true;
                    marked += 1;
                }
                None => warn!(task = %task, "no checksum entry to mark dirty"),
            }
        }
        if marked > 0 {
            self.save(&entries)?;
        }
        Ok(marked)
    }
}
