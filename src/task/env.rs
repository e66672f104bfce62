// src/task/env.rs

use std::collections::BTreeMap;

/// Separator used to join list values, as in `PATH`.
#[cfg(windows)]
pub const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const PATH_SEPARATOR: &str = ":";

/// Environment handed to a task's subprocesses.
///
/// Each task owns its own copy; the process environment is only read once,
/// when the copy is taken, and never written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEnv {
    vars: BTreeMap<String, String>,
}

impl TaskEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Join `values` with [`PATH_SEPARATOR`] and store them under `key`.
    ///
    /// An existing value is extended (`old:new`) unless `override_existing`
    /// is set, in which case it is replaced. Empty `values` is a no-op.
    pub fn update<I, S>(&mut self, key: &str, values: I, override_existing: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR);
        if joined.is_empty() {
            return;
        }

        match self.vars.get_mut(key) {
            Some(existing) if !override_existing && !existing.is_empty() => {
                existing.push_str(PATH_SEPARATOR);
                existing.push_str(&joined);
            }
            _ => {
                self.vars.insert(key.to_string(), joined);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, String)> for TaskEnv {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
