use std::collections::HashMap;
use std::future::Future;

use super::ArchiveStore;
use crate::error::{Error, Result};

/// An archive held as a map of path to bytes.
///
/// Useful for embedding and for tests that do not want to build a ZIP file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), data.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl ArchiveStore for MemoryStore {
    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let result = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()));
        async move { result }
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
