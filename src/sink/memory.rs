//! In-memory outputs
//!
//! Useful for embedding callers that want to inspect what a channel persisted, and for
//! injecting open, write and close failures.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Backend, Output};

#[derive(Debug, Default)]
struct MemoryState {
    contents: HashMap<String, String>,
    open: HashSet<String>,
    fail_open: HashSet<String>,
    fail_write: HashSet<String>,
    fail_close: HashSet<String>,
    writes: HashMap<String, usize>,
}

/// Backend that keeps every output as a string; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Empty backend with no failures armed
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything persisted to `identifier` so far
    pub fn contents(&self, identifier: &str) -> Option<String> {
        self.state().contents.get(identifier).cloned()
    }

    /// Number of successful writes to `identifier`
    pub fn write_count(&self, identifier: &str) -> usize {
        self.state().writes.get(identifier).copied().unwrap_or(0)
    }

    /// Whether an output for `identifier` is currently open
    pub fn is_open(&self, identifier: &str) -> bool {
        self.state().open.contains(identifier)
    }

    /// Make opens of `identifier` fail (or succeed again)
    pub fn fail_open(&self, identifier: &str, fail: bool) {
        toggle(&mut self.state().fail_open, identifier, fail);
    }

    /// Make writes to `identifier` fail (or succeed again)
    pub fn fail_write(&self, identifier: &str, fail: bool) {
        toggle(&mut self.state().fail_write, identifier, fail);
    }

    /// Make closing `identifier` fail; the output is released either way
    pub fn fail_close(&self, identifier: &str, fail: bool) {
        toggle(&mut self.state().fail_close, identifier, fail);
    }
}

fn toggle(set: &mut HashSet<String>, identifier: &str, on: bool) {
    if on {
        set.insert(identifier.to_string());
    } else {
        set.remove(identifier);
    }
}

impl Backend for MemoryBackend {
    fn open(&self, identifier: &str) -> io::Result<Box<dyn Output>> {
        let mut state = self.state();
        if state.fail_open.contains(identifier) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot open {}", identifier),
            ));
        }
        state.contents.entry(identifier.to_string()).or_default();
        state.open.insert(identifier.to_string());

        Ok(Box::new(MemoryOutput {
            identifier: identifier.to_string(),
            backend: self.clone(),
        }))
    }
}

struct MemoryOutput {
    identifier: String,
    backend: MemoryBackend,
}

impl Output for MemoryOutput {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let mut state = self.backend.state();
        if state.fail_write.contains(&self.identifier) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot write {}", self.identifier),
            ));
        }
        state
            .contents
            .entry(self.identifier.clone())
            .or_default()
            .push_str(text);
        *state.writes.entry(self.identifier.clone()).or_default() += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut state = self.backend.state();
        state.open.remove(&self.identifier);
        if state.fail_close.contains(&self.identifier) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot close {}", self.identifier),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_records_writes() {
        let backend = MemoryBackend::new();
        let mut output = backend.open("a").unwrap();
        assert!(backend.is_open("a"));

        output.write_text("x").unwrap();
        output.write_text("y").unwrap();
        output.close().unwrap();

        assert_eq!(backend.contents("a").as_deref(), Some("xy"));
        assert_eq!(backend.write_count("a"), 2);
        assert!(!backend.is_open("a"));
    }

    #[test]
    fn test_memory_backend_failure_injection() {
        let backend = MemoryBackend::new();
        backend.fail_open("a", true);
        assert!(backend.open("a").is_err());
        backend.fail_open("a", false);

        let mut output = backend.open("a").unwrap();
        backend.fail_write("a", true);
        assert!(output.write_text("x").is_err());
        assert_eq!(backend.contents("a").as_deref(), Some(""));

        backend.fail_close("a", true);
        assert!(output.close().is_err());
        assert!(!backend.is_open("a"));
    }
}
