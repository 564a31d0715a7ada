//! Line-buffered log channel
//!
//! A channel collects text fragments in memory and writes them to its output in one payload
//! once the number of pending fragments reaches the threshold. The threshold is checked before
//! a fragment is inserted, so up to `threshold` fragments may be pending between calls.
//! Pending content is also written by [`Channel::flush`] and [`Channel::close`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{write_failure_message, ChannelError};
use crate::sink::{Backend, Console, FileBackend, Output, Stdout};

/// Pending fragments that trigger a flush when no threshold is given
pub const DEFAULT_THRESHOLD: usize = 30;

/// A named, file-backed, line-buffered log destination
///
/// All operations take `&self`; each channel serializes its own buffer and output behind a
/// mutex, so a channel can be shared as `Arc<Channel>`.
pub struct Channel {
    identifier: String,
    backend: Arc<dyn Backend>,
    console: Arc<dyn Console>,
    exit_on_error: Arc<AtomicBool>,
    state: Mutex<ChannelState>,
}

struct ChannelState {
    threshold: usize,
    buffer: Vec<String>,
    output: Option<Box<dyn Output>>,
}

impl Channel {
    /// Open a file-backed channel that echoes to stdout
    pub fn open(identifier: impl Into<String>, threshold: usize) -> Result<Self, ChannelError> {
        Self::with_backend(
            identifier,
            threshold,
            Arc::new(FileBackend::new()),
            Arc::new(Stdout),
        )
    }

    /// Open a channel through an explicit backend and console
    pub fn with_backend(
        identifier: impl Into<String>,
        threshold: usize,
        backend: Arc<dyn Backend>,
        console: Arc<dyn Console>,
    ) -> Result<Self, ChannelError> {
        Self::from_parts(
            identifier.into(),
            threshold,
            backend,
            console,
            Arc::new(AtomicBool::new(false)),
            false,
        )
    }

    /// `resume` opens through [`Backend::reopen`], keeping content already persisted
    pub(crate) fn from_parts(
        identifier: String,
        threshold: usize,
        backend: Arc<dyn Backend>,
        console: Arc<dyn Console>,
        exit_on_error: Arc<AtomicBool>,
        resume: bool,
    ) -> Result<Self, ChannelError> {
        let opened = if resume {
            backend.reopen(&identifier)
        } else {
            backend.open(&identifier)
        };
        let output = opened.map_err(|source| ChannelError::Open {
            identifier: identifier.clone(),
            source,
        })?;
        tracing::debug!(identifier = %identifier, threshold, "opened log channel");

        Ok(Self {
            identifier,
            backend,
            console,
            exit_on_error,
            state: Mutex::new(ChannelState {
                threshold: threshold.max(1),
                buffer: Vec::new(),
                output: Some(output),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier of the backing output
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Pending fragments that trigger a flush
    pub fn threshold(&self) -> usize {
        self.state().threshold
    }

    /// Set the flush threshold; zero is treated as one
    pub fn set_threshold(&self, threshold: usize) {
        self.state().threshold = threshold.max(1);
    }

    /// Number of fragments waiting to be written
    pub fn pending_lines(&self) -> usize {
        self.state().buffer.len()
    }

    /// Snapshot of the pending fragments, in insertion order
    pub fn pending(&self) -> Vec<String> {
        self.state().buffer.clone()
    }

    /// Whether the channel still holds an open output
    pub fn is_open(&self) -> bool {
        self.state().output.is_some()
    }

    /// Whether a write failure terminates the process
    pub fn exit_on_error(&self) -> bool {
        self.exit_on_error.load(Ordering::SeqCst)
    }

    /// Buffer `message` verbatim
    pub fn put(&self, message: &str) -> Result<(), ChannelError> {
        self.insert(message.to_string())
    }

    /// Buffer `message` followed by a newline
    pub fn put_line(&self, message: &str) -> Result<(), ChannelError> {
        self.insert(format!("{}\n", message))
    }

    /// Like [`Channel::put`], echoing `message` to the console first when `echo` is set
    pub fn put_echo(&self, message: &str, echo: bool) -> Result<(), ChannelError> {
        if echo {
            self.console.write(message);
        }
        self.put(message)
    }

    /// Like [`Channel::put_line`], echoing `message` to the console first when `echo` is set
    pub fn put_line_echo(&self, message: &str, echo: bool) -> Result<(), ChannelError> {
        if echo {
            self.console.write_line(message);
        }
        self.put_line(message)
    }

    fn insert(&self, fragment: String) -> Result<(), ChannelError> {
        let mut guard = self.state();
        let state = &mut *guard;

        if state.output.is_none() {
            return Err(self.closed());
        }
        if state.buffer.len() >= state.threshold {
            self.flush_locked(state)?;
        }
        state.buffer.push(fragment);
        Ok(())
    }

    /// Write every pending fragment to the output as one payload
    ///
    /// On failure the fragments stay pending, the output is closed, and the failure is
    /// reported on the console. If the exit-on-error flag is set the process then exits
    /// with status 1.
    pub fn flush(&self) -> Result<(), ChannelError> {
        let mut guard = self.state();
        self.flush_locked(&mut guard)
    }

    fn flush_locked(&self, state: &mut ChannelState) -> Result<(), ChannelError> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        let payload = state.buffer.concat();
        let Some(output) = state.output.as_mut() else {
            return Err(self.closed());
        };

        match output.write_text(&payload) {
            Ok(()) => {
                tracing::debug!(
                    identifier = %self.identifier,
                    lines = state.buffer.len(),
                    "flushed log channel"
                );
                state.buffer.clear();
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    identifier = %self.identifier,
                    error = %source,
                    pending = state.buffer.len(),
                    "log channel write failed"
                );
                self.console
                    .write_line(&write_failure_message(&self.identifier, &source));
                if let Some(output) = state.output.take() {
                    self.release_silently(output);
                }
                if self.exit_on_error() {
                    std::process::exit(1);
                }
                Err(ChannelError::Write {
                    identifier: self.identifier.clone(),
                    source,
                })
            }
        }
    }

    /// Flush pending content and release the output
    ///
    /// Returns the flush error if the flush failed, otherwise the close error if releasing
    /// the output failed. Closing an already closed channel does nothing.
    pub fn close(&self) -> Result<(), ChannelError> {
        let mut guard = self.state();
        let state = &mut *guard;
        if state.output.is_none() {
            return Ok(());
        }

        let flushed = self.flush_locked(state);
        let closed = match state.output.take() {
            Some(output) => output.close().map_err(|source| ChannelError::Close {
                identifier: self.identifier.clone(),
                source,
            }),
            None => Ok(()),
        };
        tracing::debug!(identifier = %self.identifier, "closed log channel");
        flushed.and(closed)
    }

    /// Release the output, flushing first when `should_flush` is set
    ///
    /// Never fails; problems are reported on the console only.
    pub fn close_silently(&self, should_flush: bool) {
        let mut guard = self.state();
        let state = &mut *guard;
        if state.output.is_none() {
            return;
        }
        if should_flush {
            // reported by flush_locked
            let _ = self.flush_locked(state);
        }
        if let Some(output) = state.output.take() {
            self.release_silently(output);
        }
    }

    /// Re-acquire an output for a closed channel, keeping pending fragments
    ///
    /// Does nothing if the channel is open.
    pub fn reopen(&self) -> Result<(), ChannelError> {
        let mut state = self.state();
        if state.output.is_some() {
            return Ok(());
        }
        let output = self
            .backend
            .reopen(&self.identifier)
            .map_err(|source| ChannelError::Open {
                identifier: self.identifier.clone(),
                source,
            })?;
        state.output = Some(output);
        tracing::debug!(
            identifier = %self.identifier,
            pending = state.buffer.len(),
            "reopened log channel"
        );
        Ok(())
    }

    fn release_silently(&self, output: Box<dyn Output>) {
        if let Err(e) = output.close() {
            tracing::warn!(identifier = %self.identifier, error = %e, "failed to close log output");
            self.console
                .write_line(&format!("Error closing log file {}: {}", self.identifier, e));
        }
    }

    fn closed(&self) -> ChannelError {
        ChannelError::Closed {
            identifier: self.identifier.clone(),
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close_silently(true);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Channel")
            .field("identifier", &self.identifier)
            .field("threshold", &state.threshold)
            .field("pending", &state.buffer.len())
            .field("open", &state.output.is_some())
            .finish()
    }
}
