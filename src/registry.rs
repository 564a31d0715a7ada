//! Registry of named channels
//!
//! Maps channel names to channels, routes messages by name and holds the exit-on-error flag
//! shared by every channel it creates. A process-wide instance is available through
//! [`Registry::global`]; components that want isolation can own their own [`Registry`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::channel::Channel;
use crate::config::RegistryConfig;
use crate::error::{ChannelError, DispatchError};
use crate::sink::{Backend, Console, FileBackend, Stdout};

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Name to channel mapping plus the shared failure policy
pub struct Registry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    exit_on_error: Arc<AtomicBool>,
    backend: Arc<dyn Backend>,
    console: Arc<dyn Console>,
}

impl Registry {
    /// Create an empty registry writing files and echoing to stdout
    pub fn new() -> Self {
        Self::with_backend(Arc::new(FileBackend::new()), Arc::new(Stdout))
    }

    /// Create an empty registry with an explicit backend and console
    pub fn with_backend(backend: Arc<dyn Backend>, console: Arc<dyn Console>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            exit_on_error: Arc::new(AtomicBool::new(false)),
            backend,
            console,
        }
    }

    /// Build a registry and every channel listed in `config`
    ///
    /// Stops at the first channel that fails to open; channels opened before it are flushed
    /// and closed as the partial registry drops.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ChannelError> {
        let registry = Self::with_backend(Arc::new(config.backend()), Arc::new(Stdout));
        registry.set_exit_on_error(config.exit_on_error);
        for channel in &config.channels {
            registry.create(
                &channel.name,
                channel.identifier(),
                config.threshold_for(channel),
            )?;
        }
        Ok(registry)
    }

    /// The process-wide registry, created empty on first use
    ///
    /// The static is never dropped, so its channels are not flushed at process exit;
    /// call [`Registry::close_all`] during shutdown.
    pub fn global() -> &'static Registry {
        GLOBAL_REGISTRY.get_or_init(Registry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Channel>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Channel>>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_channel(
        &self,
        identifier: &str,
        threshold: usize,
        resume: bool,
    ) -> Result<Channel, ChannelError> {
        Channel::from_parts(
            identifier.to_string(),
            threshold,
            Arc::clone(&self.backend),
            Arc::clone(&self.console),
            Arc::clone(&self.exit_on_error),
            resume,
        )
    }

    /// Open a channel and register it under `name`
    ///
    /// Fails with [`ChannelError::DuplicateName`] if the name is taken; use
    /// [`Registry::replace`] to swap a channel out. The output is opened without holding
    /// the registry lock.
    pub fn create(
        &self,
        name: &str,
        identifier: &str,
        threshold: usize,
    ) -> Result<Arc<Channel>, ChannelError> {
        if self.contains(name) {
            return Err(duplicate(name));
        }
        let channel = Arc::new(self.open_channel(identifier, threshold, false)?);

        let mut channels = self.write();
        if channels.contains_key(name) {
            drop(channels);
            channel.close_silently(false);
            return Err(duplicate(name));
        }
        channels.insert(name.to_string(), Arc::clone(&channel));
        tracing::debug!(name, identifier, "registered log channel");
        Ok(channel)
    }

    /// Register a new channel under `name`, closing any channel already registered there
    ///
    /// The previous channel is flushed and closed before the new one opens, under the
    /// registry lock. When both use the same identifier the new channel continues the
    /// existing output instead of truncating it. If opening fails the name is left
    /// unregistered.
    pub fn replace(
        &self,
        name: &str,
        identifier: &str,
        threshold: usize,
    ) -> Result<Arc<Channel>, ChannelError> {
        let mut channels = self.write();
        let mut resume = false;
        if let Some(previous) = channels.remove(name) {
            tracing::debug!(name, identifier = previous.identifier(), "replacing log channel");
            previous.close_silently(true);
            resume = previous.identifier() == identifier;
        }
        let channel = Arc::new(self.open_channel(identifier, threshold, resume)?);
        channels.insert(name.to_string(), Arc::clone(&channel));
        Ok(channel)
    }

    /// Create one channel per name, using each name as its identifier
    ///
    /// Stops at the first failure; channels created before it stay registered.
    pub fn create_many<S: AsRef<str>>(
        &self,
        names: &[S],
        threshold: usize,
    ) -> Result<(), ChannelError> {
        for name in names {
            let name = name.as_ref();
            self.create(name, name, threshold)?;
        }
        Ok(())
    }

    /// The channel registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.read().get(name).cloned()
    }

    /// Whether a channel is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no channel is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer `message` as a line on every named channel
    ///
    /// The message is echoed to the console once when `echo` is set. Unknown names are
    /// skipped. Every known channel is attempted, in the order given, and their failures
    /// are returned together.
    pub fn dispatch<S: AsRef<str>>(
        &self,
        names: &[S],
        message: &str,
        echo: bool,
    ) -> Result<(), DispatchError> {
        if echo {
            self.console.write_line(message);
        }

        let targets: Vec<(&str, Arc<Channel>)> = {
            let channels = self.read();
            names
                .iter()
                .filter_map(|name| {
                    let name = name.as_ref();
                    channels.get(name).map(|c| (name, Arc::clone(c)))
                })
                .collect()
        };

        let failures: Vec<(String, ChannelError)> = targets
            .into_iter()
            .filter_map(|(name, channel)| {
                channel
                    .put_line(message)
                    .err()
                    .map(|e| (name.to_string(), e))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }

    /// Buffer `message` as a line on the channel named `name`
    ///
    /// Unknown names are ignored.
    pub fn dispatch_one(&self, name: &str, message: &str, echo: bool) -> Result<(), ChannelError> {
        if echo {
            self.console.write_line(message);
        }
        match self.get(name) {
            Some(channel) => channel.put_line(message),
            None => Ok(()),
        }
    }

    /// Close every registered channel
    ///
    /// Channels stay registered. Every channel is closed even if an earlier one fails;
    /// the first failure (in name order) is returned.
    pub fn close_all(&self) -> Result<(), ChannelError> {
        let mut channels: Vec<(String, Arc<Channel>)> = self
            .read()
            .iter()
            .map(|(name, channel)| (name.clone(), Arc::clone(channel)))
            .collect();
        channels.sort_by(|a, b| a.0.cmp(&b.0));

        let mut first_error = None;
        for (name, channel) in channels {
            if let Err(e) = channel.close() {
                tracing::warn!(name = %name, error = %e, "failed to close log channel");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether a failed flush on any channel terminates the process
    pub fn exit_on_error(&self) -> bool {
        self.exit_on_error.load(Ordering::SeqCst)
    }

    /// Set the failure policy; applies to existing channels on their next flush
    pub fn set_exit_on_error(&self, exit_on_error: bool) {
        self.exit_on_error.store(exit_on_error, Ordering::SeqCst);
    }
}

fn duplicate(name: &str) -> ChannelError {
    ChannelError::DuplicateName {
        name: name.to_string(),
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
