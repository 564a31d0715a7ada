//! chanlog - named, line-buffered, file-backed log channels
//!
//! A [`Channel`] buffers text fragments in memory and writes them to its output once a
//! per-channel threshold is reached or the channel is closed. A [`Registry`] maps names to
//! channels so any call site can route a message to one or several channels by name,
//! optionally echoing it to the console.

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod registry;
pub mod sink;

pub use channel::{Channel, DEFAULT_THRESHOLD};
pub use config::{ChannelConfig, RegistryConfig};
pub use error::{ChannelError, DispatchError};
pub use registry::Registry;
