//! Output collaborators for channels
//!
//! A channel never touches files or the terminal directly. It opens its output through a
//! [`Backend`] and echoes through a [`Console`], so both can be swapped for in-memory versions.

mod console;
mod file;
mod memory;

use std::io;

pub use console::{Console, MemoryConsole, Stdout};
pub use file::{FileBackend, OpenMode};
pub use memory::MemoryBackend;

/// Opens outputs by identifier
pub trait Backend: Send + Sync {
    /// Open (or create) the output named by `identifier`
    fn open(&self, identifier: &str) -> io::Result<Box<dyn Output>>;

    /// Open the output again for a channel that lost it; existing content must be kept
    fn reopen(&self, identifier: &str) -> io::Result<Box<dyn Output>> {
        self.open(identifier)
    }
}

/// An open output owned by exactly one channel
pub trait Output: Send {
    /// Write `text` verbatim
    fn write_text(&mut self, text: &str) -> io::Result<()>;

    /// Release the output
    fn close(self: Box<Self>) -> io::Result<()>;
}
