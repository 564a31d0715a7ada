//! File-backed outputs

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Backend, Output};

/// How an existing log file is treated on open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Start the file empty
    #[default]
    Truncate,
    /// Keep existing content and write after it
    Append,
}

/// Opens plain text files, optionally relative to a base directory
#[derive(Debug, Clone, Default)]
pub struct FileBackend {
    base_dir: Option<PathBuf>,
    mode: OpenMode,
}

impl FileBackend {
    /// Backend resolving identifiers as given, truncating on open
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers under `dir`
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Use `mode` for first opens; reopens always append
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mode used for first opens
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Path an identifier resolves to
    pub fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Backend for FileBackend {
    fn open(&self, identifier: &str) -> io::Result<Box<dyn Output>> {
        self.open_with(identifier, self.mode)
    }

    fn reopen(&self, identifier: &str) -> io::Result<Box<dyn Output>> {
        self.open_with(identifier, OpenMode::Append)
    }
}

impl FileBackend {
    fn open_with(&self, identifier: &str, mode: OpenMode) -> io::Result<Box<dyn Output>> {
        let path = self.resolve(identifier);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OpenMode::Truncate => options.write(true).truncate(true),
            OpenMode::Append => options.append(true),
        };
        let file = options.open(&path)?;

        Ok(Box::new(FileOutput { file }))
    }
}

/// Unbuffered: a failed write leaves nothing behind for close to retry
struct FileOutput {
    file: File,
}

impl Output for FileOutput {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        drop(self.file);
        Ok(())
    }
}
