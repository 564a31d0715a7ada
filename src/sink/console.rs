//! Console echo sinks

use std::io::Write;
use std::sync::Mutex;

/// Best-effort console sink; failures are ignored
pub trait Console: Send + Sync {
    /// Write `text` without a terminator
    fn write(&self, text: &str);

    /// Write `text` followed by a newline
    fn write_line(&self, text: &str);
}

/// Console sink backed by the process stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Console for Stdout {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", text);
    }
}

/// Console sink that captures everything written to it
#[derive(Debug, Default)]
pub struct MemoryConsole {
    output: Mutex<String>,
}

impl MemoryConsole {
    /// Empty capture buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.output
            .lock()
            .map(|o| o.clone())
            .unwrap_or_default()
    }
}

impl Console for MemoryConsole {
    fn write(&self, text: &str) {
        if let Ok(mut output) = self.output.lock() {
            output.push_str(text);
        }
    }

    fn write_line(&self, text: &str) {
        if let Ok(mut output) = self.output.lock() {
            output.push_str(text);
            output.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_console_captures() {
        let console = MemoryConsole::new();
        console.write("a");
        console.write_line("b");
        console.write_line("c");
        assert_eq!(console.contents(), "ab\nc\n");
    }
}
