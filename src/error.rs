//! Error types for channels and the registry

use std::fmt;
use std::io;

use thiserror::Error;

/// Errors returned by channel and registry operations
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The backing output could not be opened
    #[error("failed to open log output '{identifier}'")]
    Open {
        identifier: String,
        #[source]
        source: io::Error,
    },

    /// Buffered lines could not be written to the backing output
    #[error("failed to write log output '{identifier}'")]
    Write {
        identifier: String,
        #[source]
        source: io::Error,
    },

    /// The backing output could not be released
    #[error("failed to close log output '{identifier}'")]
    Close {
        identifier: String,
        #[source]
        source: io::Error,
    },

    /// The channel has no open output (closed explicitly or after a failed flush)
    #[error("log channel '{identifier}' is closed")]
    Closed { identifier: String },

    /// A channel with this name is already registered
    #[error("log channel name '{name}' is already registered")]
    DuplicateName { name: String },
}

impl ChannelError {
    /// The underlying io error, if this error wraps one
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            ChannelError::Open { source, .. }
            | ChannelError::Write { source, .. }
            | ChannelError::Close { source, .. } => Some(source),
            ChannelError::Closed { .. } | ChannelError::DuplicateName { .. } => None,
        }
    }
}

/// Failures collected while dispatching one message to several channels
#[derive(Debug)]
pub struct DispatchError {
    /// Channel name and the error its delivery produced, in dispatch order
    pub failures: Vec<(String, ChannelError)>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.failures.iter().map(|(n, _)| n.as_str()).collect();
        write!(f, "dispatch failed for channel(s): {}", names.join(", "))
    }
}

impl std::error::Error for DispatchError {}

/// Categories of io failures for console messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Anything else
    Other,
}

impl FailureKind {
    /// Short human-readable description
    pub fn describe(&self) -> &'static str {
        match self {
            FailureKind::DiskFull => "disk full",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::NotFound => "file or directory not found",
            FailureKind::Other => "i/o error",
        }
    }
}

/// Categorize an io error
pub fn categorize_io_error(e: &io::Error) -> FailureKind {
    use std::io::ErrorKind;

    match e.kind() {
        ErrorKind::StorageFull | ErrorKind::WriteZero => FailureKind::DiskFull,
        ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        ErrorKind::NotFound => FailureKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28, EDQUOT = 122 (Linux) / 69 (macOS)
                    if os_error == 28 || os_error == 122 || os_error == 69 {
                        return FailureKind::DiskFull;
                    }
                    // EACCES
                    if os_error == 13 {
                        return FailureKind::PermissionDenied;
                    }
                }
            }
            FailureKind::Other
        }
    }
}

/// Console message for a failed write to `identifier`
pub fn write_failure_message(identifier: &str, e: &io::Error) -> String {
    match categorize_io_error(e) {
        FailureKind::Other => format!("Error writing log file {}: {}", identifier, e),
        kind => format!("Error writing log file {}: {}", identifier, kind.describe()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_io_error() {
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(categorize_io_error(&e), FailureKind::PermissionDenied);

        let e = io::Error::new(io::ErrorKind::WriteZero, "short write");
        assert_eq!(categorize_io_error(&e), FailureKind::DiskFull);

        let e = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(categorize_io_error(&e), FailureKind::NotFound);

        let e = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(categorize_io_error(&e), FailureKind::Other);
    }

    #[test]
    fn test_write_failure_message() {
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(
            write_failure_message("app.log", &e),
            "Error writing log file app.log: permission denied"
        );

        let e = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(
            write_failure_message("app.log", &e),
            "Error writing log file app.log: boom"
        );
    }

    #[test]
    fn test_io_error_accessor() {
        let err = ChannelError::Closed {
            identifier: "a".to_string(),
        };
        assert!(err.io_error().is_none());

        let err = ChannelError::Write {
            identifier: "a".to_string(),
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        assert_eq!(err.io_error().map(|e| e.kind()), Some(io::ErrorKind::Other));
        assert_eq!(err.to_string(), "failed to write log output 'a'");
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError {
            failures: vec![
                (
                    "app".to_string(),
                    ChannelError::Closed {
                        identifier: "app.log".to_string(),
                    },
                ),
                (
                    "audit".to_string(),
                    ChannelError::Closed {
                        identifier: "audit.log".to_string(),
                    },
                ),
            ],
        };
        assert_eq!(err.to_string(), "dispatch failed for channel(s): app, audit");
    }
}
