//! Global error handling for dirprompt
//!
//! Only failures that must reach the user end up here. Unreadable folders,
//! unreadable files and unreachable databases are modelled as values
//! (see [`crate::types`]) and degraded where they happen.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Global error type for dirprompt operations
#[derive(Error, Debug)]
pub enum PromptError {
    /// Missing or malformed user input, detected before any work starts
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The generated text could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An output folder could not be created
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Other file system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Settings file errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The walk was cancelled by its caller
    #[error("Scan cancelled")]
    Cancelled,

    /// The walk ran past its deadline
    #[error("Scan timed out")]
    TimedOut,

    /// A background task failed to complete
    #[error("Task failed: {0}")]
    Task(String),
}

impl PromptError {
    /// True for the errors raised by a stopped walk
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }

    /// Process exit status for a command-line run that failed with this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => EXIT_INVALID_INPUT,
            e if e.is_interrupted() => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit status when the input was rejected before any work
pub const EXIT_INVALID_INPUT: u8 = 1;
/// Exit status when writing or generating failed
pub const EXIT_FAILURE: u8 = 2;
/// Exit status when the user interrupted the run
pub const EXIT_INTERRUPTED: u8 = 130;

/// Specialized Result type for dirprompt operations
pub type Result<T> = std::result::Result<T, PromptError>;

/// Creates a PromptError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::PromptError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

impl From<tokio::task::JoinError> for PromptError {
    fn from(err: tokio::task::JoinError) -> Self {
        PromptError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(PromptError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(PromptError::Cancelled.exit_code(), 130);
        assert_eq!(PromptError::TimedOut.exit_code(), 130);
        let write = PromptError::Write {
            path: PathBuf::from("/out/report.md"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(write.exit_code(), 2);
        assert_eq!(PromptError::Task("panicked".into()).exit_code(), 2);
    }
}
