//! Error types for file transmission

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A file could not be transmitted.
///
/// Every failure of a transmission window is reported as this one kind; the
/// variant only tells what went wrong with the file.
#[derive(Error, Debug)]
pub enum InvalidFileError {
    #[error("failed to open the file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to skip {offset} bytes of {}: {reason}", path.display())]
    Skip {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("file {} ended prematurely ({read} of {expected} bytes read)", path.display())]
    PrematureEnd {
        path: PathBuf,
        read: u64,
        expected: u64,
    },

    #[error("failed to read the file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file {} is already closed", path.display())]
    Closed { path: PathBuf },

    #[error("cannot advance {shift} bytes in {}, only {available} bytes are left", path.display())]
    AdvancePastEnd {
        path: PathBuf,
        shift: u64,
        available: u64,
    },

    #[error(
        "pending literal data of {} needs {required} bytes, the buffer holds {capacity}",
        path.display()
    )]
    BufferOverflow {
        path: PathBuf,
        required: usize,
        capacity: usize,
    },

    #[error("cannot send {length} bytes of {} through an empty window", path.display())]
    EmptyWindow { path: PathBuf, length: u64 },
}

impl InvalidFileError {
    /// Path of the file that failed.
    pub fn path(&self) -> &PathBuf {
        match self {
            InvalidFileError::Open { path, .. }
            | InvalidFileError::Skip { path, .. }
            | InvalidFileError::PrematureEnd { path, .. }
            | InvalidFileError::Read { path, .. }
            | InvalidFileError::Closed { path }
            | InvalidFileError::AdvancePastEnd { path, .. }
            | InvalidFileError::BufferOverflow { path, .. }
            | InvalidFileError::EmptyWindow { path, .. } => path,
        }
    }
}

/// rsync process exit values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,
    /// Syntax or usage error
    Syntax = 1,
    /// Protocol incompatibility
    Protocol = 2,
    /// Errors selecting input/output files or dirs
    FileSelect = 3,
    /// Requested action not supported
    Unsupported = 4,
    /// Error in file I/O
    FileIo = 11,
    /// Error in rsync protocol data stream
    StreamIo = 12,
    /// Received SIGINT or SIGTERM
    Signal = 20,
    /// Partial transfer due to error
    Partial = 23,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&InvalidFileError> for ExitCode {
    fn from(_: &InvalidFileError) -> Self {
        ExitCode::FileIo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premature_end_message() {
        let err = InvalidFileError::PrematureEnd {
            path: PathBuf::from("/srv/data.bin"),
            read: 10,
            expected: 25,
        };
        assert_eq!(
            err.to_string(),
            "file /srv/data.bin ended prematurely (10 of 25 bytes read)"
        );
        assert_eq!(err.path(), &PathBuf::from("/srv/data.bin"));
    }

    #[test]
    fn test_open_error_keeps_source() {
        use std::error::Error as _;

        let err = InvalidFileError::Open {
            path: PathBuf::from("missing"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.source().is_some());
        assert_eq!(ExitCode::from(&err), ExitCode::FileIo);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Ok.code(), 0);
        assert_eq!(ExitCode::FileIo.code(), 11);
        assert_eq!(ExitCode::Signal.code(), 20);
        assert_eq!(ExitCode::Partial.code(), 23);
    }
}
