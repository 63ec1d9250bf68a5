//! Scoped transmission sessions
//!
//! A [`TransmissionWindow`] is only handed out for the duration of a closure.
//! The stream is closed when the closure returns, when it fails, and when it
//! unwinds.

use crate::error::InvalidFileError;
use crate::transmission::TransmissionWindow;
use crate::types::FileDescriptor;

/// Open a window over `descriptor`, run `action` with it, and close it.
///
/// Errors from opening the file are converted into the caller's error type,
/// so an action can mix transmission failures with its own.
///
/// # Example
/// ```no_run
/// use rsynk_core::{with_transmission, FileDescriptor, InvalidFileError};
///
/// fn checksum(descriptor: &FileDescriptor) -> Result<u32, InvalidFileError> {
///     with_transmission(descriptor, 700, 8 * 1024, |window| {
///         let mut sum = 0u32;
///         while window.window_len() > 0 {
///             sum = window.window().iter().fold(sum, |acc, b| acc.wrapping_add(*b as u32));
///             window.advance(window.window_len())?;
///         }
///         Ok(sum)
///     })
/// }
/// ```
pub fn with_transmission<T, E, F>(
    descriptor: &FileDescriptor,
    window_capacity: usize,
    buffer_capacity: usize,
    action: F,
) -> Result<T, E>
where
    F: FnOnce(&mut TransmissionWindow) -> Result<T, E>,
    E: From<InvalidFileError>,
{
    let mut window = TransmissionWindow::open(descriptor, window_capacity, buffer_capacity)?;
    let result = action(&mut window);
    // Dropping the window on unwind closes it as well
    window.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileBitmasks, Group, User};
    use std::panic::{self, AssertUnwindSafe};
    use std::path::Path;
    use tempfile::TempDir;

    fn descriptor(path: &Path, length: u64) -> FileDescriptor {
        FileDescriptor {
            path: path.to_path_buf(),
            mode: FileBitmasks::REGULAR_FILE | 0o644,
            byte_offset: 0,
            byte_length: length,
            modified_at_seconds: 0,
            owner: User::new(0, "root"),
            group: Group::new(0, "root"),
        }
    }

    #[derive(Debug)]
    enum SendError {
        File(InvalidFileError),
        Rejected,
    }

    impl From<InvalidFileError> for SendError {
        fn from(e: InvalidFileError) -> Self {
            SendError::File(e)
        }
    }

    #[test]
    fn test_action_result_is_returned() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        std::fs::write(&path, b"hello transmission").unwrap();

        let first = with_transmission(&descriptor(&path, 18), 5, 16, |window| {
            Ok::<_, InvalidFileError>(window.window().to_vec())
        })
        .unwrap();
        assert_eq!(first, b"hello");
    }

    #[test]
    fn test_action_error_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        std::fs::write(&path, b"hello").unwrap();

        let err = with_transmission(&descriptor(&path, 5), 4, 8, |_| Err::<(), _>(SendError::Rejected))
            .unwrap_err();
        assert!(matches!(err, SendError::Rejected));
    }

    #[test]
    fn test_open_error_converts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.txt");

        let err = with_transmission(&descriptor(&path, 5), 4, 8, |_| Ok::<_, SendError>(()))
            .unwrap_err();
        assert!(matches!(err, SendError::File(InvalidFileError::Open { .. })));
    }

    #[test]
    fn test_action_sees_primed_window() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        std::fs::write(&path, vec![7u8; 64]).unwrap();

        let mut seen = None;
        with_transmission(&descriptor(&path, 64), 8, 16, |window| {
            seen = Some(window.remaining_bytes());
            Ok::<_, InvalidFileError>(())
        })
        .unwrap();
        assert_eq!(seen, Some(56));
    }

    #[test]
    fn test_panicking_action_unwinds_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        std::fs::write(&path, b"0123456789").unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            with_transmission(&descriptor(&path, 10), 4, 8, |_| -> Result<(), InvalidFileError> {
                panic!("matcher bug")
            })
        }));
        assert!(outcome.is_err());

        // The file is still usable afterwards
        let again = with_transmission(&descriptor(&path, 10), 4, 8, |window| {
            Ok::<_, InvalidFileError>(window.window().to_vec())
        })
        .unwrap();
        assert_eq!(again, b"0123");
    }

    #[test]
    fn test_empty_file_session() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let len = with_transmission(&descriptor(&path, 0), 700, 8192, |window| {
            window.advance(0)?;
            Ok::<_, InvalidFileError>(window.window_len())
        })
        .unwrap();
        assert_eq!(len, 0);
    }
}
