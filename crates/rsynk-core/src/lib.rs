//! rsynk Core - File descriptors, request options, and the transmission window
//!
//! This crate contains the pieces of the rsync sender that sit below the wire
//! protocol: the sliding window a delta matcher reads file bytes through, the
//! scoped session that owns it, and the plain data types describing what is
//! being sent. It performs no network I/O.

pub mod config;
pub mod error;
pub mod options;
pub mod session;
pub mod transmission;
pub mod types;

pub use config::{Config, ConfigError, FilesConfig, TransmissionConfig};
pub use error::*;
pub use options::{FileSelection, RequestOptions, RsyncOption};
pub use session::with_transmission;
pub use transmission::TransmissionWindow;
pub use types::*;

/// Default transmission buffer size in bytes (8 KB)
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Default window length in bytes (rsync's minimum block length)
pub const DEFAULT_WINDOW_SIZE: usize = 700;
