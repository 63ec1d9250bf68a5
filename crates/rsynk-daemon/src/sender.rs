//! Literal sender
//!
//! Drives a transmission window the way the rolling matcher does when none of
//! the receiver's blocks match: the window slides one byte at a time, every
//! byte it leaves behind becomes pending literal data behind the mark, and
//! the pending bytes are flushed as a chunk whenever they would no longer fit
//! in the buffer.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::trace;

use rsynk_core::{InvalidFileError, TransmissionWindow};

/// Counters for one sent file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmissionStats {
    /// Bytes written as literal data
    pub literal_bytes: u64,
    /// Number of literal chunks written
    pub chunks: u64,
}

/// Sending a file failed
#[derive(Error, Debug)]
pub enum SendError {
    #[error(transparent)]
    File(#[from] InvalidFileError),

    #[error("failed to write literal data: {0}")]
    Output(#[source] io::Error),

    #[error("window of {window} bytes leaves no room for literal data in a {buffer} byte buffer")]
    WindowTooLarge { window: usize, buffer: usize },
}

/// Writes the content of a window's file as literal chunks
pub struct LiteralSender<W> {
    output: W,
    /// Literal bytes handed to `output` over all files
    written: u64,
}

impl<W: Write> LiteralSender<W> {
    pub fn new(output: W) -> Self {
        Self { output, written: 0 }
    }

    /// Total literal bytes written so far, across every file sent.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Slide through the whole window and write every byte as literal data.
    pub fn send<R: Read>(
        &mut self,
        window: &mut TransmissionWindow<R>,
    ) -> Result<TransmissionStats, SendError> {
        if window.window_len() > 0 && window.window_capacity() >= window.buffer_capacity() {
            return Err(SendError::WindowTooLarge {
                window: window.window_capacity(),
                buffer: window.buffer_capacity(),
            });
        }

        let mut stats = TransmissionStats::default();
        window.set_mark(0);

        while window.window_len() > 0 {
            if window.is_full() {
                self.flush(window, &mut stats)?;
                window.set_mark(0);
            }
            window.advance(1)?;
        }
        self.flush(window, &mut stats)?;

        self.output.flush().map_err(SendError::Output)?;
        Ok(stats)
    }

    fn flush<R>(
        &mut self,
        window: &TransmissionWindow<R>,
        stats: &mut TransmissionStats,
    ) -> Result<(), SendError> {
        let literal = window.marked();
        if literal.is_empty() {
            return Ok(());
        }

        self.output.write_all(literal).map_err(SendError::Output)?;
        self.written += literal.len() as u64;
        stats.literal_bytes += literal.len() as u64;
        stats.chunks += 1;
        trace!("Sent {} literal bytes of {:?}", literal.len(), window.path());
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}
