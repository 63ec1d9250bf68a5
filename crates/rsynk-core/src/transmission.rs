//! Sliding transmission window over a file being sent
//!
//! The delta matcher never sees a whole file. It looks at a window of at most
//! `window_capacity` bytes that slides forward through a fixed buffer while
//! bytes are pulled lazily from disk. When the tail of the buffer runs out the
//! live bytes are moved back to its start, so the buffer is allocated once and
//! never grows.
//!
//! # Offsets
//!
//! All offsets index into the buffer, not the file:
//!
//! ```text
//!  0      mark     start           end       read      capacity
//!  |-------|========|###############|.........|---------|
//!           pending    window         prefetched   free
//!           literal
//! ```
//!
//! `end` and `read` are exclusive. The mark is optional and pins the first
//! byte of literal data the caller has not emitted yet; compaction never
//! discards anything at or after `min(start, mark)`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, error, trace, warn};

use crate::error::InvalidFileError;
use crate::types::FileDescriptor;

/// A window of file bytes held in a fixed-capacity buffer.
///
/// Obtained through [`crate::session::with_transmission`], which closes the
/// underlying stream however the caller's operation ends.
pub struct TransmissionWindow<R = File> {
    path: PathBuf,
    stream: Option<R>,
    buffer: Box<[u8]>,
    window_capacity: usize,
    /// Bytes the descriptor promised
    expected: u64,
    /// Bytes not yet pulled from the stream
    remaining: u64,
    start: usize,
    end: usize,
    read: usize,
    mark: Option<usize>,
}

impl TransmissionWindow<File> {
    /// Open `descriptor.path`, position it at the slice offset, and prime the
    /// first window.
    pub(crate) fn open(
        descriptor: &FileDescriptor,
        window_capacity: usize,
        buffer_capacity: usize,
    ) -> Result<Self, InvalidFileError> {
        if descriptor.byte_length == 0 {
            return Self::new(descriptor, None, window_capacity, buffer_capacity);
        }

        let mut file = File::open(&descriptor.path).map_err(|source| {
            error!(
                "Failed to open the file {:?}: {}",
                descriptor.path, source
            );
            InvalidFileError::Open {
                path: descriptor.path.clone(),
                source,
            }
        })?;
        seek_to(&mut file, &descriptor.path, descriptor.byte_offset)?;

        Self::new(descriptor, Some(file), window_capacity, buffer_capacity)
    }
}

impl<R: Read> TransmissionWindow<R> {
    /// Build a window over an already opened stream positioned at the start
    /// of the file. The slice offset is skipped by reading.
    pub(crate) fn from_reader(
        descriptor: &FileDescriptor,
        mut stream: R,
        window_capacity: usize,
        buffer_capacity: usize,
    ) -> Result<Self, InvalidFileError> {
        if descriptor.byte_length == 0 {
            return Self::new(descriptor, None, window_capacity, buffer_capacity);
        }

        skip(&mut stream, &descriptor.path, descriptor.byte_offset)?;
        Self::new(descriptor, Some(stream), window_capacity, buffer_capacity)
    }

    fn new(
        descriptor: &FileDescriptor,
        stream: Option<R>,
        window_capacity: usize,
        buffer_capacity: usize,
    ) -> Result<Self, InvalidFileError> {
        let Some(stream) = stream.filter(|_| descriptor.byte_length > 0) else {
            debug!("{:?} is empty, nothing to transmit", descriptor.path);
            return Ok(Self {
                path: descriptor.path.clone(),
                stream: None,
                buffer: Box::default(),
                window_capacity: 0,
                expected: 0,
                remaining: 0,
                start: 0,
                end: 0,
                read: 0,
                mark: None,
            });
        };

        let clamped = window_capacity.min(buffer_capacity);
        if clamped != window_capacity {
            warn!(
                "Window of {} bytes does not fit a {} byte buffer, using {}",
                window_capacity, buffer_capacity, clamped
            );
        }
        if clamped == 0 {
            return Err(InvalidFileError::EmptyWindow {
                path: descriptor.path.clone(),
                length: descriptor.byte_length,
            });
        }

        debug!(
            "Opened {:?} for transmission: offset={} length={} window={} buffer={}",
            descriptor.path, descriptor.byte_offset, descriptor.byte_length, clamped, buffer_capacity
        );

        let mut window = Self {
            path: descriptor.path.clone(),
            stream: Some(stream),
            buffer: vec![0u8; buffer_capacity].into_boxed_slice(),
            window_capacity: clamped,
            expected: descriptor.byte_length,
            remaining: descriptor.byte_length,
            start: 0,
            end: 0,
            read: 0,
            mark: None,
        };
        window.advance(0)?;
        Ok(window)
    }

    /// Move the window forward by `shift` bytes and refill it from the stream.
    ///
    /// The window keeps `window_capacity` bytes until the file runs out, then
    /// shrinks towards zero. `shift` may reach past the prefetched bytes, up
    /// to the end of the slice.
    ///
    /// Two requests are rejected before anything moves: a shift past the end
    /// of the slice, and a refill that does not fit in the buffer next to the
    /// marked bytes ([`InvalidFileError::BufferOverflow`]). Callers release
    /// the mark once [`is_full`](Self::is_full) reports a full buffer.
    pub fn advance(&mut self, shift: usize) -> Result<(), InvalidFileError> {
        let available = (self.read - self.start) as u64 + self.remaining;
        if shift as u64 > available {
            let err = InvalidFileError::AdvancePastEnd {
                path: self.path.clone(),
                shift: shift as u64,
                available,
            };
            error!("{}", err);
            return Err(err);
        }

        let start = self.start + shift;
        let target = (available - shift as u64).min(self.window_capacity as u64) as usize;
        let first = self.mark.map_or(start, |mark| mark.min(start));
        let required = start + target - first;
        if required > self.buffer.len() {
            let err = InvalidFileError::BufferOverflow {
                path: self.path.clone(),
                required,
                capacity: self.buffer.len(),
            };
            error!("{}", err);
            return Err(err);
        }

        self.start = start;
        if first > self.read {
            self.discard(first - self.read)?;
        }
        if self.start + target > self.buffer.len() {
            self.compact();
        }
        if self.start + target > self.read {
            self.fill(self.start + target - self.read)?;
        }

        self.end = self.start + target;
        self.debug_check();
        Ok(())
    }

    /// Skip `gap` stream bytes nothing refers to and restart the buffer at
    /// the first live byte.
    fn discard(&mut self, gap: usize) -> Result<(), InvalidFileError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(InvalidFileError::Closed {
                path: self.path.clone(),
            });
        };

        let skipped = io::copy(&mut stream.by_ref().take(gap as u64), &mut io::sink())
            .map_err(|source| {
                error!("Failed to read {:?}: {}", self.path, source);
                InvalidFileError::Read {
                    path: self.path.clone(),
                    source,
                }
            })?;
        self.remaining -= skipped;
        if skipped < gap as u64 {
            let err = InvalidFileError::PrematureEnd {
                path: self.path.clone(),
                read: self.expected - self.remaining,
                expected: self.expected,
            };
            error!("{}", err);
            return Err(err);
        }

        let first = self.read + gap;
        self.start -= first;
        self.mark = self.mark.map(|mark| mark - first);
        self.read = 0;
        self.end = 0;
        trace!("Skipped {} bytes of {:?}", gap, self.path);
        Ok(())
    }

    /// Read until exactly `needed` more bytes sit after `read`.
    fn fill(&mut self, needed: usize) -> Result<(), InvalidFileError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(InvalidFileError::Closed {
                path: self.path.clone(),
            });
        };

        let mut filled = 0;
        while filled < needed {
            let limit = self.read + (needed - filled);
            match stream.read(&mut self.buffer[self.read..limit]) {
                Ok(0) => {
                    let err = InvalidFileError::PrematureEnd {
                        path: self.path.clone(),
                        read: self.expected - self.remaining,
                        expected: self.expected,
                    };
                    error!("{}", err);
                    return Err(err);
                }
                Ok(n) => {
                    filled += n;
                    self.read += n;
                    self.remaining -= n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    error!("Failed to read {:?}: {}", self.path, source);
                    return Err(InvalidFileError::Read {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<R> TransmissionWindow<R> {
    /// Move everything from the first live byte onwards to the buffer start.
    fn compact(&mut self) {
        let first = self.first_offset();
        if first == 0 {
            return;
        }

        self.buffer.copy_within(first..self.read, 0);
        self.start -= first;
        self.end -= first;
        self.read -= first;
        if let Some(mark) = self.mark.as_mut() {
            *mark -= first;
        }
        trace!("Compacted {:?} by {} bytes", self.path, first);
    }

    /// Pin the byte `relative_offset` bytes after the window start as the
    /// first byte of pending literal data.
    pub fn set_mark(&mut self, relative_offset: usize) {
        debug_assert!(
            relative_offset <= self.window_len(),
            "mark {} beyond a {} byte window",
            relative_offset,
            self.window_len()
        );
        self.mark = Some(self.start + relative_offset);
    }

    pub fn window_len(&self) -> usize {
        self.end - self.start
    }

    pub fn start_offset(&self) -> usize {
        self.start
    }

    /// One past the last byte of the window.
    pub fn end_offset(&self) -> usize {
        self.end
    }

    /// One past the last byte loaded from the stream.
    pub fn read_offset(&self) -> usize {
        self.read
    }

    pub fn mark_offset(&self) -> Option<usize> {
        self.mark
    }

    /// The earliest live byte: the mark when it lies before the window start.
    pub fn first_offset(&self) -> usize {
        match self.mark {
            Some(mark) => mark.min(self.start),
            None => self.start,
        }
    }

    /// Bytes from the first live byte to the end of the window.
    pub fn total_bytes(&self) -> usize {
        self.end - self.first_offset()
    }

    /// Whether the live bytes occupy the whole buffer.
    ///
    /// A zero-length file has an empty buffer and is therefore always full.
    pub fn is_full(&self) -> bool {
        self.total_bytes() == self.buffer.len()
    }

    /// The bytes currently in the window.
    pub fn window(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    /// Pending literal bytes between the mark and the window start.
    pub fn marked(&self) -> &[u8] {
        &self.buffer[self.first_offset()..self.start]
    }

    /// The raw buffer; offsets returned by this window index into it.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of the slice not yet read from the stream.
    pub fn remaining_bytes(&self) -> u64 {
        self.remaining
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the underlying stream. Later calls do nothing.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(
                "Closed {:?} ({} of {} bytes read)",
                self.path,
                self.expected - self.remaining,
                self.expected
            );
        }
    }

    fn debug_check(&self) {
        debug_assert!(self.first_offset() <= self.start);
        debug_assert!(self.start <= self.end);
        debug_assert!(self.end <= self.read);
        debug_assert!(self.read <= self.buffer.len());
        debug_assert!(self.total_bytes() <= self.buffer.len());
    }
}

impl<R> Drop for TransmissionWindow<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R> std::fmt::Debug for TransmissionWindow<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionWindow")
            .field("path", &self.path)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("read", &self.read)
            .field("mark", &self.mark)
            .field("remaining", &self.remaining)
            .field("capacity", &self.buffer.len())
            .finish()
    }
}

fn seek_to(file: &mut File, path: &Path, offset: u64) -> Result<(), InvalidFileError> {
    if offset == 0 {
        return Ok(());
    }

    let len = file
        .metadata()
        .map_err(|e| InvalidFileError::Skip {
            path: path.to_path_buf(),
            offset,
            reason: e.to_string(),
        })?
        .len();
    if offset > len {
        return Err(InvalidFileError::Skip {
            path: path.to_path_buf(),
            offset,
            reason: format!("file is only {} bytes long", len),
        });
    }

    file.seek(SeekFrom::Start(offset))
        .map_err(|e| InvalidFileError::Skip {
            path: path.to_path_buf(),
            offset,
            reason: e.to_string(),
        })?;
    Ok(())
}

fn skip<R: Read>(stream: &mut R, path: &Path, offset: u64) -> Result<(), InvalidFileError> {
    let skipped = io::copy(&mut stream.by_ref().take(offset), &mut io::sink()).map_err(|e| {
        InvalidFileError::Skip {
            path: path.to_path_buf(),
            offset,
            reason: e.to_string(),
        }
    })?;
    if skipped < offset {
        return Err(InvalidFileError::Skip {
            path: path.to_path_buf(),
            offset,
            reason: format!("stream ended after {} bytes", skipped),
        });
    }
    Ok(())
}
