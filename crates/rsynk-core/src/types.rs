//! Core type definitions for rsynk
//!
//! These describe the files a sender transmits. They are produced once per
//! file by the metadata reader and never mutated afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// POSIX file type bits (the `S_IF*` family) used in rsync file modes
pub struct FileBitmasks;

impl FileBitmasks {
    /// Mask selecting the file type bits of a mode
    pub const FILE_TYPE: u32 = 0o170000;

    pub const SOCKET: u32 = 0o140000;
    pub const SYMLINK: u32 = 0o120000;
    pub const REGULAR_FILE: u32 = 0o100000;
    pub const BLOCK_DEVICE: u32 = 0o060000;
    pub const DIRECTORY: u32 = 0o040000;
    pub const CHARACTER_DEVICE: u32 = 0o020000;
    pub const FIFO: u32 = 0o010000;

    /// Anything the platform cannot classify
    pub const OTHER: u32 = 0o150000;
}

/// Type of filesystem entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharacterDevice,
    Fifo,
    Socket,
    Other,
}

impl FileType {
    /// The `S_IF*` bits for this type.
    pub const fn mode_bits(self) -> u32 {
        match self {
            FileType::Regular => FileBitmasks::REGULAR_FILE,
            FileType::Directory => FileBitmasks::DIRECTORY,
            FileType::Symlink => FileBitmasks::SYMLINK,
            FileType::BlockDevice => FileBitmasks::BLOCK_DEVICE,
            FileType::CharacterDevice => FileBitmasks::CHARACTER_DEVICE,
            FileType::Fifo => FileBitmasks::FIFO,
            FileType::Socket => FileBitmasks::SOCKET,
            FileType::Other => FileBitmasks::OTHER,
        }
    }

    /// Classify a mode by its type bits.
    pub const fn from_mode(mode: u32) -> Self {
        match mode & FileBitmasks::FILE_TYPE {
            FileBitmasks::REGULAR_FILE => FileType::Regular,
            FileBitmasks::DIRECTORY => FileType::Directory,
            FileBitmasks::SYMLINK => FileType::Symlink,
            FileBitmasks::BLOCK_DEVICE => FileType::BlockDevice,
            FileBitmasks::CHARACTER_DEVICE => FileType::CharacterDevice,
            FileBitmasks::FIFO => FileType::Fifo,
            FileBitmasks::SOCKET => FileType::Socket,
            _ => FileType::Other,
        }
    }
}

/// File owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub name: String,
}

impl User {
    pub fn new(uid: u32, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
        }
    }
}

/// File group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: u32,
    pub name: String,
}

impl Group {
    pub fn new(gid: u32, name: impl Into<String>) -> Self {
        Self {
            gid,
            name: name.into(),
        }
    }
}

/// The byte range of a file that may be sent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBoundaries {
    /// First byte of the slice
    pub offset: u64,
    /// Number of bytes in the slice
    pub length: u64,
}

impl FileBoundaries {
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// The whole of a file `length` bytes long.
    pub const fn whole(length: u64) -> Self {
        Self { offset: 0, length }
    }

    /// Restrict the slice to a file that is currently `file_len` bytes long.
    pub fn clamp_to(self, file_len: u64) -> Self {
        let offset = self.offset.min(file_len);
        let length = self.length.min(file_len - offset);
        Self { offset, length }
    }
}

/// A resolved file slice ready to be transmitted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// File type and permission bits
    pub mode: u32,
    /// Start of the slice within the file
    pub byte_offset: u64,
    /// Number of bytes to transmit from `byte_offset`
    pub byte_length: u64,
    /// Last modification time, seconds since the epoch
    pub modified_at_seconds: i64,
    pub owner: User,
    pub group: Group,
}

impl FileDescriptor {
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    /// Permission bits without the file type.
    pub fn permissions(&self) -> u32 {
        self.mode & !FileBitmasks::FILE_TYPE
    }

    pub fn boundaries(&self) -> FileBoundaries {
        FileBoundaries::new(self.byte_offset, self.byte_length)
    }

    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }
}
