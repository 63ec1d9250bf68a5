//! File metadata resolution
//!
//! Turns a tracked file into the [`FileDescriptor`] the transmission window
//! is opened with. Attributes are read without following symlinks. A failed
//! owner or group lookup is not fatal: it is logged and the configured
//! default identity is reported instead.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::error;

use rsynk_core::{FileBoundaries, FileDescriptor, FileType, FilesConfig, Group, User};

use crate::tracked::TrackedFile;

/// Ownership lookups and defaults of the filesystem being served
pub trait FileSystemInfo: Send + Sync {
    fn owner(&self, path: &Path) -> io::Result<User>;
    fn group(&self, path: &Path) -> io::Result<Group>;

    fn default_user(&self) -> User;
    fn default_group(&self) -> Group;
    fn default_dir_permission(&self) -> u32;
    fn default_file_permission(&self) -> u32;
}

/// Resolves owners through the system user and group databases
#[derive(Debug, Clone, Default)]
pub struct UnixFileSystemInfo {
    files: FilesConfig,
}

impl UnixFileSystemInfo {
    pub fn new(files: FilesConfig) -> Self {
        Self { files }
    }
}

impl FileSystemInfo for UnixFileSystemInfo {
    fn owner(&self, path: &Path) -> io::Result<User> {
        let (uid, _) = ownership(path)?;
        Ok(User::new(uid, user_name(uid)?))
    }

    fn group(&self, path: &Path) -> io::Result<Group> {
        let (_, gid) = ownership(path)?;
        Ok(Group::new(gid, group_name(gid)?))
    }

    fn default_user(&self) -> User {
        self.files.default_user()
    }

    fn default_group(&self) -> Group {
        self.files.default_group()
    }

    fn default_dir_permission(&self) -> u32 {
        self.files.default_dir_permission
    }

    fn default_file_permission(&self) -> u32 {
        self.files.default_file_permission
    }
}

/// Builds file descriptors for tracked files
#[derive(Clone)]
pub struct FileInfoReader {
    fs: Arc<dyn FileSystemInfo>,
}

impl FileInfoReader {
    pub fn new(fs: Arc<dyn FileSystemInfo>) -> Self {
        Self { fs }
    }

    pub fn file_info(&self, file: &TrackedFile) -> io::Result<FileDescriptor> {
        let path = &file.path;
        let meta = fs::symlink_metadata(path)?;
        let file_type = file_type(&meta);

        let owner = self.fs.owner(path).unwrap_or_else(|e| {
            error!("Cannot read file owner uid and name for {:?}: {}", path, e);
            self.fs.default_user()
        });
        let group = self.fs.group(path).unwrap_or_else(|e| {
            error!("Cannot read file gid and group name for {:?}: {}", path, e);
            self.fs.default_group()
        });

        let permission = match file_type {
            FileType::Directory => self.fs.default_dir_permission(),
            _ => self.fs.default_file_permission(),
        };

        let boundaries = file
            .boundaries
            .unwrap_or_else(|| FileBoundaries::whole(meta.len()))
            .clamp_to(meta.len());

        let modified_at_seconds = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(FileDescriptor {
            path: path.clone(),
            mode: file_type.mode_bits() | permission,
            byte_offset: boundaries.offset,
            byte_length: boundaries.length,
            modified_at_seconds,
            owner,
            group,
        })
    }
}

impl std::fmt::Debug for FileInfoReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileInfoReader").finish_non_exhaustive()
    }
}

fn file_type(meta: &fs::Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_dir() {
        return FileType::Directory;
    }
    if ft.is_file() {
        return FileType::Regular;
    }
    if ft.is_symlink() {
        return FileType::Symlink;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        if ft.is_block_device() {
            return FileType::BlockDevice;
        }
        if ft.is_char_device() {
            return FileType::CharacterDevice;
        }
        if ft.is_fifo() {
            return FileType::Fifo;
        }
        if ft.is_socket() {
            return FileType::Socket;
        }
    }

    FileType::Other
}

#[cfg(unix)]
fn ownership(path: &Path) -> io::Result<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;

    let meta = fs::symlink_metadata(path)?;
    Ok((meta.uid(), meta.gid()))
}

#[cfg(not(unix))]
fn ownership(_path: &Path) -> io::Result<(u32, u32)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "file ownership is not available on this platform",
    ))
}

/// Largest buffer handed to the reentrant passwd/group lookups
#[cfg(unix)]
const MAX_LOOKUP_BUFFER: usize = 1024 * 1024;

#[cfg(unix)]
fn user_name(uid: u32) -> io::Result<String> {
    use std::ffi::CStr;

    let mut buf = vec![0 as libc::c_char; 1024];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };

        if rc == libc::ERANGE && buf.len() < MAX_LOOKUP_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no user with uid {}", uid),
            ));
        }

        // pw_name points into `buf`, which outlives this borrow
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}

#[cfg(unix)]
fn group_name(gid: u32) -> io::Result<String> {
    use std::ffi::CStr;

    let mut buf = vec![0 as libc::c_char; 1024];
    loop {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();

        let rc = unsafe {
            libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
        };

        if rc == libc::ERANGE && buf.len() < MAX_LOOKUP_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no group with gid {}", gid),
            ));
        }

        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}

#[cfg(not(unix))]
fn user_name(_uid: u32) -> io::Result<String> {
    Err(io::ErrorKind::Unsupported.into())
}

#[cfg(not(unix))]
fn group_name(_gid: u32) -> io::Result<String> {
    Err(io::ErrorKind::Unsupported.into())
}
