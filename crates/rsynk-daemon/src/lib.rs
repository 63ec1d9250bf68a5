//! rsynk Daemon - Command resolution and file sending
//!
//! This crate sits between an rsync client's remote command line and the
//! transmission window in `rsynk-core`:
//!
//! ```text
//! rsync --server --sender -vlogDtpre.iLsfxC . file...
//!        │
//!        ▼
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ CommandsResolver │──▶│ RsyncServerSend  │──▶│  FileInfoReader  │
//! │  (match argv)    │   │  (ServerArgs)    │   │ (FileDescriptor) │
//! └──────────────────┘   └────────┬─────────┘   └──────────────────┘
//!                                 │ with_transmission
//!                                 ▼
//!                        ┌──────────────────┐
//!                        │  LiteralSender   │──▶ output
//!                        │ (window + mark)  │
//!                        └──────────────────┘
//! ```
//!
//! Every file is read through its own window on the calling thread; separate
//! commands share nothing and can run on separate threads.

pub mod args;
pub mod command;
pub mod file_info;
pub mod sender;
pub mod tracked;

pub use args::ServerArgs;
pub use command::{
    AllCommandsResolver, Command, CommandEntry, CommandError, CommandsResolver,
    RsyncCommandsResolver, RsyncServerSendCommand,
};
pub use file_info::{FileInfoReader, FileSystemInfo, UnixFileSystemInfo};
pub use sender::{LiteralSender, SendError, TransmissionStats};
pub use tracked::{AllFilesTracked, BoundedFiles, TrackedFile, TrackedFilesProvider};
