//! Remote command resolution and execution
//!
//! A client connecting over a remote shell asks for a command line. The
//! resolvers pick the one [`Command`] whose predicate accepts it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rsynk_core::{
    with_transmission, Config, ConfigError, ExitCode, FileType, InvalidFileError,
    TransmissionConfig,
};

use crate::args::ServerArgs;
use crate::file_info::{FileInfoReader, UnixFileSystemInfo};
use crate::sender::{LiteralSender, SendError, TransmissionStats};
use crate::tracked::{AllFilesTracked, TrackedFilesProvider};

/// Command errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("no command matches: {0}")]
    NotFound(String),

    #[error("{count} commands match: {args}")]
    Ambiguous { count: usize, args: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    File(#[from] InvalidFileError),

    #[error("cannot send {}: {reason}", path.display())]
    FileSelect { path: PathBuf, reason: String },

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CommandError {
    /// Whether the error concerns a single requested file only.
    fn is_per_file(&self) -> bool {
        matches!(self, CommandError::File(_) | CommandError::FileSelect { .. })
    }
}

impl From<SendError> for CommandError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::File(e) => CommandError::File(e),
            SendError::Output(e) => CommandError::Output(e),
            e @ SendError::WindowTooLarge { .. } => {
                CommandError::Config(ConfigError::Invalid(e.to_string()))
            }
        }
    }
}

impl From<&CommandError> for ExitCode {
    fn from(e: &CommandError) -> Self {
        match e {
            CommandError::NotFound(_) => ExitCode::Unsupported,
            CommandError::Ambiguous { .. } => ExitCode::Protocol,
            CommandError::InvalidArguments(_) => ExitCode::Syntax,
            CommandError::File(e) => ExitCode::from(e),
            CommandError::FileSelect { .. } => ExitCode::FileSelect,
            CommandError::Output(_) => ExitCode::StreamIo,
            CommandError::Config(_) => ExitCode::Syntax,
        }
    }
}

/// A command a client can ask the server to run
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the command, writing its data channel to `output`.
    fn execute(&self, args: &[String], output: &mut dyn Write) -> Result<ExitCode, CommandError>;
}

/// Picks the command for a command line
pub trait CommandsResolver: Send + Sync {
    fn resolve(&self, args: &[String]) -> Result<&dyn Command, CommandError>;
}

/// A command and the predicate deciding which command lines it accepts
pub struct CommandEntry {
    pub command: Box<dyn Command>,
    pub matches: fn(&[String]) -> bool,
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("command", &self.command.name())
            .finish_non_exhaustive()
    }
}

/// Resolves rsync command lines
#[derive(Debug)]
pub struct RsyncCommandsResolver {
    entries: Vec<CommandEntry>,
}

impl RsyncCommandsResolver {
    pub fn new(config: &Config) -> Self {
        Self::with_tracked_files(config, Arc::new(AllFilesTracked))
    }

    pub fn with_tracked_files(config: &Config, tracked: Arc<dyn TrackedFilesProvider>) -> Self {
        Self::from_entries(vec![CommandEntry {
            command: Box::new(RsyncServerSendCommand::new(config, tracked)),
            matches: is_server_send,
        }])
    }

    pub fn from_entries(entries: Vec<CommandEntry>) -> Self {
        Self { entries }
    }
}

impl CommandsResolver for RsyncCommandsResolver {
    fn resolve(&self, args: &[String]) -> Result<&dyn Command, CommandError> {
        let mut matching = self.entries.iter().filter(|entry| (entry.matches)(args));

        match (matching.next(), matching.count()) {
            (None, _) => Err(CommandError::NotFound(args.join(" "))),
            (Some(entry), 0) => {
                debug!("Resolved {:?} to {}", args, entry.command.name());
                Ok(entry.command.as_ref())
            }
            (Some(_), others) => Err(CommandError::Ambiguous {
                count: others + 1,
                args: args.join(" "),
            }),
        }
    }
}

/// Resolves every command the server knows
#[derive(Debug)]
pub struct AllCommandsResolver {
    rsync: RsyncCommandsResolver,
}

impl AllCommandsResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            rsync: RsyncCommandsResolver::new(config),
        }
    }

    pub fn with_tracked_files(config: &Config, tracked: Arc<dyn TrackedFilesProvider>) -> Self {
        Self {
            rsync: RsyncCommandsResolver::with_tracked_files(config, tracked),
        }
    }
}

impl CommandsResolver for AllCommandsResolver {
    fn resolve(&self, args: &[String]) -> Result<&dyn Command, CommandError> {
        match args.first().map(String::as_str) {
            Some("rsync") => self.rsync.resolve(args),
            _ => Err(CommandError::NotFound(args.join(" "))),
        }
    }
}

/// `rsync --server --sender ...` without daemon mode
fn is_server_send(args: &[String]) -> bool {
    args.len() >= 4
        && !args.iter().any(|arg| arg == "--daemon" || arg == "daemon")
        && args[1] == "--server"
        && args[2] == "--sender"
}

/// Sends the requested files to a client
pub struct RsyncServerSendCommand {
    files: FileInfoReader,
    tracked: Arc<dyn TrackedFilesProvider>,
    transmission: TransmissionConfig,
}

impl RsyncServerSendCommand {
    pub fn new(config: &Config, tracked: Arc<dyn TrackedFilesProvider>) -> Self {
        Self::with_file_info(
            FileInfoReader::new(Arc::new(UnixFileSystemInfo::new(config.files.clone()))),
            tracked,
            config.transmission.clone(),
        )
    }

    pub fn with_file_info(
        files: FileInfoReader,
        tracked: Arc<dyn TrackedFilesProvider>,
        transmission: TransmissionConfig,
    ) -> Self {
        Self {
            files,
            tracked,
            transmission,
        }
    }

    fn send_file<W: Write>(
        &self,
        path: &Path,
        sender: &mut LiteralSender<W>,
    ) -> Result<TransmissionStats, CommandError> {
        let tracked = self
            .tracked
            .tracked(path)
            .ok_or_else(|| CommandError::FileSelect {
                path: path.to_path_buf(),
                reason: "file is not tracked".into(),
            })?;

        let descriptor =
            self.files
                .file_info(&tracked)
                .map_err(|e| CommandError::FileSelect {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

        if descriptor.file_type() != FileType::Regular {
            info!(
                "Skipping {:?}: {:?} is not a regular file",
                path,
                descriptor.file_type()
            );
            return Ok(TransmissionStats::default());
        }

        let stats = with_transmission(
            &descriptor,
            self.transmission.window_size,
            self.transmission.buffer_size,
            |window| sender.send(window),
        )?;
        Ok(stats)
    }
}

impl std::fmt::Debug for RsyncServerSendCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsyncServerSendCommand")
            .field("transmission", &self.transmission)
            .finish_non_exhaustive()
    }
}

impl Command for RsyncServerSendCommand {
    fn name(&self) -> &'static str {
        "rsync server send"
    }

    fn execute(&self, args: &[String], output: &mut dyn Write) -> Result<ExitCode, CommandError> {
        let args = ServerArgs::parse(args)?;
        if args.files.is_empty() {
            return Err(CommandError::InvalidArguments("no files requested".into()));
        }

        info!(
            "Sending {} file(s) (verbosity {})",
            args.files.len(),
            args.verbosity
        );

        let mut sender = LiteralSender::new(output);
        let mut total = TransmissionStats::default();
        let mut failed = 0usize;

        for path in &args.files {
            let written_before = sender.bytes_written();
            match self.send_file(path, &mut sender) {
                Ok(stats) => {
                    info!(
                        "Sent {:?}: {} literal bytes in {} chunks",
                        path, stats.literal_bytes, stats.chunks
                    );
                    total.literal_bytes += stats.literal_bytes;
                    total.chunks += stats.chunks;
                }
                // Literal data already sent cannot be taken back, so a file
                // is only skipped when none of it reached the client.
                Err(e)
                    if e.is_per_file()
                        && args.options.save_flist
                        && sender.bytes_written() == written_before =>
                {
                    warn!("{}", e);
                    failed += 1;
                }
                Err(e) => {
                    if sender.bytes_written() > written_before {
                        error!(
                            "{:?} failed after {} bytes were sent, aborting",
                            path,
                            sender.bytes_written() - written_before
                        );
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "Finished: {} literal bytes in {} chunks, {} file(s) failed",
            total.literal_bytes, total.chunks, failed
        );

        Ok(if failed > 0 {
            ExitCode::Partial
        } else {
            ExitCode::Ok
        })
    }
}
