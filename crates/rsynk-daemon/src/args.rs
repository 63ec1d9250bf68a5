//! rsync server command line parsing
//!
//! An rsync client starts the remote side with a command line such as
//!
//! ```text
//! rsync --server --sender -vlogDtpre.iLsfxC . /srv/file.log
//! ```
//!
//! Short flags arrive clustered and `-e` carries the client's capability
//! letters rather than a remote shell. The lone `.` separates the options
//! from the requested files.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::debug;

use rsynk_core::{FileSelection, RequestOptions, RsyncOption};

use crate::command::CommandError;

#[derive(Parser, Debug)]
#[command(name = "rsync", disable_help_flag = true, disable_version_flag = true)]
struct RawServerArgs {
    #[arg(long)]
    server: bool,

    #[arg(long)]
    sender: bool,

    #[arg(long)]
    daemon: bool,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'l', long = "links")]
    links: bool,

    #[arg(short = 'o', long = "owner")]
    owner: bool,

    #[arg(short = 'g', long = "group")]
    group: bool,

    /// Same as --devices --specials
    #[arg(short = 'D')]
    devices_and_specials: bool,

    #[arg(long)]
    devices: bool,

    #[arg(long)]
    specials: bool,

    #[arg(short = 'r', long = "recursive")]
    recursive: bool,

    #[arg(short = 'd', long = "dirs")]
    dirs: bool,

    #[arg(short = 'R', long = "relative")]
    relative: bool,

    #[arg(short = 'z', long = "compress")]
    compress: bool,

    #[arg(short = 'x', long = "one-file-system")]
    one_file_system: bool,

    #[arg(short = 's', long = "protect-args")]
    protect_args: bool,

    #[arg(short = 'm', long = "prune-empty-dirs")]
    prune_empty_dirs: bool,

    #[arg(long)]
    delete: bool,

    #[arg(long = "numeric-ids")]
    numeric_ids: bool,

    #[arg(long = "checksum-seed", allow_negative_numbers = true)]
    checksum_seed: Option<i32>,

    /// Pre-release info (`.iLsfxC`) on a server, a remote shell otherwise
    #[arg(short = 'e', long = "rsh", allow_hyphen_values = true)]
    rsh: Option<String>,

    // Accepted for compatibility; they only matter to the receiver
    #[arg(short = 't', long = "times")]
    times: bool,

    #[arg(short = 'p', long = "perms")]
    perms: bool,

    #[arg(short = 'c', long = "checksum")]
    checksum: bool,

    #[arg(short = 'W', long = "whole-file")]
    whole_file: bool,

    #[arg(short = 'S', long = "sparse")]
    sparse: bool,

    /// `.` followed by the requested files
    files: Vec<String>,
}

/// A parsed rsync server invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    pub options: RequestOptions,
    pub verbosity: u8,
    pub files: Vec<PathBuf>,
}

impl ServerArgs {
    /// Parse a full argument vector, `rsync` included.
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        let raw = RawServerArgs::try_parse_from(args)
            .map_err(|e| CommandError::InvalidArguments(e.to_string()))?;
        Ok(raw.into_server_args())
    }
}

impl RawServerArgs {
    fn into_server_args(self) -> ServerArgs {
        let mut options = Vec::new();
        let mut flag = |enabled: bool, option: RsyncOption| {
            if enabled {
                options.push(option);
            }
        };

        flag(self.server, RsyncOption::Server);
        flag(self.sender, RsyncOption::Sender);
        flag(self.daemon, RsyncOption::Daemon);
        flag(self.verbose > 0, RsyncOption::VerboseMode);
        flag(self.links, RsyncOption::PreserveLinks);
        flag(self.owner, RsyncOption::PreserveUser);
        flag(self.group, RsyncOption::PreserveGroup);
        flag(
            self.devices || self.devices_and_specials,
            RsyncOption::PreserveDevices,
        );
        flag(
            self.specials || self.devices_and_specials,
            RsyncOption::PreserveSpecials,
        );
        flag(
            self.recursive,
            RsyncOption::FileSelection(FileSelection::Recurse),
        );
        flag(
            self.dirs,
            RsyncOption::FileSelection(FileSelection::TransferDirectoriesWithoutContent),
        );
        flag(self.relative, RsyncOption::RelativePaths);
        flag(self.compress, RsyncOption::Compress);
        flag(self.one_file_system, RsyncOption::OneFileSystem);
        flag(self.protect_args, RsyncOption::ProtectArgs);
        flag(self.prune_empty_dirs, RsyncOption::PruneEmptyDirectories);
        flag(self.delete, RsyncOption::Delete);
        flag(self.numeric_ids, RsyncOption::NumericIds);

        if let Some(seed) = self.checksum_seed {
            options.push(RsyncOption::ChecksumSeed(seed));
        }

        match self.rsh {
            Some(info) if info.starts_with('.') => {
                options.extend(capabilities(&info));
                options.push(RsyncOption::PreReleaseInfo(info));
            }
            Some(_) => options.push(RsyncOption::ShellCommand),
            None => {}
        }

        let ignored: Vec<&str> = [
            (self.times, "times"),
            (self.perms, "perms"),
            (self.checksum, "checksum"),
            (self.whole_file, "whole-file"),
            (self.sparse, "sparse"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        if !ignored.is_empty() {
            debug!("Ignoring receiver-side options: {}", ignored.join(", "));
        }

        let mut files = self.files.into_iter().peekable();
        if files.peek().map(String::as_str) == Some(".") {
            files.next();
        }

        ServerArgs {
            options: RequestOptions::new(options),
            verbosity: self.verbose,
            files: files.map(PathBuf::from).collect(),
        }
    }
}

/// Options announced by the capability letters after `-e.`
fn capabilities(info: &str) -> Vec<RsyncOption> {
    info.chars()
        .skip(1)
        .filter_map(|c| match c {
            'i' => Some(RsyncOption::IncrementalRecurse),
            'L' => Some(RsyncOption::SymlinkTimeSetting),
            'f' => Some(RsyncOption::FListIoErrorSafety),
            'C' => Some(RsyncOption::ChecksumSeedOrderFix),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_typical_sender_invocation() {
        let parsed = ServerArgs::parse(&args(
            "rsync --server --sender -vlogDtpre.iLsfxC . /srv/a.log /srv/b.log",
        ))
        .unwrap();

        let o = &parsed.options;
        assert!(o.server);
        assert!(o.sender);
        assert!(!o.daemon);
        assert!(o.verbose_mode);
        assert!(o.preserve_links);
        assert!(o.preserve_user);
        assert!(o.preserve_group);
        assert!(o.preserve_devices);
        assert!(o.preserve_specials);
        assert_eq!(o.directory_mode, FileSelection::Recurse);
        assert!(o.incremental_recurse);
        assert!(o.symlink_time_setting);
        assert!(o.save_flist);
        assert!(o.checksum_seed_order_fix);
        assert!(!o.shell_command);
        assert_eq!(o.pre_release_info.as_deref(), Some(".iLsfxC"));

        assert_eq!(parsed.verbosity, 1);
        assert_eq!(
            parsed.files,
            vec![PathBuf::from("/srv/a.log"), PathBuf::from("/srv/b.log")]
        );
    }

    #[test]
    fn test_long_options() {
        let parsed = ServerArgs::parse(&args(
            "rsync --server --sender --delete --numeric-ids --checksum-seed=7 -vvz . f",
        ))
        .unwrap();

        assert!(parsed.options.delete);
        assert!(parsed.options.numeric_ids);
        assert!(parsed.options.compress);
        assert_eq!(parsed.options.checksum_seed, Some(7));
        assert_eq!(parsed.verbosity, 2);
        assert_eq!(parsed.files, vec![PathBuf::from("f")]);
    }

    #[test]
    fn test_directory_modes() {
        let dirs = ServerArgs::parse(&args("rsync --server --sender -d . dir")).unwrap();
        assert_eq!(
            dirs.options.directory_mode,
            FileSelection::TransferDirectoriesWithoutContent
        );

        let plain = ServerArgs::parse(&args("rsync --server --sender -l . dir")).unwrap();
        assert_eq!(plain.options.directory_mode, FileSelection::NoDirectories);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let err = ServerArgs::parse(&args("rsync --server --sender --frobnicate . f")).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArguments(_)));
    }

    #[test]
    fn test_files_without_dot() {
        let parsed = ServerArgs::parse(&args("rsync --server --sender a b")).unwrap();
        assert_eq!(parsed.files, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }
}
