//! rsync request options
//!
//! A client request is a flat set of toggles. The server argument parser
//! produces [`RsyncOption`] values and [`RequestOptions`] folds them into the
//! booleans the rest of the sender looks at.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Which directories a request transfers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileSelection {
    /// Transfer the client's file list exactly but exclude directories
    #[default]
    NoDirectories,
    /// Transfer the client's file list and recurse into directories
    Recurse,
    /// Transfer directories named in the file list without their content
    TransferDirectoriesWithoutContent,
}

/// A single option of an rsync request
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RsyncOption {
    Server,
    Sender,
    Daemon,

    Compress,
    ChecksumSeed(i32),
    ChecksumSeedOrderFix,
    Delete,

    FListIoErrorSafety,
    IncrementalRecurse,
    RelativePaths,
    ShellCommand,
    SymlinkTimeSetting,
    NumericIds,
    OneFileSystem,
    PreReleaseInfo(String),
    PreserveDevices,
    PreserveGroup,
    PreserveLinks,
    PreserveSpecials,
    PreserveUser,
    ProtectArgs,
    PruneEmptyDirectories,

    FileSelection(FileSelection),

    VerboseMode,
}

/// The options of one request, resolved to plain values
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub server: bool,
    pub sender: bool,
    pub daemon: bool,

    pub compress: bool,
    pub checksum_seed: Option<i32>,
    pub checksum_seed_order_fix: bool,
    pub delete: bool,
    pub directory_mode: FileSelection,

    pub incremental_recurse: bool,
    pub numeric_ids: bool,
    pub one_file_system: bool,
    pub pre_release_info: Option<String>,
    pub preserve_devices: bool,
    pub preserve_group: bool,
    pub preserve_links: bool,
    pub preserve_specials: bool,
    pub preserve_user: bool,
    pub protect_args: bool,
    pub prune_empty_directories: bool,
    pub relative_names: bool,
    /// Keep going when a file cannot be read instead of aborting the run
    pub save_flist: bool,
    pub shell_command: bool,
    pub symlink_time_setting: bool,
    pub verbose_mode: bool,
}

impl RequestOptions {
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator<Item = RsyncOption>,
    {
        let options: Vec<RsyncOption> = options.into_iter().collect();
        let set: HashSet<&RsyncOption> = options.iter().collect();
        let has = |option: RsyncOption| set.contains(&option);

        // Exactly one selection wins; none or a conflicting pair fall back
        // to the default.
        let selections: HashSet<FileSelection> = options
            .iter()
            .filter_map(|option| match option {
                RsyncOption::FileSelection(selection) => Some(*selection),
                _ => None,
            })
            .collect();
        let directory_mode = match selections.len() {
            1 => selections.into_iter().next().unwrap_or_default(),
            _ => FileSelection::default(),
        };

        let checksum_seed = options.iter().find_map(|option| match option {
            RsyncOption::ChecksumSeed(seed) => Some(*seed),
            _ => None,
        });
        let pre_release_info = options.iter().find_map(|option| match option {
            RsyncOption::PreReleaseInfo(info) => Some(info.clone()),
            _ => None,
        });

        Self {
            server: has(RsyncOption::Server),
            sender: has(RsyncOption::Sender),
            daemon: has(RsyncOption::Daemon),
            compress: has(RsyncOption::Compress),
            checksum_seed,
            checksum_seed_order_fix: has(RsyncOption::ChecksumSeedOrderFix),
            delete: has(RsyncOption::Delete),
            directory_mode,
            incremental_recurse: has(RsyncOption::IncrementalRecurse),
            numeric_ids: has(RsyncOption::NumericIds),
            one_file_system: has(RsyncOption::OneFileSystem),
            pre_release_info,
            preserve_devices: has(RsyncOption::PreserveDevices),
            preserve_group: has(RsyncOption::PreserveGroup),
            preserve_links: has(RsyncOption::PreserveLinks),
            preserve_specials: has(RsyncOption::PreserveSpecials),
            preserve_user: has(RsyncOption::PreserveUser),
            protect_args: has(RsyncOption::ProtectArgs),
            prune_empty_directories: has(RsyncOption::PruneEmptyDirectories),
            relative_names: has(RsyncOption::RelativePaths),
            save_flist: has(RsyncOption::FListIoErrorSafety),
            shell_command: has(RsyncOption::ShellCommand),
            symlink_time_setting: has(RsyncOption::SymlinkTimeSetting),
            verbose_mode: has(RsyncOption::VerboseMode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        let options = RequestOptions::new(std::iter::empty());
        assert_eq!(options, RequestOptions::default());
        assert_eq!(options.directory_mode, FileSelection::NoDirectories);
    }

    #[test]
    fn test_flags() {
        let options = RequestOptions::new([
            RsyncOption::Server,
            RsyncOption::Sender,
            RsyncOption::PreserveLinks,
            RsyncOption::NumericIds,
            RsyncOption::FListIoErrorSafety,
        ]);
        assert!(options.server);
        assert!(options.sender);
        assert!(!options.daemon);
        assert!(options.preserve_links);
        assert!(options.numeric_ids);
        assert!(options.save_flist);
        assert!(!options.compress);
    }

    #[test]
    fn test_single_directory_mode() {
        let options = RequestOptions::new([RsyncOption::FileSelection(FileSelection::Recurse)]);
        assert_eq!(options.directory_mode, FileSelection::Recurse);
    }

    #[test]
    fn test_conflicting_directory_modes_fall_back() {
        let options = RequestOptions::new([
            RsyncOption::FileSelection(FileSelection::Recurse),
            RsyncOption::FileSelection(FileSelection::TransferDirectoriesWithoutContent),
        ]);
        assert_eq!(options.directory_mode, FileSelection::NoDirectories);
    }

    #[test]
    fn test_repeated_directory_mode_counts_once() {
        let options = RequestOptions::new([
            RsyncOption::FileSelection(FileSelection::Recurse),
            RsyncOption::FileSelection(FileSelection::Recurse),
        ]);
        assert_eq!(options.directory_mode, FileSelection::Recurse);
    }

    #[test]
    fn test_valued_options() {
        let options = RequestOptions::new([
            RsyncOption::PreReleaseInfo(".iLsfxC".into()),
            RsyncOption::ChecksumSeed(42),
        ]);
        assert_eq!(options.pre_release_info.as_deref(), Some(".iLsfxC"));
        assert_eq!(options.checksum_seed, Some(42));
    }
}
