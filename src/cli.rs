use clap::Parser;
use drive_trash_cleaner::DeleteMode;
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "drive-trash-cleaner")]
#[command(
    about = "Delete files that have been in the Google Drive trash for too long",
    long_about = None
)]
pub struct Cli {
    /// Automatically delete older trashed files without prompting for confirmation
    #[arg(short, long, conflicts_with = "view")]
    pub auto: bool,

    /// Only view which files are to be deleted without deleting them
    #[arg(short, long)]
    pub view: bool,

    /// Number of days files can remain in the trash before being deleted [default: 30]
    #[arg(short, long, value_name = "#")]
    pub days: Option<u64>,

    /// Quiet mode. Only show file count
    #[arg(short, long)]
    pub quiet: bool,

    /// Timeout in seconds for backend errors [default: 300]
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only delete files in the 'My Drive' hierarchy, excluding those in 'Computers' etc.
    #[arg(short, long)]
    pub mydriveonly: bool,

    /// Don't show scanning progress. Useful when directing output to files
    #[arg(long)]
    pub noprogress: bool,

    /// Show full path to files. May be slow for a large number of files.
    /// The path shown is the current one, which differs from where the file
    /// was trashed if the parent folder has moved since
    #[arg(long)]
    pub fullpath: bool,

    /// Path to log file. Default is no logs
    #[arg(long, value_name = "PATH")]
    pub logfile: Option<PathBuf>,

    /// Path to page token file. Default is "page_token" beside the executable
    #[arg(long, value_name = "PATH")]
    pub ptokenfile: Option<PathBuf>,

    /// Path to OAuth2 credentials file. Default is ~/.credentials/google-drive-trash-cleaner.json
    #[arg(long, value_name = "PATH")]
    pub credfile: Option<PathBuf>,

    /// Path to settings file. Default is TrashCleaner.toml in the working directory
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn delete_mode(&self) -> DeleteMode {
        if self.view {
            DeleteMode::ViewOnly
        } else if self.auto {
            DeleteMode::Auto
        } else {
            DeleteMode::Confirm
        }
    }

    /// Paths are only worth resolving when something will display them.
    pub fn full_path(&self) -> bool {
        self.fullpath && (!self.quiet || self.logfile.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection() {
        let cli = Cli::parse_from(["drive-trash-cleaner", "-v"]);
        assert_eq!(cli.delete_mode(), DeleteMode::ViewOnly);
        let cli = Cli::parse_from(["drive-trash-cleaner", "--auto", "-d", "7"]);
        assert_eq!(cli.delete_mode(), DeleteMode::Auto);
        assert_eq!(cli.days, Some(7));
        let cli = Cli::parse_from(["drive-trash-cleaner"]);
        assert_eq!(cli.delete_mode(), DeleteMode::Confirm);
    }

    #[test]
    fn test_auto_and_view_conflict() {
        assert!(Cli::try_parse_from(["drive-trash-cleaner", "-a", "-v"]).is_err());
    }

    #[test]
    fn test_negative_days_rejected() {
        assert!(Cli::try_parse_from(["drive-trash-cleaner", "--days", "-3"]).is_err());
    }

    #[test]
    fn test_quiet_without_logfile_skips_paths() {
        let cli = Cli::parse_from(["drive-trash-cleaner", "-q", "--fullpath"]);
        assert!(!cli.full_path());
        let cli = Cli::parse_from([
            "drive-trash-cleaner",
            "-q",
            "--fullpath",
            "--logfile",
            "gdtc.log",
        ]);
        assert!(cli.full_path());
    }
}
