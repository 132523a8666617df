//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Capture an online e-book reader page by page into a local PDF.
///
/// Pages are saved as they are captured, so an interrupted run picks up where
/// it stopped. When no document is given you are asked for one.
#[derive(Parser, Debug)]
#[command(name = "bookcapture")]
#[command(author, version, about)]
pub struct Args {
    /// Document id, or a reader URL containing `bid=NNN` or `/book/NNN`
    pub document: Option<String>,

    /// Institutional reader domain (default: wqbook.wqxuetang.com)
    #[arg(long)]
    pub domain: Option<String>,

    /// Volume number for multi-volume works
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub volume: Option<u32>,

    /// Directory for page images and the assembled PDF
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Session file (default: ~/.config/bookcapture/session.json)
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Log in again even if a saved session exists
    #[arg(long)]
    pub fresh_login: bool,

    /// Show the browser window while capturing
    #[arg(long)]
    pub headed: bool,

    /// Seconds to wait for an interactive login (10-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(10..=3600))]
    pub login_timeout: Option<u64>,

    /// Do not produce the outlined `_toc.pdf`
    #[arg(long)]
    pub no_outline: bool,

    /// Remove page images after a complete, outlined run (catalog.json is kept)
    #[arg(long)]
    pub clean_up: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Delete the saved session and exit
    #[arg(long)]
    pub clear_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["bookcapture"]).unwrap();
        assert!(args.document.is_none());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.fresh_login);
        assert!(args.login_timeout.is_none());
    }

    #[test]
    fn test_cli_document_positional() {
        let args = Args::try_parse_from(["bookcapture", "3245678"]).unwrap();
        assert_eq!(args.document.as_deref(), Some("3245678"));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["bookcapture", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["bookcapture", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["bookcapture", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_login_timeout_range() {
        let args = Args::try_parse_from(["bookcapture", "--login-timeout", "600"]).unwrap();
        assert_eq!(args.login_timeout, Some(600));

        let err = Args::try_parse_from(["bookcapture", "--login-timeout", "5"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_volume_zero_rejected() {
        let err = Args::try_parse_from(["bookcapture", "1", "--volume", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_output_dir_short_flag() {
        let args = Args::try_parse_from(["bookcapture", "-o", "/tmp/books", "1"]).unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/books")));
    }

    #[test]
    fn test_cli_switches() {
        let args = Args::try_parse_from([
            "bookcapture",
            "--fresh-login",
            "--headed",
            "--no-outline",
            "--clean-up",
            "--no-color",
            "--clear-session",
        ])
        .unwrap();
        assert!(args.fresh_login && args.headed && args.no_outline);
        assert!(args.clean_up && args.no_color && args.clear_session);
    }
}
