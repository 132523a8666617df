//! Failure classification and user-facing descriptors for archive errors.

use crate::assemble::AssemblyError;
use crate::capture::CaptureError;
use crate::driver::DriverError;
use crate::pipeline::PipelineError;
use crate::session::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureCategory {
    Auth,
    Access,
    Reader,
    Browser,
    Filesystem,
    Other,
}

impl FailureCategory {
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Auth => "🔐",
            Self::Access => "🚫",
            Self::Reader => "📖",
            Self::Browser => "🌐",
            Self::Filesystem => "💾",
            Self::Other => "⚠️",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Auth => "Authentication",
            Self::Access => "Access",
            Self::Reader => "Reader",
            Self::Browser => "Browser",
            Self::Filesystem => "Filesystem",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDescriptor {
    pub category: FailureCategory,
    pub what: &'static str,
    pub why: &'static str,
    pub fix: &'static str,
}

const UNHANDLED: FailureDescriptor = FailureDescriptor {
    category: FailureCategory::Other,
    what: "Unhandled failure",
    why: "The error did not match a known category and needs closer inspection.",
    fix: "Inspect logs (-v or RUST_LOG=debug) and rerun; captured pages are kept.",
};

/// Returns the descriptor shown to the operator for a failed run.
#[must_use]
pub fn describe_failure(error: &PipelineError) -> FailureDescriptor {
    match error {
        PipelineError::Session(SessionError::LoginTimeout { .. }) => FailureDescriptor {
            category: FailureCategory::Auth,
            what: "Login not completed",
            why: "The login window was not completed before the timeout elapsed.",
            fix: "Rerun and finish logging in, or raise --login-timeout.",
        },
        PipelineError::Session(SessionError::Driver(e)) | PipelineError::Capture(CaptureError::Driver(e)) => {
            describe_driver(e)
        }
        PipelineError::Session(SessionError::Store(_)) | PipelineError::Store(_) => FailureDescriptor {
            category: FailureCategory::Filesystem,
            what: "Session file unusable",
            why: "The stored login session could not be read or written.",
            fix: "Check permissions on the session file or run with --clear-session.",
        },
        PipelineError::Session(SessionError::Prompt(_)) | PipelineError::Prompt(_) => FailureDescriptor {
            category: FailureCategory::Other,
            what: "No answer from the terminal",
            why: "A confirmation was needed but standard input was closed.",
            fix: "Run interactively, or pass the document on the command line.",
        },
        PipelineError::Capture(CaptureError::AccessDenied { .. }) => FailureDescriptor {
            category: FailureCategory::Access,
            what: "Page access denied",
            why: "A page did not render, so the session expired or the document is only partly licensed.",
            fix: "Rerun with --fresh-login; pages already saved are kept and skipped.",
        },
        PipelineError::Capture(CaptureError::Discovery { .. }) => FailureDescriptor {
            category: FailureCategory::Reader,
            what: "Document details not found",
            why: "The reader did not show its page count or title; the page layout may have changed.",
            fix: "Open the document in a browser to confirm it loads, then retry with --headed.",
        },
        PipelineError::Capture(CaptureError::Io { .. }) | PipelineError::Cleanup { .. } => {
            FailureDescriptor {
                category: FailureCategory::Filesystem,
                what: "Could not write artifacts",
                why: "A page image or directory could not be written to the output directory.",
                fix: "Check free space and permissions for the output directory.",
            }
        }
        PipelineError::Assembly(AssemblyError::NoPages { .. }) => FailureDescriptor {
            category: FailureCategory::Filesystem,
            what: "No pages to assemble",
            why: "The images directory holds no captured pages.",
            fix: "Rerun to capture the document before assembling.",
        },
        PipelineError::Assembly(AssemblyError::Image { .. }) => FailureDescriptor {
            category: FailureCategory::Filesystem,
            what: "Damaged page image",
            why: "A captured page could not be decoded.",
            fix: "Delete the damaged image{n}.png and rerun to capture it again.",
        },
        PipelineError::Assembly(AssemblyError::Pdf(_) | AssemblyError::Io { .. }) => {
            FailureDescriptor {
                category: FailureCategory::Filesystem,
                what: "PDF could not be written",
                why: "Writing or reading the assembled document failed.",
                fix: "Check free space and permissions, then rerun; pages are kept.",
            }
        }
        PipelineError::Task(_) => UNHANDLED,
    }
}

fn describe_driver(error: &DriverError) -> FailureDescriptor {
    match error {
        DriverError::Launch(_) => FailureDescriptor {
            category: FailureCategory::Browser,
            what: "Browser failed to start",
            why: "Chrome or Chromium was not found or exited during startup.",
            fix: "Install Chrome/Chromium or set `chrome_executable` in config.toml.",
        },
        DriverError::Unsupported => FailureDescriptor {
            category: FailureCategory::Browser,
            what: "Browser support not built",
            why: "This binary was compiled without browser automation.",
            fix: "Rebuild with `--features browser`.",
        },
        DriverError::Protocol(_) | DriverError::ElementNotFound { .. } | DriverError::Closed => {
            FailureDescriptor {
                category: FailureCategory::Browser,
                what: "Browser automation failed",
                why: "The browser stopped responding or closed while the reader was in use.",
                fix: "Rerun to resume; use --headed to watch the reader.",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_login_timeout_is_auth() {
        let error = PipelineError::from(SessionError::LoginTimeout {
            waited: Duration::from_secs(300),
        });
        let d = describe_failure(&error);
        assert_eq!(d.category, FailureCategory::Auth);
        assert!(d.fix.contains("--login-timeout"));
    }

    #[test]
    fn test_access_denied_and_discovery_are_distinct() {
        let denied = describe_failure(&PipelineError::from(CaptureError::AccessDenied { page: 3 }));
        let discovery = describe_failure(&PipelineError::from(CaptureError::discovery("no .perc")));
        assert_eq!(denied.category, FailureCategory::Access);
        assert_eq!(discovery.category, FailureCategory::Reader);
        assert!(denied.fix.contains("--fresh-login"));
    }

    #[test]
    fn test_driver_errors_map_through_session_and_capture() {
        let launch = PipelineError::from(SessionError::Driver(DriverError::Launch("no chrome".into())));
        assert_eq!(describe_failure(&launch).what, "Browser failed to start");
        let closed = PipelineError::from(CaptureError::Driver(DriverError::Closed));
        assert_eq!(describe_failure(&closed).category, FailureCategory::Browser);
    }

    #[test]
    fn test_category_labels_and_icons_are_set() {
        for category in [
            FailureCategory::Auth,
            FailureCategory::Access,
            FailureCategory::Reader,
            FailureCategory::Browser,
            FailureCategory::Filesystem,
            FailureCategory::Other,
        ] {
            assert!(!category.label().is_empty());
            assert!(!category.icon().is_empty());
        }
    }
}
