//! Resolved runtime settings handed from the CLI to the library.

use std::path::PathBuf;
use std::time::Duration;

use crate::endpoints::Endpoints;

/// Mobile Safari user agent; the reader serves its page-image layout to it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1";

pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SELECTOR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SETTLE_FALLBACK_MS: u64 = 2_000;
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Waits used by discovery and the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimings {
    /// Budget for the optional guidance overlay to appear.
    pub overlay_timeout: Duration,
    /// Budget for required selectors (progress indicator, page images).
    pub selector_timeout: Duration,
    /// Interval between image-ready checks.
    pub settle_poll: Duration,
    /// Budget for the image-ready predicate to hold.
    pub settle_timeout: Duration,
    /// Fixed delay used when the predicate never holds.
    pub settle_fallback: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            overlay_timeout: Duration::from_secs(3),
            selector_timeout: Duration::from_secs(DEFAULT_SELECTOR_TIMEOUT_SECS),
            settle_poll: Duration::from_millis(100),
            settle_timeout: Duration::from_millis(DEFAULT_SETTLE_TIMEOUT_MS),
            settle_fallback: Duration::from_millis(DEFAULT_SETTLE_FALLBACK_MS),
        }
    }
}

/// How browser contexts are launched.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    /// User agent sent by every context.
    pub user_agent: String,
    /// Run capture contexts without a visible window.
    pub headless_capture: bool,
    /// Explicit Chrome/Chromium binary; searched for when `None`.
    pub chrome_executable: Option<PathBuf>,
    /// Window size of the interactive login context.
    pub login_window: (u32, u32),
    /// Viewport of capture contexts.
    pub capture_window: (u32, u32),
    /// Device scale factor of capture contexts.
    pub capture_scale: f64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headless_capture: true,
            chrome_executable: None,
            login_window: (375, 667),
            capture_window: (1080, 1920),
            capture_scale: 0.5,
        }
    }
}

/// PDF assembly options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblySettings {
    /// JPEG quality (1..=100) used when embedding page images.
    pub jpeg_quality: u8,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Everything one archive run needs.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Parent directory for artifacts and outputs.
    pub output_dir: PathBuf,
    /// Session store location.
    pub session_file: PathBuf,
    /// Reader URL patterns.
    pub endpoints: Endpoints,
    /// Browser launch options.
    pub browser: BrowserSettings,
    /// Capture waits.
    pub timings: CaptureTimings,
    /// Budget for the operator to finish an interactive login.
    pub login_timeout: Duration,
    /// Start with an interactive login even if a session is stored.
    pub fresh_login: bool,
    /// Assembly options.
    pub assembly: AssemblySettings,
    /// Produce the outline-annotated variant when a catalog is available.
    pub outline: bool,
    /// Remove the images directory after a complete run.
    pub clean_up: bool,
}

impl ArchiveSettings {
    /// Settings with defaults for everything except the two required paths.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, session_file: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            session_file: session_file.into(),
            endpoints: Endpoints::default(),
            browser: BrowserSettings::default(),
            timings: CaptureTimings::default(),
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            fresh_login: false,
            assembly: AssemblySettings::default(),
            outline: true,
            clean_up: false,
        }
    }
}
