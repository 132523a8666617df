//! Browser automation contract.
//!
//! The session negotiator and the capture loop only talk to a browser through
//! [`AutomationDriver`]; contexts are opened by a [`DriverLauncher`]. The
//! Chromium implementation lives in [`chromium`]; tests substitute scripted
//! fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::SessionCookie;

pub mod chromium;

pub use chromium::ChromiumLauncher;

/// Errors surfaced by automation drivers.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The browser could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// A protocol command failed.
    #[error("browser command failed: {0}")]
    Protocol(String),
    /// The selector matched no element when one was required.
    #[error("no element matches '{selector}'")]
    ElementNotFound {
        /// The selector that matched nothing.
        selector: String,
    },
    /// The context was closed (or its browser exited).
    #[error("browser context is closed")]
    Closed,
    /// Browser support is not compiled into this build.
    #[error("browser support not compiled; rebuild with `--features browser`")]
    Unsupported,
}

/// Whether a wait requires the element to be rendered visibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Present in the DOM.
    Attached,
    /// Present and laid out with a non-zero box.
    Visible,
}

/// Kind of context to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Visible window sized for the mobile reader, for operator login.
    Interactive,
    /// Capture context (headless unless configured otherwise).
    Capture,
}

/// One open browser context.
///
/// Methods that look an element up report absence through their return value
/// rather than an error; errors mean the browser itself misbehaved.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Navigates the page and waits for the load to finish.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Waits up to `timeout` for `selector`. Returns `false` on timeout.
    async fn wait_for(
        &self,
        selector: &str,
        visibility: Visibility,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;

    /// Trimmed text content of the first match.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, DriverError>;

    async fn click(&self, selector: &str) -> Result<bool, DriverError>;

    /// Clicks the first match whose trimmed text equals `text`.
    async fn click_with_text(&self, selector: &str, text: &str) -> Result<bool, DriverError>;

    /// Scrolls the first match to the viewport centre. Returns `false` when
    /// nothing matches.
    async fn scroll_into_view(&self, selector: &str) -> Result<bool, DriverError>;

    /// Whether the image matched by `selector` has finished decoding.
    async fn image_ready(&self, selector: &str) -> Result<bool, DriverError>;

    /// PNG screenshot clipped to the first match.
    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, DriverError>;

    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError>;

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Resolves with the URL of the next main-frame navigation.
    async fn next_navigation(&self) -> Result<String, DriverError>;

    /// Closes the context. Further calls fail with [`DriverError::Closed`].
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens browser contexts.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn AutomationDriver>, DriverError>;
}
