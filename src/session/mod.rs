//! Session negotiation.
//!
//! [`SessionNegotiator`] is a small state machine that turns stored or freshly
//! captured credentials into a ready [`ViewingContext`]:
//!
//! ```text
//! UseStoredCredentials --(none stored / not trusted)--> InteractiveLogin
//! InteractiveLogin     --(login observed, saved)------> UseFreshCredentials
//! any                  --(access denied reported)-----> InteractiveLogin
//! ```
//!
//! A reported access denial also marks the stored session stale on disk, so
//! the next process starts at `InteractiveLogin` instead of offering it again.
//!
//! The operator is asked at most once per negotiator whether to trust a
//! stored session. Interactive logins are bounded by a timeout that surfaces
//! as the recoverable [`SessionError::LoginTimeout`].

mod context;

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

pub use context::ViewingContext;

use crate::auth::{SessionCredentials, SessionStore, StoreError};
use crate::driver::{AutomationDriver, DriverError, DriverLauncher, LaunchMode, Visibility};
use crate::endpoints::Endpoints;
use crate::prompt::{PromptError, Prompter};
use crate::reader;
use crate::settings::ArchiveSettings;
use crate::target::DocumentTarget;

const TRUST_QUESTION: &str = "A saved login session was found. Use it?";

/// Where the negotiator will start on the next [`SessionNegotiator::establish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorState {
    UseStoredCredentials,
    InteractiveLogin,
    UseFreshCredentials,
}

impl fmt::Display for NegotiatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UseStoredCredentials => "use-stored-credentials",
            Self::InteractiveLogin => "interactive-login",
            Self::UseFreshCredentials => "use-fresh-credentials",
        };
        f.write_str(label)
    }
}

/// Errors that stop negotiation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operator did not finish logging in within the budget.
    #[error("login was not completed within {}s", .waited.as_secs())]
    LoginTimeout {
        /// The budget that elapsed.
        waited: Duration,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl SessionError {
    /// Whether asking the operator and calling `establish` again can succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LoginTimeout { .. })
    }
}

/// Timeouts and URLs used during negotiation.
#[derive(Debug, Clone)]
pub struct NegotiationSettings {
    pub endpoints: Endpoints,
    /// Budget for the operator to finish logging in.
    pub login_timeout: Duration,
    /// Budget for each login dialog element to appear.
    pub ui_timeout: Duration,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            login_timeout: Duration::from_secs(crate::settings::DEFAULT_LOGIN_TIMEOUT_SECS),
            ui_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ArchiveSettings> for NegotiationSettings {
    fn from(settings: &ArchiveSettings) -> Self {
        Self {
            endpoints: settings.endpoints.clone(),
            login_timeout: settings.login_timeout,
            ..Self::default()
        }
    }
}

/// Establishes authenticated viewing contexts.
#[derive(Debug)]
pub struct SessionNegotiator {
    state: NegotiatorState,
    trust_prompted: bool,
    fresh: Option<SessionCredentials>,
    store: SessionStore,
    settings: NegotiationSettings,
}

impl SessionNegotiator {
    /// Starts from stored credentials when a session file exists and was not
    /// refused in an earlier run, otherwise from an interactive login.
    #[must_use]
    pub fn new(store: SessionStore, settings: NegotiationSettings) -> Self {
        let state = if store.is_stale() {
            info!("stored session was refused earlier; interactive login required");
            NegotiatorState::InteractiveLogin
        } else if store.exists() {
            NegotiatorState::UseStoredCredentials
        } else {
            NegotiatorState::InteractiveLogin
        };
        Self::starting_with(state, store, settings)
    }

    #[must_use]
    pub fn starting_with(
        state: NegotiatorState,
        store: SessionStore,
        settings: NegotiationSettings,
    ) -> Self {
        debug!(%state, "session negotiator created");
        Self {
            state,
            trust_prompted: false,
            fresh: None,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Capture hit a page it may not view: the next negotiation, in this run
    /// or a later one, starts with an interactive login.
    pub fn report_access_denied(&mut self) {
        if let Err(e) = self.store.mark_stale() {
            warn!(error = %e, "could not record refused session");
        }
        self.fresh = None;
        self.transition(NegotiatorState::InteractiveLogin);
    }

    /// Runs the state machine until a viewing context is ready.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::LoginTimeout`] when an interactive login is
    /// not completed in time (the state stays `InteractiveLogin`), and store,
    /// driver or prompt failures otherwise.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn establish(
        &mut self,
        launcher: &dyn DriverLauncher,
        prompter: &dyn Prompter,
        target: &DocumentTarget,
    ) -> Result<ViewingContext, SessionError> {
        let viewer_url = self.settings.endpoints.viewer_url(target);

        loop {
            match self.state {
                NegotiatorState::UseStoredCredentials => {
                    let Some(credentials) = self.load_stored()? else {
                        info!("no usable stored session; interactive login required");
                        self.transition(NegotiatorState::InteractiveLogin);
                        continue;
                    };

                    let context =
                        open_capture_context(launcher, target, &viewer_url, credentials, self.state)
                            .await?;
                    if self.trust_prompted {
                        return Ok(context);
                    }

                    self.trust_prompted = true;
                    let trusted = match prompter.confirm(TRUST_QUESTION) {
                        Ok(answer) => answer,
                        Err(e) => {
                            context.close_quietly().await;
                            return Err(e.into());
                        }
                    };
                    if trusted {
                        info!("using stored session");
                        return Ok(context);
                    }

                    context.close_quietly().await;
                    self.transition(NegotiatorState::InteractiveLogin);
                }
                NegotiatorState::InteractiveLogin => {
                    let credentials = self.interactive_login(launcher, &viewer_url).await?;
                    self.store.save(&credentials)?;
                    self.fresh = Some(credentials);
                    self.transition(NegotiatorState::UseFreshCredentials);
                }
                NegotiatorState::UseFreshCredentials => {
                    let credentials = match self.fresh.clone() {
                        Some(credentials) => credentials,
                        None => match self.load_stored()? {
                            Some(credentials) => credentials,
                            None => {
                                self.transition(NegotiatorState::InteractiveLogin);
                                continue;
                            }
                        },
                    };
                    return open_capture_context(
                        launcher,
                        target,
                        &viewer_url,
                        credentials,
                        self.state,
                    )
                    .await;
                }
            }
        }
    }

    fn transition(&mut self, next: NegotiatorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state transition");
        }
        self.state = next;
    }

    fn load_stored(&self) -> Result<Option<SessionCredentials>, SessionError> {
        match self.store.load() {
            Ok(credentials) => Ok(credentials),
            Err(StoreError::Corrupt { path, source }) => {
                warn!(path = %path.display(), error = %source, "ignoring unreadable session file");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn interactive_login(
        &self,
        launcher: &dyn DriverLauncher,
        viewer_url: &str,
    ) -> Result<SessionCredentials, SessionError> {
        let mut driver = launcher.launch(LaunchMode::Interactive).await?;
        let outcome = self.drive_login(driver.as_ref(), viewer_url).await;
        if let Err(e) = driver.close().await {
            warn!(error = %e, "failed to close login browser");
        }
        outcome
    }

    async fn drive_login(
        &self,
        driver: &dyn AutomationDriver,
        viewer_url: &str,
    ) -> Result<SessionCredentials, SessionError> {
        driver.navigate(viewer_url).await?;
        self.open_login_dialog(driver).await?;

        let waited = self.settings.login_timeout;
        info!(
            timeout_secs = waited.as_secs(),
            "complete the login in the browser window"
        );
        match tokio::time::timeout(waited, wait_for_return(driver, viewer_url)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = waited.as_secs(), "login window timed out");
                return Err(SessionError::LoginTimeout { waited });
            }
        }

        let credentials = SessionCredentials::new(driver.cookies().await?);
        if credentials.is_empty() {
            warn!("login finished but the browser reported no cookies");
        }
        info!(cookies = credentials.len(), "login completed");
        Ok(credentials)
    }

    /// Walks the reader's guidance overlay and bookmark dialog to reach the
    /// login page. Missing elements are tolerated; the operator can navigate
    /// by hand.
    async fn open_login_dialog(&self, driver: &dyn AutomationDriver) -> Result<(), DriverError> {
        let ui = self.settings.ui_timeout;

        if driver
            .wait_for(reader::GUIDE_OVERLAY, Visibility::Visible, ui)
            .await?
        {
            driver.click(reader::GUIDE_OVERLAY).await?;
        }

        if driver
            .wait_for(reader::BOOKMARK_TRIGGER, Visibility::Visible, ui)
            .await?
        {
            driver.click(reader::BOOKMARK_TRIGGER).await?;
        } else {
            debug!("bookmark control not shown");
        }

        let confirmed = driver
            .wait_for(reader::DIALOG_BUTTON, Visibility::Visible, ui)
            .await?
            && driver
                .click_with_text(reader::DIALOG_BUTTON, reader::CONFIRM_LABEL)
                .await?;
        if confirmed {
            debug!("login dialog confirmed");
        } else {
            info!("login dialog did not appear; open the login page in the browser window");
        }
        Ok(())
    }
}

/// Resolves once the main frame has left the viewer and come back to it.
async fn wait_for_return(driver: &dyn AutomationDriver, viewer_url: &str) -> Result<(), DriverError> {
    let mut departed = !is_viewer_url(&driver.current_url().await?, viewer_url);
    loop {
        let url = driver.next_navigation().await?;
        if is_viewer_url(&url, viewer_url) {
            if departed {
                return Ok(());
            }
        } else {
            if !departed {
                debug!(url = %url, "left the reader for login");
            }
            departed = true;
        }
    }
}

/// Whether `candidate` shows the same document as `viewer_url`: same host
/// and path, and identical values for every query parameter the viewer URL
/// sets. Extra parameters on `candidate` are allowed.
fn is_viewer_url(candidate: &str, viewer_url: &str) -> bool {
    let (Ok(candidate), Ok(viewer)) = (Url::parse(candidate), Url::parse(viewer_url)) else {
        return candidate == viewer_url;
    };
    if candidate.host_str() != viewer.host_str() || candidate.path() != viewer.path() {
        return false;
    }
    viewer.query_pairs().all(|(key, value)| {
        candidate
            .query_pairs()
            .any(|(other_key, other_value)| other_key == key && other_value == value)
    })
}

async fn open_capture_context(
    launcher: &dyn DriverLauncher,
    target: &DocumentTarget,
    viewer_url: &str,
    credentials: SessionCredentials,
    origin: NegotiatorState,
) -> Result<ViewingContext, SessionError> {
    let mut driver = launcher.launch(LaunchMode::Capture).await?;
    if let Err(e) = install_session(driver.as_ref(), viewer_url, &credentials).await {
        if let Err(close_err) = driver.close().await {
            warn!(error = %close_err, "failed to close browser context");
        }
        return Err(e.into());
    }
    debug!(cookies = credentials.len(), %origin, "viewing context ready");
    Ok(ViewingContext::new(
        driver,
        target.clone(),
        credentials,
        origin,
    ))
}

/// Cookies are scoped to the reader host, so the page is visited once before
/// they are installed and again afterwards.
async fn install_session(
    driver: &dyn AutomationDriver,
    viewer_url: &str,
    credentials: &SessionCredentials,
) -> Result<(), DriverError> {
    driver.navigate(viewer_url).await?;
    driver.set_cookies(credentials.cookies()).await?;
    driver.navigate(viewer_url).await
}
