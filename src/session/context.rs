//! The authenticated browser context handed to capture.

use std::fmt;

use tracing::warn;

use super::NegotiatorState;
use crate::auth::SessionCredentials;
use crate::driver::{AutomationDriver, DriverError};
use crate::target::DocumentTarget;

/// An authenticated, navigable view of one document.
///
/// Created by the session negotiator, consumed by capture, and closed by the
/// pipeline before the catalog step.
pub struct ViewingContext {
    driver: Box<dyn AutomationDriver>,
    target: DocumentTarget,
    credentials: SessionCredentials,
    origin: NegotiatorState,
}

impl ViewingContext {
    #[must_use]
    pub fn new(
        driver: Box<dyn AutomationDriver>,
        target: DocumentTarget,
        credentials: SessionCredentials,
        origin: NegotiatorState,
    ) -> Self {
        Self {
            driver,
            target,
            credentials,
            origin,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &dyn AutomationDriver {
        self.driver.as_ref()
    }

    #[must_use]
    pub fn target(&self) -> &DocumentTarget {
        &self.target
    }

    /// Cookies the context was opened with.
    #[must_use]
    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    /// Negotiator state that produced this context.
    #[must_use]
    pub fn origin(&self) -> NegotiatorState {
        self.origin
    }

    /// Closes the underlying browser context.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if shutdown fails.
    pub async fn close(mut self) -> Result<(), DriverError> {
        self.driver.close().await
    }

    /// Closes the context, logging instead of returning shutdown failures.
    pub async fn close_quietly(self) {
        if let Err(e) = self.close().await {
            warn!(error = %e, "failed to close browser context");
        }
    }
}

impl fmt::Debug for ViewingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewingContext")
            .field("target", &self.target)
            .field("cookies", &self.credentials.len())
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
