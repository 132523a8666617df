//! End-to-end archive run.
//!
//! ```text
//! negotiate -> capture -> close context -> catalog -> assemble -> outline -> cleanup
//!     ^            |
//!     +------------+  access denied / login timeout, operator agrees to retry
//! ```
//!
//! Every step is idempotent against what is already on disk, so a failed or
//! interrupted run is resumed by running it again.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::assemble::{
    AnnotateOutcome, AssemblyError, AssemblyOutcome, annotate_with_outline, assemble_document,
};
use crate::auth::{SessionCredentials, SessionStore, StoreError};
use crate::capture::{CaptureError, CaptureObserver, CaptureOutcome, CaptureReport, run_capture};
use crate::catalog::{CatalogFetcher, CatalogStatus, load_catalog};
use crate::driver::DriverLauncher;
use crate::layout::{ArtifactLayout, CATALOG_FILE_NAME};
use crate::prompt::{PromptError, Prompter};
use crate::session::{NegotiationSettings, NegotiatorState, SessionError, SessionNegotiator};
use crate::settings::ArchiveSettings;
use crate::target::{DocumentIdentity, DocumentTarget};

const REAUTHENTICATE_QUESTION: &str =
    "A page did not load for this session. Log in again and continue?";
const RETRY_LOGIN_QUESTION: &str = "Login was not completed in time. Try again?";

/// Errors that end an archive run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// The blocking assembly task panicked or was cancelled.
    #[error("assembly task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to remove '{path}': {source}")]
    Cleanup {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Capture stopped after at least one page was saved.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Capture(CaptureError::AccessDenied { page }) if *page > 1)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSummary {
    /// The reader reported no pages; nothing was written.
    EmptyDocument { identity: DocumentIdentity },
    Archived(ArchivedDocument),
}

/// Outputs of a run that reached assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedDocument {
    pub identity: DocumentIdentity,
    pub layout: ArtifactLayout,
    pub capture: CaptureReport,
    /// `None` when the catalog could not be fetched.
    pub catalog: Option<CatalogStatus>,
    pub document: AssemblyOutcome,
    /// `None` when outlines are disabled or no catalog is available.
    pub outline: Option<AnnotateOutcome>,
    /// The images directory was removed.
    pub cleaned_up: bool,
}

/// Runs archives with injected browser, prompt and progress seams.
pub struct Archiver<'a> {
    settings: ArchiveSettings,
    launcher: &'a dyn DriverLauncher,
    prompter: &'a dyn Prompter,
    observer: &'a dyn CaptureObserver,
}

impl<'a> Archiver<'a> {
    #[must_use]
    pub fn new(
        settings: ArchiveSettings,
        launcher: &'a dyn DriverLauncher,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            settings,
            launcher,
            prompter,
            observer: &(),
        }
    }

    /// Reports capture progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn CaptureObserver) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    /// Captures, assembles and annotates `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when negotiation, capture or assembly fails
    /// and the operator declines to retry. Catalog failures are logged and
    /// tolerated.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn archive(&self, target: &DocumentTarget) -> Result<RunSummary, PipelineError> {
        let store = SessionStore::new(&self.settings.session_file);
        let negotiation = NegotiationSettings::from(&self.settings);
        let mut negotiator = if self.settings.fresh_login {
            SessionNegotiator::starting_with(NegotiatorState::InteractiveLogin, store, negotiation)
        } else {
            SessionNegotiator::new(store, negotiation)
        };

        let (outcome, credentials) = self.capture_with_relogin(&mut negotiator, target).await?;
        let (identity, layout, capture) = match outcome {
            CaptureOutcome::EmptyDocument { identity } => {
                info!("document has no pages; nothing to assemble");
                return Ok(RunSummary::EmptyDocument { identity });
            }
            CaptureOutcome::Completed {
                identity,
                layout,
                report,
            } => (identity, layout, report),
        };
        info!(
            captured = capture.captured,
            skipped = capture.skipped,
            total = capture.total,
            "all pages on disk"
        );

        let catalog = self.fetch_catalog(target, &credentials, &layout).await;
        let document = self.assemble(&layout).await?;
        let outline = if self.settings.outline {
            self.annotate(&layout).await?
        } else {
            None
        };
        let cleaned_up = self.clean_up(&layout, &document)?;

        Ok(RunSummary::Archived(ArchivedDocument {
            identity,
            layout,
            capture,
            catalog,
            document,
            outline,
            cleaned_up,
        }))
    }

    async fn capture_with_relogin(
        &self,
        negotiator: &mut SessionNegotiator,
        target: &DocumentTarget,
    ) -> Result<(CaptureOutcome, SessionCredentials), PipelineError> {
        loop {
            let context = match negotiator.establish(self.launcher, self.prompter, target).await {
                Ok(context) => context,
                Err(SessionError::LoginTimeout { waited }) => {
                    if self.prompter.confirm(RETRY_LOGIN_QUESTION)? {
                        continue;
                    }
                    return Err(SessionError::LoginTimeout { waited }.into());
                }
                Err(e) => return Err(e.into()),
            };

            let credentials = context.credentials().clone();
            let result = run_capture(
                &context,
                &self.settings.output_dir,
                &self.settings.timings,
                self.observer,
            )
            .await;
            if let Err(e) = context.close().await {
                warn!(error = %e, "failed to close capture browser");
            }

            match result {
                Ok(outcome) => return Ok((outcome, credentials)),
                Err(CaptureError::AccessDenied { page }) => {
                    warn!(
                        page,
                        "page did not render; the session may have expired or the document is not licensed for it"
                    );
                    negotiator.report_access_denied();
                    if self.prompter.confirm(REAUTHENTICATE_QUESTION)? {
                        continue;
                    }
                    return Err(CaptureError::AccessDenied { page }.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn fetch_catalog(
        &self,
        target: &DocumentTarget,
        credentials: &SessionCredentials,
        layout: &ArtifactLayout,
    ) -> Option<CatalogStatus> {
        let fetcher = match CatalogFetcher::new(credentials, &self.settings.browser.user_agent) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                warn!(error = %e, "catalog unavailable; continuing without outline");
                return None;
            }
        };
        let url = self.settings.endpoints.catalog_url(target);
        match fetcher.fetch_catalog(&url, &layout.catalog_path).await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "catalog unavailable; continuing without outline");
                None
            }
        }
    }

    async fn assemble(&self, layout: &ArtifactLayout) -> Result<AssemblyOutcome, PipelineError> {
        let images_dir = layout.images_dir.clone();
        let output = layout.document_path.clone();
        let settings = self.settings.assembly;
        let outcome =
            tokio::task::spawn_blocking(move || assemble_document(&images_dir, &output, &settings))
                .await??;
        Ok(outcome)
    }

    async fn annotate(
        &self,
        layout: &ArtifactLayout,
    ) -> Result<Option<AnnotateOutcome>, PipelineError> {
        let catalog = match load_catalog(&layout.catalog_path) {
            Ok(Some(catalog)) => catalog,
            Ok(None) => {
                debug!("no catalog on disk; skipping outline");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "stored catalog unreadable; skipping outline");
                return Ok(None);
            }
        };

        let document = layout.document_path.clone();
        let output = layout.outlined_document_path.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            annotate_with_outline(&document, &catalog, &output)
        })
        .await??;
        Ok(Some(outcome))
    }

    /// Removes the page images once both outputs exist and no page is
    /// missing. `catalog.json` stays so a later outline can be rebuilt without
    /// a new request.
    fn clean_up(
        &self,
        layout: &ArtifactLayout,
        document: &AssemblyOutcome,
    ) -> Result<bool, PipelineError> {
        if !self.settings.clean_up {
            return Ok(false);
        }
        let complete = match document {
            AssemblyOutcome::Written { missing_pages, .. } => missing_pages.is_empty(),
            AssemblyOutcome::Skipped { .. } => true,
        };
        if !complete || !layout.outlined_document_path.exists() {
            info!("keeping page images; the outlined document was not produced");
            return Ok(false);
        }
        let removed = remove_page_images(&layout.images_dir)?;
        info!(path = %layout.images_dir.display(), removed, "page images removed");
        Ok(true)
    }
}

/// Deletes every file in `dir` except the catalog, then `dir` itself if it
/// ends up empty. A missing directory is not an error.
fn remove_page_images(dir: &Path) -> Result<usize, PipelineError> {
    let cleanup_error = |path: &Path, source| PipelineError::Cleanup {
        path: path.to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => return Err(cleanup_error(dir, source)),
    };

    let mut removed = 0;
    let mut kept = 0;
    for entry in entries {
        let entry = entry.map_err(|source| cleanup_error(dir, source))?;
        let path = entry.path();
        if entry.file_name() == CATALOG_FILE_NAME || !path.is_file() {
            kept += 1;
            continue;
        }
        std::fs::remove_file(&path).map_err(|source| cleanup_error(&path, source))?;
        removed += 1;
    }
    if kept == 0 {
        std::fs::remove_dir(dir).map_err(|source| cleanup_error(dir, source))?;
    }
    Ok(removed)
}
