//! Page capture.
//!
//! Discovery reads the page count and title from the reader; the capture
//! loop then renders each page in order and persists it as
//! `image{n}.png`. File existence is the "already captured" marker, so an
//! interrupted run resumes where it stopped.

mod discovery;
mod pages;

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

pub use discovery::{Discovery, discover, parse_page_progress};
pub use pages::capture_pages;

use crate::driver::DriverError;
use crate::layout::ArtifactLayout;
use crate::session::ViewingContext;
use crate::settings::CaptureTimings;
use crate::target::DocumentIdentity;

/// Errors that abort a capture run.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Page `page` did not render for this session. Pages before it are on disk.
    #[error("access denied at page {page}: the page did not render for this session")]
    AccessDenied { page: u32 },
    /// The reader never reported its page count or title.
    #[error("could not read document details: {reason}")]
    Discovery { reason: String },
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub(crate) fn discovery(reason: impl Into<String>) -> Self {
        Self::Discovery {
            reason: reason.into(),
        }
    }
}

/// Counts from one pass of the capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub total: u32,
    /// Pages captured by this run.
    pub captured: u32,
    /// Pages already on disk.
    pub skipped: u32,
    /// Pages captured after the fixed delay because the ready check never held.
    pub settle_fallbacks: u32,
}

/// Result of [`run_capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The reader reported zero pages; nothing was written.
    EmptyDocument { identity: DocumentIdentity },
    /// Every page has an artifact.
    Completed {
        identity: DocumentIdentity,
        layout: ArtifactLayout,
        report: CaptureReport,
    },
}

/// Progress notifications from a capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Discovered { title: String, total: u32 },
    PageSkipped { page: u32, total: u32 },
    PageCaptured { page: u32, total: u32 },
}

/// Receives [`CaptureEvent`]s, e.g. to drive a progress bar.
pub trait CaptureObserver: Send + Sync {
    fn on_event(&self, event: &CaptureEvent);
}

impl CaptureObserver for () {
    fn on_event(&self, _event: &CaptureEvent) {}
}

/// Discovers the document and captures every missing page under `output_dir`.
///
/// A zero-page document returns [`CaptureOutcome::EmptyDocument`] before any
/// directory is created.
///
/// # Errors
///
/// See [`discover`] and [`capture_pages`].
#[instrument(skip_all, fields(document = %context.target().document_id))]
pub async fn run_capture(
    context: &ViewingContext,
    output_dir: &Path,
    timings: &CaptureTimings,
    observer: &dyn CaptureObserver,
) -> Result<CaptureOutcome, CaptureError> {
    let discovery = discover(context, timings).await?;
    let identity = discovery.identity;
    let total = discovery.total_pages;

    if total == 0 {
        info!("reader reports zero pages; nothing to capture");
        return Ok(CaptureOutcome::EmptyDocument { identity });
    }

    info!(title = %identity.title, total, "capturing document");
    observer.on_event(&CaptureEvent::Discovered {
        title: identity.title.clone(),
        total,
    });

    let layout = ArtifactLayout::new(output_dir, &identity);
    std::fs::create_dir_all(&layout.images_dir).map_err(|source| CaptureError::Io {
        path: layout.images_dir.clone(),
        source,
    })?;

    let report = capture_pages(context, &layout, total, timings, observer).await?;
    Ok(CaptureOutcome::Completed {
        identity,
        layout,
        report,
    })
}
