//! Reading page count and title from a freshly loaded reader.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use super::CaptureError;
use crate::driver::Visibility;
use crate::reader;
use crate::session::ViewingContext;
use crate::settings::CaptureTimings;
use crate::target::DocumentIdentity;

#[allow(clippy::expect_used)]
static PROGRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*/\s*(\d+)").expect("progress regex is valid") // Static pattern, safe to panic
});

/// What the reader reports about the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub identity: DocumentIdentity,
    pub total_pages: u32,
    /// The reader flagged the document as not purchased.
    pub preview_only: bool,
}

/// Parses the progress indicator text `current/total`.
#[must_use]
pub fn parse_page_progress(text: &str) -> Option<(u32, u32)> {
    let caps = PROGRESS_PATTERN.captures(text)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// Dismisses the guidance overlay and reads the page count and title.
///
/// # Errors
///
/// Returns [`CaptureError::Discovery`] when the progress indicator or the
/// title cannot be read. That usually means the reader did not load or its
/// markup changed, not that access was refused.
#[instrument(skip_all, fields(document = %context.target().document_id))]
pub async fn discover(
    context: &ViewingContext,
    timings: &CaptureTimings,
) -> Result<Discovery, CaptureError> {
    let driver = context.driver();

    if driver
        .wait_for(reader::GUIDE_OVERLAY, Visibility::Visible, timings.overlay_timeout)
        .await?
    {
        driver.click(reader::GUIDE_OVERLAY).await?;
        debug!("dismissed guidance overlay");
    }

    if !driver
        .wait_for(
            reader::PROGRESS_INDICATOR,
            Visibility::Visible,
            timings.selector_timeout,
        )
        .await?
    {
        return Err(CaptureError::discovery(format!(
            "progress indicator `{}` did not appear within {}s",
            reader::PROGRESS_INDICATOR,
            timings.selector_timeout.as_secs()
        )));
    }

    let progress = driver
        .text_of(reader::PROGRESS_INDICATOR)
        .await?
        .unwrap_or_default();
    let Some((_, total_pages)) = parse_page_progress(&progress) else {
        return Err(CaptureError::discovery(format!(
            "unreadable progress indicator text '{progress}'"
        )));
    };

    let title = driver
        .text_of(reader::TITLE)
        .await?
        .filter(|title| !title.trim().is_empty());
    let title = match title {
        Some(title) => title,
        // An empty document has nothing to name.
        None if total_pages == 0 => String::new(),
        None => {
            return Err(CaptureError::discovery(format!(
                "document title `{}` not found",
                reader::TITLE
            )));
        }
    };

    let preview_only = driver.exists(reader::PAID_CONTENT_WARNING).await?;
    if preview_only {
        warn!("document is not purchased; only preview pages may be readable");
    }

    let identity = DocumentIdentity::new(context.target(), &title);
    debug!(title = %identity.title, total_pages, "document discovered");
    Ok(Discovery {
        identity,
        total_pages,
        preview_only,
    })
}
