//! The sequential, resumable per-page capture loop.

use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use super::{CaptureError, CaptureEvent, CaptureObserver, CaptureReport};
use crate::driver::{AutomationDriver, DriverError, Visibility};
use crate::layout::{ArtifactLayout, write_atomically};
use crate::reader;
use crate::session::ViewingContext;
use crate::settings::CaptureTimings;

/// Captures pages `1..=total` that have no artifact yet.
///
/// An existing artifact is trusted as complete and never re-captured.
///
/// # Errors
///
/// Returns [`CaptureError::AccessDenied`] at the first page whose container
/// or image does not render; remaining pages are not attempted.
#[instrument(skip_all, fields(total))]
pub async fn capture_pages(
    context: &ViewingContext,
    layout: &ArtifactLayout,
    total: u32,
    timings: &CaptureTimings,
    observer: &dyn CaptureObserver,
) -> Result<CaptureReport, CaptureError> {
    let driver = context.driver();
    let mut report = CaptureReport {
        total,
        ..CaptureReport::default()
    };

    for page in 1..=total {
        let path = layout.page_path(page);
        if path.exists() {
            debug!(page, "page already captured");
            report.skipped += 1;
            observer.on_event(&CaptureEvent::PageSkipped { page, total });
            continue;
        }

        let container = reader::page_container(page);
        if !driver.scroll_into_view(&container).await? {
            warn!(page, "page container missing; access denied");
            return Err(CaptureError::AccessDenied { page });
        }

        let image = reader::page_image(page);
        if !driver
            .wait_for(&image, Visibility::Attached, timings.selector_timeout)
            .await?
        {
            warn!(page, "page image never rendered; access denied");
            return Err(CaptureError::AccessDenied { page });
        }

        if !image_settled(driver, &image, timings).await? {
            debug!(
                page,
                fallback_ms = timings.settle_fallback.as_millis(),
                "image not reported ready; using fixed delay"
            );
            report.settle_fallbacks += 1;
            sleep(timings.settle_fallback).await;
        }

        let png = driver.capture_element(&container).await?;
        write_atomically(&path, &png).map_err(|source| CaptureError::Io {
            path: path.clone(),
            source,
        })?;
        report.captured += 1;
        debug!(page, bytes = png.len(), "page captured");
        observer.on_event(&CaptureEvent::PageCaptured { page, total });
    }

    info!(
        captured = report.captured,
        skipped = report.skipped,
        total,
        "capture complete"
    );
    Ok(report)
}

/// Polls the image-ready predicate until it holds or the settle budget runs out.
async fn image_settled(
    driver: &dyn AutomationDriver,
    selector: &str,
    timings: &CaptureTimings,
) -> Result<bool, DriverError> {
    let deadline = Instant::now() + timings.settle_timeout;
    loop {
        if driver.image_ready(selector).await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(timings.settle_poll).await;
    }
}
