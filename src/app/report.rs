//! Operator-facing run summaries.

use bookcapture_core::assemble::AssemblyOutcome;
use bookcapture_core::{AnnotateOutcome, CatalogStatus, PipelineError, RunSummary, describe_failure};

pub(crate) fn render_summary_lines(summary: &RunSummary) -> Vec<String> {
    let archived = match summary {
        RunSummary::EmptyDocument { identity } => {
            return vec![format!(
                "'{}' ({}) has no pages; nothing was saved.",
                identity.title, identity.document_id
            )];
        }
        RunSummary::Archived(archived) => archived,
    };

    let capture = archived.capture;
    let mut lines = vec![format!(
        "'{}': {} pages ({} captured, {} already saved)",
        archived.identity.title, capture.total, capture.captured, capture.skipped
    )];

    match &archived.document {
        AssemblyOutcome::Written {
            path,
            missing_pages,
            ..
        } => {
            lines.push(format!("  PDF: {}", path.display()));
            if !missing_pages.is_empty() {
                lines.push(format!("  Missing pages: {}", join_pages(missing_pages)));
            }
        }
        AssemblyOutcome::Skipped { path } => {
            lines.push(format!("  PDF: {} (already present)", path.display()));
        }
    }

    match &archived.outline {
        Some(AnnotateOutcome::Written { path, entries }) => {
            lines.push(format!("  Outlined PDF: {} ({entries} entries)", path.display()));
        }
        Some(AnnotateOutcome::Skipped) => lines.push(format!(
            "  Outlined PDF: {} (already present)",
            archived.layout.outlined_document_path.display()
        )),
        Some(AnnotateOutcome::NoEntries) => {
            lines.push("  Outline: catalog is empty".to_string());
        }
        None if archived.catalog.is_none() => {
            lines.push("  Outline: catalog unavailable".to_string());
        }
        None => {}
    }
    if let Some(CatalogStatus::Fetched { entries }) = archived.catalog {
        lines.push(format!("  Catalog: {entries} entries saved"));
    }

    if archived.cleaned_up {
        lines.push("  Page images removed".to_string());
    } else {
        lines.push(format!("  Page images: {}", archived.layout.images_dir.display()));
    }
    lines
}

pub(crate) fn render_failure_lines(error: &PipelineError) -> Vec<String> {
    let descriptor = describe_failure(error);
    vec![
        format!(
            "{} {}: {}",
            descriptor.category.icon(),
            descriptor.category.label(),
            error
        ),
        format!("  What: {}", descriptor.what),
        format!("  Why: {}", descriptor.why),
        format!("  Fix: {}", descriptor.fix),
    ]
}

fn join_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
