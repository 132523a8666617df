//! Document assembly.
//!
//! Captured pages are combined in numeric page order into one PDF, each page
//! sized to its image. An outlined copy can then be derived from the catalog.
//! Both outputs are written through a `.part` file and are never overwritten.

mod outline;
mod pdf;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use lopdf::Document;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

pub use outline::annotate_with_outline;

use crate::layout::partial_path;
use crate::settings::AssemblySettings;
use pdf::{PdfBuilder, encode_page};

#[allow(clippy::expect_used)]
static PAGE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^image(\d+)\.png$").expect("page file regex is valid") // Static pattern, safe to panic
});

/// Errors from building or annotating the document.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// No page artifacts to assemble.
    #[error("no captured pages found in '{dir}'")]
    NoPages { dir: PathBuf },
    #[error("page image '{path}' could not be decoded: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("'{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A captured page found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifactFile {
    /// 1-based page number parsed from the file name.
    pub page_index: u32,
    pub path: PathBuf,
}

/// Result of [`assemble_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    /// The document already existed and was left untouched.
    Skipped { path: PathBuf },
    Written {
        path: PathBuf,
        pages: usize,
        /// Page numbers below the highest captured one with no artifact.
        missing_pages: Vec<u32>,
    },
}

/// Result of [`annotate_with_outline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotateOutcome {
    /// The outlined document already existed.
    Skipped,
    /// The catalog has no entries; nothing was written.
    NoEntries,
    Written { path: PathBuf, entries: usize },
}

/// Lists `image{n}.png` files in `dir`, sorted by page number.
///
/// Other files (partial writes, the catalog) are ignored.
///
/// # Errors
///
/// Returns [`AssemblyError::Io`] if the directory cannot be read.
pub fn collect_page_artifacts(dir: &Path) -> Result<Vec<PageArtifactFile>, AssemblyError> {
    let io_error = |source| AssemblyError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(caps) = PAGE_FILE_PATTERN.captures(name)
            && let Ok(page_index) = caps[1].parse::<u32>()
            && page_index > 0
        {
            artifacts.push(PageArtifactFile {
                page_index,
                path: entry.path(),
            });
        }
    }
    artifacts.sort_by_key(|a| a.page_index);
    Ok(artifacts)
}

/// Page numbers between 1 and the highest artifact that have no artifact.
#[must_use]
pub fn missing_pages(artifacts: &[PageArtifactFile]) -> Vec<u32> {
    let Some(last) = artifacts.last().map(|a| a.page_index) else {
        return Vec::new();
    };
    let mut present = artifacts.iter().map(|a| a.page_index).peekable();
    let mut missing = Vec::new();
    for page in 1..=last {
        if present.peek() == Some(&page) {
            present.next();
        } else {
            missing.push(page);
        }
    }
    missing
}

/// Combines the page images in `images_dir` into one PDF at `output`.
///
/// Pages are ordered numerically (page 10 after page 9). Gaps are logged and
/// reported but do not stop assembly.
///
/// # Errors
///
/// Returns [`AssemblyError::NoPages`] when `images_dir` holds no pages,
/// [`AssemblyError::Image`] for an undecodable page and I/O or PDF errors on
/// write.
#[instrument(skip(settings), fields(images = %images_dir.display(), output = %output.display()))]
pub fn assemble_document(
    images_dir: &Path,
    output: &Path,
    settings: &AssemblySettings,
) -> Result<AssemblyOutcome, AssemblyError> {
    if output.exists() {
        debug!("document already assembled");
        return Ok(AssemblyOutcome::Skipped {
            path: output.to_path_buf(),
        });
    }

    let artifacts = collect_page_artifacts(images_dir)?;
    if artifacts.is_empty() {
        return Err(AssemblyError::NoPages {
            dir: images_dir.to_path_buf(),
        });
    }
    let missing = missing_pages(&artifacts);
    if !missing.is_empty() {
        warn!(missing = ?missing, "page artifacts missing; assembling what exists");
    }

    let mut builder = PdfBuilder::new();
    for artifact in &artifacts {
        let raw = std::fs::read(&artifact.path).map_err(|source| AssemblyError::Io {
            path: artifact.path.clone(),
            source,
        })?;
        let page = encode_page(&raw, settings.jpeg_quality).map_err(|source| AssemblyError::Image {
            path: artifact.path.clone(),
            source,
        })?;
        builder.add_image_page(page);
    }

    let pages = builder.page_count();
    let mut doc = builder.finish();
    save_atomically(&mut doc, output)?;
    info!(pages, "document assembled");

    Ok(AssemblyOutcome::Written {
        path: output.to_path_buf(),
        pages,
        missing_pages: missing,
    })
}

/// Saves `doc` next to `output` and renames it into place.
pub(crate) fn save_atomically(doc: &mut Document, output: &Path) -> Result<(), AssemblyError> {
    let io_error = |source| AssemblyError::Io {
        path: output.to_path_buf(),
        source,
    };
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let partial = partial_path(output);
    doc.save(&partial).map_err(lopdf::Error::from)?;
    std::fs::rename(&partial, output).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_collect_sorts_numerically_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["image10.png", "image2.png", "image1.png", "image3.png.part", "catalog.json", "image0.png"] {
            touch(dir.path(), name);
        }
        let pages: Vec<u32> = collect_page_artifacts(dir.path())
            .unwrap()
            .iter()
            .map(|a| a.page_index)
            .collect();
        assert_eq!(pages, [1, 2, 10]);
    }

    #[test]
    fn test_missing_pages_reports_gaps() {
        let artifacts: Vec<PageArtifactFile> = [1, 2, 5]
            .into_iter()
            .map(|page_index| PageArtifactFile {
                page_index,
                path: PathBuf::from(format!("image{page_index}.png")),
            })
            .collect();
        assert_eq!(missing_pages(&artifacts), [3, 4]);
        assert!(missing_pages(&[]).is_empty());
    }

    #[test]
    fn test_assemble_empty_dir_is_no_pages() {
        let dir = tempfile::tempdir().unwrap();
        let err = assemble_document(dir.path(), &dir.path().join("out.pdf"), &AssemblySettings::default())
            .unwrap_err();
        assert!(matches!(err, AssemblyError::NoPages { .. }));
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn test_assemble_skips_existing_output_without_reading_pages() {
        let dir = tempfile::tempdir().unwrap();
        // Not a valid image; it would fail if decoded.
        touch(dir.path(), "image1.png");
        let output = dir.path().join("out.pdf");
        std::fs::write(&output, b"existing").unwrap();

        let outcome = assemble_document(dir.path(), &output, &AssemblySettings::default()).unwrap();
        assert!(matches!(outcome, AssemblyOutcome::Skipped { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"existing");
    }

    #[test]
    fn test_assemble_bad_image_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "image1.png");
        let output = dir.path().join("out.pdf");
        let err = assemble_document(dir.path(), &output, &AssemblySettings::default()).unwrap_err();
        assert!(matches!(err, AssemblyError::Image { .. }));
        assert!(!output.exists());
    }
}
