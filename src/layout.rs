//! On-disk layout of a document's artifacts.

use std::path::{Path, PathBuf};

use crate::target::DocumentIdentity;

/// File name of the persisted table of contents inside the images directory.
pub const CATALOG_FILE_NAME: &str = "catalog.json";

/// Derived paths for every artifact of one document.
///
/// ```text
/// {out}/{id}_{title}_images/image{n}.png
/// {out}/{id}_{title}_images/catalog.json
/// {out}/{id}_{title}.pdf
/// {out}/{id}_{title}_toc.pdf
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Directory holding page images and the catalog.
    pub images_dir: PathBuf,
    /// Persisted table of contents.
    pub catalog_path: PathBuf,
    /// Assembled document.
    pub document_path: PathBuf,
    /// Assembled document with an outline attached.
    pub outlined_document_path: PathBuf,
}

impl ArtifactLayout {
    /// Derives the layout for `identity` under `output_dir`.
    #[must_use]
    pub fn new(output_dir: &Path, identity: &DocumentIdentity) -> Self {
        let stem = identity.file_stem();
        let images_dir = output_dir.join(format!("{stem}_images"));
        Self {
            catalog_path: images_dir.join(CATALOG_FILE_NAME),
            images_dir,
            document_path: output_dir.join(format!("{stem}.pdf")),
            outlined_document_path: output_dir.join(format!("{stem}_toc.pdf")),
        }
    }

    /// Artifact path for 1-based page `page`.
    #[must_use]
    pub fn page_path(&self, page: u32) -> PathBuf {
        self.images_dir.join(page_file_name(page))
    }
}

/// File name of the artifact for 1-based page `page`.
#[must_use]
pub fn page_file_name(page: u32) -> String {
    format!("image{page}.png")
}

/// Sibling path used while a file is being written.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Writes `bytes` to a `.part` sibling and renames it over `path`, so an
/// interrupted write never leaves a truncated file under the final name.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    std::fs::write(&partial, bytes)?;
    std::fs::rename(&partial, path)
}
