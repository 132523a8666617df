//! Outline (bookmark) annotation from the catalog.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};
use tracing::{debug, info, instrument};

use super::{AnnotateOutcome, AssemblyError, save_atomically};
use crate::catalog::{CatalogEntry, CatalogTree};

/// Writes a copy of the PDF at `document` with an outline built from
/// `catalog` to `output`.
///
/// Entries point at their 1-based `pnum`; numbers past the last page land on
/// the last page and entries without a number on the first.
///
/// # Errors
///
/// Returns [`AssemblyError::Pdf`] when the document cannot be read or
/// written, [`AssemblyError::Io`] on filesystem failure.
#[instrument(skip(catalog), fields(document = %document.display(), output = %output.display()))]
pub fn annotate_with_outline(
    document: &Path,
    catalog: &CatalogTree,
    output: &Path,
) -> Result<AnnotateOutcome, AssemblyError> {
    if output.exists() {
        debug!("outlined document already present");
        return Ok(AnnotateOutcome::Skipped);
    }
    if catalog.is_empty() {
        debug!("catalog has no entries; no outline to attach");
        return Ok(AnnotateOutcome::NoEntries);
    }

    let mut doc = Document::load(document)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(AssemblyError::NoPages {
            dir: document.to_path_buf(),
        });
    }

    let outlines_id = doc.new_object_id();
    let mut root = dictionary! { "Type" => "Outlines" };
    if let Some(level) = build_level(&mut doc, catalog.entries(), outlines_id, &pages) {
        root.set("First", Object::Reference(level.first));
        root.set("Last", Object::Reference(level.last));
        root.set("Count", level.count);
    }
    doc.objects.insert(outlines_id, Object::Dictionary(root));

    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let pdf_catalog = doc.get_object_mut(catalog_id)?.as_dict_mut()?;
    pdf_catalog.set("Outlines", Object::Reference(outlines_id));
    pdf_catalog.set("PageMode", "UseOutlines");

    save_atomically(&mut doc, output)?;
    let entries = catalog.node_count();
    info!(entries, "outline attached");
    Ok(AnnotateOutcome::Written {
        path: output.to_path_buf(),
        entries,
    })
}

struct Level {
    first: ObjectId,
    last: ObjectId,
    count: i64,
}

/// Adds outline items for `entries` under `parent`. Nested levels start
/// collapsed.
fn build_level(
    doc: &mut Document,
    entries: &[CatalogEntry],
    parent: ObjectId,
    pages: &[ObjectId],
) -> Option<Level> {
    let ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();
    let (&first, &last) = (ids.first()?, ids.last()?);

    for (index, entry) in entries.iter().enumerate() {
        let mut item = Dictionary::new();
        item.set("Title", pdf_text(&entry.label));
        item.set("Parent", Object::Reference(parent));
        item.set(
            "Dest",
            vec![
                Object::Reference(pages[page_slot(entry.page_number, pages.len())]),
                Object::Name(b"Fit".to_vec()),
            ],
        );
        if index > 0 {
            item.set("Prev", Object::Reference(ids[index - 1]));
        }
        if let Some(next) = ids.get(index + 1) {
            item.set("Next", Object::Reference(*next));
        }
        if let Some(children) = build_level(doc, &entry.children, ids[index], pages) {
            item.set("First", Object::Reference(children.first));
            item.set("Last", Object::Reference(children.last));
            item.set("Count", -children.count);
        }
        doc.objects.insert(ids[index], Object::Dictionary(item));
    }

    Some(Level {
        first,
        last,
        count: i64::try_from(entries.len()).unwrap_or(i64::MAX),
    })
}

/// Index into the page list for 1-based `page_number`.
fn page_slot(page_number: Option<u32>, page_count: usize) -> usize {
    let last = page_count.saturating_sub(1);
    match page_number {
        Some(n) if n > 0 => usize::try_from(n - 1).map_or(last, |index| index.min(last)),
        _ => 0,
    }
}

/// PDF text string in UTF-16BE with byte order mark.
fn pdf_text(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
