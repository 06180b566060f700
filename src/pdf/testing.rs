//! Fixture builders shared by the unit tests.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

/// Content stream bytes drawn on 1-based page `n` of a sample document
pub fn page_content(n: u32) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n).into_bytes()
}

/// A document with `num_pages` pages. `Resources` and `MediaBox` live on the
/// page tree root so that every page inherits them, and all pages share one
/// font object.
pub fn sample_pdf(num_pages: u32) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let page_ids: Vec<ObjectId> = (1..=num_pages)
        .map(|n| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(n)));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
        })
        .collect();

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        "Count" => num_pages as i64,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn write_pdf(dir: &Path, name: &str, doc: &mut Document) -> PathBuf {
    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

/// Decoded content of every page of the document at `path`, in page order
pub fn page_contents(path: &Path) -> Vec<Vec<u8>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| doc.get_page_content(*id).unwrap())
        .collect()
}
