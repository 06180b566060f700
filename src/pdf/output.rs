use super::PdfDocument;
use crate::error::SectionError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic `/Parent` chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// A new document assembled from pages imported out of one source.
///
/// Imported objects are renumbered into this document's id space. The map
/// from source to output ids lives for the whole document, so resources
/// shared by several pages (fonts, images) are copied only once.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    id_map: BTreeMap<ObjectId, ObjectId>,
    /// Output ids handed out for pages that are referenced but not imported yet
    reserved_pages: BTreeSet<ObjectId>,
}

impl OutputDocument {
    pub fn new(version: &str) -> Self {
        let mut doc = Document::with_version(version);
        let pages_id = doc.new_object_id();
        OutputDocument {
            doc,
            pages_id,
            kids: Vec::new(),
            id_map: BTreeMap::new(),
            reserved_pages: BTreeSet::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Copy the page at zero-based `index` of `source`, appending it.
    pub fn import_page(&mut self, source: &PdfDocument, index: usize) -> Result<(), SectionError> {
        let page_id = source.page_id(index).ok_or_else(|| {
            SectionError::source_unreadable(
                &source.path,
                format!("page index {} out of range ({} pages)", index, source.page_count()),
            )
        })?;
        let page = source
            .doc
            .get_dictionary(page_id)
            .map_err(|e| SectionError::source_unreadable(&source.path, e))?;

        let new_id = match self.id_map.get(&page_id) {
            Some(id) => {
                self.reserved_pages.remove(id);
                *id
            }
            None => {
                let id = self.doc.new_object_id();
                self.id_map.insert(page_id, id);
                id
            }
        };

        let mut pending = Vec::new();
        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.remap(&source.doc, value, &mut pending));
        }
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(&source.doc, page, key) {
                copy.set(key, self.remap(&source.doc, value, &mut pending));
            }
        }
        copy.set("Parent", self.pages_id);

        while let Some(src_id) = pending.pop() {
            let object = match source.doc.get_object(src_id) {
                Ok(object) => self.remap(&source.doc, object, &mut pending),
                Err(_) => Object::Null,
            };
            self.doc.objects.insert(self.id_map[&src_id], object);
        }

        self.doc.objects.insert(new_id, Object::Dictionary(copy));
        self.kids.push(new_id);
        log::debug!(
            "Imported page {} as object {} {}",
            index + 1,
            new_id.0,
            new_id.1
        );
        Ok(())
    }

    /// Finalize the page tree, serialize, and release the document.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, lopdf::Error> {
        // Pages that were linked to but never imported
        for id in &self.reserved_pages {
            self.doc.objects.insert(*id, Object::Null);
        }

        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => self.kids.len() as i64,
            "Kids" => kids,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn remap(&mut self, source: &Document, object: &Object, pending: &mut Vec<ObjectId>) -> Object {
        match object {
            Object::Reference(id) => match self.map_reference(source, *id, pending) {
                Some(new_id) => Object::Reference(new_id),
                None => Object::Null,
            },
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.remap(source, item, pending))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.remap_dict(source, dict, pending)),
            Object::Stream(stream) => {
                let mut stream = stream.clone();
                stream.dict = self.remap_dict(source, &stream.dict, pending);
                Object::Stream(stream)
            }
            other => other.clone(),
        }
    }

    fn remap_dict(
        &mut self,
        source: &Document,
        dict: &Dictionary,
        pending: &mut Vec<ObjectId>,
    ) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.remap(source, value, pending));
        }
        copy
    }

    /// Output id for a source reference, or `None` when the target must not be
    /// carried over (page tree nodes, the catalog, dangling references).
    fn map_reference(
        &mut self,
        source: &Document,
        id: ObjectId,
        pending: &mut Vec<ObjectId>,
    ) -> Option<ObjectId> {
        if let Some(new_id) = self.id_map.get(&id) {
            return Some(*new_id);
        }

        let is_page = match source.get_object(id) {
            Ok(Object::Dictionary(dict)) => match type_name(dict) {
                Some(b"Pages") | Some(b"Catalog") => return None,
                Some(b"Page") => true,
                _ => false,
            },
            Ok(_) => false,
            Err(_) => return None,
        };

        let new_id = self.doc.new_object_id();
        self.id_map.insert(id, new_id);
        if is_page {
            self.reserved_pages.insert(new_id);
        } else {
            pending.push(id);
        }
        Some(new_id)
    }
}

fn type_name(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

fn inherited_attribute<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = match node.get(b"Parent") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok()?,
            _ => return None,
        };
        if let Ok(value) = parent.get(key) {
            return Some(value);
        }
        node = parent;
    }
    None
}
