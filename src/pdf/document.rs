use crate::error::SectionError;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// A loaded source PDF. The file is read in full by `open`; the parsed
/// object graph is released when the handle is dropped.
pub struct PdfDocument {
    pub doc: Document,
    pub path: PathBuf,
    /// Page object ids in page order, collected once at load
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SectionError> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| SectionError::source_unreadable(path, e))?;
        // get_pages is keyed by page number, so values come out in page order
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        log::info!(
            "Loaded {} (PDF {}, {} pages)",
            path.display(),
            doc.version,
            pages.len()
        );
        Ok(PdfDocument {
            doc,
            path: path.to_path_buf(),
            pages,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Object id of the page at zero-based `index`
    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    /// Get metadata from the document info dictionary
    pub fn get_info(&self) -> PdfInfo {
        let mut info = PdfInfo::default();

        let dict = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(info_ref)) => self.doc.get_dictionary(*info_ref).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        };

        if let Some(dict) = dict {
            info.title = get_string_from_dict(dict, b"Title");
            info.author = get_string_from_dict(dict, b"Author");
            info.creator = get_string_from_dict(dict, b"Creator");
            info.producer = get_string_from_dict(dict, b"Producer");
            info.creation_date = get_string_from_dict(dict, b"CreationDate");
            info.mod_date = get_string_from_dict(dict, b"ModDate");
            info.subject = get_string_from_dict(dict, b"Subject");
            info.keywords = get_string_from_dict(dict, b"Keywords");
        }

        info.version = self.doc.version.clone();
        info.page_count = self.page_count();
        info
    }
}

#[derive(Debug, Default, Clone)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub version: String,
    pub page_count: u32,
}

fn get_string_from_dict(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        _ => None,
    })
}

fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        // PDFDocEncoding, approximated as Latin-1
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}
