use crate::error::SectionError;
use crate::license::License;
use crate::page_range::PageRange;
use crate::pdf::{OutputDocument, PdfDocument};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;

const SOURCE_SUFFIX: &str = ".pdf";
const OUTPUT_SUFFIX: &str = "_output.pdf";

/// Result of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub output_path: PathBuf,
    pub page_count: u32,
    pub source_page_count: u32,
}

/// Copies a contiguous range of pages out of a PDF into a new file.
pub struct PageRangeExtractor<'a> {
    license: &'a License,
}

impl<'a> PageRangeExtractor<'a> {
    pub fn new(license: &'a License) -> Self {
        PageRangeExtractor { license }
    }

    /// Extract next to the source, at [`derive_output_path`].
    pub fn extract(&self, source: &Path, range: PageRange) -> Result<Extraction, SectionError> {
        self.extract_to(source, range, &derive_output_path(source))
    }

    pub fn extract_to(
        &self,
        source: &Path,
        range: PageRange,
        output: &Path,
    ) -> Result<Extraction, SectionError> {
        log::debug!(
            "Extracting pages {} of {} (license {:?})",
            range,
            source.display(),
            self.license.key()
        );

        let (bytes, page_count, source_page_count) = {
            let doc = PdfDocument::open(source)?;
            let total = doc.page_count();
            if range.expected_count(total) == 0 {
                log::warn!(
                    "Page range {} selects no pages of {} ({} pages)",
                    range,
                    source.display(),
                    total
                );
            }

            let mut new_doc = OutputDocument::new(&doc.doc.version);
            for index in range.selected_indices(total) {
                new_doc.import_page(&doc, index)?;
            }
            let page_count = new_doc.page_count();
            let bytes = new_doc.into_bytes().map_err(|e| {
                SectionError::output_write(output, std::io::Error::other(e.to_string()))
            })?;
            (bytes, page_count, total)
        };

        write_atomically(output, &bytes)?;
        log::info!(
            "Wrote {} ({} bytes, {} pages)",
            output.display(),
            bytes.len(),
            page_count
        );

        Ok(Extraction {
            output_path: output.to_path_buf(),
            page_count,
            source_page_count,
        })
    }
}

/// Replace the first `.pdf` in the path with `_output.pdf`.
///
/// The replacement is a plain substring replace over the whole path, so a
/// directory such as `my.pdf-archive/` is affected too. Paths with no `.pdf`
/// at all get `_output.pdf` appended so the source is never overwritten.
/// On Unix the path bytes are searched directly, so non-UTF-8 paths are
/// handled the same way; elsewhere such paths take the append route.
pub fn derive_output_path(source: &Path) -> PathBuf {
    replace_first_suffix(source).unwrap_or_else(|| {
        let mut appended = OsString::from(source.as_os_str());
        appended.push(OUTPUT_SUFFIX);
        PathBuf::from(appended)
    })
}

#[cfg(unix)]
fn replace_first_suffix(source: &Path) -> Option<PathBuf> {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let bytes = source.as_os_str().as_bytes();
    let needle = SOURCE_SUFFIX.as_bytes();
    let at = bytes.windows(needle.len()).position(|w| w == needle)?;

    let mut replaced = Vec::with_capacity(bytes.len() + OUTPUT_SUFFIX.len());
    replaced.extend_from_slice(&bytes[..at]);
    replaced.extend_from_slice(OUTPUT_SUFFIX.as_bytes());
    replaced.extend_from_slice(&bytes[at + needle.len()..]);
    Some(PathBuf::from(OsString::from_vec(replaced)))
}

#[cfg(not(unix))]
fn replace_first_suffix(source: &Path) -> Option<PathBuf> {
    let s = source.to_str()?;
    s.contains(SOURCE_SUFFIX)
        .then(|| PathBuf::from(s.replacen(SOURCE_SUFFIX, OUTPUT_SUFFIX, 1)))
}

/// Write `bytes` to a temporary file beside `path`, then rename it into
/// place, replacing any existing file.
///
/// A replaced file keeps its permissions; a new one gets the usual
/// `0o666` less the umask.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SectionError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let fail = |e: std::io::Error| SectionError::output_write(path, e);
    let existing = std::fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut builder = Builder::new();
    builder.prefix(".pdftools");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut file = builder.tempfile_in(dir).map_err(fail)?;
    file.write_all(bytes).map_err(fail)?;
    if let Some(permissions) = existing {
        file.as_file().set_permissions(permissions).map_err(fail)?;
    }
    file.as_file().sync_all().map_err(fail)?;
    file.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::LicenseKey;
    use crate::pdf::testing::{page_content, page_contents, sample_pdf, write_pdf};

    fn license() -> License {
        License::register(LicenseKey::new("TEST-LICENSE").unwrap()).unwrap()
    }

    #[test]
    fn test_extract_middle_pages() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "report.pdf", &mut sample_pdf(10));
        let license = license();

        let result = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(3, 5))
            .unwrap();

        assert_eq!(result.output_path, dir.path().join("report_output.pdf"));
        assert_eq!(result.page_count, 3);
        assert_eq!(result.source_page_count, 10);
        assert_eq!(
            page_contents(&result.output_path),
            vec![page_content(3), page_content(4), page_content(5)]
        );
    }

    #[test]
    fn test_upper_bound_beyond_document() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "all.pdf", &mut sample_pdf(10));
        let license = license();

        let result = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(1, 20))
            .unwrap();

        assert_eq!(result.page_count, 10);
        assert_eq!(page_contents(&result.output_path), page_contents(&source));
    }

    #[test]
    fn test_single_page_range() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "one.pdf", &mut sample_pdf(4));
        let license = license();
        let extractor = PageRangeExtractor::new(&license);

        let inside = extractor.extract(&source, PageRange::new(2, 2)).unwrap();
        assert_eq!(page_contents(&inside.output_path), vec![page_content(2)]);

        let outside = extractor.extract(&source, PageRange::new(9, 9)).unwrap();
        assert_eq!(outside.page_count, 0);
    }

    #[test]
    fn test_inverted_range_writes_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "inv.pdf", &mut sample_pdf(10));
        let license = license();

        let result = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(5, 3))
            .unwrap();

        assert_eq!(result.page_count, 0);
        let doc = lopdf::Document::load(&result.output_path).unwrap();
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn test_output_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "same.pdf", &mut sample_pdf(6));
        let license = license();
        let extractor = PageRangeExtractor::new(&license);

        let first = extractor.extract(&source, PageRange::new(2, 4)).unwrap();
        let first_bytes = std::fs::read(&first.output_path).unwrap();
        let second = extractor.extract(&source, PageRange::new(2, 4)).unwrap();
        let second_bytes = std::fs::read(&second.output_path).unwrap();

        assert_eq!(first.output_path, second.output_path);
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_existing_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "old.pdf", &mut sample_pdf(3));
        std::fs::write(dir.path().join("old_output.pdf"), b"stale").unwrap();
        let license = license();

        let result = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(1, 1))
            .unwrap();
        assert_eq!(page_contents(&result.output_path), vec![page_content(1)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_output_follows_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "perm.pdf", &mut sample_pdf(2));
        let plain = dir.path().join("plain");
        std::fs::write(&plain, b"x").unwrap();
        let license = license();

        let result = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(1, 2))
            .unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&result.output_path), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_output_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "keep.pdf", &mut sample_pdf(2));
        let output = dir.path().join("keep_output.pdf");
        std::fs::write(&output, b"old").unwrap();
        std::fs::set_permissions(&output, std::fs::Permissions::from_mode(0o640)).unwrap();
        let license = license();

        PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(1, 1))
            .unwrap();

        let mode = std::fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_missing_source_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ghost.pdf");
        let license = license();

        let err = PageRangeExtractor::new(&license)
            .extract(&source, PageRange::new(1, 2))
            .unwrap_err();

        assert!(matches!(err, SectionError::SourceUnreadable { .. }));
        assert!(!dir.path().join("ghost_output.pdf").exists());
    }

    #[test]
    fn test_unwritable_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "src.pdf", &mut sample_pdf(2));
        let output = dir.path().join("no-such-dir").join("out.pdf");
        let license = license();

        let err = PageRangeExtractor::new(&license)
            .extract_to(&source, PageRange::new(1, 2), &output)
            .unwrap_err();

        assert_eq!(err.exit_code(), 5);
        assert!(!output.exists());
    }

    #[test]
    fn test_derive_output_path() {
        assert_eq!(
            derive_output_path(Path::new("/docs/book.pdf")),
            PathBuf::from("/docs/book_output.pdf")
        );
        // only the first occurrence is replaced, even inside a directory name
        assert_eq!(
            derive_output_path(Path::new("/my.pdf-archive/doc.pdf")),
            PathBuf::from("/my_output.pdf-archive/doc.pdf")
        );
        assert_eq!(
            derive_output_path(Path::new("scan.PDF")),
            PathBuf::from("scan.PDF_output.pdf")
        );
        assert_eq!(
            derive_output_path(Path::new("notes")),
            PathBuf::from("notes_output.pdf")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_derive_output_path_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let source = Path::new(OsStr::from_bytes(b"/scans/caf\xe9.pdf"));
        let expected = Path::new(OsStr::from_bytes(b"/scans/caf\xe9_output.pdf"));
        assert_eq!(derive_output_path(source), expected.to_path_buf());
    }
}
