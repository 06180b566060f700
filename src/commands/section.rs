use crate::extractor::{Extraction, PageRangeExtractor};
use crate::license::License;
use crate::page_range::PageRange;
use anyhow::{Context, Result};
use std::path::Path;

pub fn run<P: AsRef<Path>>(
    license: &License,
    path: P,
    range: PageRange,
    output: Option<&Path>,
) -> Result<Extraction> {
    let path = path.as_ref();
    let extractor = PageRangeExtractor::new(license);

    let extraction = match output {
        Some(output) => extractor.extract_to(path, range, output),
        None => extractor.extract(path, range),
    }
    .with_context(|| format!("Failed to extract pages {} from {}", range, path.display()))?;

    println!(
        "Saved {} of {} page(s) to {}",
        extraction.page_count,
        extraction.source_page_count,
        extraction.output_path.display()
    );

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::exit_code_for;
    use crate::license::LicenseKey;
    use crate::pdf::testing::{sample_pdf, write_pdf};

    #[test]
    fn test_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_pdf(dir.path(), "in.pdf", &mut sample_pdf(5));
        let output = dir.path().join("chapter.pdf");
        let license = License::register(LicenseKey::new("K-1").unwrap()).unwrap();

        let extraction =
            run(&license, &source, PageRange::new(2, 3), Some(output.as_path())).unwrap();
        assert_eq!(extraction.output_path, output);
        assert_eq!(extraction.page_count, 2);
        assert!(!dir.path().join("in_output.pdf").exists());
    }

    #[test]
    fn test_failure_keeps_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let license = License::register(LicenseKey::new("K-1").unwrap()).unwrap();

        let err = run(&license, dir.path().join("nope.pdf"), PageRange::new(1, 1), None)
            .unwrap_err();
        assert_eq!(exit_code_for(&err), 4);
    }
}
