pub mod document;
pub mod output;

#[cfg(test)]
pub mod testing;

pub use document::PdfDocument;
pub use output::OutputDocument;
