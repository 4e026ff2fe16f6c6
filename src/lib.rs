//! # pdfmodel
//!
//! Two-way conversion between PDF files and a structured document model.
//!
//! Extraction turns every page into styled text runs (one per glyph, with
//! font, size, bold/italic, position and RGB color) and base64-encoded images.
//! Reconstruction draws a model back into a new PDF using the standard Times
//! faces. The model serializes to JSON, so `PDF → JSON → PDF` works end to end.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfmodel::{extract_file, json, JsonFormat};
//!
//! fn main() -> pdfmodel::Result<()> {
//!     let doc = extract_file("document.pdf")?;
//!     println!("{}", json::to_json(&doc, JsonFormat::Pretty)?);
//!
//!     let rebuilt = pdfmodel::reconstruct(&doc)?;
//!     std::fs::write("rebuilt.pdf", rebuilt)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Fidelity
//!
//! - Only document-model round trips are exact; regenerated PDFs differ from
//!   their source byte for byte.
//! - Reconstruction renders every run in one of four Times faces; the
//!   recorded font name is kept in the model only.
//! - Images are drawn after all text on a page.
//! - Vector graphics, annotations and forms are not carried over.

pub mod color;
pub mod engine;
pub mod error;
pub mod extract;
pub mod json;
pub mod metadata;
pub mod model;
pub mod reconstruct;
pub mod style;

// Re-export commonly used types
pub use engine::{LopdfSource, PdfSource};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Extractor};
pub use json::JsonFormat;
pub use model::{Document, Image, Metadata, Page, StyledTextRun, TextColor};
pub use reconstruct::{
    FontResolver, FontStyle, ReconstructOptions, Reconstructor, StandardFontTable,
};
pub use style::{FontNameHeuristic, StyleInference};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Extract a document model from PDF bytes.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::extract_bytes;
///
/// let data = std::fs::read("document.pdf").unwrap();
/// let doc = extract_bytes(&data).unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn extract_bytes(data: &[u8]) -> Result<Document> {
    let source = LopdfSource::load_bytes(data)?;
    Extractor::new().extract(&source)
}

/// Extract a document model from a PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::extract_file;
///
/// let doc = extract_file("document.pdf").unwrap();
/// println!("{}", doc.plain_text());
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let source = LopdfSource::load_file(path)?;
    Extractor::new().extract(&source)
}

/// Extract a document model from a reader.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::extract_reader;
/// use std::fs::File;
///
/// let file = File::open("document.pdf").unwrap();
/// let doc = extract_reader(file).unwrap();
/// ```
pub fn extract_reader<R: Read>(reader: R) -> Result<Document> {
    let source = LopdfSource::load_reader(reader)?;
    Extractor::new().extract(&source)
}

/// Build PDF bytes from a document model.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::{reconstruct, Document, Page, StyledTextRun};
///
/// let mut page = Page::letter(1);
/// page.add_text(StyledTextRun::new("Hello", "Times-Roman", 12.0).at(72.0, 700.0));
/// let mut doc = Document::new();
/// doc.add_page(page);
///
/// std::fs::write("hello.pdf", reconstruct(&doc).unwrap()).unwrap();
/// ```
pub fn reconstruct(document: &Document) -> Result<Vec<u8>> {
    Reconstructor::new().reconstruct(document)
}

/// Build a PDF from a document model into a sink.
pub fn reconstruct_to<W: Write>(document: &Document, target: &mut W) -> Result<()> {
    Reconstructor::new().reconstruct_to(document, target)
}

/// Convert a PDF file to a pretty-printed JSON file.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::pdf_to_json_file;
///
/// pdf_to_json_file("report.pdf", "report.json").unwrap();
/// ```
pub fn pdf_to_json_file<P: AsRef<Path>, Q: AsRef<Path>>(pdf: P, json: Q) -> Result<()> {
    let doc = extract_file(pdf)?;
    let mut out = BufWriter::new(File::create(json)?);
    json::to_writer(&doc, JsonFormat::Pretty, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Read a serialized document model and write it as a PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfmodel::json_to_pdf_file;
///
/// json_to_pdf_file("report.json", "rebuilt.pdf").unwrap();
/// ```
pub fn json_to_pdf_file<P: AsRef<Path>, Q: AsRef<Path>>(json: P, pdf: Q) -> Result<()> {
    let doc = json::from_reader(BufReader::new(File::open(json)?))?;
    // Build in memory first so a failed conversion leaves no partial file.
    let bytes = reconstruct(&doc)?;
    std::fs::write(pdf, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Edge Case Tests ====================

    #[test]
    fn test_extract_bytes_empty_data() {
        let data: [u8; 0] = [];
        assert!(matches!(extract_bytes(&data), Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_extract_bytes_unknown_magic() {
        let data = b"<!DOCTYPE html><html></html>";
        assert!(matches!(extract_bytes(data), Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_extract_bytes_truncated_pdf() {
        // Header only: recognised as PDF but unreadable
        let result = extract_bytes(b"%PDF-1.7\n%test");
        assert!(matches!(result, Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_extract_reader_unknown_magic() {
        let result = extract_reader(&b"Not a PDF file"[..]);
        assert!(matches!(result, Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_extract_file_missing() {
        let result = extract_file("/nonexistent/input.pdf");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_reconstruct_then_extract() {
        let mut page = Page::letter(1);
        page.add_text(StyledTextRun::new("A", "Whatever", 12.0).at(72.0, 700.0));
        let mut doc = Document::new();
        doc.add_page(page);

        let pdf = reconstruct(&doc).unwrap();
        let back = extract_bytes(&pdf).unwrap();
        assert_eq!(back.page_count(), 1);
        assert_eq!(back.plain_text(), "A");
        assert_eq!(back.pages[0].texts[0].font_name, "Times-Roman");
    }

    #[test]
    fn test_json_format_default() {
        assert_eq!(JsonFormat::default(), JsonFormat::Pretty);
    }
}
