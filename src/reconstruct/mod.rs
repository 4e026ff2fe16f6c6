//! Document model to PDF reconstruction.
//!
//! Every page is rebuilt at its declared size. Text runs are drawn first, in
//! model order, each in its own text object with one of four fixed faces;
//! images are drawn after all text. The output is not byte-compatible with
//! any source PDF the model came from.

mod fonts;
mod options;

pub use fonts::{FontResolver, FontStyle, StandardFontTable};
pub use options::ReconstructOptions;

use std::io::Write;
use std::sync::Arc;

use crate::engine::{PageBuilder, PdfWriter};
use crate::error::{Error, Result};
use crate::metadata;
use crate::model::{Document, Image, Page, StyledTextRun, TextColor};

/// Builds PDF bytes from a [`Document`].
#[derive(Clone)]
pub struct Reconstructor {
    fonts: Arc<dyn FontResolver>,
    options: ReconstructOptions,
}

impl Reconstructor {
    /// Create a reconstructor drawing with the Times faces.
    pub fn new() -> Self {
        Self {
            fonts: StandardFontTable::shared(),
            options: ReconstructOptions::default(),
        }
    }

    /// Set reconstruction options.
    pub fn with_options(mut self, options: ReconstructOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the font table.
    pub fn with_fonts<F: FontResolver + 'static>(mut self, fonts: F) -> Self {
        self.fonts = Arc::new(fonts);
        self
    }

    pub fn options(&self) -> &ReconstructOptions {
        &self.options
    }

    /// Build the PDF in memory.
    pub fn reconstruct(&self, document: &Document) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reconstruct_to(document, &mut buf)?;
        Ok(buf)
    }

    /// Build the PDF into a sink.
    ///
    /// The whole model is checked before anything is written, so an invalid
    /// page never leaves a truncated document in `target`.
    pub fn reconstruct_to<W: Write>(&self, document: &Document, target: &mut W) -> Result<()> {
        validate(document)?;

        let mut writer = PdfWriter::new(&self.options.pdf_version)
            .with_compression(self.options.compress);
        if let Some(metadata) = &document.metadata {
            metadata::apply_to_info(writer.info_mut(), metadata);
        }

        for page in &document.pages {
            self.write_page(&mut writer, page)?;
        }
        log::debug!("reconstructed {} page(s)", writer.page_count());
        writer.write_to(target)
    }

    fn write_page(&self, writer: &mut PdfWriter, page: &Page) -> Result<()> {
        let mut builder = writer.begin_page(page.width, page.height);
        for run in &page.texts {
            self.draw_text(&mut builder, run);
        }
        for image in &page.images {
            draw_image(&mut builder, page.page_number, image);
        }
        builder.finish()
    }

    fn draw_text(&self, builder: &mut PageBuilder<'_>, run: &StyledTextRun) {
        let style = FontStyle::from_flags(run.bold, run.italic);
        let mut text = builder.begin_text();
        text.set_font(self.fonts.base_font(style), run.font_size);
        // Unset leaves the default fill, which renders black.
        if let TextColor::Rgb { red, green, blue } = run.color {
            text.set_fill_rgb(red, green, blue);
        }
        text.new_line_at_offset(run.x, run.y);
        text.show_text(&run.text);
    }
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw one image, logging and skipping it when it cannot be embedded.
fn draw_image(builder: &mut PageBuilder<'_>, page_number: u32, image: &Image) {
    let bytes = match image.decode_data() {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("page {}: skipping image {}: {}", page_number, image.name, e);
            return;
        }
    };
    let (width, height) = image.draw_size();
    if let Err(e) = builder.draw_image(&image.format, &bytes, image.x, image.y, width, height) {
        log::warn!("page {}: skipping image {}: {}", page_number, image.name, e);
    }
}

fn validate(document: &Document) -> Result<()> {
    for page in &document.pages {
        page.validate()?;
        for run in &page.texts {
            if !(run.font_size.is_finite() && run.font_size > 0.0) {
                return Err(Error::InvalidModel(format!(
                    "page {}: text run {:?} has font size {}",
                    page.page_number, run.text, run.font_size
                )));
            }
            if let TextColor::Rgb { red, green, blue } = run.color {
                TextColor::rgb(red, green, blue)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;
    use lopdf::content::Content;
    use lopdf::Document as LopdfDocument;

    fn uncompressed() -> Reconstructor {
        Reconstructor::new().with_options(ReconstructOptions::new().with_compression(false))
    }

    /// Operators of the first page's content stream.
    fn page_operators(pdf: &[u8]) -> Vec<String> {
        let doc = LopdfDocument::load_mem(pdf).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content.operations.into_iter().map(|op| op.operator).collect()
    }

    fn base_fonts(pdf: &[u8]) -> Vec<String> {
        let doc = LopdfDocument::load_mem(pdf).unwrap();
        let mut names: Vec<String> = doc
            .objects
            .values()
            .filter_map(|obj| obj.as_dict().ok())
            .filter(|dict| matches!(dict.get(b"Type").and_then(|t| t.as_name()), Ok(b"Font")))
            .filter_map(|dict| dict.get(b"BaseFont").and_then(|n| n.as_name()).ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();
        names.sort();
        names
    }

    fn single_run_document(run: StyledTextRun) -> Document {
        let mut page = Page::letter(1);
        page.add_text(run);
        let mut doc = Document::new();
        doc.add_page(page);
        doc
    }

    #[test]
    fn test_bold_unset_color_uses_bold_face_without_fill() {
        let run = StyledTextRun::new("Title", "Arial", 18.0)
            .with_style(true, false)
            .at(72.0, 720.0);
        let pdf = uncompressed().reconstruct(&single_run_document(run)).unwrap();

        assert_eq!(base_fonts(&pdf), vec!["Times-Bold".to_string()]);
        let ops = page_operators(&pdf);
        assert_eq!(ops, vec!["q", "BT", "Tf", "Td", "Tj", "ET", "Q"]);
    }

    #[test]
    fn test_explicit_color_emits_fill() {
        let run = StyledTextRun::new("x", "Arial", 10.0)
            .with_color(TextColor::rgb(1.0, 0.0, 0.0).unwrap());
        let pdf = uncompressed().reconstruct(&single_run_document(run)).unwrap();
        assert_eq!(
            page_operators(&pdf),
            vec!["q", "BT", "Tf", "rg", "Td", "Tj", "ET", "Q"]
        );
    }

    #[test]
    fn test_four_faces_shared_across_pages() {
        let mut doc = Document::new();
        for (n, (bold, italic)) in [(false, false), (true, false), (false, true), (true, true)]
            .into_iter()
            .enumerate()
        {
            let mut page = Page::letter(n as u32 + 1);
            page.add_text(StyledTextRun::new("a", "Any", 12.0).with_style(bold, italic));
            page.add_text(StyledTextRun::new("b", "Any", 12.0).with_style(bold, italic));
            doc.add_page(page);
        }
        let pdf = Reconstructor::new().reconstruct(&doc).unwrap();
        assert_eq!(
            base_fonts(&pdf),
            vec!["Times-Bold", "Times-BoldItalic", "Times-Italic", "Times-Roman"]
        );
    }

    #[test]
    fn test_corrupt_image_is_skipped() {
        let mut page = Page::letter(1);
        page.add_text(StyledTextRun::new("kept", "Times-Roman", 12.0));
        let mut broken = Image::from_raster("broken.png", "png", 2, 2, &[0]);
        broken.data = "***".to_string();
        page.add_image(broken);
        page.add_image(Image::from_raster("junk.png", "png", 2, 2, b"not a png"));
        let mut doc = Document::new();
        doc.add_page(page);

        let pdf = uncompressed().reconstruct(&doc).unwrap();
        let ops = page_operators(&pdf);
        assert!(!ops.iter().any(|op| op == "Do"));
        assert!(ops.iter().any(|op| op == "Tj"));
    }

    #[test]
    fn test_invalid_page_size_rejected() {
        let mut doc = Document::new();
        doc.add_page(Page::new(1, 0.0, 792.0));
        let mut sink = Vec::new();
        assert!(matches!(
            Reconstructor::new().reconstruct_to(&doc, &mut sink),
            Err(Error::InvalidModel(_))
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_invalid_run_rejected() {
        let doc = single_run_document(StyledTextRun::new("x", "F", 0.0));
        assert!(matches!(
            Reconstructor::new().reconstruct(&doc),
            Err(Error::InvalidModel(_))
        ));

        let run = StyledTextRun::new("x", "F", 12.0).with_color(TextColor::Rgb {
            red: 2.0,
            green: 0.0,
            blue: 0.0,
        });
        assert!(matches!(
            Reconstructor::new().reconstruct(&single_run_document(run)),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn test_metadata_written_to_info() {
        let mut doc = Document::new();
        doc.add_page(Page::letter(1));
        doc.metadata = Some(Metadata {
            title: Some("Quarterly".to_string()),
            total_pages: 99,
            ..Default::default()
        });
        let pdf = Reconstructor::new().reconstruct(&doc).unwrap();

        let parsed = LopdfDocument::load_mem(&pdf).unwrap();
        let info = parsed.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = parsed.get_dictionary(info).unwrap();
        assert!(info.get(b"Title").is_ok());
        assert!(info.get(b"Pages").is_err());
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_version_and_empty_document() {
        let pdf = Reconstructor::new()
            .with_options(ReconstructOptions::new().with_version("1.4"))
            .reconstruct(&Document::new())
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4"));
        let parsed = LopdfDocument::load_mem(&pdf).unwrap();
        assert!(parsed.get_pages().is_empty());
    }
}
