//! PDF to document model extraction.
//!
//! The [`Extractor`] walks a [`PdfSource`] page by page. Every shown glyph
//! becomes one [`StyledTextRun`]; every image XObject in the page resources
//! becomes one [`Image`]. A page whose text cannot be read fails the whole
//! extraction, while an image that cannot be decoded is dropped and logged.

mod options;

pub use options::ExtractOptions;

use std::collections::HashMap;
use std::sync::Arc;

use crate::color;
use crate::engine::{PdfSource, TextPosition};
use crate::error::Result;
use crate::metadata;
use crate::model::{Document, Image, Page, StyledTextRun};
use crate::style::{FontNameHeuristic, StyleInference};

/// Font name recorded for glyphs without a resolved font.
pub const UNKNOWN_FONT: &str = "Unknown";

/// Builds a [`Document`] from a parsed PDF.
#[derive(Clone)]
pub struct Extractor {
    style: Arc<dyn StyleInference>,
    options: ExtractOptions,
}

impl Extractor {
    /// Create an extractor using the font-name heuristic.
    pub fn new() -> Self {
        Self {
            style: Arc::new(FontNameHeuristic),
            options: ExtractOptions::default(),
        }
    }

    /// Set extraction options.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the bold/italic inference strategy.
    pub fn with_style<S: StyleInference + 'static>(mut self, style: S) -> Self {
        self.style = Arc::new(style);
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every page and the document metadata.
    pub fn extract<S: PdfSource + ?Sized>(&self, source: &S) -> Result<Document> {
        let page_count = source.page_count();
        log::debug!("extracting {} page(s)", page_count);

        let mut document = Document::new();
        for index in 0..page_count {
            document.add_page(self.extract_page(source, index)?);
        }
        document.metadata = Some(metadata::to_model(&source.info(), document.page_count()));
        Ok(document)
    }

    fn extract_page<S: PdfSource + ?Sized>(&self, source: &S, index: usize) -> Result<Page> {
        let page_number = index as u32 + 1;
        let (width, height) = source.page_size(index)?;
        let content = source.page_content(index)?;

        let mut page = Page::new(page_number, width, height);
        page.texts = content
            .glyphs
            .iter()
            .map(|glyph| self.text_run(glyph))
            .collect();
        if self.options.sort_by_position {
            // Stable: glyphs sharing a baseline position keep stream order.
            page.texts
                .sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
        }

        if self.options.extract_images {
            page.images = self.extract_images(source, index, &content.image_origins)?;
        }

        log::debug!(
            "page {}: {} text run(s), {} image(s)",
            page_number,
            page.texts.len(),
            page.images.len()
        );
        Ok(page)
    }

    fn text_run(&self, glyph: &TextPosition) -> StyledTextRun {
        let font_name = glyph.font.as_ref().and_then(|f| f.name.as_deref());
        StyledTextRun::new(
            glyph.unicode.clone(),
            font_name.unwrap_or(UNKNOWN_FONT),
            glyph.font_size,
        )
        .with_style(self.style.is_bold(font_name), self.style.is_italic(font_name))
        .at(glyph.x, glyph.y)
        .with_extent(glyph.width, glyph.height)
        .with_color(color::normalize(glyph.fill_color.as_ref()))
    }

    /// Decode the page's images in resource order.
    ///
    /// Numbering follows resource order, so an image that fails to decode
    /// still uses up its index.
    fn extract_images<S: PdfSource + ?Sized>(
        &self,
        source: &S,
        index: usize,
        origins: &HashMap<String, (f32, f32)>,
    ) -> Result<Vec<Image>> {
        let page_number = index as u32 + 1;
        let resources = source.image_resources(index)?;

        let mut images = Vec::with_capacity(resources.len());
        for (position, resource) in resources.iter().enumerate() {
            let raster = match source.decode_image(resource) {
                Ok(raster) => raster,
                Err(e) => {
                    log::warn!(
                        "page {}: skipping image /{}: {}",
                        page_number,
                        resource.name,
                        e
                    );
                    continue;
                }
            };
            let name = Image::synthesized_name(page_number, position + 1, &raster.format);
            let (x, y) = origins.get(&resource.name).copied().unwrap_or((0.0, 0.0));
            images.push(
                Image::from_raster(
                    name,
                    raster.format.as_str(),
                    raster.width,
                    raster.height,
                    &raster.bytes,
                )
                .at(x, y),
            );
        }
        Ok(images)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        ColorState, FontRef, ImageResource, InfoDictionary, PageContent, RasterImage, TITLE,
    };
    use crate::error::{Error, ImageDecodeError};
    use crate::model::TextColor;

    /// In-memory source with a fixed set of pages.
    #[derive(Default)]
    struct MockSource {
        pages: Vec<MockPage>,
        info: InfoDictionary,
    }

    #[derive(Default)]
    struct MockPage {
        size: (f32, f32),
        content: PageContent,
        images: Vec<(ImageResource, Option<RasterImage>)>,
        unreadable: bool,
    }

    impl PdfSource for MockSource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, index: usize) -> Result<(f32, f32)> {
            Ok(self.pages[index].size)
        }

        fn page_content(&self, index: usize) -> Result<PageContent> {
            let page = &self.pages[index];
            if page.unreadable {
                return Err(Error::SourceRead("broken content stream".to_string()));
            }
            Ok(page.content.clone())
        }

        fn image_resources(&self, index: usize) -> Result<Vec<ImageResource>> {
            Ok(self.pages[index]
                .images
                .iter()
                .map(|(resource, _)| resource.clone())
                .collect())
        }

        fn decode_image(
            &self,
            image: &ImageResource,
        ) -> std::result::Result<RasterImage, ImageDecodeError> {
            self.pages
                .iter()
                .flat_map(|p| p.images.iter())
                .find(|(resource, _)| resource == image)
                .and_then(|(_, raster)| raster.clone())
                .ok_or_else(|| ImageDecodeError::Unsupported("JBIG2Decode".to_string()))
        }

        fn info(&self) -> InfoDictionary {
            self.info.clone()
        }
    }

    fn glyph(text: &str, font: Option<&str>, x: f32, y: f32) -> TextPosition {
        TextPosition {
            unicode: text.to_string(),
            font: font.map(|name| FontRef {
                name: Some(name.to_string()),
            }),
            font_size: 12.0,
            x,
            y,
            width: 6.0,
            height: 12.0,
            fill_color: None,
        }
    }

    fn image_resource(name: &str, id: u32) -> ImageResource {
        ImageResource {
            name: name.to_string(),
            object_id: (id, 0),
            width: 4,
            height: 2,
        }
    }

    fn raster(format: &str) -> RasterImage {
        RasterImage {
            format: format.to_string(),
            width: 4,
            height: 2,
            bytes: vec![1, 2, 3],
        }
    }

    fn letter_page() -> MockPage {
        MockPage {
            size: (612.0, 792.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_pages_numbered_in_order() {
        let source = MockSource {
            pages: (0..3).map(|_| letter_page()).collect(),
            ..Default::default()
        };
        let doc = Extractor::new().extract(&source).unwrap();
        let numbers: Vec<u32> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(doc.metadata.unwrap().total_pages, 3);
    }

    #[test]
    fn test_plain_times_run_is_black() {
        let mut page = letter_page();
        page.content.glyphs.push(glyph("Hello", Some("Times-Roman"), 72.0, 700.0));
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };

        let doc = Extractor::new().extract(&source).unwrap();
        let run = &doc.pages[0].texts[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(run.font_name, "Times-Roman");
        assert_eq!(run.font_size, 12.0);
        assert!(!run.bold && !run.italic);
        assert_eq!((run.x, run.y), (72.0, 700.0));
        assert_eq!(run.color, TextColor::BLACK);
        assert_eq!(run.color.components(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_style_and_unknown_font() {
        let mut page = letter_page();
        page.content.glyphs.push(glyph("a", Some("Arial-BoldItalicMT"), 0.0, 10.0));
        page.content.glyphs.push(glyph("b", None, 10.0, 10.0));
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };

        let doc = Extractor::new().extract(&source).unwrap();
        let texts = &doc.pages[0].texts;
        assert!(texts[0].bold && texts[0].italic);
        assert_eq!(texts[1].font_name, UNKNOWN_FONT);
        assert!(!texts[1].bold && !texts[1].italic);
    }

    #[test]
    fn test_color_from_graphics_state() {
        let mut page = letter_page();
        let mut g = glyph("x", Some("Helvetica"), 0.0, 0.0);
        g.fill_color = Some(ColorState::gray(0.4));
        page.content.glyphs.push(g);
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };

        let doc = Extractor::new().extract(&source).unwrap();
        assert_eq!(doc.pages[0].texts[0].color.components(), (0.4, 0.4, 0.4));
    }

    #[test]
    fn test_sorting_by_position() {
        let mut page = letter_page();
        page.content.glyphs.push(glyph("low", None, 10.0, 100.0));
        page.content.glyphs.push(glyph("right", None, 50.0, 700.0));
        page.content.glyphs.push(glyph("left", None, 10.0, 700.0));
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };

        let sorted = Extractor::new().extract(&source).unwrap();
        assert_eq!(sorted.plain_text(), "leftrightlow");

        let unsorted = Extractor::new()
            .with_options(ExtractOptions::new().unsorted())
            .extract(&source)
            .unwrap();
        assert_eq!(unsorted.plain_text(), "lowrightleft");
    }

    #[test]
    fn test_image_names_follow_resource_order() {
        let mut page = letter_page();
        page.images = vec![
            (image_resource("Im0", 10), Some(raster("png"))),
            (image_resource("Im1", 11), Some(raster("jpg"))),
            (image_resource("Im2", 12), Some(raster("png"))),
        ];
        page.content
            .image_origins
            .insert("Im1".to_string(), (100.0, 300.0));
        let source = MockSource {
            pages: vec![letter_page(), page],
            ..Default::default()
        };

        let doc = Extractor::new().extract(&source).unwrap();
        let names: Vec<&str> = doc.pages[1].images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["image_2_1.png", "image_2_2.jpg", "image_2_3.png"]);

        let placed = &doc.pages[1].images[1];
        assert_eq!((placed.x, placed.y), (100.0, 300.0));
        assert_eq!(placed.format, "jpg");
        assert_eq!(placed.decode_data().unwrap(), vec![1, 2, 3]);
        assert!(placed.placement_width.is_none());
    }

    #[test]
    fn test_failed_image_is_skipped() {
        let mut page = letter_page();
        page.images = vec![
            (image_resource("Im0", 10), None),
            (image_resource("Im1", 11), Some(raster("png"))),
        ];
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };

        let doc = Extractor::new().extract(&source).unwrap();
        let images = &doc.pages[0].images;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "image_1_2.png");
    }

    #[test]
    fn test_images_disabled() {
        let mut page = letter_page();
        page.images = vec![(image_resource("Im0", 10), Some(raster("png")))];
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };
        let doc = Extractor::new()
            .with_options(ExtractOptions::new().with_images(false))
            .extract(&source)
            .unwrap();
        assert!(doc.pages[0].images.is_empty());
    }

    #[test]
    fn test_unreadable_page_fails_document() {
        let broken = MockPage {
            unreadable: true,
            ..letter_page()
        };
        let source = MockSource {
            pages: vec![letter_page(), broken],
            ..Default::default()
        };
        assert!(matches!(
            Extractor::new().extract(&source),
            Err(Error::SourceRead(_))
        ));
    }

    #[test]
    fn test_metadata_from_info() {
        let mut info = InfoDictionary::new();
        info.set(TITLE, "Minutes");
        let source = MockSource {
            pages: vec![letter_page()],
            info,
        };
        let doc = Extractor::new().extract(&source).unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Minutes"));
        assert_eq!(metadata.total_pages, 1);
    }

    #[test]
    fn test_custom_style_inference() {
        struct AlwaysBold;
        impl StyleInference for AlwaysBold {
            fn is_bold(&self, _: Option<&str>) -> bool {
                true
            }
            fn is_italic(&self, _: Option<&str>) -> bool {
                false
            }
        }

        let mut page = letter_page();
        page.content.glyphs.push(glyph("a", Some("Courier"), 0.0, 0.0));
        let source = MockSource {
            pages: vec![page],
            ..Default::default()
        };
        let doc = Extractor::new().with_style(AlwaysBold).extract(&source).unwrap();
        assert!(doc.pages[0].texts[0].bold);
    }
}
