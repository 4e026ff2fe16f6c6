//! PDF engine layer.
//!
//! Wraps lopdf behind the [`PdfSource`] trait for reading and [`PdfWriter`] for
//! writing, so the extractor and reconstructor never handle lopdf objects
//! directly.

pub mod colorspace;
mod info;
mod interpreter;
mod raster;
mod source;
mod writer;

use std::collections::HashMap;

use crate::error::{ImageDecodeError, Result};

pub use colorspace::{ColorSpace, ColorState};
pub use info::{InfoDictionary, AUTHOR, CREATION_DATE, CREATOR, MOD_DATE, PRODUCER, TITLE};
pub use source::LopdfSource;
pub use writer::{PageBuilder, PdfWriter, TextObject};

/// Letter size, used when a page declares no usable media box.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// The font a glyph was shown with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontRef {
    /// The font's `/BaseFont`, when the font dictionary declares one.
    pub name: Option<String>,
}

/// One shown glyph, in page user space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPosition {
    pub unicode: String,
    pub font: Option<FontRef>,
    /// Font size after the text and transformation matrices are applied.
    pub font_size: f32,
    /// Baseline origin.
    pub x: f32,
    pub y: f32,
    /// Horizontal advance of the glyph.
    pub width: f32,
    pub height: f32,
    /// Non-stroking color in effect when the glyph was shown.
    pub fill_color: Option<ColorState>,
}

/// Everything the content interpreter observed on one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Glyphs in content stream order.
    pub glyphs: Vec<TextPosition>,
    /// Origin of the first placement of each page-level image XObject, by resource name.
    pub image_origins: HashMap<String, (f32, f32)>,
}

/// An image XObject declared in a page's resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    /// Resource name, e.g. `Im0`.
    pub name: String,
    pub object_id: (u32, u16),
    pub width: u32,
    pub height: u32,
}

/// Raster bytes in a self-describing codec.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    /// Codec file suffix: `png`, `jpg` or `jpx`.
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// A parsed PDF as the extractor sees it.
///
/// Pages are addressed by zero-based index. Every page call starts from a
/// fresh interpreter, so no graphics or text state crosses page boundaries.
pub trait PdfSource {
    /// Number of pages in the page tree.
    fn page_count(&self) -> usize;

    /// Page width and height in user space units.
    fn page_size(&self, index: usize) -> Result<(f32, f32)>;

    /// Interpret the page's content stream.
    fn page_content(&self, index: usize) -> Result<PageContent>;

    /// Image XObjects of the page, in resource declaration order.
    fn image_resources(&self, index: usize) -> Result<Vec<ImageResource>>;

    /// Decode one image into raster bytes.
    fn decode_image(
        &self,
        image: &ImageResource,
    ) -> std::result::Result<RasterImage, ImageDecodeError>;

    /// The document information dictionary.
    fn info(&self) -> InfoDictionary;
}
