//! PDF output through lopdf.
//!
//! A [`PdfWriter`] owns the document being built. Pages are built one at a
//! time through a [`PageBuilder`], which borrows the writer exclusively, and
//! text is drawn through a [`TextObject`] that closes its `BT`/`ET` pair and
//! restores the graphics state when dropped.

use std::collections::BTreeMap;
use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{
    dictionary, Dictionary, Document as LopdfDocument, Object, ObjectId, Stream, StringFormat,
};

use super::info::InfoDictionary;
use super::raster::{deflate, prepare_image};
use crate::error::{Error, ImageDecodeError, Result};

/// Builds a new PDF document.
pub struct PdfWriter {
    doc: LopdfDocument,
    pages_id: ObjectId,
    kids: Vec<Object>,
    /// Font objects shared by every page, keyed by base font name.
    fonts: BTreeMap<String, ObjectId>,
    info: InfoDictionary,
    compress: bool,
}

impl PdfWriter {
    /// Start an empty document with the given header version, e.g. `"1.7"`.
    pub fn new(version: &str) -> Self {
        let mut doc = LopdfDocument::with_version(version);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            fonts: BTreeMap::new(),
            info: InfoDictionary::new(),
            compress: true,
        }
    }

    /// Whether content and image streams are Flate-compressed.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// The `/Info` entries written by [`finish`](Self::finish).
    pub fn info(&self) -> &InfoDictionary {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut InfoDictionary {
        &mut self.info
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Open a page of the given size. Only one page can be open at a time.
    pub fn begin_page(&mut self, width: f32, height: f32) -> PageBuilder<'_> {
        PageBuilder {
            writer: self,
            width,
            height,
            operations: Vec::new(),
            fonts: Dictionary::new(),
            xobjects: Dictionary::new(),
        }
    }

    /// Serialize the document.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize the document into a sink.
    pub fn write_to<W: Write>(mut self, target: &mut W) -> Result<()> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        if !self.info.is_empty() {
            let info_id = self.doc.add_object(self.info.to_dictionary());
            self.doc.trailer.set("Info", info_id);
        }

        self.doc
            .save_to(target)
            .map_err(|e| Error::TargetWrite(e.to_string()))
    }

    fn font_id(&mut self, base_font: &str) -> ObjectId {
        if let Some(id) = self.fonts.get(base_font) {
            return *id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.insert(base_font.to_string(), id);
        id
    }

    fn stream(&self, dict: Dictionary, data: Vec<u8>) -> Result<Stream> {
        if !self.compress {
            return Ok(Stream::new(dict, data));
        }
        let compressed = deflate(&data).map_err(|e| Error::TargetWrite(e.to_string()))?;
        let mut dict = dict;
        dict.set("Filter", "FlateDecode");
        Ok(Stream::new(dict, compressed))
    }
}

/// One page under construction.
///
/// Nothing reaches the document until [`finish`](Self::finish); a builder
/// dropped early leaves the document without that page.
pub struct PageBuilder<'w> {
    writer: &'w mut PdfWriter,
    width: f32,
    height: f32,
    operations: Vec<Operation>,
    /// Resource name to font object.
    fonts: Dictionary,
    xobjects: Dictionary,
}

impl<'w> PageBuilder<'w> {
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Open a text object inside its own graphics state; `ET Q` is emitted
    /// when it drops, so fill color never carries over to the next one.
    pub fn begin_text(&mut self) -> TextObject<'_, 'w> {
        self.operations
            .extend([Operation::new("q", vec![]), Operation::new("BT", vec![])]);
        TextObject { page: self }
    }

    /// Embed raster bytes and draw them with their lower-left corner at
    /// `(x, y)`, scaled to `width`×`height`.
    ///
    /// A payload that cannot be embedded leaves the page untouched.
    pub fn draw_image(
        &mut self,
        format: &str,
        bytes: &[u8],
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> std::result::Result<(), ImageDecodeError> {
        let prepared = prepare_image(format, bytes, self.writer.compress)?;
        let mut image = prepared.image;
        if let Some(mask) = prepared.soft_mask {
            let mask_id = self.writer.doc.add_object(mask);
            image.dict.set("SMask", mask_id);
        }
        let image_id = self.writer.doc.add_object(image);

        let name = format!("Im{}", self.xobjects.len() + 1);
        self.xobjects.set(name.as_bytes().to_vec(), image_id);
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    /// Write the content stream and add the page to the document.
    pub fn finish(self) -> Result<()> {
        let PageBuilder {
            writer,
            width,
            height,
            operations,
            fonts,
            xobjects,
        } = self;

        let content = Content { operations }
            .encode()
            .map_err(|e| Error::TargetWrite(e.to_string()))?;
        let stream = writer.stream(Dictionary::new(), content)?;
        let content_id = writer.doc.add_object(stream);

        let mut resources = Dictionary::new();
        if !fonts.is_empty() {
            resources.set("Font", fonts);
        }
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }

        let page_id = writer.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => writer.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        writer.kids.push(page_id.into());
        Ok(())
    }

    fn font_resource(&mut self, base_font: &str) -> Vec<u8> {
        let id = self.writer.font_id(base_font);
        let existing = self
            .fonts
            .iter()
            .find(|(_, obj)| matches!(obj, Object::Reference(r) if *r == id))
            .map(|(name, _)| name.clone());
        existing.unwrap_or_else(|| {
            let name = format!("F{}", self.fonts.len() + 1).into_bytes();
            self.fonts.set(name.clone(), id);
            name
        })
    }
}

/// An open `q BT … ET Q` text object.
pub struct TextObject<'p, 'w> {
    page: &'p mut PageBuilder<'w>,
}

impl TextObject<'_, '_> {
    /// Select a standard font by base name.
    pub fn set_font(&mut self, base_font: &str, size: f32) {
        let name = self.page.font_resource(base_font);
        self.push("Tf", vec![Object::Name(name), size.into()]);
    }

    pub fn set_fill_rgb(&mut self, red: f32, green: f32, blue: f32) {
        self.push("rg", vec![red.into(), green.into(), blue.into()]);
    }

    /// Move to the start of the next line, offset from the start of the current one.
    pub fn new_line_at_offset(&mut self, x: f32, y: f32) {
        self.push("Td", vec![x.into(), y.into()]);
    }

    /// Show a string in WinAnsiEncoding.
    pub fn show_text(&mut self, text: &str) {
        let bytes = encode_win_ansi(text);
        self.push("Tj", vec![Object::String(bytes, StringFormat::Literal)]);
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.page.operations.push(Operation::new(operator, operands));
    }
}

impl Drop for TextObject<'_, '_> {
    fn drop(&mut self) {
        self.page
            .operations
            .extend([Operation::new("ET", vec![]), Operation::new("Q", vec![])]);
    }
}

/// Encode text for the standard fonts. Characters outside WinAnsiEncoding
/// become `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut replaced = 0usize;
    for ch in text.chars() {
        match win_ansi_code(ch) {
            Some(code) => out.push(code),
            None => {
                replaced += 1;
                out.push(b'?');
            }
        }
    }
    if replaced > 0 {
        log::warn!(
            "{} character(s) in {:?} are not in WinAnsiEncoding, replaced with '?'",
            replaced,
            text
        );
    }
    out
}

fn win_ansi_code(ch: char) -> Option<u8> {
    let code = match ch {
        '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => return Some(ch as u8),
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}
