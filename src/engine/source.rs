//! lopdf-backed [`PdfSource`].

use std::io::Read;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use super::interpreter::PageInterpreter;
use super::raster;
use super::{ImageResource, InfoDictionary, PageContent, PdfSource, RasterImage, LETTER};
use crate::error::{Error, ImageDecodeError, Result};

/// How far the header may sit from the start of the file.
const HEADER_WINDOW: usize = 1024;

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 16;

/// A parsed PDF held in memory.
///
/// The lopdf document is owned here and released when the source drops,
/// on both the success and the error path of an extraction.
pub struct LopdfSource {
    doc: LopdfDocument,
    pages: Vec<ObjectId>,
}

impl LopdfSource {
    /// Parse PDF bytes.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        if !has_pdf_header(data) {
            return Err(Error::SourceRead(
                "not a PDF: missing %PDF- header".to_string(),
            ));
        }
        let doc = LopdfDocument::load_mem(data)?;
        Ok(Self::from_document(doc))
    }

    /// Parse a PDF file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load_bytes(&data)
    }

    /// Parse a PDF from a reader.
    pub fn load_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load_bytes(&data)
    }

    /// Wrap an already loaded lopdf document.
    pub fn from_document(doc: LopdfDocument) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// PDF version from the file header.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages.get(index).copied().ok_or_else(|| {
            Error::SourceRead(format!(
                "page index {} out of range ({} pages)",
                index,
                self.pages.len()
            ))
        })
    }

    fn page_dict(&self, index: usize) -> Result<(ObjectId, &Dictionary)> {
        let id = self.page_id(index)?;
        let dict = self
            .doc
            .get_dictionary(id)
            .map_err(|e| Error::SourceRead(format!("page {}: {}", index + 1, e)))?;
        Ok((id, dict))
    }

    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        inherited(&self.doc, page_id, b"Resources")
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
    }
}

impl PdfSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let id = self.page_id(index)?;
        let media_box = inherited(&self.doc, id, b"MediaBox")
            .and_then(|obj| resolve(&self.doc, obj).as_array().ok())
            .and_then(|items| rectangle_size(&self.doc, items));

        match media_box {
            Some(size) => Ok(size),
            None => {
                log::warn!(
                    "page {} has no usable MediaBox, assuming {}x{}",
                    index + 1,
                    LETTER.0,
                    LETTER.1
                );
                Ok(LETTER)
            }
        }
    }

    fn page_content(&self, index: usize) -> Result<PageContent> {
        let (id, dict) = self.page_dict(index)?;
        let content = page_content_bytes(&self.doc, dict)
            .map_err(|e| Error::SourceRead(format!("page {}: {}", index + 1, e)))?;
        PageInterpreter::new(&self.doc)
            .run(&content, self.page_resources(id))
            .map_err(|e| match e {
                Error::SourceRead(msg) => Error::SourceRead(format!("page {}: {}", index + 1, msg)),
                other => other,
            })
    }

    fn image_resources(&self, index: usize) -> Result<Vec<ImageResource>> {
        let id = self.page_id(index)?;
        let xobjects = match self
            .page_resources(id)
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
        {
            Some(dict) => dict,
            None => return Ok(Vec::new()),
        };

        let mut images = Vec::new();
        for (name, value) in xobjects.iter() {
            let object_id = match value {
                Object::Reference(id) => *id,
                _ => {
                    log::debug!(
                        "skipping inline XObject /{} on page {}",
                        String::from_utf8_lossy(name),
                        index + 1
                    );
                    continue;
                }
            };
            let stream = match self.doc.get_object(object_id).and_then(Object::as_stream) {
                Ok(stream) => stream,
                Err(e) => {
                    return Err(Error::SourceRead(format!(
                        "page {}: XObject /{}: {}",
                        index + 1,
                        String::from_utf8_lossy(name),
                        e
                    )))
                }
            };
            if !is_image(stream) {
                continue;
            }
            images.push(ImageResource {
                name: String::from_utf8_lossy(name).into_owned(),
                object_id,
                width: dimension(&self.doc, &stream.dict, b"Width"),
                height: dimension(&self.doc, &stream.dict, b"Height"),
            });
        }
        Ok(images)
    }

    fn decode_image(
        &self,
        image: &ImageResource,
    ) -> std::result::Result<RasterImage, ImageDecodeError> {
        let stream = self
            .doc
            .get_object(image.object_id)
            .and_then(Object::as_stream)
            .map_err(|e| ImageDecodeError::Malformed(e.to_string()))?;
        raster::decode_image_stream(&self.doc, stream)
    }

    fn info(&self) -> InfoDictionary {
        InfoDictionary::from_document(&self.doc)
    }
}

/// `true` when `%PDF-` appears near the start of the data.
pub(crate) fn has_pdf_header(data: &[u8]) -> bool {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Follow indirect references to the object they point at.
///
/// Dangling or overlong chains resolve to the last reference seen, which every
/// typed accessor then rejects.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => obj = target,
                Err(_) => return obj,
            },
            _ => return obj,
        }
    }
    obj
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Stream data with its filters removed.
pub(crate) fn stream_bytes(stream: &Stream) -> lopdf::Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

/// Look up a page attribute, walking `/Parent` links for inherited keys.
fn inherited<'a>(doc: &'a LopdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        dict = resolve(doc, dict.get(b"Parent").ok()?).as_dict().ok()?;
    }
    None
}

fn rectangle_size(doc: &LopdfDocument, items: &[Object]) -> Option<(f32, f32)> {
    if items.len() != 4 {
        return None;
    }
    let mut coords = [0.0f32; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
        *slot = number(resolve(doc, item))?;
    }
    let width = (coords[2] - coords[0]).abs();
    let height = (coords[3] - coords[1]).abs();
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Some((width, height))
    } else {
        None
    }
}

fn page_content_bytes(
    doc: &LopdfDocument,
    page: &Dictionary,
) -> std::result::Result<Vec<u8>, String> {
    let contents = match page.get(b"Contents") {
        Ok(obj) => resolve(doc, obj),
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Stream(stream) => stream_bytes(stream).map_err(|e| e.to_string()),
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                let stream = resolve(doc, part)
                    .as_stream()
                    .map_err(|_| "/Contents array item is not a stream".to_string())?;
                if !content.is_empty() {
                    content.push(b' ');
                }
                content.extend_from_slice(&stream_bytes(stream).map_err(|e| e.to_string())?);
            }
            Ok(content)
        }
        _ => Err("/Contents is not a stream or array".to_string()),
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

fn dimension(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> u32 {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .map_or(0, |v| v.clamp(0, u32::MAX as i64) as u32)
}
