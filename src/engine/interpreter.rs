//! Content stream interpreter.
//!
//! Walks the operations lopdf tokenizes and tracks just enough graphics and
//! text state to place every shown glyph: the CTM, the text and line
//! matrices, font selection, text spacing parameters and the non-stroking
//! color. Vector painting operators are ignored.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::colorspace::{ColorSpace, ColorState};
use super::source::{number, resolve, stream_bytes};
use super::{FontRef, PageContent, TextPosition};
use crate::error::{Error, Result};

/// Nesting limit for form XObjects; deeper forms are skipped.
const MAX_FORM_DEPTH: usize = 8;

/// Glyph width used when a font carries no metrics, in glyph space units.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Font size in effect before any `Tf`.
const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub(crate) const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut v = [0.0f32; 6];
        for (slot, operand) in v.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix::new(
            self.a * other.a + self.b * other.c,
            self.a * other.b + self.b * other.d,
            self.c * other.a + self.d * other.c,
            self.c * other.b + self.d * other.d,
            self.e * other.a + self.f * other.c + other.e,
            self.e * other.b + self.f * other.d + other.f,
        )
    }

    fn origin(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

type TextDecoder<'a> = Box<dyn Fn(&[u8]) -> Option<String> + 'a>;

/// Glyph advance widths of a font, in thousandths of text space.
#[derive(Debug, Clone, PartialEq)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    Cid {
        default: f32,
        widths: HashMap<u32, f32>,
    },
}

impl Widths {
    fn width(&self, code: u32) -> f32 {
        match self {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { default, widths } => widths.get(&code).copied().unwrap_or(*default),
        }
    }
}

/// A font resource prepared for glyph-by-glyph decoding.
struct LoadedFont<'a> {
    base_name: Option<String>,
    /// Composite fonts use two-byte codes.
    two_byte: bool,
    widths: Widths,
    decoder: Option<TextDecoder<'a>>,
}

impl<'a> LoadedFont<'a> {
    fn load(doc: &'a LopdfDocument, dict: &'a Dictionary) -> Self {
        let base_name = name_value(doc, dict, b"BaseFont");
        let two_byte = name_value(doc, dict, b"Subtype").as_deref() == Some("Type0");
        let widths = if two_byte {
            cid_widths(doc, dict)
        } else {
            simple_widths(doc, dict)
        };
        let decoder = dict.get_font_encoding(doc).ok().map(|encoding| {
            Box::new(move |bytes: &[u8]| LopdfDocument::decode_text(&encoding, bytes).ok())
                as TextDecoder<'a>
        });

        Self {
            base_name,
            two_byte,
            widths,
            decoder,
        }
    }

    /// Split a string operand into character codes.
    fn codes<'s>(&self, bytes: &'s [u8]) -> Vec<(u32, &'s [u8])> {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                (code, chunk)
            })
            .collect()
    }

    fn decode(&self, code: u32, bytes: &[u8]) -> String {
        if let Some(text) = self.decoder.as_ref().and_then(|decode| decode(bytes)) {
            return text;
        }
        if self.two_byte {
            char::from_u32(code).map(String::from).unwrap_or_default()
        } else {
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Parameters saved and restored by `q`/`Q`.
#[derive(Clone)]
struct GraphicsState<'a> {
    ctm: Matrix,
    fill: ColorState,
    font: Option<Rc<LoadedFont<'a>>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz / 100`.
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl<'a> GraphicsState<'a> {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: ColorState::default(),
            font: None,
            font_size: DEFAULT_FONT_SIZE,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Text object matrices, reset by every `BT`.
struct TextMatrices {
    tm: Matrix,
    tlm: Matrix,
}

impl TextMatrices {
    fn new() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn set(&mut self, m: Matrix) {
        self.tlm = m;
        self.tm = m;
    }
}

/// Interprets one page. Build a fresh interpreter per page.
pub(crate) struct PageInterpreter<'a> {
    doc: &'a LopdfDocument,
    fonts: HashMap<ObjectId, Rc<LoadedFont<'a>>>,
    content: PageContent,
}

impl<'a> PageInterpreter<'a> {
    pub(crate) fn new(doc: &'a LopdfDocument) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            content: PageContent::default(),
        }
    }

    /// Run a page content stream against the page's resources.
    pub(crate) fn run(
        mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
    ) -> Result<PageContent> {
        let operations = decode_operations(content)?;
        let mut state = GraphicsState::new(Matrix::IDENTITY);
        self.execute(&operations, resources, &mut state, 0)?;
        Ok(self.content)
    }

    fn execute(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        state: &mut GraphicsState<'a>,
        depth: usize,
    ) -> Result<()> {
        let mut stack: Vec<GraphicsState<'a>> = Vec::new();
        let mut text = TextMatrices::new();

        for op in operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        *state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }

                "g" => {
                    if let Some(g) = operands.first().and_then(number) {
                        state.fill = ColorState::gray(g);
                    }
                }
                "rg" => {
                    if let [r, g, b] = numbers::<3>(operands) {
                        state.fill = ColorState::rgb(r, g, b);
                    }
                }
                "k" => {
                    if let [c, m, y, k] = numbers::<4>(operands) {
                        state.fill = ColorState::cmyk(c, m, y, k);
                    }
                }
                "cs" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        let space = self.color_space(name, resources);
                        state.fill = ColorState::initial(space);
                    }
                }
                "sc" | "scn" => {
                    let components: Vec<f32> = operands.iter().filter_map(number).collect();
                    if !components.is_empty() {
                        state.fill.components = components;
                    }
                }

                "BT" => text = TextMatrices::new(),
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(number))
                    {
                        state.font = self.font(name, resources);
                        state.font_size = size;
                    }
                }
                "Tc" => set_number(&mut state.char_spacing, operands),
                "Tw" => set_number(&mut state.word_spacing, operands),
                "TL" => set_number(&mut state.leading, operands),
                "Ts" => set_number(&mut state.rise, operands),
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(number) {
                        state.horizontal_scaling = scale / 100.0;
                    }
                }
                "Td" => {
                    if let [tx, ty] = numbers::<2>(operands) {
                        text.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = numbers::<2>(operands) {
                        state.leading = -ty;
                        text.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        text.set(m);
                    }
                }
                "T*" => text.move_line(0.0, -state.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, state, &mut text);
                    }
                }
                "'" => {
                    text.move_line(0.0, -state.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, state, &mut text);
                    }
                }
                "\"" => {
                    if let Some(aw) = operands.first().and_then(number) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = operands.get(1).and_then(number) {
                        state.char_spacing = ac;
                    }
                    text.move_line(0.0, -state.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes, state, &mut text);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, state, &mut text),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.font_size
                                            * state.horizontal_scaling;
                                        text.tm = Matrix::translation(tx, 0.0).then(&text.tm);
                                    }
                                }
                            }
                        }
                    }
                }

                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(name, resources, state, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Emit one [`TextPosition`] per character code and advance the text matrix.
    fn show(&mut self, bytes: &[u8], state: &GraphicsState<'a>, text: &mut TextMatrices) {
        let font = state.font.clone();
        let font_ref = font.as_ref().map(|f| FontRef {
            name: f.base_name.clone(),
        });
        let codes: Vec<(u32, Vec<u8>)> = match font.as_deref() {
            Some(f) => f
                .codes(bytes)
                .into_iter()
                .map(|(code, raw)| (code, raw.to_vec()))
                .collect(),
            None => bytes.iter().map(|&b| (b as u32, vec![b])).collect(),
        };

        let fs = state.font_size;
        let th = state.horizontal_scaling;
        for (code, raw) in codes {
            let glyph_width = font
                .as_deref()
                .map_or(DEFAULT_GLYPH_WIDTH, |f| f.widths.width(code))
                / 1000.0;
            let user = text.tm.then(&state.ctm);
            let rendering = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, state.rise).then(&user);
            let size = rendering.vertical_scale();

            let unicode = match font.as_deref() {
                Some(f) => f.decode(code, &raw),
                None => raw.iter().map(|&b| b as char).collect(),
            };

            if size > 0.0 && !unicode.is_empty() {
                let (x, y) = rendering.origin();
                self.content.glyphs.push(TextPosition {
                    unicode,
                    font: font_ref.clone(),
                    font_size: size,
                    x,
                    y,
                    width: glyph_width * fs * th * user.horizontal_scale(),
                    height: size,
                    fill_color: Some(state.fill.clone()),
                });
            }

            let single_space = raw.len() == 1 && code == 32;
            let spacing = state.char_spacing + if single_space { state.word_spacing } else { 0.0 };
            let tx = (glyph_width * fs + spacing) * th;
            text.tm = Matrix::translation(tx, 0.0).then(&text.tm);
        }
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &GraphicsState<'a>,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let stream = match lookup(doc, resources, b"XObject", name).and_then(|o| o.as_stream().ok())
        {
            Some(stream) => stream,
            None => {
                log::debug!("XObject /{} not found", String::from_utf8_lossy(name));
                return Ok(());
            }
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Image" => {
                if depth == 0 {
                    self.content
                        .image_origins
                        .entry(String::from_utf8_lossy(name).into_owned())
                        .or_insert_with(|| state.ctm.origin());
                }
            }
            Ok(Object::Name(subtype)) if subtype == b"Form" => {
                if depth >= MAX_FORM_DEPTH {
                    log::warn!(
                        "form XObject /{} nested deeper than {} levels, skipped",
                        String::from_utf8_lossy(name),
                        MAX_FORM_DEPTH
                    );
                    return Ok(());
                }
                let data = stream_bytes(stream).map_err(|e| {
                    Error::SourceRead(format!(
                        "form XObject /{}: {}",
                        String::from_utf8_lossy(name),
                        e
                    ))
                })?;
                let operations = decode_operations(&data)?;
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| resolve(doc, o).as_array().ok())
                    .and_then(|items| Matrix::from_operands(items))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve(doc, o).as_dict().ok())
                    .or(resources);

                let mut form_state = state.clone();
                form_state.ctm = form_matrix.then(&state.ctm);
                self.execute(&operations, form_resources, &mut form_state, depth + 1)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn font(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
    ) -> Option<Rc<LoadedFont<'a>>> {
        let doc = self.doc;
        let entry = resources
            .and_then(|res| res.get(b"Font").ok())
            .and_then(|fonts| resolve(doc, fonts).as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok());

        let font = match entry {
            Some(Object::Reference(id)) => {
                if let Some(font) = self.fonts.get(id) {
                    return Some(Rc::clone(font));
                }
                let dict = doc.get_dictionary(*id).ok()?;
                let font = Rc::new(LoadedFont::load(doc, dict));
                self.fonts.insert(*id, Rc::clone(&font));
                font
            }
            Some(Object::Dictionary(dict)) => Rc::new(LoadedFont::load(doc, dict)),
            _ => return None,
        };
        Some(font)
    }

    fn color_space(&self, name: &[u8], resources: Option<&'a Dictionary>) -> ColorSpace {
        match name {
            b"DeviceGray" | b"DeviceRGB" | b"DeviceCMYK" | b"Pattern" => {
                ColorSpace::from_object(self.doc, &Object::Name(name.to_vec()))
            }
            _ => match lookup(self.doc, resources, b"ColorSpace", name) {
                Some(obj) => ColorSpace::from_object(self.doc, obj),
                None => {
                    log::debug!("color space /{} not found", String::from_utf8_lossy(name));
                    ColorSpace::Other(String::from_utf8_lossy(name).into_owned())
                }
            },
        }
    }
}

fn decode_operations(content: &[u8]) -> Result<Vec<Operation>> {
    Content::decode(content)
        .map(|c| c.operations)
        .map_err(|e| Error::SourceRead(format!("content stream: {}", e)))
}

/// Resolve `resources[category][name]`.
fn lookup<'a>(
    doc: &'a LopdfDocument,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let dict = resolve(doc, resources?.get(category).ok()?).as_dict().ok()?;
    Some(resolve(doc, dict.get(name).ok()?))
}

fn numbers<const N: usize>(operands: &[Object]) -> [f32; N] {
    let mut values = [f32::NAN; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        if let Some(v) = number(operand) {
            *slot = v;
        }
    }
    values
}

fn set_number(target: &mut f32, operands: &[Object]) {
    if let Some(value) = operands.first().and_then(number) {
        *target = value;
    }
}

fn name_value(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn simple_widths(doc: &LopdfDocument, dict: &Dictionary) -> Widths {
    let first_char = dict
        .get(b"FirstChar")
        .ok()
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(0)
        .max(0) as u32;
    let widths = dict
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|items| {
            items
                .iter()
                .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();
    let missing = dict
        .get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .and_then(|fd| fd.get(b"MissingWidth").ok())
        .and_then(|o| number(resolve(doc, o)))
        .filter(|w| *w > 0.0)
        .unwrap_or(DEFAULT_GLYPH_WIDTH);

    Widths::Simple {
        first_char,
        widths,
        missing,
    }
}

/// `/DW` and `/W` of the first descendant font.
fn cid_widths(doc: &LopdfDocument, dict: &Dictionary) -> Widths {
    let descendant = dict
        .get(b"DescendantFonts")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .and_then(|fonts| fonts.first())
        .and_then(|o| resolve(doc, o).as_dict().ok());

    let Some(descendant) = descendant else {
        return Widths::Cid {
            default: 1000.0,
            widths: HashMap::new(),
        };
    };

    let default = descendant
        .get(b"DW")
        .ok()
        .and_then(|o| number(resolve(doc, o)))
        .unwrap_or(1000.0);
    let entries = descendant
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|items| items.iter().map(|o| resolve(doc, o)).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut widths = HashMap::new();
    let mut i = 0;
    while i < entries.len() {
        let Some(first) = number(entries[i]) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match entries.get(i + 1) {
            // c [w1 w2 ...]
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            // c_first c_last w
            Some(last) => {
                let (Some(last), Some(w)) =
                    (number(last), entries.get(i + 2).and_then(|o| number(o)))
                else {
                    break;
                };
                for code in first..=(last.max(0.0) as u32).min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }

    Widths::Cid { default, widths }
}
