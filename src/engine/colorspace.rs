//! Color spaces and the generic RGB transform.

use lopdf::{Document as LopdfDocument, Object};

use super::source::{resolve, stream_bytes};
use crate::error::ColorConversionError;

/// Nesting limit for base spaces such as `[/Indexed base ...]`.
const MAX_NESTING_DEPTH: usize = 4;

/// A color space as declared by a content stream or its resources.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab,
    /// ICC profile; only the component count is used.
    IccBased { components: usize },
    /// Palette lookup into a base space.
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
    Separation,
    DeviceN { components: usize },
    Pattern,
    /// A family this crate does not recognize.
    Other(String),
}

impl ColorSpace {
    /// Parse a color space from a name or a family array.
    ///
    /// Device names and their inline-image abbreviations are accepted as
    /// names; resource lookups are left to the caller.
    pub(crate) fn from_object(doc: &LopdfDocument, obj: &Object) -> ColorSpace {
        Self::parse(doc, obj, 0)
    }

    fn parse(doc: &LopdfDocument, obj: &Object, depth: usize) -> ColorSpace {
        if depth > MAX_NESTING_DEPTH {
            return ColorSpace::Other("nesting too deep".to_string());
        }
        match resolve(doc, obj) {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => Self::from_array(doc, items, depth),
            other => ColorSpace::Other(format!("{:?}", other)),
        }
    }

    fn from_name(name: &[u8]) -> ColorSpace {
        match name {
            b"DeviceGray" | b"G" => ColorSpace::DeviceGray,
            b"DeviceRGB" | b"RGB" => ColorSpace::DeviceRgb,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::DeviceCmyk,
            b"CalGray" => ColorSpace::CalGray,
            b"CalRGB" => ColorSpace::CalRgb,
            b"Lab" => ColorSpace::Lab,
            b"Pattern" => ColorSpace::Pattern,
            other => ColorSpace::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }

    fn from_array(doc: &LopdfDocument, items: &[Object], depth: usize) -> ColorSpace {
        let family = match items.first().map(|o| resolve(doc, o)) {
            Some(Object::Name(name)) => name.as_slice(),
            _ => return ColorSpace::Other("malformed array".to_string()),
        };
        match family {
            b"ICCBased" => {
                let components = items
                    .get(1)
                    .and_then(|o| resolve(doc, o).as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").ok())
                    .and_then(|n| n.as_i64().ok())
                    .unwrap_or(3);
                ColorSpace::IccBased {
                    components: components.max(0) as usize,
                }
            }
            b"Indexed" | b"I" => {
                let base = match items.get(1) {
                    Some(base) => Self::parse(doc, base, depth + 1),
                    None => return ColorSpace::Other("Indexed without base".to_string()),
                };
                let hival = items
                    .get(2)
                    .and_then(|o| resolve(doc, o).as_i64().ok())
                    .unwrap_or(0)
                    .clamp(0, 255) as usize;
                let lookup = match items.get(3).map(|o| resolve(doc, o)) {
                    Some(Object::String(bytes, _)) => bytes.clone(),
                    Some(Object::Stream(stream)) => stream_bytes(stream).unwrap_or_default(),
                    _ => Vec::new(),
                };
                ColorSpace::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                }
            }
            b"Separation" => ColorSpace::Separation,
            b"DeviceN" => {
                let components = items
                    .get(1)
                    .and_then(|o| resolve(doc, o).as_array().ok())
                    .map_or(1, |names| names.len());
                ColorSpace::DeviceN { components }
            }
            b"Pattern" => ColorSpace::Pattern,
            other => Self::from_name(other),
        }
    }

    /// Short family name, used in log messages.
    pub fn name(&self) -> &str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::CalGray => "CalGray",
            ColorSpace::CalRgb => "CalRGB",
            ColorSpace::Lab => "Lab",
            ColorSpace::IccBased { .. } => "ICCBased",
            ColorSpace::Indexed { .. } => "Indexed",
            ColorSpace::Separation => "Separation",
            ColorSpace::DeviceN { .. } => "DeviceN",
            ColorSpace::Pattern => "Pattern",
            ColorSpace::Other(name) => name.as_str(),
        }
    }

    /// Number of components a color in this space carries.
    pub fn component_count(&self) -> usize {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => 1,
            ColorSpace::DeviceRgb | ColorSpace::CalRgb | ColorSpace::Lab => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::IccBased { components } | ColorSpace::DeviceN { components } => {
                *components
            }
            ColorSpace::Indexed { .. } | ColorSpace::Separation => 1,
            ColorSpace::Pattern | ColorSpace::Other(_) => 0,
        }
    }

    /// Components selected when a content stream switches to this space.
    pub fn initial_components(&self) -> Vec<f32> {
        match self {
            ColorSpace::DeviceCmyk => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Separation => vec![1.0],
            ColorSpace::DeviceN { components } => vec![1.0; *components],
            other => vec![0.0; other.component_count()],
        }
    }

    /// Convert components to 8-bit RGB channels.
    pub fn to_rgb(&self, components: &[f32]) -> Result<[u8; 3], ColorConversionError> {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => {
                let [g] = take::<1>(components)?;
                Ok([channel(g); 3])
            }
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => {
                let [r, g, b] = take::<3>(components)?;
                Ok([channel(r), channel(g), channel(b)])
            }
            ColorSpace::DeviceCmyk => {
                let [c, m, y, k] = take::<4>(components)?;
                Ok(cmyk_to_rgb(c, m, y, k))
            }
            ColorSpace::IccBased { components: n } => match n {
                1 => ColorSpace::DeviceGray.to_rgb(components),
                3 => ColorSpace::DeviceRgb.to_rgb(components),
                4 => ColorSpace::DeviceCmyk.to_rgb(components),
                _ => Err(ColorConversionError::Unsupported(format!(
                    "ICCBased with {} components",
                    n
                ))),
            },
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let [index] = take::<1>(components)?;
                let index = (index.round().max(0.0) as usize).min(*hival);
                let width = base.component_count();
                let start = index * width;
                let entry = lookup
                    .get(start..start + width)
                    .ok_or(ColorConversionError::PaletteIndex(index))?;
                let base_components: Vec<f32> =
                    entry.iter().map(|&b| b as f32 / 255.0).collect();
                base.to_rgb(&base_components)
            }
            other => Err(ColorConversionError::Unsupported(other.name().to_string())),
        }
    }
}

/// The current color of a graphics state: a space plus its components.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    pub space: ColorSpace,
    pub components: Vec<f32>,
}

impl ColorState {
    pub fn new(space: ColorSpace, components: Vec<f32>) -> Self {
        Self { space, components }
    }

    pub fn gray(g: f32) -> Self {
        Self::new(ColorSpace::DeviceGray, vec![g])
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(ColorSpace::DeviceRgb, vec![r, g, b])
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::new(ColorSpace::DeviceCmyk, vec![c, m, y, k])
    }

    /// Switch to a space at its initial color.
    pub fn initial(space: ColorSpace) -> Self {
        let components = space.initial_components();
        Self::new(space, components)
    }

    /// Generic transform to 8-bit RGB.
    pub fn to_rgb(&self) -> Result<[u8; 3], ColorConversionError> {
        self.space.to_rgb(&self.components)
    }
}

impl Default for ColorState {
    /// The initial non-stroking color of every page: DeviceGray black.
    fn default() -> Self {
        Self::gray(0.0)
    }
}

fn take<const N: usize>(components: &[f32]) -> Result<[f32; N], ColorConversionError> {
    components
        .get(..N)
        .and_then(|slice| <[f32; N]>::try_from(slice).ok())
        .ok_or(ColorConversionError::ComponentCount {
            expected: N,
            actual: components.len(),
        })
}

fn channel(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub(crate) fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> [u8; 3] {
    let k = k.clamp(0.0, 1.0);
    let mix = |v: f32| channel((1.0 - v.clamp(0.0, 1.0)) * (1.0 - k));
    [mix(c), mix(m), mix(y)]
}
