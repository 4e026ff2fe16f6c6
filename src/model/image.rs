//! Embedded raster images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ImageDecodeError;

/// A raster image placed on a page.
///
/// `width`/`height` are pixel dimensions. Extraction does not capture the
/// on-page rendered size, so `placement_width`/`placement_height` stay unset
/// for extracted images and the pixel size is used for drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// `image_{page}_{index}.{format}` for extracted images.
    pub name: String,
    /// Raster codec, e.g. `png` or `jpg`.
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Base64-encoded raster bytes.
    pub data: String,
    /// Bottom-left placement in PDF user space.
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_height: Option<f32>,
}

impl Image {
    /// Build an image from raw encoded bytes.
    pub fn from_raster(
        name: impl Into<String>,
        format: impl Into<String>,
        width: u32,
        height: u32,
        bytes: &[u8],
    ) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            width,
            height,
            data: STANDARD.encode(bytes),
            x: 0.0,
            y: 0.0,
            placement_width: None,
            placement_height: None,
        }
    }

    /// Name an extracted image after its page and 1-based position.
    pub fn synthesized_name(page_number: u32, index: usize, format: &str) -> String {
        format!("image_{}_{}.{}", page_number, index, format)
    }

    /// Set the bottom-left placement.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Decode the base64 payload.
    pub fn decode_data(&self) -> std::result::Result<Vec<u8>, ImageDecodeError> {
        Ok(STANDARD.decode(self.data.as_bytes())?)
    }

    /// Size to draw at: the placement size when known, the pixel size otherwise.
    pub fn draw_size(&self) -> (f32, f32) {
        (
            self.placement_width.unwrap_or(self.width as f32),
            self.placement_height.unwrap_or(self.height as f32),
        )
    }
}
