//! Color normalization to RGB in `[0, 1]`.

use crate::engine::{ColorSpace, ColorState};
use crate::model::TextColor;

/// Map a graphics state color to normalized RGB.
///
/// Never fails. A missing color state and any conversion failure both yield
/// black `(0, 0, 0)`; the serialized "unset" sentinel is never produced here.
pub fn normalize(color: Option<&ColorState>) -> TextColor {
    let Some(color) = color else {
        return TextColor::BLACK;
    };
    let (red, green, blue) = to_unit_rgb(color);
    TextColor::rgb(red, green, blue).unwrap_or(TextColor::BLACK)
}

/// Normalize a color space and its components.
pub fn normalize_components(space: &ColorSpace, components: &[f32]) -> TextColor {
    normalize(Some(&ColorState::new(space.clone(), components.to_vec())))
}

fn to_unit_rgb(color: &ColorState) -> (f32, f32, f32) {
    let c = &color.components;
    match (&color.space, c.as_slice()) {
        (ColorSpace::DeviceRgb, [r, g, b, ..]) => (unit(*r), unit(*g), unit(*b)),
        (ColorSpace::DeviceGray, [g, ..]) => {
            let g = unit(*g);
            (g, g, g)
        }
        (ColorSpace::DeviceRgb | ColorSpace::DeviceGray, _) => {
            log::debug!(
                "{} color with {} component(s), using black",
                color.space.name(),
                c.len()
            );
            (0.0, 0.0, 0.0)
        }
        _ => match color.to_rgb() {
            Ok([r, g, b]) => (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0),
            Err(e) => {
                log::debug!("color conversion failed, using black: {}", e);
                (0.0, 0.0, 0.0)
            }
        },
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
