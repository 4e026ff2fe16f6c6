//! Bold/italic inference from font names.
//!
//! Font names are the only signal used: descriptor flags and weights are
//! ignored, so subset-prefixed or non-English names can be misjudged.

/// Derives style flags for a font.
///
/// The extractor only talks to this trait, so a descriptor-based strategy can
/// replace the name heuristic without touching the extraction loop.
pub trait StyleInference: Send + Sync {
    /// Whether text in this font should be treated as bold.
    fn is_bold(&self, font_name: Option<&str>) -> bool;

    /// Whether text in this font should be treated as italic.
    fn is_italic(&self, font_name: Option<&str>) -> bool;
}

const BOLD_MARKERS: [&str; 3] = ["bold", "bld", "black"];
const ITALIC_MARKERS: [&str; 2] = ["italic", "oblique"];

/// Substring match on the lower-cased font name.
///
/// A face named "...Black" counts as bold even when it is a display weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontNameHeuristic;

impl StyleInference for FontNameHeuristic {
    fn is_bold(&self, font_name: Option<&str>) -> bool {
        is_bold(font_name)
    }

    fn is_italic(&self, font_name: Option<&str>) -> bool {
        is_italic(font_name)
    }
}

/// `true` iff the name contains `bold`, `bld` or `black`, ignoring case.
pub fn is_bold(font_name: Option<&str>) -> bool {
    contains_any(font_name, &BOLD_MARKERS)
}

/// `true` iff the name contains `italic` or `oblique`, ignoring case.
pub fn is_italic(font_name: Option<&str>) -> bool {
    contains_any(font_name, &ITALIC_MARKERS)
}

fn contains_any(font_name: Option<&str>, markers: &[&str]) -> bool {
    match font_name {
        Some(name) => {
            let name = name.to_lowercase();
            markers.iter().any(|marker| name.contains(marker))
        }
        None => false,
    }
}
