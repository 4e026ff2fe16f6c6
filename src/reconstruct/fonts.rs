//! Rendering font selection.
//!
//! Output text is drawn with one of four fixed faces chosen from the run's
//! bold/italic flags alone. The run's own font name is kept in the model but
//! never consulted here.

use std::sync::{Arc, OnceLock};

/// Style variant of a rendering font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }
}

/// Maps a style variant to the base font name used in the output PDF.
pub trait FontResolver: Send + Sync {
    fn base_font(&self, style: FontStyle) -> &str;
}

/// The four Times faces from the standard 14 fonts.
#[derive(Debug, Clone)]
pub struct StandardFontTable {
    regular: String,
    bold: String,
    italic: String,
    bold_italic: String,
}

impl StandardFontTable {
    /// Build a table from explicit base font names.
    pub fn new(
        regular: impl Into<String>,
        bold: impl Into<String>,
        italic: impl Into<String>,
        bold_italic: impl Into<String>,
    ) -> Self {
        Self {
            regular: regular.into(),
            bold: bold.into(),
            italic: italic.into(),
            bold_italic: bold_italic.into(),
        }
    }

    pub fn times() -> Self {
        Self::new(
            "Times-Roman",
            "Times-Bold",
            "Times-Italic",
            "Times-BoldItalic",
        )
    }

    /// Process-wide table, built on first use and read-only afterwards.
    pub fn shared() -> Arc<StandardFontTable> {
        static TABLE: OnceLock<Arc<StandardFontTable>> = OnceLock::new();
        Arc::clone(TABLE.get_or_init(|| Arc::new(StandardFontTable::times())))
    }
}

impl Default for StandardFontTable {
    fn default() -> Self {
        Self::times()
    }
}

impl FontResolver for StandardFontTable {
    fn base_font(&self, style: FontStyle) -> &str {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
            FontStyle::BoldItalic => &self.bold_italic,
        }
    }
}
