//! Page-level types.

use super::{Image, StyledTextRun};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single page in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Text runs in extraction order
    pub texts: Vec<StyledTextRun>,

    /// Images in resource declaration order
    pub images: Vec<Image>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(page_number: u32, width: f32, height: f32) -> Self {
        Self {
            page_number,
            width,
            height,
            texts: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Create a new page with standard Letter size (8.5 x 11 inches).
    pub fn letter(page_number: u32) -> Self {
        Self::new(page_number, 612.0, 792.0)
    }

    /// Add a text run to the page.
    pub fn add_text(&mut self, run: StyledTextRun) {
        self.texts.push(run);
    }

    /// Add an image to the page.
    pub fn add_image(&mut self, image: Image) {
        self.images.push(image);
    }

    /// Check if the page has neither text nor images.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.images.is_empty()
    }

    /// Concatenated text of all runs, in model order.
    pub fn plain_text(&self) -> String {
        self.texts.iter().map(|run| run.text.as_str()).collect()
    }

    /// Check the page number and dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(Error::InvalidModel(
                "page numbers start at 1, got 0".to_string(),
            ));
        }
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(Error::InvalidModel(format!(
                "page {} has non-positive size {}x{}",
                self.page_number, self.width, self.height
            )));
        }
        if let Some(image) = self.images.iter().find(|i| i.width == 0 || i.height == 0) {
            return Err(Error::InvalidModel(format!(
                "image {} on page {} has empty size {}x{}",
                image.name, self.page_number, image.width, image.height
            )));
        }
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::letter(1)
    }
}
