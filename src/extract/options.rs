//! Extraction options.

/// Options for building a document model from a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Order text runs top to bottom, then left to right, instead of content
    /// stream order.
    pub sort_by_position: bool,

    /// Whether to decode embedded images.
    pub extract_images: bool,
}

impl ExtractOptions {
    /// Create new extraction options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep text runs in content stream order.
    pub fn unsorted(mut self) -> Self {
        self.sort_by_position = false;
        self
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            sort_by_position: true,
            extract_images: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ExtractOptions::default();
        assert!(options.sort_by_position);
        assert!(options.extract_images);
    }

    #[test]
    fn test_builder() {
        let options = ExtractOptions::new().unsorted().with_images(false);
        assert!(!options.sort_by_position);
        assert!(!options.extract_images);
    }
}
