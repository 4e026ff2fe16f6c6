//! Options for building a PDF.

/// Options for [`Reconstructor`](super::Reconstructor).
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// PDF header version written to the output.
    pub pdf_version: String,

    /// Flate-compress content and image streams.
    pub compress: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".to_string(),
            compress: true,
        }
    }
}

impl ReconstructOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header version, e.g. `"1.4"`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}
