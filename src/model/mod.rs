//! Document model types.
//!
//! Plain values describing a PDF as structured data: pages with styled text
//! runs and raster images. The model is what gets serialized to JSON and what
//! the reconstructor turns back into a PDF; it carries no behavior beyond
//! construction, validation and serialization.

mod document;
mod image;
mod page;
mod text;

pub use document::{Document, Metadata};
pub use image::Image;
pub use page::Page;
pub use text::{StyledTextRun, TextColor, UNSET_COMPONENT};
