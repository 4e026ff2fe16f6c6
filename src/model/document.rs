//! Document-level types.

use super::Page;
use crate::error::{Error, Result};
use chrono::serde::ts_milliseconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A PDF document as structured data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, author, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Pages in source order
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_number: u32) -> Option<&Page> {
        if page_number == 0 {
            return None;
        }
        self.pages.get((page_number - 1) as usize)
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check every page against the model invariants.
    pub fn validate(&self) -> Result<()> {
        for page in &self.pages {
            page.validate()?;
        }
        Ok(())
    }

    /// Check that pages are numbered `1..=N` in order.
    ///
    /// Extracted documents always satisfy this; hand-written models may not.
    pub fn validate_numbering(&self) -> Result<()> {
        for (index, page) in self.pages.iter().enumerate() {
            let expected = index as u32 + 1;
            if page.page_number != expected {
                return Err(Error::InvalidModel(format!(
                    "page at position {} is numbered {}",
                    expected, page.page_number
                )));
            }
        }
        Ok(())
    }
}

/// Document metadata.
///
/// `total_pages` is informational: it is derived when extracting and ignored
/// when rebuilding a PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Document author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Creator application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// PDF producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// Creation date, serialized as epoch milliseconds
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_date: Option<DateTime<Utc>>,

    /// Last modification date, serialized as epoch milliseconds
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub modification_date: Option<DateTime<Utc>>,

    /// Total number of pages
    #[serde(default)]
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_document_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.page_count(), 0);
        assert!(doc.get_page(0).is_none());
        assert!(doc.get_page(1).is_none());
    }

    #[test]
    fn test_metadata_omits_absent_fields() {
        let metadata = Metadata {
            title: Some("Report".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["title"], "Report");
        assert_eq!(json["totalPages"], 0);
        assert!(json.get("author").is_none());
        assert!(json.get("creationDate").is_none());
    }

    #[test]
    fn test_metadata_dates_as_epoch_millis() {
        let created = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let metadata = Metadata {
            creation_date: Some(created),
            total_pages: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["creationDate"], 1_700_000_000_123i64);

        let back: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_validate_numbering() {
        let mut doc = Document::new();
        doc.add_page(Page::letter(1));
        doc.add_page(Page::letter(2));
        assert!(doc.validate_numbering().is_ok());

        doc.add_page(Page::letter(5));
        assert!(doc.validate_numbering().is_err());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_document_without_metadata() {
        let json = serde_json::to_string(&Document::new()).unwrap();
        assert_eq!(json, r#"{"pages":[]}"#);
    }
}
