//! JSON serialization of the document model.

use std::io::{Read, Write};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::{Error, Result};
use crate::model::Document;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with a 4-space indent
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a document to JSON.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let mut buf = Vec::new();
    to_writer(doc, format, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Serialization(e.to_string()))
}

/// Write a document as JSON into a sink.
pub fn to_writer<W: Write>(doc: &Document, format: JsonFormat, writer: W) -> Result<()> {
    let result = match format {
        JsonFormat::Pretty => {
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = Serializer::with_formatter(writer, formatter);
            doc.serialize(&mut ser)
        }
        JsonFormat::Compact => serde_json::to_writer(writer, doc),
    };
    result.map_err(|e| {
        if e.is_io() {
            Error::Io(e.into())
        } else {
            Error::Serialization(format!("JSON serialization error: {}", e))
        }
    })
}

/// Parse a document from JSON and check it against the model invariants.
pub fn from_json(json: &str) -> Result<Document> {
    let doc: Document = serde_json::from_str(json).map_err(invalid)?;
    doc.validate()?;
    Ok(doc)
}

/// Read a document from a JSON source.
pub fn from_reader<R: Read>(reader: R) -> Result<Document> {
    let doc: Document = serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            Error::Io(e.into())
        } else {
            invalid(e)
        }
    })?;
    doc.validate()?;
    Ok(doc)
}

fn invalid(e: serde_json::Error) -> Error {
    Error::InvalidModel(e.to_string())
}
