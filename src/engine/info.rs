//! The document information dictionary.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object, StringFormat};

use super::source::resolve;

pub const TITLE: &str = "Title";
pub const AUTHOR: &str = "Author";
pub const CREATOR: &str = "Creator";
pub const PRODUCER: &str = "Producer";
pub const CREATION_DATE: &str = "CreationDate";
pub const MOD_DATE: &str = "ModDate";

/// Text entries of a PDF `/Info` dictionary, keyed by their PDF names.
///
/// Dates are kept in their raw PDF date syntax; the metadata translator owns
/// the conversion to instants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoDictionary {
    entries: BTreeMap<String, String>,
}

impl InfoDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Read the trailer's `/Info` dictionary, keeping entries that decode as text.
    pub(crate) fn from_document(doc: &LopdfDocument) -> Self {
        let mut info = Self::new();
        let dict = match doc.trailer.get(b"Info") {
            Ok(obj) => match resolve(doc, obj).as_dict() {
                Ok(dict) => dict,
                Err(_) => return info,
            },
            Err(_) => return info,
        };

        for (key, value) in dict.iter() {
            if let Some(text) = decode_text_string(resolve(doc, value)) {
                info.set(String::from_utf8_lossy(key).into_owned(), text);
            }
        }
        info
    }

    /// Build the `/Info` dictionary written into a new PDF.
    pub(crate) fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (key, value) in self.iter() {
            dict.set(key.as_bytes().to_vec(), encode_text_string(value));
        }
        dict
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 behind a byte order mark,
/// otherwise PDFDocEncoding.
pub(crate) fn decode_text_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => match bytes.as_slice() {
            [0xFE, 0xFF, rest @ ..] => {
                let utf16: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            }
            [0xEF, 0xBB, 0xBF, rest @ ..] => Some(String::from_utf8_lossy(rest).into_owned()),
            _ => Some(bytes.iter().map(|&b| pdf_doc_char(b)).collect()),
        },
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Code points 0x80..=0x9E of PDFDocEncoding.
const PDF_DOC_HIGH: [char; 31] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}',
    '\u{2044}', '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}',
    '\u{201D}', '\u{2018}', '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}',
    '\u{0141}', '\u{0152}', '\u{0160}', '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}',
    '\u{0153}', '\u{0161}', '\u{017E}',
];

/// Code points 0x18..=0x1F of PDFDocEncoding (spacing diacritics).
const PDF_DOC_LOW: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}',
    '\u{02DC}',
];

fn pdf_doc_char(code: u8) -> char {
    match code {
        0x18..=0x1F => PDF_DOC_LOW[usize::from(code - 0x18)],
        0x80..=0x9E => PDF_DOC_HIGH[usize::from(code - 0x80)],
        0xA0 => '\u{20AC}',
        0x9F | 0xAD => char::REPLACEMENT_CHARACTER,
        _ => char::from(code),
    }
}

/// Encode a text string, switching to UTF-16BE when it is not plain ASCII.
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.bytes().all(|b| b.is_ascii() && !(0x18..=0x1F).contains(&b)) {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_string_round_trip() {
        for text in ["Plain title", "Résumé – ñ", "日本語"] {
            let obj = encode_text_string(text);
            assert_eq!(decode_text_string(&obj).as_deref(), Some(text));
        }
    }

    #[test]
    fn test_pdf_doc_encoding() {
        let obj = Object::String(vec![0x48, 0xE9], StringFormat::Literal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("Hé"));

        // Valid UTF-8 for "é", but two PDFDocEncoding characters.
        let obj = Object::String(vec![0xC3, 0xA9], StringFormat::Literal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("Ã©"));

        let obj = Object::String(vec![0x84, 0x92, 0xA0], StringFormat::Literal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("\u{2014}\u{2122}\u{20AC}"));
    }

    #[test]
    fn test_utf8_with_byte_order_mark() {
        let obj = Object::String(vec![0xEF, 0xBB, 0xBF, 0xC3, 0xA9], StringFormat::Literal);
        assert_eq!(decode_text_string(&obj).as_deref(), Some("é"));
    }

    #[test]
    fn test_dictionary_round_trip() {
        let mut info = InfoDictionary::new();
        info.set(TITLE, "Quarterly");
        info.set("Subject", "Numbers");
        let dict = info.to_dictionary();
        assert!(dict.has(b"Title"));
        assert!(dict.has(b"Subject"));
        assert_eq!(info.get(TITLE), Some("Quarterly"));
        assert_eq!(info.remove("Subject").as_deref(), Some("Numbers"));
        assert!(info.get("Subject").is_none());
    }
}
