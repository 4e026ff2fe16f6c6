//! Translation between [`Metadata`] and the PDF information dictionary.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::engine::{InfoDictionary, AUTHOR, CREATION_DATE, CREATOR, MOD_DATE, PRODUCER, TITLE};
use crate::model::Metadata;

/// Build model metadata from an info dictionary.
///
/// Absent or unparsable entries stay `None`; `total_pages` is taken from the
/// page tree, never from the dictionary.
pub fn to_model(info: &InfoDictionary, page_count: u32) -> Metadata {
    Metadata {
        title: text(info, TITLE),
        author: text(info, AUTHOR),
        creator: text(info, CREATOR),
        producer: text(info, PRODUCER),
        creation_date: info.get(CREATION_DATE).and_then(parse_pdf_date),
        modification_date: info.get(MOD_DATE).and_then(parse_pdf_date),
        total_pages: page_count,
    }
}

/// Copy the fields present in `metadata` into `info`.
///
/// Entries for absent fields are left as they are, and `total_pages` is never
/// written.
pub fn apply_to_info(info: &mut InfoDictionary, metadata: &Metadata) {
    let fields = [
        (TITLE, &metadata.title),
        (AUTHOR, &metadata.author),
        (CREATOR, &metadata.creator),
        (PRODUCER, &metadata.producer),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            info.set(key, value.as_str());
        }
    }
    if let Some(date) = metadata.creation_date {
        info.set(CREATION_DATE, format_pdf_date(&date));
    }
    if let Some(date) = metadata.modification_date {
        info.set(MOD_DATE, format_pdf_date(&date));
    }
}

fn text(info: &InfoDictionary, key: &str) -> Option<String> {
    info.get(key).map(str::to_string)
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Everything after the year is optional; missing fields default to the
/// start of their range and a missing offset means UTC.
pub fn parse_pdf_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    if s.len() < 4 || !s.is_char_boundary(4) {
        return None;
    }

    let digits = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len())
        .min(14);
    let (stamp, zone) = s.split_at(digits);

    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match stamp.get(range) {
            Some(v) => v.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = stamp.get(0..4)?.parse().ok()?;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_offset(zone)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse the `Z`, `+HH'mm'` or `-HH'mm'` suffix of a PDF date.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let mut chars = zone.chars();
    let sign = match chars.next() {
        None | Some('Z') | Some('z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };
    let rest: String = chars.filter(|c| *c != '\'').collect();
    let hours: i32 = rest.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Format an instant as a PDF date in UTC.
pub fn format_pdf_date(date: &DateTime<Utc>) -> String {
    format!("D:{}+00'00'", date.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_full_date() {
        let date = parse_pdf_date("D:20240115103045Z").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 15));
        assert_eq!((date.hour(), date.minute(), date.second()), (10, 30, 45));
    }

    #[test]
    fn test_parse_minimal_date() {
        let date = parse_pdf_date("D:2024").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 1));
        assert_eq!(date.hour(), 0);
    }

    #[test]
    fn test_parse_offset_normalizes_to_utc() {
        let date = parse_pdf_date("D:20240115103045+05'30'").unwrap();
        assert_eq!((date.hour(), date.minute()), (5, 0));

        let date = parse_pdf_date("D:20231231230000-02'00'").unwrap();
        assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2024, 1, 1, 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20241301").is_none());
        assert!(parse_pdf_date("D:20240115103045X").is_none());
        assert!(parse_pdf_date("").is_none());
    }

    #[test]
    fn test_format_round_trip() {
        let date = Utc.with_ymd_and_hms(2023, 6, 1, 8, 9, 10).unwrap();
        let text = format_pdf_date(&date);
        assert_eq!(text, "D:20230601080910+00'00'");
        assert_eq!(parse_pdf_date(&text), Some(date));
    }

    #[test]
    fn test_to_model() {
        let mut info = InfoDictionary::new();
        info.set(TITLE, "Annual Report");
        info.set(PRODUCER, "pdfTeX");
        info.set(CREATION_DATE, "D:20240115103045Z");
        info.set(MOD_DATE, "not a date");

        let metadata = to_model(&info, 7);
        assert_eq!(metadata.title.as_deref(), Some("Annual Report"));
        assert_eq!(metadata.producer.as_deref(), Some("pdfTeX"));
        assert!(metadata.author.is_none());
        assert!(metadata.creation_date.is_some());
        assert!(metadata.modification_date.is_none());
        assert_eq!(metadata.total_pages, 7);
    }

    #[test]
    fn test_apply_only_present_fields() {
        let mut info = InfoDictionary::new();
        info.set(AUTHOR, "Existing Author");
        info.set(TITLE, "Old Title");

        let metadata = Metadata {
            title: Some("New Title".to_string()),
            creation_date: Some(Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap()),
            total_pages: 42,
            ..Default::default()
        };
        apply_to_info(&mut info, &metadata);

        assert_eq!(info.get(TITLE), Some("New Title"));
        assert_eq!(info.get(AUTHOR), Some("Existing Author"));
        assert_eq!(info.get(CREATION_DATE), Some("D:20200229000000+00'00'"));
        assert!(info.get(MOD_DATE).is_none());
        assert!(info.iter().all(|(key, _)| !key.contains("Pages")));
    }
}
