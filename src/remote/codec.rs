use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use super::error::{FetchFailure, SaveFailure};
use crate::store::StatusEntry;

#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    text: String,
    time: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedDocument {
    pub entries: Vec<StatusEntry>,
    /// Entries dropped because their `time` was not an RFC 3339 instant.
    pub skipped: usize,
}

pub fn decode_document(bytes: &[u8]) -> Result<DecodedDocument, FetchFailure> {
    let wire: Vec<WireEntry> =
        serde_json::from_slice(bytes).map_err(|err| FetchFailure::Decode(err.to_string()))?;
    let mut decoded = DecodedDocument {
        entries: Vec::with_capacity(wire.len()),
        skipped: 0,
    };
    for (position, raw) in wire.into_iter().enumerate() {
        match OffsetDateTime::parse(raw.time.trim(), &Rfc3339) {
            Ok(time) => decoded.entries.push(StatusEntry::new(raw.text, time)),
            Err(err) => {
                tracing::warn!(position, time = %raw.time, %err, "skipping status with unparseable time");
                decoded.skipped += 1;
            }
        }
    }
    Ok(decoded)
}

pub fn encode_document(entries: &[StatusEntry]) -> Result<Vec<u8>, SaveFailure> {
    let wire = entries
        .iter()
        .map(|entry| {
            entry
                .time
                .to_offset(UtcOffset::UTC)
                .format(&Rfc3339)
                .map(|time| WireEntry {
                    text: entry.text.clone(),
                    time,
                })
                .map_err(|err| SaveFailure::Encode(err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_vec(&wire).map_err(|err| SaveFailure::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    #[test]
    fn decodes_browser_style_timestamps() {
        let doc = br#"[
            {"text":"hi","time":"2025-01-01T00:00:00.000Z"},
            {"text":"later","time":"2025-01-01T05:30:00-05:00"}
        ]"#;
        let decoded = decode_document(doc).expect("decodes");
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.entries.len(), 2);
        assert_eq!(decoded.entries[0].text, "hi");
        assert_eq!(decoded.entries[0].time, datetime!(2025-01-01 00:00 UTC));
        assert_eq!(decoded.entries[1].time, datetime!(2025-01-01 10:30 UTC));
    }

    #[test]
    fn skips_entries_with_bad_times_and_keeps_the_rest() {
        let doc = br#"[
            {"text":"ok","time":"2025-01-01T00:00:00Z"},
            {"text":"bad","time":"yesterday-ish"},
            {"text":"blank","time":""}
        ]"#;
        let decoded = decode_document(doc).expect("decodes");
        assert_eq!(decoded.skipped, 2);
        let texts: Vec<_> = decoded.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["ok"]);
    }

    #[test]
    fn rejects_documents_that_are_not_status_arrays() {
        assert_matches!(decode_document(b"{}"), Err(FetchFailure::Decode(_)));
        assert_matches!(decode_document(b"not json"), Err(FetchFailure::Decode(_)));
        assert_matches!(
            decode_document(br#"[{"time":"2025-01-01T00:00:00Z"}]"#),
            Err(FetchFailure::Decode(_))
        );
    }

    #[test]
    fn empty_array_is_an_empty_collection() {
        let decoded = decode_document(b"[]").expect("decodes");
        assert!(decoded.entries.is_empty());
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn encodes_text_and_utc_time_only() {
        let entries = vec![StatusEntry::new(
            "cake \"now\"",
            datetime!(2025-06-03 15:05 -4),
        )];
        let bytes = encode_document(&entries).expect("encodes");
        let json = String::from_utf8(bytes).expect("utf8");
        assert_eq!(
            json,
            r#"[{"text":"cake \"now\"","time":"2025-06-03T19:05:00Z"}]"#
        );
    }
}
