//! Skip-tracker entity model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reason stored for files skipped because all their subtitles are text based.
pub const REASON_TEXT_SUBTITLES: &str = "text_subtitles_present";

/// A row of `skipped_transcodes`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SkipRecord {
    pub file_path: String,
    pub reason: String,
    /// Compact JSON, see [`SkipMetadata`].
    pub metadata: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl SkipRecord {
    /// Decode the stored metadata. Rows with missing or malformed metadata
    /// yield `None` and are treated as stale by callers.
    pub fn parsed_metadata(&self) -> Option<SkipMetadata> {
        self.metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Size and modification time of a file, used to detect changes since the
/// file was last inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub size: u64,
    pub mtime_ns: i64,
}

/// Metadata stored alongside a skip record.
///
/// Fields are declared in alphabetical order so the serialized JSON has
/// sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipMetadata {
    #[serde(default)]
    pub codecs: Vec<String>,
    pub mtime_ns: i64,
    pub size: u64,
}

impl SkipMetadata {
    pub fn new(signature: FileSignature, codecs: Vec<String>) -> Self {
        Self {
            codecs,
            mtime_ns: signature.mtime_ns,
            size: signature.size,
        }
    }

    /// Whether the file still looks the way it did when the record was written.
    pub fn matches(&self, signature: &FileSignature) -> bool {
        self.size == signature.size && self.mtime_ns == signature.mtime_ns
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_json_has_sorted_compact_keys() {
        let meta = SkipMetadata::new(
            FileSignature {
                size: 1024,
                mtime_ns: 1_700_000_000_000_000_000,
            },
            vec!["ass".into(), "subrip".into()],
        );
        assert_eq!(
            meta.to_json(),
            r#"{"codecs":["ass","subrip"],"mtime_ns":1700000000000000000,"size":1024}"#
        );
    }

    #[test]
    fn matches_requires_both_fields() {
        let meta = SkipMetadata::new(FileSignature { size: 10, mtime_ns: 5 }, vec![]);
        assert!(meta.matches(&FileSignature { size: 10, mtime_ns: 5 }));
        assert!(!meta.matches(&FileSignature { size: 11, mtime_ns: 5 }));
        assert!(!meta.matches(&FileSignature { size: 10, mtime_ns: 6 }));
    }

    #[test]
    fn malformed_metadata_is_none() {
        let mut record = SkipRecord {
            file_path: "/a.mkv".into(),
            reason: REASON_TEXT_SUBTITLES.into(),
            metadata: Some("{not json".into()),
            created_at: None,
        };
        assert!(record.parsed_metadata().is_none());

        record.metadata = Some(r#"{"codecs":["srt"]}"#.into());
        assert!(record.parsed_metadata().is_none(), "size and mtime_ns are required");

        record.metadata = Some(r#"{"mtime_ns":3,"size":2}"#.into());
        let meta = record.parsed_metadata().unwrap();
        assert!(meta.codecs.is_empty());
        assert_eq!(meta.size, 2);
    }
}
