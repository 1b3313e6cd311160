//! Core data models stored in the metadata index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension given to every stored original and preview.
pub const JPEG_EXTENSION: &str = ".jpg";

/// One ingested image, as recorded in `map.json`.
///
/// Optional fields that were never produced are omitted from the JSON and
/// read back as `None`. Legacy key names (`uuid`, `thumbnail`,
/// `ocr_string`, `t5_summary`) are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(alias = "uuid")]
    pub id: String,
    pub original_filename: String,
    pub tags: String,
    pub extension: String,
    pub full_path: String,
    #[serde(alias = "thumbnail")]
    pub thumbnail_path: String,
    pub upload_time: DateTime<Utc>,
    pub upload_time_zone: String,
    #[serde(default, alias = "ocr_string", skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, alias = "t5_summary", skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    /// Binarized derivative written next to the original.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    /// Hex SHA-256 of the uploaded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl DocumentRecord {
    /// Tags split on whitespace, the way the gallery shows them.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.split_whitespace().collect()
    }
}

/// A record together with its index key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub key: u64,
    pub record: DocumentRecord,
}
