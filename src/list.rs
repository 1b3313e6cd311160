//! Query entry point: every indexed document, ready for rendering.
//!
//! Records may point at files that were removed by hand. Listing never
//! fails because of that; each entry carries the paths that are missing
//! so the caller can show a placeholder instead.
//!
//! Used by the `homedocs list` / `homedocs get` commands and by
//! `GET /documents` on the HTTP server.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::index::MetadataIndex;
use crate::models::{DocumentRecord, IndexEntry};

/// One index entry plus the referenced files that no longer exist.
#[derive(Debug, Clone, Serialize)]
pub struct ListedDocument {
    pub key: u64,
    pub record: DocumentRecord,
    pub missing_files: Vec<String>,
}

impl ListedDocument {
    pub fn from_entry(entry: IndexEntry) -> Self {
        let missing_files = missing_files(&entry.record);
        Self {
            key: entry.key,
            record: entry.record,
            missing_files,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_files.is_empty()
    }
}

/// Paths referenced by `record` that are not on disk.
pub fn missing_files(record: &DocumentRecord) -> Vec<String> {
    let mut paths = vec![&record.full_path, &record.thumbnail_path];
    if let Some(p) = &record.processed_path {
        paths.push(p);
    }
    paths
        .into_iter()
        .filter(|p| !Path::new(p.as_str()).exists())
        .cloned()
        .collect()
}

pub fn list_documents(index: &MetadataIndex) -> crate::error::Result<Vec<ListedDocument>> {
    Ok(index
        .all()?
        .into_iter()
        .map(ListedDocument::from_entry)
        .collect())
}

/// Looks up an entry by numeric key first, then by document id.
/// `Ok(None)` means no such document.
pub fn find_document(
    index: &MetadataIndex,
    key_or_id: &str,
) -> crate::error::Result<Option<ListedDocument>> {
    if let Ok(key) = key_or_id.parse::<u64>() {
        if let Some(record) = index.get(key)? {
            return Ok(Some(ListedDocument::from_entry(IndexEntry { key, record })));
        }
    }
    Ok(index.find_by_id(key_or_id)?.map(ListedDocument::from_entry))
}

/// CLI entry point for `homedocs list`.
pub fn run_list(config: &Config, json: bool) -> Result<()> {
    let index = MetadataIndex::new(config.data_root());
    let docs = list_documents(&index)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<5} {:<36} {:<24} {:<20} {:<4} TAGS",
        "KEY", "ID", "FILENAME", "UPLOADED", "OCR"
    );
    for doc in &docs {
        let r = &doc.record;
        println!(
            "{:<5} {:<36} {:<24} {:<20} {:<4} {}{}",
            doc.key,
            r.id,
            truncate(&r.original_filename, 24),
            r.upload_time.format("%Y-%m-%d %H:%M:%S"),
            if r.ocr_text.is_some() { "yes" } else { "no" },
            r.tag_list().join(", "),
            if doc.is_complete() { "" } else { "  [missing files]" }
        );
    }
    println!();
    println!("{} document(s)", docs.len());
    Ok(())
}

/// CLI entry point for `homedocs get`.
pub fn run_get(config: &Config, key_or_id: &str) -> Result<()> {
    let index = MetadataIndex::new(config.data_root());
    let Some(doc) = find_document(&index, key_or_id)? else {
        bail!("document not found: {}", key_or_id);
    };
    let r = &doc.record;

    println!("--- Document {} ---", doc.key);
    println!("id:                {}", r.id);
    println!("original_filename: {}", r.original_filename);
    println!("tags:              {}", r.tag_list().join(", "));
    println!(
        "upload_time:       {} ({})",
        r.upload_time.to_rfc3339(),
        r.upload_time_zone
    );
    println!("full_path:         {}", r.full_path);
    println!("thumbnail_path:    {}", r.thumbnail_path);
    if let Some(ref p) = r.processed_path {
        println!("processed_path:    {}", p);
    }
    if let Some(ref sum) = r.sha256 {
        println!("sha256:            {}", sum);
    }
    for missing in &doc.missing_files {
        println!("MISSING:           {}", missing);
    }
    println!();

    if let Some(ref summary) = r.summary_text {
        println!("--- Summary ---");
        println!("{}", summary);
        println!();
    }
    match r.ocr_text {
        Some(ref text) => {
            println!("--- OCR Text ---");
            println!("{}", text);
        }
        None => println!("(no OCR text)"),
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record_at(dir: &Path, id: &str, create_files: bool) -> DocumentRecord {
        let full = dir.join(format!("{}.jpg", id));
        let thumb = dir.join(format!("thumb-{}.jpg", id));
        if create_files {
            std::fs::write(&full, b"jpg").unwrap();
            std::fs::write(&thumb, b"jpg").unwrap();
        }
        DocumentRecord {
            id: id.to_string(),
            original_filename: "scan.jpg".to_string(),
            tags: "bank statement".to_string(),
            extension: ".jpg".to_string(),
            full_path: full.to_string_lossy().into_owned(),
            thumbnail_path: thumb.to_string_lossy().into_owned(),
            upload_time: Utc::now(),
            upload_time_zone: "utc".to_string(),
            ocr_text: None,
            summary_text: None,
            processed_path: None,
            sha256: None,
        }
    }

    #[test]
    fn listing_tolerates_missing_files() {
        let tmp = TempDir::new().unwrap();
        let index = MetadataIndex::new(tmp.path());
        index.append(record_at(tmp.path(), "present", true)).unwrap();
        let gone = record_at(tmp.path(), "gone", false);
        let gone_thumb = gone.thumbnail_path.clone();
        index.append(gone).unwrap();

        let docs = list_documents(&index).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].is_complete());
        assert_eq!(docs[1].missing_files.len(), 2);
        assert!(docs[1].missing_files.contains(&gone_thumb));
    }

    #[test]
    fn find_by_key_or_id() {
        let tmp = TempDir::new().unwrap();
        let index = MetadataIndex::new(tmp.path());
        index.append(record_at(tmp.path(), "abc-1", true)).unwrap();
        index.append(record_at(tmp.path(), "abc-2", true)).unwrap();

        assert_eq!(find_document(&index, "1").unwrap().unwrap().record.id, "abc-2");
        assert_eq!(find_document(&index, "abc-1").unwrap().unwrap().key, 0);
        assert!(find_document(&index, "nope").unwrap().is_none());
        assert!(find_document(&index, "7").unwrap().is_none());
    }

    #[test]
    fn lookup_on_corrupt_index_is_an_error_not_a_miss() {
        let tmp = TempDir::new().unwrap();
        let index = MetadataIndex::new(tmp.path());
        std::fs::write(index.path(), "{oops").unwrap();

        let err = find_document(&index, "0").unwrap_err();
        assert_eq!(err.code(), "index_corrupt");
    }

    #[test]
    fn empty_root_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = MetadataIndex::new(tmp.path().join("fresh"));
        assert!(list_documents(&index).unwrap().is_empty());
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("short.jpg", 24), "short.jpg");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
