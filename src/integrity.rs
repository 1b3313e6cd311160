//! Storage integrity report.
//!
//! Cross-checks the index against the filesystem: every record's original
//! and thumbnail must exist, originals carrying a checksum must still match
//! it, and the shard tree must be complete. Files under the
//! tree or `previews/` that no record references are reported as orphans
//! (left behind by ingests that failed after the original was written).
//! Used by `homedocs check`.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::{MetadataIndex, INDEX_FILE, LOCK_FILE};
use crate::tree;

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub documents: usize,
    pub leaf_dirs: usize,
    pub missing_originals: Vec<String>,
    pub missing_thumbnails: Vec<String>,
    pub checksum_mismatches: Vec<String>,
    pub orphan_files: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.leaf_dirs == tree::LEAF_COUNT
            && self.missing_originals.is_empty()
            && self.missing_thumbnails.is_empty()
            && self.checksum_mismatches.is_empty()
    }
}

pub fn check_storage(root: &Path) -> Result<IntegrityReport> {
    let index = MetadataIndex::new(root);
    let entries = index.all()?;

    let mut report = IntegrityReport {
        documents: entries.len(),
        leaf_dirs: tree::count_leaves(root),
        ..Default::default()
    };

    let mut referenced: HashSet<PathBuf> = HashSet::new();
    for entry in &entries {
        let r = &entry.record;
        referenced.insert(PathBuf::from(&r.full_path));
        referenced.insert(PathBuf::from(&r.thumbnail_path));
        if let Some(p) = &r.processed_path {
            referenced.insert(PathBuf::from(p));
        }

        let original = Path::new(&r.full_path);
        if !original.exists() {
            report.missing_originals.push(r.full_path.clone());
        } else if let Some(expected) = &r.sha256 {
            let actual = hex::encode(Sha256::digest(std::fs::read(original)?));
            if &actual != expected {
                report.checksum_mismatches.push(r.full_path.clone());
            }
        }
        if !Path::new(&r.thumbnail_path).exists() {
            report.missing_thumbnails.push(r.thumbnail_path.clone());
        }
    }

    if root.is_dir() {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            if entry.depth() == 1 && (name == INDEX_FILE || name == LOCK_FILE) {
                continue;
            }
            if !referenced.contains(path) {
                report.orphan_files.push(path.to_string_lossy().into_owned());
            }
        }
        report.orphan_files.sort();
    }

    Ok(report)
}

/// CLI entry point for `homedocs check`. Returns whether storage is clean.
pub fn run_check(config: &Config) -> Result<bool> {
    let root = config.data_root();
    let report = check_storage(root)?;

    println!("HomeDocs Storage Check");
    println!("======================");
    println!();
    println!("  Root:        {}", root.display());
    println!("  Documents:   {}", report.documents);
    println!("  Shard dirs:  {} / {}", report.leaf_dirs, tree::LEAF_COUNT);
    print_list("Missing originals", &report.missing_originals);
    print_list("Missing thumbnails", &report.missing_thumbnails);
    print_list("Checksum mismatches", &report.checksum_mismatches);
    print_list("Orphan files", &report.orphan_files);
    println!();
    println!("{}", if report.is_clean() { "ok" } else { "problems found" });

    Ok(report.is_clean())
}

fn print_list(label: &str, items: &[String]) {
    println!("  {}: {}", label, items.len());
    for item in items {
        println!("    {}", item);
    }
}
