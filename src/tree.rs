//! Shard tree initialization.
//!
//! The tree is a fixed 16×16×16 layout of single hex-digit directories.
//! It is built once under the storage root and never cleaned up.

use std::path::Path;
use walkdir::WalkDir;

use crate::error::{HomeDocsError, Result};

/// Digits used at every level of the tree.
pub const HEX_DIGITS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Number of leaf directories in a complete tree.
pub const LEAF_COUNT: usize = 16 * 16 * 16;

/// Ensures every leaf directory exists under `root`.
///
/// Safe to call on a partial or complete tree. Returns how many leaf
/// directories were newly created.
pub fn ensure_tree(root: &Path) -> Result<usize> {
    let mut created = 0;
    for a in HEX_DIGITS {
        for b in HEX_DIGITS {
            for c in HEX_DIGITS {
                let leaf = root
                    .join(a.to_string())
                    .join(b.to_string())
                    .join(c.to_string());
                if leaf.is_dir() {
                    continue;
                }
                std::fs::create_dir_all(&leaf)
                    .map_err(|e| HomeDocsError::storage_write(&leaf, e))?;
                created += 1;
            }
        }
    }
    if created > 0 {
        tracing::info!(root = %root.display(), created, "shard tree initialized");
    }
    Ok(created)
}

/// Counts leaf directories of the shard tree present under `root`.
pub fn count_leaves(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(3)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| is_shard_path(e.path().strip_prefix(root).unwrap_or(e.path())))
        .count()
}

fn is_shard_path(relative: &Path) -> bool {
    let parts: Vec<_> = relative.components().collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            let s = p.as_os_str().to_string_lossy();
            s.len() == 1 && s.chars().all(|c| HEX_DIGITS.contains(&c))
        })
}
