//! Shard-tree addressing.
//!
//! A stored document lives at `root/<c0>/<c1>/<c2>/<token><ext>`, where
//! `c0..c2` are the first three characters of its token. Tokens are UUID v4
//! strings, so the leading characters are lowercase hex digits and always
//! land inside the tree built by [`crate::tree::ensure_tree`].

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{HomeDocsError, Result};

/// Number of leading token characters used as path segments.
pub const SHARD_DEPTH: usize = 3;

/// Fresh-token attempts before [`allocate`] gives up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// A resolved storage address for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub token: String,
    pub path: PathBuf,
}

/// Generates a new random token.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Computes the storage path for `token`. Pure and deterministic.
pub fn resolve(root: &Path, token: &str, extension: &str) -> Result<PathBuf> {
    let mut segments = token.chars().take(SHARD_DEPTH);
    let (Some(c0), Some(c1), Some(c2)) = (segments.next(), segments.next(), segments.next())
    else {
        return Err(HomeDocsError::InvalidToken(token.to_string()));
    };
    if [c0, c1, c2].iter().any(|c| matches!(c, '/' | '\\' | '.')) {
        return Err(HomeDocsError::InvalidToken(token.to_string()));
    }

    Ok(root
        .join(c0.to_string())
        .join(c1.to_string())
        .join(c2.to_string())
        .join(format!("{}{}", token, extension)))
}

/// Generates a token whose resolved path is not occupied yet.
///
/// Collisions are not expected with UUID v4 tokens; the check keeps a
/// stray file from ever being overwritten.
pub fn allocate(root: &Path, extension: &str) -> Result<Address> {
    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
        let token = generate_token();
        let path = resolve(root, &token, extension)?;
        if !path.exists() {
            return Ok(Address { token, path });
        }
        tracing::warn!(path = %path.display(), "address collision, drawing a new token");
    }
    Err(HomeDocsError::AddressExhausted {
        root: root.to_path_buf(),
        attempts: MAX_ALLOCATION_ATTEMPTS,
    })
}
