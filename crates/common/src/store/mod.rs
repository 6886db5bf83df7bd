// Solide - Solidity Workspace Engine
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Path-addressed file store.
//!
//! The store is a flat key-value collection mapping normalized file paths to
//! their text content. It has no notion of directories; the hierarchy seen by
//! users is derived from the keys by the virtual file system in the engine.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: a process-local map, used for tests and ephemeral sessions.
//! - [`DiskStore`]: one JSON record per path under a root directory, surviving
//!   restarts of the process.
//!
//! The store offers no multi-key transactions. A caller that rewrites one key
//! and deletes another performs two independent operations.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// A single persisted file record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredFile {
    /// Normalized path, the primary key of the record.
    pub path: String,
    /// Text content of the file.
    pub content: String,
}

impl StoredFile {
    /// Create a record, normalizing the given path.
    pub fn new(path: impl AsRef<str>, content: impl Into<String>) -> Self {
        Self { path: normalize_path(path.as_ref()), content: content.into() }
    }
}

/// Errors reported by a [`FileStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the path.
    #[error("file not found: {0}")]
    NotFound(String),
    /// A persisted record could not be decoded.
    #[error("corrupted record for {0}")]
    Corrupted(String),
    /// Underlying I/O failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Record (de)serialization failure.
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error only signals a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Normalize a file path: backslashes become forward slashes and runs of
/// slashes collapse into one.
///
/// Normalization is idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }
    normalized
}

/// Durable mapping of `{path -> content}` pairs.
///
/// Every method normalizes the path it receives, so callers may pass paths in
/// any separator style.
pub trait FileStore: Send + Sync + 'static {
    /// Insert or overwrite the content stored at `path`.
    fn put(&self, path: &str, content: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch the content at `path`, or [`StoreError::NotFound`].
    fn get(&self, path: &str) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Remove the record at `path`. Removing an absent key succeeds.
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every stored record, ordered by path.
    fn get_all(&self) -> impl Future<Output = Result<Vec<StoredFile>, StoreError>> + Send;

    /// Remove every record.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Whether a record exists at `path`.
    fn contains(&self, path: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move {
            match self.get(path).await {
                Ok(_) => Ok(true),
                Err(StoreError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_backslashes() {
        assert_eq!(normalize_path("a\\b\\c.sol"), "a/b/c.sol");
    }

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(normalize_path("a//b///c.sol"), "a/b/c.sol");
        assert_eq!(normalize_path("a\\\\b//c.sol"), "a/b/c.sol");
        assert_eq!(normalize_path("a\\/b"), "a/b");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["a\\b//c.sol", "//x//y\\\\z", "plain.sol", "", "\\", "dir/"] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_stored_file_normalizes() {
        let file = StoredFile::new("contracts\\\\Foo.sol", "contract Foo {}");
        assert_eq!(file.path, "contracts/Foo.sol");
    }
}
