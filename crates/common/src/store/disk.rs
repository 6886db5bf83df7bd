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

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use alloy_primitives::keccak256;
use tokio::fs;
use tracing::{debug, trace, warn};

use super::{normalize_path, FileStore, StoreError, StoredFile};

const RECORD_EXTENSION: &str = "json";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A store that keeps one JSON record per file under a root directory.
///
/// Record files are named after the keccak256 hash of the normalized path, so
/// arbitrary path strings map onto flat, filesystem-safe names. Each record
/// carries its own path, which is what [`FileStore::get_all`] reports.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened disk store");
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, path: &str) -> PathBuf {
        let name = keccak256(path.as_bytes());
        self.root.join(format!("{}.{RECORD_EXTENSION}", hex::encode(name)))
    }

    async fn read_record(&self, file: &Path) -> Result<Option<StoredFile>, StoreError> {
        match fs::read_to_string(file).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl FileStore for DiskStore {
    async fn put(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let record = StoredFile::new(path, content);
        let file = self.record_path(&record.path);
        trace!(path = %record.path, file = %file.display(), "disk store put");

        // Write to a sibling and rename so a record is never observed half-written.
        // Staging names are unique per put so concurrent puts to one key never collide.
        let staging = file.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&staging, serde_json::to_vec(&record)?).await?;
        if let Err(e) = fs::rename(&staging, &file).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<String, StoreError> {
        let path = normalize_path(path);
        let file = self.record_path(&path);
        match self.read_record(&file).await {
            Ok(Some(record)) if record.path == path => Ok(record.content),
            Ok(Some(_)) => Err(StoreError::Corrupted(path)),
            Ok(None) => Err(StoreError::NotFound(path)),
            Err(StoreError::Serde(_)) => Err(StoreError::Corrupted(path)),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let file = self.record_path(&normalize_path(path));
        match fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self) -> Result<Vec<StoredFile>, StoreError> {
        let mut records = Vec::new();
        for file in self.record_files().await? {
            match self.read_record(&file).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(StoreError::Serde(e)) => {
                    warn!(file = %file.display(), error = %e, "skipping corrupted store record");
                }
                Err(e) => return Err(e),
            }
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for file in self.record_files().await? {
            match fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(root = %self.root.display(), "cleared disk store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();

        store.put("contracts\\Foo.sol", "contract Foo {}").await.unwrap();
        assert_eq!(store.get("contracts/Foo.sol").await.unwrap(), "contract Foo {}");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DiskStore::open(dir.path()).await.unwrap();
            store.put("a/b.sol", "persisted").await.unwrap();
        }

        let store = DiskStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("a/b.sol").await.unwrap(), "persisted");
    }

    #[tokio::test]
    async fn test_get_missing_and_delete_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();

        assert!(store.get("missing.sol").await.unwrap_err().is_not_found());
        store.delete("missing.sol").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_all_skips_corrupted_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();
        store.put("b.sol", "b").await.unwrap();
        store.put("a.sol", "a").await.unwrap();
        std::fs::write(dir.path().join("garbage.json"), "not json").unwrap();

        let all = store.get_all().await.unwrap();
        let paths: Vec<_> = all.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.sol", "b.sol"]);
    }

    #[tokio::test]
    async fn test_corrupted_record_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();
        let file = store.record_path("x.sol");
        std::fs::write(&file, "{").unwrap();

        assert!(matches!(store.get("x.sol").await, Err(StoreError::Corrupted(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();

        for _ in 0..50 {
            let (one, two) = tokio::join!(store.put("x.sol", "one"), store.put("x.sol", "two"));
            one.unwrap();
            two.unwrap();
        }

        let content = store.get("x.sol").await.unwrap();
        assert!(content == "one" || content == "two");
        assert_eq!(store.record_files().await.unwrap().len(), 1);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).await.unwrap();
        for i in 0..5 {
            store.put(&format!("dir/{i}.sol"), "x").await.unwrap();
        }

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
