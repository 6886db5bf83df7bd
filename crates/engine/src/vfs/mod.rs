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

//! Virtual file system over a [`FileStore`].
//!
//! [`VirtualFs`] is a stateless view: it normalizes every path it receives,
//! derives the directory hierarchy from the store's keys on each listing and
//! implements moves as read, write and delete sequences.
//!
//! # Moves are not transactional
//!
//! The store offers no multi-key transactions. Every collision check runs
//! before the first write, so a rejected move leaves the store untouched, but
//! a store failure in the middle of a directory move leaves the files moved
//! so far at their new location and the rest at the old one. Each file is
//! written to its destination before its source is deleted, so a partial
//! move can duplicate files but never lose them.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use solide_common::{normalize_path, FileStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod path;
pub mod tree;

pub use path::resolve_import_path;
pub use tree::{build_tree, file_paths, FileSystemItem, ItemKind, PLACEHOLDER_FILE};

use path::{clean_path, is_occupied, is_within, unique_path};

/// Directory created on open so a fresh workspace is never empty.
pub const DEFAULT_DIRECTORY: &str = "contracts";

/// Errors reported by the [`VirtualFs`].
#[derive(Debug, Error)]
pub enum VfsError {
    /// No file or directory exists at the path.
    #[error("file not found: {0}")]
    NotFound(String),
    /// A move target is taken and renaming was not requested.
    #[error("a file or directory already exists at {0}")]
    AlreadyExists(String),
    /// A move whose target is the source itself or lies below it.
    #[error("cannot move {from} into itself ({to})")]
    InvalidMove {
        /// Path being moved.
        from: String,
        /// Requested destination.
        to: String,
    },
    /// An import requested by the compiler has no stored file.
    #[error("Unable to resolve import: {0}")]
    ImportResolution(String),
    /// Failure of the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VfsError {
    /// Whether the error only signals a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Store(e) if e.is_not_found())
    }
}

/// Options of [`VirtualFs::move_file`] and [`VirtualFs::move_directory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOptions {
    /// Pick `name_1`, `name_2`, ... instead of failing when the target is taken.
    pub auto_rename: bool,
}

impl MoveOptions {
    /// Options with automatic renaming enabled.
    pub fn auto_rename() -> Self {
        Self { auto_rename: true }
    }
}

/// Where a move ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// Final destination path.
    pub new_path: String,
    /// Whether the destination differs from the requested target.
    pub renamed: bool,
}

/// Hierarchical file operations over a flat [`FileStore`].
#[derive(Debug)]
pub struct VirtualFs<S> {
    store: Arc<S>,
}

impl<S> Clone for VirtualFs<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: FileStore> VirtualFs<S> {
    /// Open a file system over `store`, creating [`DEFAULT_DIRECTORY`] if it
    /// does not exist yet.
    pub async fn open(store: S) -> Self {
        let vfs = Self { store: Arc::new(store) };
        if let Err(e) = vfs.create_directory(DEFAULT_DIRECTORY).await {
            warn!(error = %e, "failed to create the default directory");
        }
        vfs
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create or overwrite a file.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), VfsError> {
        let path = normalize_path(path);
        debug!(path = %path, bytes = content.len(), "writing file");
        self.store.put(&path, content).await?;
        Ok(())
    }

    /// Content of a file, or [`VfsError::NotFound`].
    pub async fn read_file(&self, path: &str) -> Result<String, VfsError> {
        let path = normalize_path(path);
        match self.store.get(&path).await {
            Ok(content) => Ok(content),
            Err(StoreError::NotFound(_)) => Err(VfsError::NotFound(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a file. Deleting an absent file succeeds.
    pub async fn delete_file(&self, path: &str) -> Result<(), VfsError> {
        let path = normalize_path(path);
        debug!(path = %path, "deleting file");
        self.store.delete(&path).await?;
        Ok(())
    }

    /// Whether a file exists at `path`.
    pub async fn exists(&self, path: &str) -> Result<bool, VfsError> {
        Ok(self.store.contains(&normalize_path(path)).await?)
    }

    /// The directory hierarchy derived from every stored path.
    pub async fn list_files(&self) -> Result<Vec<FileSystemItem>, VfsError> {
        let files = self.store.get_all().await?;
        Ok(build_tree(files.iter().map(|f| f.path.as_str())))
    }

    /// Every stored file as a flat `{path -> content}` map.
    pub async fn get_files(&self) -> Result<BTreeMap<String, String>, VfsError> {
        let files = self.store.get_all().await?;
        Ok(files.into_iter().map(|f| (f.path, f.content)).collect())
    }

    /// Make a directory visible by writing its placeholder file.
    pub async fn create_directory(&self, path: &str) -> Result<(), VfsError> {
        let placeholder = format!("{}/{PLACEHOLDER_FILE}", clean_path(path));
        if !self.exists(&placeholder).await? {
            self.store.put(&placeholder, "").await?;
        }
        Ok(())
    }

    /// Delete a directory and every file below it. Returns the number of
    /// deleted files.
    pub async fn delete_directory(&self, path: &str) -> Result<usize, VfsError> {
        let dir = clean_path(path);
        let members: Vec<String> =
            self.get_files().await?.into_keys().filter(|p| is_within(p, &dir)).collect();
        if members.is_empty() {
            return Err(VfsError::NotFound(dir));
        }
        for member in &members {
            self.store.delete(member).await?;
        }
        info!(path = %dir, files = members.len(), "deleted directory");
        Ok(members.len())
    }

    /// Move a single file.
    ///
    /// Fails with [`VfsError::AlreadyExists`] when `target` is taken unless
    /// [`MoveOptions::auto_rename`] is set, in which case the first free
    /// `name_N.ext` sibling is used.
    pub async fn move_file(
        &self,
        source: &str,
        target: &str,
        options: MoveOptions,
    ) -> Result<MoveOutcome, VfsError> {
        let source = clean_path(source);
        let target = clean_path(target);
        if is_within(&target, &source) {
            return Err(VfsError::InvalidMove { from: source, to: target });
        }

        let content = self.read_file(&source).await?;
        let keys: Vec<String> = self.get_files().await?.into_keys().collect();
        let taken = |p: &str| is_occupied(p, keys.iter().map(String::as_str));

        let (new_path, renamed) = if taken(&target) {
            if !options.auto_rename {
                return Err(VfsError::AlreadyExists(target));
            }
            (unique_path(&target, taken), true)
        } else {
            (target, false)
        };

        self.store.put(&new_path, &content).await?;
        self.store.delete(&source).await?;
        info!(from = %source, to = %new_path, renamed, "moved file");

        Ok(MoveOutcome { new_path, renamed })
    }

    /// Move a directory together with every file below it.
    ///
    /// The collision policy of [`Self::move_file`] applies to the directory
    /// as a whole. See the module documentation for the failure semantics.
    pub async fn move_directory(
        &self,
        source: &str,
        target: &str,
        options: MoveOptions,
    ) -> Result<MoveOutcome, VfsError> {
        let source = clean_path(source);
        let target = clean_path(target);
        if is_within(&target, &source) {
            return Err(VfsError::InvalidMove { from: source, to: target });
        }

        let files = self.get_files().await?;
        let members: Vec<(&String, &String)> =
            files.iter().filter(|(path, _)| is_within(path, &source)).collect();
        if members.is_empty() {
            return Err(VfsError::NotFound(source));
        }

        let taken = |p: &str| is_occupied(p, files.keys().map(String::as_str));
        let (new_path, renamed) = if taken(&target) {
            if !options.auto_rename {
                return Err(VfsError::AlreadyExists(target));
            }
            (unique_path(&target, taken), true)
        } else {
            (target, false)
        };

        for (path, content) in &members {
            let relocated = format!("{new_path}{}", &path[source.len()..]);
            self.store.put(&relocated, content).await?;
            self.store.delete(path).await?;
        }
        info!(from = %source, to = %new_path, files = members.len(), renamed, "moved directory");

        Ok(MoveOutcome { new_path, renamed })
    }

    /// Content of an imported file, or [`VfsError::ImportResolution`].
    pub async fn resolve_import(&self, import_path: &str) -> Result<String, VfsError> {
        match self.read_file(import_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.is_not_found() => {
                Err(VfsError::ImportResolution(normalize_path(import_path)))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every file, e.g. when switching workspaces.
    pub async fn clear(&self) -> Result<(), VfsError> {
        self.store.clear().await?;
        info!("cleared workspace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solide_common::MemoryStore;

    async fn vfs() -> VirtualFs<MemoryStore> {
        VirtualFs::open(MemoryStore::new()).await
    }

    #[tokio::test]
    async fn test_open_creates_default_directory() {
        let vfs = vfs().await;
        assert!(vfs.exists("contracts/.gitkeep").await.unwrap());

        let tree = vfs.list_files().await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "contracts");
        assert!(tree[0].children().is_empty());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_placeholder() {
        let store = MemoryStore::new();
        store.put("contracts/.gitkeep", "keep").await.unwrap();
        let vfs = VirtualFs::open(store).await;
        assert_eq!(vfs.read_file("contracts/.gitkeep").await.unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_normalized_access() {
        let vfs = vfs().await;
        vfs.write_file("a\\b//c.sol", "x").await.unwrap();
        assert_eq!(vfs.read_file("a/b/c.sol").await.unwrap(), "x");
        assert!(vfs.exists("a\\b\\c.sol").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let vfs = vfs().await;
        let err = vfs.read_file("nope.sol").await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(ref p) if p == "nope.sol"));
    }

    #[tokio::test]
    async fn test_move_file_plain() {
        let vfs = vfs().await;
        vfs.write_file("a.sol", "A").await.unwrap();

        let outcome = vfs.move_file("a.sol", "lib/a.sol", MoveOptions::default()).await.unwrap();
        assert_eq!(outcome, MoveOutcome { new_path: "lib/a.sol".into(), renamed: false });
        assert!(!vfs.exists("a.sol").await.unwrap());
        assert_eq!(vfs.read_file("lib/a.sol").await.unwrap(), "A");
    }

    #[tokio::test]
    async fn test_move_file_collision_without_rename() {
        let vfs = vfs().await;
        vfs.write_file("a.sol", "new").await.unwrap();
        vfs.write_file("b/a.sol", "old").await.unwrap();
        let before = vfs.get_files().await.unwrap();

        let err = vfs.move_file("a.sol", "b/a.sol", MoveOptions::default()).await.unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        assert_eq!(vfs.get_files().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_move_file_auto_rename() {
        let vfs = vfs().await;
        vfs.write_file("a.sol", "new").await.unwrap();
        vfs.write_file("b/a.sol", "old").await.unwrap();

        let outcome = vfs.move_file("a.sol", "b/a.sol", MoveOptions::auto_rename()).await.unwrap();
        assert_eq!(outcome, MoveOutcome { new_path: "b/a_1.sol".into(), renamed: true });
        assert_eq!(vfs.read_file("b/a.sol").await.unwrap(), "old");
        assert_eq!(vfs.read_file("b/a_1.sol").await.unwrap(), "new");
        assert!(!vfs.exists("a.sol").await.unwrap());

        vfs.write_file("c.sol", "third").await.unwrap();
        let outcome = vfs.move_file("c.sol", "b/a.sol", MoveOptions::auto_rename()).await.unwrap();
        assert_eq!(outcome.new_path, "b/a_2.sol");
    }

    #[tokio::test]
    async fn test_move_missing_file() {
        let vfs = vfs().await;
        let err = vfs.move_file("ghost.sol", "x.sol", MoveOptions::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_move_directory_with_children() {
        let vfs = vfs().await;
        vfs.write_file("a/1.sol", "one").await.unwrap();
        vfs.write_file("a/2.sol", "two").await.unwrap();
        vfs.write_file("ab.sol", "sibling").await.unwrap();

        let outcome = vfs.move_directory("a", "b", MoveOptions::default()).await.unwrap();
        assert_eq!(outcome.new_path, "b");

        let leaves = file_paths(&vfs.list_files().await.unwrap());
        assert!(leaves.contains(&"b/1.sol".to_string()));
        assert!(leaves.contains(&"b/2.sol".to_string()));
        assert!(leaves.contains(&"ab.sol".to_string()));
        let tree = vfs.list_files().await.unwrap();
        assert!(tree.iter().all(|item| item.path != "a"));
    }

    #[tokio::test]
    async fn test_move_directory_into_own_subtree_rejected() {
        let vfs = vfs().await;
        vfs.write_file("x/y/z.sol", "z").await.unwrap();
        let before = vfs.get_files().await.unwrap();

        for target in ["x/y", "x", "x/y/deeper"] {
            let err = vfs.move_directory("x", target, MoveOptions::auto_rename()).await.unwrap_err();
            assert!(matches!(err, VfsError::InvalidMove { .. }), "target {target}");
        }
        assert_eq!(vfs.get_files().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_move_directory_collision() {
        let vfs = vfs().await;
        vfs.write_file("a/1.sol", "one").await.unwrap();
        vfs.write_file("b/other.sol", "other").await.unwrap();
        let before = vfs.get_files().await.unwrap();

        let err = vfs.move_directory("a", "b", MoveOptions::default()).await.unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        assert_eq!(vfs.get_files().await.unwrap(), before);

        let outcome = vfs.move_directory("a", "b", MoveOptions::auto_rename()).await.unwrap();
        assert_eq!(outcome, MoveOutcome { new_path: "b_1".into(), renamed: true });
        assert_eq!(vfs.read_file("b_1/1.sol").await.unwrap(), "one");
        assert_eq!(vfs.read_file("b/other.sol").await.unwrap(), "other");
    }

    #[tokio::test]
    async fn test_move_directory_carries_placeholder() {
        let vfs = vfs().await;
        vfs.create_directory("empty").await.unwrap();
        vfs.move_directory("empty", "moved", MoveOptions::default()).await.unwrap();
        assert!(vfs.exists("moved/.gitkeep").await.unwrap());
        assert!(!vfs.exists("empty/.gitkeep").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_directory() {
        let vfs = vfs().await;
        vfs.write_file("lib/a.sol", "a").await.unwrap();
        vfs.write_file("lib/sub/b.sol", "b").await.unwrap();
        vfs.write_file("library.sol", "c").await.unwrap();

        assert_eq!(vfs.delete_directory("lib").await.unwrap(), 2);
        assert!(vfs.exists("library.sol").await.unwrap());
        assert!(vfs.delete_directory("lib").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_import() {
        let vfs = vfs().await;
        vfs.write_file("contracts/Lib.sol", "library Lib {}").await.unwrap();

        assert_eq!(vfs.resolve_import("contracts/Lib.sol").await.unwrap(), "library Lib {}");
        let err = vfs.resolve_import("contracts/Missing.sol").await.unwrap_err();
        assert!(matches!(err, VfsError::ImportResolution(_)));
        assert_eq!(err.to_string(), "Unable to resolve import: contracts/Missing.sol");
    }

    #[tokio::test]
    async fn test_clear() {
        let vfs = vfs().await;
        vfs.write_file("a.sol", "a").await.unwrap();
        vfs.clear().await.unwrap();
        assert!(vfs.get_files().await.unwrap().is_empty());
    }
}
