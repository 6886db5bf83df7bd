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

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use tracing::trace;

use super::{normalize_path, FileStore, StoreError, StoredFile};

/// In-memory store. Cloning yields another handle to the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// New empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether the store holds no record.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl FileStore for MemoryStore {
    async fn put(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let path = normalize_path(path);
        trace!(%path, len = content.len(), "memory store put");
        self.files.write().insert(path, content.to_string());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<String, StoreError> {
        let path = normalize_path(path);
        self.files.read().get(&path).cloned().ok_or(StoreError::NotFound(path))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.files.write().remove(&normalize_path(path));
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<StoredFile>, StoreError> {
        Ok(self
            .files
            .read()
            .iter()
            .map(|(path, content)| StoredFile { path: path.clone(), content: content.clone() })
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.files.write().clear();
        Ok(())
    }
}
