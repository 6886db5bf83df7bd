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

//! Command implementations for the Solide CLI

pub mod compile;
pub mod files;

pub use compile::compile;
pub use files::{cat, clear, list, mkdir, remove, rename, write};

use eyre::{eyre, Result};
use solide_common::{DiskStore, SolideConfig};
use solide_engine::VirtualFs;

/// Open the disk store configured in `config`.
pub async fn open_store(config: &SolideConfig) -> Result<DiskStore> {
    let root = config
        .store_root()
        .ok_or_else(|| eyre!("no store directory: pass --store-dir or set SOLIDE_STORE_DIR"))?;
    tracing::debug!(root = %root.display(), "opening store");
    Ok(DiskStore::open(root).await?)
}

/// Open the workspace file system.
pub async fn open_vfs(config: &SolideConfig) -> Result<VirtualFs<DiskStore>> {
    Ok(VirtualFs::open(open_store(config).await?).await)
}
