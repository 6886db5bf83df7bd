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

//! File commands

use std::{io::Read, path::PathBuf};

use eyre::{Result, WrapErr};
use solide_common::SolideConfig;
use solide_engine::MoveOptions;

use super::open_vfs;

/// Print the workspace tree.
pub async fn list(config: &SolideConfig) -> Result<()> {
    let vfs = open_vfs(config).await?;
    for item in vfs.list_files().await? {
        print!("{item}");
    }
    Ok(())
}

/// Write `path` from a local file or standard input.
pub async fn write(config: &SolideConfig, path: &str, file: Option<PathBuf>) -> Result<()> {
    let content = match file {
        Some(file) => tokio::fs::read_to_string(&file)
            .await
            .wrap_err_with(|| format!("failed to read {}", file.display()))?,
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content).wrap_err("failed to read stdin")?;
            content
        }
    };

    let vfs = open_vfs(config).await?;
    vfs.write_file(path, &content).await?;
    println!("wrote {path} ({} bytes)", content.len());
    Ok(())
}

/// Print the content of `path`.
pub async fn cat(config: &SolideConfig, path: &str) -> Result<()> {
    let vfs = open_vfs(config).await?;
    print!("{}", vfs.read_file(path).await?);
    Ok(())
}

/// Delete a file or, with `dir`, a directory.
pub async fn remove(config: &SolideConfig, path: &str, dir: bool) -> Result<()> {
    let vfs = open_vfs(config).await?;
    if dir {
        let removed = vfs.delete_directory(path).await?;
        println!("removed {path} ({removed} entries)");
    } else {
        vfs.delete_file(path).await?;
        println!("removed {path}");
    }
    Ok(())
}

/// Move a file or, with `dir`, a directory.
pub async fn rename(
    config: &SolideConfig,
    from: &str,
    to: &str,
    auto_rename: bool,
    dir: bool,
) -> Result<()> {
    let vfs = open_vfs(config).await?;
    let options = MoveOptions { auto_rename };
    let outcome = if dir {
        vfs.move_directory(from, to, options).await?
    } else {
        vfs.move_file(from, to, options).await?
    };
    println!("moved {from} -> {}", outcome.new_path);
    Ok(())
}

/// Create an empty directory.
pub async fn mkdir(config: &SolideConfig, path: &str) -> Result<()> {
    let vfs = open_vfs(config).await?;
    vfs.create_directory(path).await?;
    println!("created {path}/");
    Ok(())
}

/// Delete every file.
pub async fn clear(config: &SolideConfig) -> Result<()> {
    let vfs = open_vfs(config).await?;
    vfs.clear().await?;
    println!("workspace cleared");
    Ok(())
}
