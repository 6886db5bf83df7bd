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

//! Compile command

use eyre::{bail, Result};
use solide_common::SolideConfig;
use solide_engine::{compiler::MarkerSeverity, Workspace};

use super::open_store;

/// Compile the stored file at `path`, print its markers and, on success,
/// its interface. Fails when the file has errors.
pub async fn compile(config: &SolideConfig, path: &str, json: bool) -> Result<()> {
    let workspace = Workspace::open(open_store(config).await?, config).await?;
    let outcome = workspace.compile_file(path).await?;

    let Some(result) = outcome.result() else {
        bail!("nothing to compile in {path}");
    };
    let artifact = workspace.compiler().current_artifact();

    if json {
        let value = serde_json::json!({
            "success": result.success,
            "markers": result.markers,
            "error": result.error,
            "artifact": artifact,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for marker in &result.markers {
            let level = match marker.severity {
                MarkerSeverity::Error => "error",
                MarkerSeverity::Warning => "warning",
            };
            println!(
                "{level}[{}:{}]: {}",
                marker.start_line_number, marker.start_column, marker.message
            );
        }
        if let Some(artifact) = artifact.as_ref().filter(|_| result.success) {
            print!("{artifact}");
        }
    }

    if !result.success {
        bail!("compilation of {path} failed");
    }
    Ok(())
}
