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

//! Native `solc` backend.
//!
//! The binary is located (or installed) through `svm` the first time it is
//! needed. Native `solc` has no import callback in standard-JSON mode, so
//! one is emulated: every `Source "..." not found` diagnostic is answered by
//! asking the [`ImportResolver`] and compiling again with the new sources.

use std::{collections::BTreeSet, path::PathBuf};

use foundry_compilers::{
    artifacts::{SolcInput, Source},
    solc::Solc,
};
use semver::Version;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    output::CompilerOutput, CompilerError, CompilerLoader, ImportResolver, SolidityCompiler,
};

/// Upper bound on compile rounds spent resolving imports.
pub const MAX_IMPORT_ROUNDS: usize = 8;

/// Loads a native `solc` of a fixed version.
#[derive(Debug, Clone)]
pub struct SolcLoader {
    version: Version,
}

impl SolcLoader {
    /// A loader for `version`.
    pub fn new(version: Version) -> Self {
        Self { version }
    }
}

impl CompilerLoader for SolcLoader {
    type Compiler = SolcCompiler;

    async fn load(&self) -> Result<SolcCompiler, CompilerError> {
        let version = self.version.clone();
        info!(%version, "locating solc");

        let solc = tokio::task::spawn_blocking(move || Solc::find_or_install(&version))
            .await
            .map_err(|e| CompilerError::Init(e.to_string()))?
            .map_err(|e| CompilerError::Init(e.to_string()))?;

        info!(path = %solc.solc.display(), "solc ready");
        Ok(SolcCompiler { solc })
    }
}

/// A native `solc` binary.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    solc: Solc,
}

impl SolcCompiler {
    /// Wrap an already located binary.
    pub fn new(solc: Solc) -> Self {
        Self { solc }
    }

    async fn run(&self, input: &SolcInput) -> Result<Value, CompilerError> {
        let solc = self.solc.clone();
        let input = input.clone();
        let output = tokio::task::spawn_blocking(move || solc.compile_exact(&input))
            .await
            .map_err(|e| CompilerError::Compile(e.to_string()))?
            .map_err(|e| CompilerError::Compile(e.to_string()))?;
        Ok(serde_json::to_value(&output)?)
    }
}

impl SolidityCompiler for SolcCompiler {
    async fn compile(
        &self,
        mut input: SolcInput,
        imports: &ImportResolver,
    ) -> Result<Value, CompilerError> {
        let mut unresolved = BTreeSet::new();

        for round in 1..=MAX_IMPORT_ROUNDS {
            let raw = self.run(&input).await?;
            let output: CompilerOutput = serde_json::from_value(raw.clone())?;

            let missing: BTreeSet<String> = output
                .errors
                .iter()
                .filter_map(|d| d.missing_source())
                .filter(|path| !unresolved.contains(*path))
                .filter(|path| !input.sources.contains_key(&PathBuf::from(*path)))
                .map(str::to_string)
                .collect();
            if missing.is_empty() || round == MAX_IMPORT_ROUNDS {
                return Ok(raw);
            }

            let mut added = false;
            for path in missing {
                match imports.resolve(&path).await {
                    Ok(content) => {
                        input.sources.insert(PathBuf::from(&path), Source::new(content));
                        added = true;
                    }
                    Err(e) => {
                        debug!(path = %path, error = %e, "import unresolved");
                        unresolved.insert(path);
                    }
                }
            }
            if !added {
                return Ok(raw);
            }
            debug!(round, sources = input.sources.len(), "recompiling with resolved imports");
        }

        Err(CompilerError::Compile("import resolution did not converge".to_string()))
    }
}
