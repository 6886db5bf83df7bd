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

//! A workspace: one file system and one compilation service, built once at
//! startup and handed to whoever needs them.

use solide_common::{FileStore, SolideConfig};
use thiserror::Error;
use tracing::info;

use crate::{
    compiler::{CompilerWorker, ImportResolver, RemoteImports, SolcLoader},
    orchestrator::{
        AnyBackend, CompilationService, CompileBackend, CompileOutcome, HttpBackend,
        ServiceConfig, TransportError, WorkerBackend,
    },
    vfs::{VfsError, VirtualFs},
};

/// Errors of workspace-level operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// File system failure.
    #[error(transparent)]
    Vfs(#[from] VfsError),
    /// The compiler could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// File system plus compilation service.
#[derive(Debug)]
pub struct Workspace<S, B = AnyBackend> {
    vfs: VirtualFs<S>,
    compiler: CompilationService<B>,
}

impl<S, B> Clone for Workspace<S, B> {
    fn clone(&self) -> Self {
        Self { vfs: self.vfs.clone(), compiler: self.compiler.clone() }
    }
}

impl<S: FileStore> Workspace<S, AnyBackend> {
    /// Open a workspace over `store` as described by `config`.
    ///
    /// With `compiler.api_url` set, compiles go to that service; otherwise a
    /// local worker is started whose `solc` is installed on first use.
    pub async fn open(store: S, config: &SolideConfig) -> Result<Self, WorkspaceError> {
        let vfs = VirtualFs::open(store).await;

        let backend = match &config.compiler.api_url {
            Some(url) => {
                info!(url = %url, "using remote compile service");
                AnyBackend::Http(HttpBackend::new(url.clone(), config.compiler.request_timeout())?)
            }
            None => {
                let version = config
                    .compiler
                    .version()
                    .map_err(|e| WorkspaceError::Config(e.to_string()))?;
                info!(%version, "using local compiler worker");
                let imports = ImportResolver::spawn(
                    vfs.clone(),
                    RemoteImports::new(config.imports.remotes.clone()),
                );
                let worker = CompilerWorker::spawn(SolcLoader::new(version.clone()), imports);
                AnyBackend::Worker(WorkerBackend::new(worker).with_solc_version(version))
            }
        };

        let compiler = CompilationService::new(backend, ServiceConfig::from(&config.compiler));
        Ok(Self { vfs, compiler })
    }
}

impl<S: FileStore, B: CompileBackend> Workspace<S, B> {
    /// Assemble a workspace from already built parts.
    pub fn from_parts(vfs: VirtualFs<S>, compiler: CompilationService<B>) -> Self {
        Self { vfs, compiler }
    }

    /// The file system.
    pub fn vfs(&self) -> &VirtualFs<S> {
        &self.vfs
    }

    /// The compilation service.
    pub fn compiler(&self) -> &CompilationService<B> {
        &self.compiler
    }

    /// Compile the stored file at `path`.
    pub async fn compile_file(&self, path: &str) -> Result<CompileOutcome, WorkspaceError> {
        let code = self.vfs.read_file(path).await?;
        Ok(self.compiler.compile_file(path, code).await?)
    }

    /// Remove every file and forget all compile state.
    pub async fn clear(&self) -> Result<(), WorkspaceError> {
        self.vfs.clear().await?;
        self.compiler.reset();
        Ok(())
    }
}
