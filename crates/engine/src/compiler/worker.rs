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

//! The compiler worker task.
//!
//! [`CompilerWorker`] is a handle to a task that owns the compiler. Jobs are
//! processed one at a time in arrival order. The compiler is loaded on first
//! use through a [`OnceCell`]: concurrent callers (a warm-up request and the
//! first job, say) await the same initialization, and a failed
//! initialization is retried by the next job.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use foundry_compilers::{
    artifacts::{output_selection::OutputSelection, Settings, SolcInput, Source, Sources},
    solc::SolcLanguage,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::{debug, error, info, warn};

use super::{
    imports::scan_imports,
    output::{CompilerOutput, Marker, MarkerSeverity},
    CompilerError, CompilerLoader, ImportResolver, SolidityCompiler,
};
use crate::vfs::resolve_import_path;

/// A compile job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Source text of the file being compiled.
    pub source_code: String,
    /// Workspace path of that file; relative imports resolve against it.
    pub source_path: String,
}

/// Result of a compile job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    /// One marker per diagnostic, or a single marker describing `error`.
    pub markers: Vec<Marker>,
    /// Parsed compiler output, absent when the job failed.
    pub output: Option<CompilerOutput>,
    /// Set when the job failed before the compiler produced output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResponse {
    /// A failed job, reported as a single marker on line 1.
    pub fn failed(error: &CompilerError) -> Self {
        Self {
            markers: vec![Marker::at_start(
                format!("Compilation error: {error}"),
                MarkerSeverity::Error,
            )],
            output: None,
            error: Some(error.to_string()),
        }
    }
}

/// Messages handled by the worker task.
enum Message {
    /// Start loading the compiler without waiting for a job.
    WarmUp,
    /// Compile and reply on `rsp`.
    Compile {
        /// The job
        req: WorkerRequest,
        /// Channel to send back the response
        rsp: oneshot::Sender<WorkerResponse>,
    },
}

/// State owned by the worker task.
struct Engine<L: CompilerLoader> {
    loader: L,
    compiler: OnceCell<L::Compiler>,
    imports: ImportResolver,
}

impl<L: CompilerLoader> Engine<L> {
    async fn compiler(&self) -> Result<&L::Compiler, CompilerError> {
        self.compiler
            .get_or_try_init(|| async {
                info!("loading compiler");
                let compiler = self.loader.load().await;
                match &compiler {
                    Ok(_) => info!("compiler ready"),
                    Err(e) => error!(error = %e, "compiler initialization failed"),
                }
                compiler
            })
            .await
    }

    async fn handle(&self, req: WorkerRequest) -> WorkerResponse {
        let compiler = match self.compiler().await {
            Ok(compiler) => compiler,
            Err(e) => return WorkerResponse::failed(&e),
        };

        let sources = self.preload(&req).await;
        debug!(path = %req.source_path, sources = sources.len(), "compiling");

        let raw = match compiler.compile(standard_input(sources), &self.imports).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %req.source_path, error = %e, "compilation failed");
                return WorkerResponse::failed(&e);
            }
        };

        match serde_json::from_value::<CompilerOutput>(raw) {
            Ok(output) => {
                let markers = output.markers(&req.source_path);
                WorkerResponse { markers, output: Some(output), error: None }
            }
            Err(e) => WorkerResponse::failed(&CompilerError::Output(e)),
        }
    }

    /// Seed the input with every import reachable from the request that the
    /// resolver can serve. Imports that fail here are left to the compiler,
    /// which requests them again and reports a proper diagnostic.
    async fn preload(&self, req: &WorkerRequest) -> BTreeMap<String, String> {
        let mut sources = BTreeMap::from([(req.source_path.clone(), req.source_code.clone())]);
        let mut failed = BTreeSet::new();
        let mut pending: Vec<String> = scan_imports(&req.source_code)
            .iter()
            .map(|import| resolve_import_path(&req.source_path, import))
            .collect();

        while let Some(path) = pending.pop() {
            if sources.contains_key(&path) || failed.contains(&path) {
                continue;
            }
            match self.imports.resolve(&path).await {
                Ok(content) => {
                    pending.extend(
                        scan_imports(&content).iter().map(|i| resolve_import_path(&path, i)),
                    );
                    sources.insert(path, content);
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "import not pre-resolved");
                    failed.insert(path);
                }
            }
        }

        sources
    }
}

/// Standard-JSON input for `sources` requesting the complete output.
pub fn standard_input(sources: BTreeMap<String, String>) -> SolcInput {
    let sources: Sources = sources
        .into_iter()
        .map(|(path, content)| (PathBuf::from(path), Source::new(content)))
        .collect();

    let mut settings = Settings::default();
    settings.output_selection = OutputSelection::complete_output_selection();

    SolcInput::new(SolcLanguage::Solidity, sources, settings)
}

/// Handle to the compiler worker task.
#[derive(Clone)]
pub struct CompilerWorker {
    tx: mpsc::Sender<Message>,
}

impl std::fmt::Debug for CompilerWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerWorker").field("closed", &self.tx.is_closed()).finish()
    }
}

impl CompilerWorker {
    /// Spawn the worker task. The compiler is loaded on the first job or
    /// [`Self::warm_up`], whichever comes first.
    pub fn spawn<L: CompilerLoader>(loader: L, imports: ImportResolver) -> Self {
        let (tx, mut rx) = mpsc::channel::<Message>(64);
        let engine = Arc::new(Engine { loader, compiler: OnceCell::new(), imports });

        tokio::spawn(async move {
            info!("compiler worker started");

            while let Some(message) = rx.recv().await {
                match message {
                    Message::WarmUp => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            // Failures are logged and retried by the next job.
                            let _ = engine.compiler().await;
                        });
                    }
                    Message::Compile { req, rsp } => {
                        let response = engine.handle(req).await;
                        if rsp.send(response).is_err() {
                            warn!("compile requester dropped before response");
                        }
                    }
                }
            }

            info!("compiler worker shutting down");
        });

        Self { tx }
    }

    /// Start loading the compiler in the background.
    pub async fn warm_up(&self) -> Result<(), CompilerError> {
        self.tx.send(Message::WarmUp).await.map_err(|_| CompilerError::WorkerGone)
    }

    /// Run a compile job and wait for its result.
    pub async fn compile(&self, req: WorkerRequest) -> Result<WorkerResponse, CompilerError> {
        let (rsp, rx) = oneshot::channel();
        self.tx.send(Message::Compile { req, rsp }).await.map_err(|_| CompilerError::WorkerGone)?;
        rx.await.map_err(|_| CompilerError::WorkerGone)
    }
}
