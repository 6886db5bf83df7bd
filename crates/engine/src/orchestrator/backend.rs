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

//! Where compile requests go.
//!
//! A [`CompileBackend`] turns a [`CompilationRequest`] into a
//! [`BackendResponse`]. Compiler diagnostics are data in the response; only
//! failures to reach the compiler at all are [`TransportError`]s.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use semver::{Version, VersionReq};
use tracing::{debug, warn};

use super::source::pragma_requirement;
use crate::compiler::{CompilerError, CompilerWorker, Marker, WorkerRequest};

/// A compile request. Its identity for caching is `source_code` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationRequest {
    /// Full source text.
    pub source_code: String,
    /// Compiler version, e.g. `0.8.20`.
    pub solidity_version: String,
    /// Inferred main contract.
    pub contract_name: String,
    /// Workspace path of the source.
    pub source_path: String,
}

/// The compiled main contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledOutput {
    /// Contract name.
    pub contract_name: String,
    /// ABI array.
    pub abi: Value,
    /// Creation bytecode as `0x`-prefixed hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
}

/// What a backend reports for a request that reached the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    /// Diagnostics as editor markers.
    pub markers: Vec<Marker>,
    /// The main contract, when it compiled.
    pub output: Option<CompiledOutput>,
    /// Failure reported by the compiler pipeline itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure to obtain any compiler response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The compile service answered with a non-success status.
    #[error("compile service returned {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error text from the response body
        message: String,
    },
    /// The request could not be sent or its response not read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The response body is not what the service is expected to send.
    #[error("invalid response: {0}")]
    Decode(String),
    /// The local compiler worker is unavailable.
    #[error(transparent)]
    Worker(#[from] CompilerError),
}

/// Something that compiles a [`CompilationRequest`].
pub trait CompileBackend: Send + Sync + 'static {
    /// Compile `request`.
    fn compile(
        &self,
        request: &CompilationRequest,
    ) -> impl Future<Output = Result<BackendResponse, TransportError>> + Send;
}

/// Backend running the local [`CompilerWorker`].
#[derive(Debug, Clone)]
pub struct WorkerBackend {
    worker: CompilerWorker,
    solc_version: Option<Version>,
}

impl WorkerBackend {
    /// A backend sending jobs to `worker`.
    pub fn new(worker: CompilerWorker) -> Self {
        Self { worker, solc_version: None }
    }

    /// Record the compiler version the worker loads, so sources whose
    /// pragma it does not satisfy are reported.
    pub fn with_solc_version(mut self, version: Version) -> Self {
        self.solc_version = Some(version);
        self
    }

    /// The worker jobs are sent to.
    pub fn worker(&self) -> &CompilerWorker {
        &self.worker
    }

    /// The pragma requirement of `source` when the worker's compiler
    /// version does not satisfy it.
    pub fn unsatisfied_pragma(&self, source: &str) -> Option<VersionReq> {
        let version = self.solc_version.as_ref()?;
        pragma_requirement(source).filter(|req| !req.matches(version))
    }
}

impl CompileBackend for WorkerBackend {
    async fn compile(
        &self,
        request: &CompilationRequest,
    ) -> Result<BackendResponse, TransportError> {
        if let Some(pragma) = self.unsatisfied_pragma(&request.source_code) {
            warn!(
                solc = ?self.solc_version,
                %pragma,
                path = %request.source_path,
                "configured solc does not satisfy the source pragma"
            );
        }

        let response = self
            .worker
            .compile(WorkerRequest {
                source_code: request.source_code.clone(),
                source_path: request.source_path.clone(),
            })
            .await?;

        if response.error.is_some() {
            return Ok(BackendResponse {
                markers: response.markers,
                output: None,
                error: response.error,
            });
        }

        let output = response.output.as_ref().and_then(|output| {
            let contract = output.contract(&request.source_path, &request.contract_name)?;
            Some(CompiledOutput {
                contract_name: request.contract_name.clone(),
                abi: contract.abi.clone().unwrap_or_else(|| Value::Array(Vec::new())),
                bytecode: contract.bytecode(),
            })
        });
        if output.is_none() {
            debug!(contract = %request.contract_name, "main contract absent from compiler output");
        }

        Ok(BackendResponse { markers: response.markers, output, error: None })
    }
}

/// The backend chosen at startup: the local worker, or a remote service
/// when one is configured.
#[derive(Debug, Clone)]
pub enum AnyBackend {
    /// Local compiler worker.
    Worker(WorkerBackend),
    /// Remote compile service.
    Http(super::http::HttpBackend),
}

impl CompileBackend for AnyBackend {
    async fn compile(
        &self,
        request: &CompilationRequest,
    ) -> Result<BackendResponse, TransportError> {
        match self {
            Self::Worker(backend) => backend.compile(request).await,
            Self::Http(backend) => backend.compile(request).await,
        }
    }
}
