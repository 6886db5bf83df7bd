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

//! Compiler worker bridge.
//!
//! The Solidity compiler is CPU heavy and not designed for concurrent jobs.
//! It runs behind a [`CompilerWorker`]: a single consumer task reached only
//! through a typed request/response channel. The compiler itself is
//! abstracted by [`SolidityCompiler`] and created lazily, exactly once, by a
//! [`CompilerLoader`].
//!
//! Imports are resolved by message passing as well: the compiler receives an
//! [`ImportResolver`] handle and awaits each import it needs.

use std::future::Future;

use foundry_compilers::artifacts::SolcInput;
use serde_json::Value;
use thiserror::Error;

pub mod imports;
pub mod output;
pub mod solc;
pub mod worker;

pub use imports::{scan_imports, ImportOutcome, ImportResolver, RemoteImports};
pub use output::{CompilerOutput, ContractOutput, Diagnostic, Marker, MarkerSeverity};
pub use solc::{SolcCompiler, SolcLoader};
pub use worker::{CompilerWorker, WorkerRequest, WorkerResponse};

/// Errors of the compiler bridge.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The compiler could not be obtained or started.
    #[error("failed to initialize compiler: {0}")]
    Init(String),
    /// The compiler crashed or rejected its input.
    #[error("compiler failed: {0}")]
    Compile(String),
    /// The compiler produced output that is not standard JSON.
    #[error("malformed compiler output: {0}")]
    Output(#[from] serde_json::Error),
    /// The worker task is no longer running.
    #[error("compiler worker is not running")]
    WorkerGone,
}

/// A Solidity compiler accepting standard-JSON input.
pub trait SolidityCompiler: Send + Sync + 'static {
    /// Compile `input` and return the raw standard-JSON output.
    ///
    /// Sources missing from `input` are requested through `imports`.
    fn compile(
        &self,
        input: SolcInput,
        imports: &ImportResolver,
    ) -> impl Future<Output = Result<Value, CompilerError>> + Send;
}

/// Creates the compiler. Called at most once per worker unless it fails.
pub trait CompilerLoader: Send + Sync + 'static {
    /// The compiler produced.
    type Compiler: SolidityCompiler;

    /// Obtain the compiler, e.g. by installing a binary.
    fn load(&self) -> impl Future<Output = Result<Self::Compiler, CompilerError>> + Send;
}
