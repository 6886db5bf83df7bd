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

//! In-process compiler doubles for tests.
//!
//! [`ScriptedCompiler`] speaks standard JSON like `solc` but does not compile
//! anything. It resolves imports through the [`ImportResolver`] exactly as a
//! real compiler callback would, reports unresolved ones as `ParserError`s,
//! and turns `// @error msg` and `// @warning msg` comments into diagnostics
//! on their line. When no error is reported, every non-abstract `contract` is
//! emitted with the ABI registered for its name.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use foundry_compilers::artifacts::SolcInput;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use solide_common::FileStore;

use solide_engine::{
    compiler::{
        scan_imports, CompilerError, CompilerLoader, CompilerWorker, ImportOutcome,
        ImportResolver, RemoteImports, SolidityCompiler,
    },
    orchestrator::{CompilationService, ServiceConfig, WorkerBackend},
    vfs::{resolve_import_path, VirtualFs},
};

/// Bytecode object emitted for every scripted contract.
pub const SCRIPTED_BYTECODE: &str = "6080604052";

/// A minimal valid contract.
pub const FOO_SOURCE: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

contract Foo {
    function get() public pure returns (uint256) {
        return 1;
    }
}
"#;

/// ABI of [`FOO_SOURCE`].
pub fn foo_abi() -> Value {
    json!([{
        "type": "function",
        "name": "get",
        "stateMutability": "pure",
        "inputs": [],
        "outputs": [{ "name": "", "type": "uint256", "internalType": "uint256" }]
    }])
}

static CONTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(abstract\s+)?contract\s+([A-Za-z_$][\w$]*)").expect("valid regex")
});

static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*@(error|warning)\s+(.*)$").expect("valid regex"));

/// Solc-like diagnostic pointing at `line:column` of `path`.
fn diagnostic(
    severity: &str,
    kind: &str,
    message: &str,
    path: &str,
    line: usize,
    column: usize,
    width: usize,
) -> Value {
    let caret = format!("{}{}", " ".repeat(column.saturating_sub(1)), "^".repeat(width.max(1)));
    json!({
        "severity": severity,
        "type": kind,
        "component": "general",
        "message": message,
        "formattedMessage": format!("{kind}: {message}\n --> {path}:{line}:{column}:\n  |\n  | {caret}\n"),
        "sourceLocation": { "file": path, "start": -1, "end": -1 }
    })
}

/// Line and column of the first occurrence of `needle` in `content`.
fn position(content: &str, needle: &str) -> (usize, usize) {
    content
        .lines()
        .enumerate()
        .find_map(|(i, line)| line.find(needle).map(|col| (i + 1, col + 1)))
        .unwrap_or((1, 1))
}

fn annotations(path: &str, content: &str) -> Vec<Value> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let caps = ANNOTATION.captures(line)?;
            let column = caps.get(0).map_or(1, |m| m.start() + 1);
            let message = caps[2].trim();
            Some(match &caps[1] {
                "error" => diagnostic("error", "TypeError", message, path, i + 1, column, message.len()),
                _ => diagnostic("warning", "Warning", message, path, i + 1, column, message.len()),
            })
        })
        .collect()
}

/// Scripted stand-in for `solc`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompiler {
    abis: Arc<HashMap<String, Value>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedCompiler {
    /// A compiler emitting empty ABIs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `abi` for contracts named `name`.
    pub fn with_contract(mut self, name: impl Into<String>, abi: Value) -> Self {
        Arc::make_mut(&mut self.abis).insert(name.into(), abi);
        self
    }

    /// Take `delay` for every compile.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of compiles run, shared between clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SolidityCompiler for ScriptedCompiler {
    async fn compile(
        &self,
        input: SolcInput,
        imports: &ImportResolver,
    ) -> Result<Value, CompilerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut sources: BTreeMap<String, String> = input
            .sources
            .iter()
            .map(|(path, source)| (path.to_string_lossy().into_owned(), source.content.to_string()))
            .collect();
        let mut errors = Vec::new();
        let mut pending: Vec<String> = sources.keys().cloned().collect();

        while let Some(path) = pending.pop() {
            let Some(content) = sources.get(&path).cloned() else {
                continue;
            };
            for import in scan_imports(&content) {
                let target = resolve_import_path(&path, &import);
                if sources.contains_key(&target) {
                    continue;
                }
                match imports.callback(&target).await {
                    ImportOutcome::Contents(text) => {
                        sources.insert(target.clone(), text);
                        pending.push(target);
                    }
                    ImportOutcome::Error(e) => {
                        let (line, column) = position(&content, &import);
                        errors.push(diagnostic(
                            "error",
                            "ParserError",
                            &format!("Source \"{target}\" not found: {e}"),
                            &path,
                            line,
                            column,
                            import.len(),
                        ));
                    }
                }
            }
            errors.extend(annotations(&path, &content));
        }

        let failed = errors.iter().any(|e| e["severity"] == "error");
        let mut contracts = Map::new();
        if !failed {
            for (path, content) in &sources {
                let mut unit = Map::new();
                for caps in CONTRACT.captures_iter(content).filter(|c| c.get(1).is_none()) {
                    let name = &caps[2];
                    let abi = self.abis.get(name).cloned().unwrap_or_else(|| json!([]));
                    unit.insert(
                        name.to_string(),
                        json!({ "abi": abi, "evm": { "bytecode": { "object": SCRIPTED_BYTECODE } } }),
                    );
                }
                if !unit.is_empty() {
                    contracts.insert(path.clone(), Value::Object(unit));
                }
            }
        }

        Ok(json!({ "errors": errors, "contracts": contracts, "sources": {} }))
    }
}

/// Loader handing out a [`ScriptedCompiler`], optionally slow or failing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoader {
    compiler: ScriptedCompiler,
    loads: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedLoader {
    /// A loader for `compiler`.
    pub fn new(compiler: ScriptedCompiler) -> Self {
        Self { compiler, ..Default::default() }
    }

    /// Fail the first `n` loads.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    /// Take `delay` for every load.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of load attempts, shared between clones.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CompilerLoader for ScriptedLoader {
    type Compiler = ScriptedCompiler;

    async fn load(&self) -> Result<ScriptedCompiler, CompilerError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(CompilerError::Init("scripted load failure".to_string()));
        }
        Ok(self.compiler.clone())
    }
}

/// A worker running `loader` with imports served from `vfs` only.
pub fn scripted_worker<S: FileStore>(vfs: &VirtualFs<S>, loader: ScriptedLoader) -> CompilerWorker {
    let imports = ImportResolver::spawn(vfs.clone(), RemoteImports::new(Vec::new()));
    CompilerWorker::spawn(loader, imports)
}

/// A compilation service over a scripted worker, with no cooldown and a
/// short requeue delay.
pub fn scripted_service<S: FileStore>(
    vfs: &VirtualFs<S>,
    loader: ScriptedLoader,
) -> CompilationService<WorkerBackend> {
    let config = ServiceConfig {
        cooldown: Duration::ZERO,
        requeue_delay: Duration::from_millis(10),
        ..Default::default()
    };
    CompilationService::new(WorkerBackend::new(scripted_worker(vfs, loader)), config)
}
