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

//! Compilation orchestration.
//!
//! [`CompilationService`] is the single entry point for compiling source
//! text. It guarantees that at most one backend invocation is in flight,
//! keeps only the newest request waiting behind it, suppresses identical
//! resubmissions within a cooldown window and caches results by exact source
//! text.
//!
//! Compiler diagnostics never replace the current artifact: the last good
//! [`ContractArtifact`] stays visible while the user fixes their code. Only a
//! compile that produces the main contract replaces it.
//!
//! State is published through [`CompilationEvent`]s and can also be polled
//! through the accessors on the service.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use solide_common::{CompilerConfig, DEFAULT_SOLC_VERSION};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::{
    artifact::ContractArtifact,
    compiler::{Marker, MarkerSeverity},
    vfs::DEFAULT_DIRECTORY,
};

pub mod backend;
pub mod events;
pub mod http;
pub mod source;

pub use backend::{
    AnyBackend, BackendResponse, CompilationRequest, CompileBackend, CompiledOutput,
    TransportError, WorkerBackend,
};
pub use events::{CompilationEvent, ConsoleLevel, ContractVersion};
pub use http::HttpBackend;
pub use source::{
    contract_name_or_default, detect_solidity_version, extract_contract_source,
    infer_contract_name, pragma_requirement, FALLBACK_CONTRACT_NAME,
};

const EVENT_CAPACITY: usize = 256;

/// Console text used when a stale cached result is replayed.
pub const STALE_RESULT_WARNING: &str = "Using cached compilation result (may be stale)";

/// Timing and defaults of a [`CompilationService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Identical input within this window after a compile is ignored.
    pub cooldown: Duration,
    /// Delay before the queued request runs.
    pub requeue_delay: Duration,
    /// Compiler version used when the source has no `pragma solidity`.
    pub default_version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(2000),
            requeue_delay: Duration::from_millis(100),
            default_version: DEFAULT_SOLC_VERSION.to_string(),
        }
    }
}

impl From<&CompilerConfig> for ServiceConfig {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            requeue_delay: config.requeue_delay(),
            default_version: config.solc_version.clone(),
        }
    }
}

/// Normalized result of one compile, as cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    /// No error diagnostics and no pipeline failure.
    pub success: bool,
    /// Diagnostics for the editor.
    pub markers: Vec<Marker>,
    /// Pipeline failure text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The main contract, present only when `success` is set and the
    /// compiler emitted it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CompiledOutput>,
}

impl CompilationResult {
    /// Markers of error severity.
    pub fn errors(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(|m| m.is_error())
    }

    /// Markers of warning severity.
    pub fn warnings(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(|m| !m.is_error())
    }
}

/// How a call to [`CompilationService::compile`] was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The backend compiled the source.
    Compiled(CompilationResult),
    /// A cached result for the same source was replayed.
    Cached(CompilationResult),
    /// The backend was unreachable and a cached result was replayed instead.
    Stale(CompilationResult),
    /// Nothing to do: empty input, a repeat within the cooldown, or the
    /// same source as the compile in flight.
    Skipped,
    /// The request was queued and a newer one replaced it before it ran.
    Superseded,
}

impl CompileOutcome {
    /// The result, unless the call was skipped or superseded.
    pub fn result(&self) -> Option<&CompilationResult> {
        match self {
            Self::Compiled(result) | Self::Cached(result) | Self::Stale(result) => Some(result),
            Self::Skipped | Self::Superseded => None,
        }
    }

    /// Whether the result holds no errors.
    pub fn is_success(&self) -> bool {
        self.result().is_some_and(|r| r.success)
    }
}

type Reply = oneshot::Sender<Result<CompileOutcome, TransportError>>;

struct Pending {
    code: String,
    path: Option<String>,
    force: bool,
    rsp: Reply,
}

#[derive(Default)]
struct State {
    in_flight: Option<String>,
    last: Option<(String, Instant)>,
    queued: Option<Pending>,
    cache: HashMap<String, CompilationResult>,
    artifact: Option<ContractArtifact>,
    markers: Vec<Marker>,
}

struct Shared {
    config: ServiceConfig,
    state: Mutex<State>,
    events: broadcast::Sender<CompilationEvent>,
    invocations: AtomicUsize,
    conversation: RwLock<Option<String>>,
}

/// The compilation service. Cheap to clone; clones share all state.
pub struct CompilationService<B> {
    backend: Arc<B>,
    shared: Arc<Shared>,
}

impl<B> Clone for CompilationService<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), shared: Arc::clone(&self.shared) }
    }
}

impl<B> std::fmt::Debug for CompilationService<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationService")
            .field("config", &self.shared.config)
            .field("invocations", &self.shared.invocations.load(Ordering::Relaxed))
            .finish()
    }
}

impl<B: CompileBackend> CompilationService<B> {
    /// A service compiling through `backend`.
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend: Arc::new(backend),
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                events,
                invocations: AtomicUsize::new(0),
                conversation: RwLock::new(None),
            }),
        }
    }

    /// Attach registered contract versions to `conversation_id`.
    pub fn with_conversation(self, conversation_id: impl Into<String>) -> Self {
        self.set_conversation(Some(conversation_id.into()));
        self
    }

    /// Change the conversation versions are attached to.
    pub fn set_conversation(&self, conversation_id: Option<String>) {
        *self.shared.conversation.write() = conversation_id;
    }

    /// The backend requests go to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compile `code` as `contracts/<ContractName>.sol`.
    ///
    /// Dropping the returned future does not cancel a compile that already
    /// started; its result still lands in the cache and the events.
    pub async fn compile(
        &self,
        code: impl Into<String>,
    ) -> Result<CompileOutcome, TransportError> {
        self.submit(code.into(), None, false).await
    }

    /// Compile `code` as the workspace file `path`, so relative imports
    /// resolve against its directory.
    pub async fn compile_file(
        &self,
        path: &str,
        code: impl Into<String>,
    ) -> Result<CompileOutcome, TransportError> {
        let path = solide_common::normalize_path(path);
        self.submit(code.into(), Some(path), false).await
    }

    /// Compile `code` ignoring the cooldown and the cache. Single-flight and
    /// queueing still apply.
    pub async fn recompile(
        &self,
        code: impl Into<String>,
    ) -> Result<CompileOutcome, TransportError> {
        self.submit(code.into(), None, true).await
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CompilationEvent> {
        self.shared.events.subscribe()
    }

    /// The artifact of the last compile that produced the main contract.
    pub fn current_artifact(&self) -> Option<ContractArtifact> {
        self.shared.state.lock().artifact.clone()
    }

    /// Markers of the last compile.
    pub fn markers(&self) -> Vec<Marker> {
        self.shared.state.lock().markers.clone()
    }

    /// The cached result for exactly `code`.
    pub fn cached(&self, code: &str) -> Option<CompilationResult> {
        self.shared.state.lock().cache.get(code).cloned()
    }

    /// Number of backend invocations so far.
    pub fn invocations(&self) -> usize {
        self.shared.invocations.load(Ordering::SeqCst)
    }

    /// Whether a compile is running or about to run.
    pub fn is_compiling(&self) -> bool {
        self.shared.state.lock().in_flight.is_some()
    }

    /// Forget cached results, markers and the current artifact, e.g. when
    /// switching workspaces. A compile in flight is not affected.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.cache.clear();
        state.last = None;
        state.artifact = None;
        state.markers.clear();
        drop(state);
        self.emit(CompilationEvent::Markers { markers: Vec::new() });
    }

    async fn submit(
        &self,
        code: String,
        path: Option<String>,
        force: bool,
    ) -> Result<CompileOutcome, TransportError> {
        if code.trim().is_empty() {
            return Ok(CompileOutcome::Skipped);
        }

        let waiter = {
            let mut state = self.shared.state.lock();

            if !force {
                if let Some((last, at)) = &state.last {
                    if *last == code && at.elapsed() < self.shared.config.cooldown {
                        trace!(code_len = code.len(), "identical source within cooldown");
                        return Ok(CompileOutcome::Skipped);
                    }
                }
            }

            match state.in_flight.as_deref().map(|current| current == code) {
                Some(true) => {
                    trace!(code_len = code.len(), "identical source already compiling");
                    return Ok(CompileOutcome::Skipped);
                }
                Some(false) => {
                    let (rsp, rx) = oneshot::channel();
                    let pending = Pending { code: code.clone(), path: path.clone(), force, rsp };
                    if let Some(previous) = state.queued.replace(pending) {
                        debug!("queued compile superseded");
                        let _ = previous.rsp.send(Ok(CompileOutcome::Superseded));
                    }
                    Some(rx)
                }
                None => {
                    state.in_flight = Some(code.clone());
                    state.last = Some((code.clone(), Instant::now()));
                    None
                }
            }
        };

        match waiter {
            Some(rx) => {
                debug!("compile queued behind the one in flight");
                rx.await.unwrap_or(Ok(CompileOutcome::Superseded))
            }
            None => {
                // The compile runs detached so the slot is released even if
                // this caller is dropped.
                let task = tokio::spawn(self.clone().execute_boxed(code, path, force));
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(_) => Ok(CompileOutcome::Superseded),
                }
            }
        }
    }

    /// Serve a request holding the in-flight slot, then pass the slot on.
    async fn execute(
        &self,
        code: String,
        path: Option<String>,
        force: bool,
    ) -> Result<CompileOutcome, TransportError> {
        let cached = if force { None } else { self.cached(&code) };
        let outcome = match cached {
            Some(result) => {
                trace!(code_len = code.len(), "cache hit");
                self.apply(&result, false);
                Ok(CompileOutcome::Cached(result))
            }
            None => self.run(&code, path).await,
        };
        self.release();
        outcome
    }

    fn execute_boxed(
        self,
        code: String,
        path: Option<String>,
        force: bool,
    ) -> BoxFuture<'static, Result<CompileOutcome, TransportError>> {
        Box::pin(async move { self.execute(code, path, force).await })
    }

    /// Clear the in-flight slot, or hand it straight to the queued request so
    /// nothing newer can overtake it during the requeue delay.
    fn release(&self) {
        let next = {
            let mut state = self.shared.state.lock();
            match state.queued.take() {
                Some(next) => {
                    state.in_flight = Some(next.code.clone());
                    state.last = Some((next.code.clone(), Instant::now()));
                    Some(next)
                }
                None => {
                    state.in_flight = None;
                    None
                }
            }
        };

        if let Some(Pending { code, path, force, rsp }) = next {
            let service = self.clone();
            let delay = self.shared.config.requeue_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let outcome = service.execute_boxed(code, path, force).await;
                if rsp.send(outcome).is_err() {
                    debug!("queued compile caller went away");
                }
            });
        }
    }

    async fn run(
        &self,
        code: &str,
        path: Option<String>,
    ) -> Result<CompileOutcome, TransportError> {
        let contract_name = contract_name_or_default(code);
        let solidity_version = detect_solidity_version(code)
            .map(|v| v.to_string())
            .unwrap_or_else(|| self.shared.config.default_version.clone());
        let source_path =
            path.unwrap_or_else(|| format!("{DEFAULT_DIRECTORY}/{contract_name}.sol"));
        let request =
            CompilationRequest { source_code: code.to_string(), solidity_version, contract_name, source_path };

        self.shared.invocations.fetch_add(1, Ordering::SeqCst);
        info!(
            contract = %request.contract_name,
            version = %request.solidity_version,
            path = %request.source_path,
            "compiling"
        );
        self.console(ConsoleLevel::Info, format!("Compiling {}...", request.contract_name));

        match self.backend.compile(&request).await {
            Ok(response) => {
                let result = self.reconcile(&request, response);
                Ok(CompileOutcome::Compiled(result))
            }
            Err(e) => self.transport_failure(&request, e),
        }
    }

    fn reconcile(&self, request: &CompilationRequest, response: BackendResponse) -> CompilationResult {
        let BackendResponse { markers, output, error } = response;

        if let Some(error) = error {
            warn!(contract = %request.contract_name, error = %error, "compiler pipeline failed");
            let result = CompilationResult { success: false, markers, error: Some(error), output: None };
            // Pipeline failures such as a compiler that failed to load are
            // not a property of the source, so they are not cached.
            self.apply(&result, false);
            return result;
        }

        let success = !markers.iter().any(Marker::is_error);
        let output = if success { output } else { None };
        if success && output.is_none() {
            warn!(contract = %request.contract_name, "main contract missing from compiler output");
            self.console(
                ConsoleLevel::Warning,
                format!("No contract named {} in compiler output", request.contract_name),
            );
        }

        let result = CompilationResult { success, markers, error: None, output };
        self.shared.state.lock().cache.insert(request.source_code.clone(), result.clone());
        debug!(
            contract = %request.contract_name,
            success,
            markers = result.markers.len(),
            "compile reconciled"
        );
        self.apply(&result, true);
        if result.output.is_some() {
            self.register_version(request);
        }
        result
    }

    fn transport_failure(
        &self,
        request: &CompilationRequest,
        err: TransportError,
    ) -> Result<CompileOutcome, TransportError> {
        let message = format!("Compilation failed: {err}");
        error!(contract = %request.contract_name, error = %err, "compile request failed");
        self.console(ConsoleLevel::Error, message.clone());

        match self.cached(&request.source_code) {
            Some(result) => {
                warn!(contract = %request.contract_name, "replaying stale cached result");
                self.console(ConsoleLevel::Warning, STALE_RESULT_WARNING);
                self.apply(&result, false);
                Ok(CompileOutcome::Stale(result))
            }
            None => {
                self.set_markers(vec![Marker::at_start(message, MarkerSeverity::Error)]);
                Err(err)
            }
        }
    }

    /// Publish `result`: markers, console lines and, when it carries the
    /// main contract, a new current artifact.
    fn apply(&self, result: &CompilationResult, fresh: bool) {
        self.set_markers(result.markers.clone());

        if let Some(error) = &result.error {
            self.console(ConsoleLevel::Error, format!("Compilation error: {error}"));
        } else {
            let mut seen = Vec::new();
            for marker in &result.markers {
                let line = format!(
                    "[Line {}:{}] {}",
                    marker.start_line_number, marker.start_column, marker.message
                );
                if seen.contains(&line) {
                    continue;
                }
                let level =
                    if marker.is_error() { ConsoleLevel::Error } else { ConsoleLevel::Warning };
                self.console(level, line.clone());
                seen.push(line);
            }
        }

        let Some(output) = &result.output else {
            return;
        };
        let artifact = ContractArtifact::from_abi(&output.contract_name, &output.abi)
            .with_bytecode(output.bytecode.clone());
        self.shared.state.lock().artifact = Some(artifact.clone());
        if fresh {
            self.console(
                ConsoleLevel::Success,
                format!("Contract \"{}\" compiled successfully", output.contract_name),
            );
        }
        self.emit(CompilationEvent::ArtifactUpdated { artifact: Box::new(artifact) });
    }

    fn register_version(&self, request: &CompilationRequest) {
        let version = ContractVersion {
            name: format!("{}.sol", request.contract_name),
            source_code: request.source_code.clone(),
            contract_name: request.contract_name.clone(),
            timestamp: Utc::now(),
            conversation_id: self.shared.conversation.read().clone(),
        };
        debug!(name = %version.name, "registering contract version");
        self.emit(CompilationEvent::ContractVersionRegistered { version });
    }

    fn set_markers(&self, markers: Vec<Marker>) {
        self.shared.state.lock().markers = markers.clone();
        self.emit(CompilationEvent::Markers { markers });
    }

    fn console(&self, level: ConsoleLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ConsoleLevel::Error => error!(target: "solide::console", "{message}"),
            ConsoleLevel::Warning => warn!(target: "solide::console", "{message}"),
            ConsoleLevel::Info | ConsoleLevel::Success => {
                info!(target: "solide::console", "{message}")
            }
        }
        self.emit(CompilationEvent::Console { level, message });
    }

    fn emit(&self, event: CompilationEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }
}
