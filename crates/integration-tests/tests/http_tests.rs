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

use serde_json::json;
use solide_common::{logging::ensure_test_logging, MemoryStore, SolideConfig};
use solide_engine::{
    orchestrator::{CompileOutcome, TransportError, STALE_RESULT_WARNING},
    CompilationEvent, Workspace, WorkspaceError,
};
use solide_integration_tests::test_utils::{foo_abi, FOO_SOURCE};
use tracing::info;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn remote_workspace(server: &MockServer) -> Workspace<MemoryStore> {
    let mut config = SolideConfig::default();
    config.compiler.api_url = Some(format!("{}/api/compile", server.uri()));
    Workspace::open(MemoryStore::new(), &config).await.unwrap()
}

fn artifact_body() -> serde_json::Value {
    json!({ "artifact": { "name": "Foo", "abi": foo_abi(), "bytecode": "0x6080" } })
}

#[tokio::test]
async fn test_remote_compile_builds_artifact() {
    ensure_test_logging(None);
    info!("Running test");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/compile"))
        .and(body_partial_json(json!({ "contractName": "Foo", "version": "0.8.20" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(artifact_body()))
        .expect(1)
        .mount(&server)
        .await;

    let ws = remote_workspace(&server).await;
    ws.vfs().write_file("contracts/Foo.sol", FOO_SOURCE).await.unwrap();
    let outcome = ws.compile_file("contracts/Foo.sol").await.unwrap();

    assert!(matches!(outcome, CompileOutcome::Compiled(_)));
    let artifact = ws.compiler().current_artifact().unwrap();
    assert_eq!(artifact.name, "Foo");
    assert_eq!(artifact.read_functions().count(), 1);
}

#[tokio::test]
async fn test_transport_failure_keeps_artifact() {
    ensure_test_logging(None);
    info!("Running test");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(artifact_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let ws = remote_workspace(&server).await;
    ws.compiler().compile(FOO_SOURCE).await.unwrap();

    let edited = FOO_SOURCE.replace("return 1;", "return 2;");
    let err = ws.compiler().compile(edited).await.unwrap_err();
    assert!(matches!(err, TransportError::Http { status: 503, .. }));

    assert_eq!(ws.compiler().current_artifact().unwrap().name, "Foo");
    let markers = ws.compiler().markers();
    assert_eq!(markers.len(), 1);
    assert!(markers[0].message.contains("service unavailable"));
}

#[tokio::test]
async fn test_transport_failure_replays_cached_result() {
    ensure_test_logging(None);
    info!("Running test");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(artifact_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "Internal error" })))
        .mount(&server)
        .await;

    let ws = remote_workspace(&server).await;
    ws.compiler().compile(FOO_SOURCE).await.unwrap();
    let mut events = ws.compiler().subscribe();

    let outcome = ws.compiler().recompile(FOO_SOURCE).await.unwrap();
    assert!(matches!(outcome, CompileOutcome::Stale(_)));
    assert!(outcome.is_success());

    let mut messages = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CompilationEvent::Console { message, .. } = event {
            messages.push(message);
        }
    }
    assert!(messages.iter().any(|m| m.contains("Internal error")));
    assert!(messages.iter().any(|m| m == STALE_RESULT_WARNING));
}

#[tokio::test]
async fn test_compile_missing_file_is_vfs_error() {
    ensure_test_logging(None);
    info!("Running test");

    let server = MockServer::start().await;
    let ws = remote_workspace(&server).await;
    let err = ws.compile_file("contracts/Nope.sol").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Vfs(e) if e.is_not_found()));
}
