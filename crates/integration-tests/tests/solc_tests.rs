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

//! Tests against a real `solc`. They download the compiler on first run.

use solide_common::{logging::ensure_test_logging, MemoryStore, SolideConfig};
use solide_engine::{artifact::StateMutability, Workspace};
use solide_integration_tests::test_utils::FOO_SOURCE;
use tracing::info;

#[tokio::test]
#[ignore = "downloads solc"]
async fn test_real_solc_round_trip() {
    ensure_test_logging(None);
    info!("Running test");

    let ws = Workspace::open(MemoryStore::new(), &SolideConfig::default()).await.unwrap();
    ws.vfs().write_file("contracts/Foo.sol", FOO_SOURCE).await.unwrap();

    let outcome = ws.compile_file("contracts/Foo.sol").await.unwrap();
    assert!(outcome.is_success(), "{:?}", ws.compiler().markers());

    let artifact = ws.compiler().current_artifact().unwrap();
    assert_eq!(artifact.name, "Foo");
    assert_eq!(artifact.functions[0].state_mutability, StateMutability::Pure);
    assert!(artifact.bytecode.unwrap().starts_with("0x6080"));
}

#[tokio::test]
#[ignore = "downloads solc"]
async fn test_real_solc_missing_import() {
    ensure_test_logging(None);
    info!("Running test");

    let ws = Workspace::open(MemoryStore::new(), &SolideConfig::default()).await.unwrap();
    let source = "pragma solidity ^0.8.20;\nimport \"./Missing.sol\";\ncontract Bar {}\n";
    ws.vfs().write_file("contracts/Bar.sol", source).await.unwrap();

    let outcome = ws.compile_file("contracts/Bar.sol").await.unwrap();
    assert!(!outcome.is_success());
    let markers = ws.compiler().markers();
    assert!(markers.iter().any(|m| m.is_error() && m.message.contains("Missing.sol")));
}
