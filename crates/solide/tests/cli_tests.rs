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

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use solide_common::logging::ensure_test_logging;
use tempfile::TempDir;
use tracing::info;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

const FOO: &str = "pragma solidity ^0.8.20;\ncontract Foo {\n    function get() public pure returns (uint256) { return 1; }\n}\n";

/// A `solide` command isolated in `dir`.
fn solide(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("solide").unwrap();
    cmd.env("SOLIDE_CONFIG", dir.join("config.toml"))
        .env("SOLIDE_STORE_DIR", dir.join("store"))
        .env_remove("SOLIDE_COMPILER_API_URL")
        .env_remove("SOLIDE_SOLC_VERSION")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_command() {
    ensure_test_logging(None);
    info!("Testing CLI help command");
    let mut cmd = Command::cargo_bin("solide").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Solidity workspace"));
}

#[test]
fn test_version_command() {
    ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("solide").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("solide"));
}

#[test]
fn test_missing_subcommand() {
    ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("solide").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_write_then_cat() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();

    solide(dir.path())
        .args(["write", "contracts/Foo.sol"])
        .write_stdin(FOO)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote contracts/Foo.sol"));

    solide(dir.path())
        .args(["cat", "contracts/Foo.sol"])
        .assert()
        .success()
        .stdout(predicate::eq(FOO));
}

#[test]
fn test_ls_shows_tree() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("Token.sol");
    std::fs::write(&source, "contract Token {}").unwrap();

    solide(dir.path())
        .args(["write", "contracts/tokens/Token.sol", "--file"])
        .arg(&source)
        .assert()
        .success();

    solide(dir.path())
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("contracts/\n  tokens/\n    Token.sol\n"));
}

#[test]
fn test_mv_auto_rename() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    solide(dir.path()).args(["write", "a.sol"]).write_stdin("contract A {}").assert().success();
    solide(dir.path()).args(["write", "b/a.sol"]).write_stdin("contract B {}").assert().success();

    solide(dir.path()).args(["mv", "a.sol", "b/a.sol"]).assert().failure();
    solide(dir.path())
        .args(["mv", "a.sol", "b/a.sol", "--auto-rename"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.sol -> b/a_1.sol"));

    solide(dir.path()).args(["cat", "b/a.sol"]).assert().success().stdout("contract B {}");
    solide(dir.path()).args(["cat", "a.sol"]).assert().failure();
}

#[test]
fn test_directory_commands() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    solide(dir.path()).args(["write", "a/1.sol"]).write_stdin("contract One {}").assert().success();
    solide(dir.path()).args(["write", "a/2.sol"]).write_stdin("contract Two {}").assert().success();

    solide(dir.path()).args(["mv", "a", "a/inner", "--dir"]).assert().failure();
    solide(dir.path()).args(["mv", "a", "b", "--dir"]).assert().success();
    solide(dir.path()).args(["cat", "b/2.sol"]).assert().success().stdout("contract Two {}");

    solide(dir.path()).args(["mkdir", "empty"]).assert().success();
    solide(dir.path()).arg("ls").assert().success().stdout(predicate::str::contains("empty/"));

    solide(dir.path())
        .args(["rm", "b", "--dir"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));
    solide(dir.path()).arg("clear").assert().success();
    // Only the default directory comes back.
    solide(dir.path()).arg("ls").assert().success().stdout("contracts/\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compile_through_remote_service() {
    ensure_test_logging(None);
    info!("Running test");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifact": {
                "name": "Foo",
                "abi": [{
                    "type": "function", "name": "get", "stateMutability": "pure",
                    "inputs": [], "outputs": [{ "name": "", "type": "uint256" }]
                }]
            }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    solide(dir.path()).args(["write", "contracts/Foo.sol"]).write_stdin(FOO).assert().success();

    solide(dir.path())
        .env("SOLIDE_COMPILER_API_URL", format!("{}/api/compile", server.uri()))
        .args(["compile", "contracts/Foo.sol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo\n"))
        .stdout(predicate::str::contains("[read]"))
        .stdout(predicate::str::contains("get() returns (uint256 value) [pure]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compile_diagnostics_fail() {
    ensure_test_logging(None);
    info!("Running test");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{
                "severity": "error",
                "type": "TypeError",
                "message": "Undeclared identifier.",
                "formattedMessage": "TypeError: Undeclared identifier.\n --> contracts/Foo.sol:3:56:\n  |\n3 |   return y;\n  |          ^\n"
            }]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    solide(dir.path()).args(["write", "contracts/Foo.sol"]).write_stdin(FOO).assert().success();

    solide(dir.path())
        .env("SOLIDE_COMPILER_API_URL", format!("{}/api/compile", server.uri()))
        .args(["compile", "contracts/Foo.sol", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("TypeError: Undeclared identifier."));
}
