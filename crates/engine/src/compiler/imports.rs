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

//! Import resolution for the compiler.
//!
//! The compiler never touches the store directly. Whenever it needs the
//! contents of an imported file it sends an [`ImportRequest`] to the import
//! service task and awaits the reply. The service consults the workspace
//! first and then the configured remote library sources.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use solide_common::{FileStore, RemoteSource};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::vfs::{VfsError, VirtualFs};

/// Reply to an import request, in the shape the compiler callback expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    /// The imported file's source text.
    Contents(String),
    /// Why the import could not be resolved.
    Error(String),
}

impl From<Result<String, VfsError>> for ImportOutcome {
    fn from(result: Result<String, VfsError>) -> Self {
        match result {
            Ok(contents) => Self::Contents(contents),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// Work item sent to the import service.
struct ImportRequest {
    /// Normalized import path
    path: String,
    /// Channel to send back the contents
    rsp: oneshot::Sender<Result<String, VfsError>>,
}

/// Handle to the import service.
///
/// Cloning is cheap; every clone talks to the same service task.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    tx: mpsc::Sender<ImportRequest>,
}

impl std::fmt::Debug for ImportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportRequest").field("path", &self.path).finish()
    }
}

impl ImportResolver {
    /// Spawn the import service over `vfs` and `remotes`.
    pub fn spawn<S: FileStore>(vfs: VirtualFs<S>, remotes: RemoteImports) -> Self {
        let (tx, mut rx) = mpsc::channel::<ImportRequest>(256);

        tokio::spawn(async move {
            debug!("import service started");
            while let Some(ImportRequest { path, rsp }) = rx.recv().await {
                let result = resolve(&vfs, &remotes, &path).await;
                if rsp.send(result).is_err() {
                    debug!(path = %path, "import requester went away");
                }
            }
            debug!("import service shutting down");
        });

        Self { tx }
    }

    /// Contents of the file at `path`, or [`VfsError::ImportResolution`].
    pub async fn resolve(&self, path: &str) -> Result<String, VfsError> {
        let (rsp, rx) = oneshot::channel();
        let request = ImportRequest { path: path.to_string(), rsp };
        if self.tx.send(request).await.is_err() {
            warn!(path, "import service is not running");
            return Err(VfsError::ImportResolution(path.to_string()));
        }
        rx.await.unwrap_or_else(|_| Err(VfsError::ImportResolution(path.to_string())))
    }

    /// [`Self::resolve`] in the `{contents} | {error}` form of the compiler
    /// import callback.
    pub async fn callback(&self, path: &str) -> ImportOutcome {
        self.resolve(path).await.into()
    }
}

async fn resolve<S: FileStore>(
    vfs: &VirtualFs<S>,
    remotes: &RemoteImports,
    path: &str,
) -> Result<String, VfsError> {
    match vfs.resolve_import(path).await {
        Ok(content) => return Ok(content),
        Err(VfsError::ImportResolution(_)) => {}
        Err(e) => return Err(e),
    }

    match remotes.fetch(path).await {
        Some(Ok(content)) => Ok(content),
        Some(Err(e)) => {
            warn!(path, error = %e, "failed to fetch remote import");
            Err(VfsError::ImportResolution(path.to_string()))
        }
        None => Err(VfsError::ImportResolution(path.to_string())),
    }
}

/// Fetches library imports such as `@openzeppelin/contracts/...` over HTTP.
///
/// Successful fetches are cached for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct RemoteImports {
    client: reqwest::Client,
    sources: Arc<Vec<RemoteSource>>,
    cache: Arc<DashMap<String, String>>,
}

impl Default for RemoteImports {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RemoteImports {
    /// Remote imports served from `sources`, matched by prefix.
    pub fn new(sources: Vec<RemoteSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, sources: Arc::new(sources), cache: Arc::new(DashMap::new()) }
    }

    /// The URL `path` is fetched from, if a source matches it.
    pub fn url_for(&self, path: &str) -> Option<String> {
        self.sources.iter().find_map(|source| {
            path.strip_prefix(source.prefix.as_str()).map(|rest| {
                format!("{}/{}", source.base_url.trim_end_matches('/'), rest.trim_start_matches('/'))
            })
        })
    }

    /// Fetch `path`, or `None` if no source serves it.
    pub async fn fetch(&self, path: &str) -> Option<Result<String, reqwest::Error>> {
        if let Some(cached) = self.cache.get(path) {
            debug!(path, "remote import cache hit");
            return Some(Ok(cached.clone()));
        }

        let url = self.url_for(path)?;
        info!(path, url = %url, "fetching remote import");

        let result = async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.text().await
        }
        .await;

        if let Ok(content) = &result {
            self.cache.insert(path.to_string(), content.clone());
        }
        Some(result)
    }
}

/// Import specifiers appearing in `source`, in order of appearance.
///
/// Matches `import "x";`, `import "x" as y;`, `import {a, b} from "x";` and
/// `import * as y from "x";`. This is a pre-scan; the compiler's own import
/// requests remain authoritative.
pub fn scan_imports(source: &str) -> Vec<String> {
    static IMPORT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"import\s+(?:[^"';]*?\s+from\s+)?["']([^"']+)["']"#).expect("valid regex")
    });

    let mut imports: Vec<String> = Vec::new();
    for caps in IMPORT.captures_iter(source) {
        let path = caps[1].to_string();
        if !imports.contains(&path) {
            imports.push(path);
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use solide_common::MemoryStore;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn test_scan_imports() {
        let source = r#"
            pragma solidity ^0.8.20;
            import "./A.sol";
            import './B.sol' as B;
            import {X, Y} from "../lib/C.sol";
            import * as D from "@openzeppelin/contracts/token/ERC20/ERC20.sol";
            import "./A.sol";
            contract Foo {}
        "#;

        assert_eq!(
            scan_imports(source),
            ["./A.sol", "./B.sol", "../lib/C.sol", "@openzeppelin/contracts/token/ERC20/ERC20.sol"]
        );
        assert!(scan_imports("contract Foo {}").is_empty());
    }

    #[test]
    fn test_url_for() {
        let remotes = RemoteImports::new(vec![RemoteSource {
            prefix: "@oz/".into(),
            base_url: "https://example.com/contracts/".into(),
        }]);
        assert_eq!(remotes.url_for("@oz/token/T.sol").as_deref(), Some("https://example.com/contracts/token/T.sol"));
        assert_eq!(remotes.url_for("contracts/T.sol"), None);
    }

    #[tokio::test]
    async fn test_resolver_reads_workspace() {
        let vfs = VirtualFs::open(MemoryStore::new()).await;
        vfs.write_file("contracts/Lib.sol", "library Lib {}").await.unwrap();
        let resolver = ImportResolver::spawn(vfs, RemoteImports::default());

        assert_eq!(resolver.resolve("contracts/Lib.sol").await.unwrap(), "library Lib {}");
        assert_eq!(
            resolver.callback("contracts/Missing.sol").await,
            ImportOutcome::Error("Unable to resolve import: contracts/Missing.sol".into())
        );
    }

    #[tokio::test]
    async fn test_resolver_fetches_and_caches_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contracts/access/Ownable.sol"))
            .respond_with(ResponseTemplate::new(200).set_body_string("abstract contract Ownable {}"))
            .expect(1)
            .mount(&server)
            .await;

        let remotes = RemoteImports::new(vec![RemoteSource {
            prefix: "@openzeppelin/contracts/".into(),
            base_url: format!("{}/contracts", server.uri()),
        }]);
        let vfs = VirtualFs::open(MemoryStore::new()).await;
        let resolver = ImportResolver::spawn(vfs, remotes);

        for _ in 0..2 {
            let content = resolver.resolve("@openzeppelin/contracts/access/Ownable.sol").await.unwrap();
            assert_eq!(content, "abstract contract Ownable {}");
        }
    }

    #[tokio::test]
    async fn test_remote_failure_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let remotes = RemoteImports::new(vec![RemoteSource {
            prefix: "@lib/".into(),
            base_url: server.uri(),
        }]);
        let vfs = VirtualFs::open(MemoryStore::new()).await;
        let resolver = ImportResolver::spawn(vfs, remotes);

        let err = resolver.resolve("@lib/Nope.sol").await.unwrap_err();
        assert!(matches!(err, VfsError::ImportResolution(p) if p == "@lib/Nope.sol"));
    }
}
