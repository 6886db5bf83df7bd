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

//! Backend posting compile requests to a remote compile service.
//!
//! The service accepts `{contractName, sourceCode, version, mainContractCode}`
//! and answers with `{artifact: {name, abi, bytecode?}, errors?}` on success
//! or `{error, details?}` on failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    backend::{BackendResponse, CompilationRequest, CompileBackend, CompiledOutput, TransportError},
    source::extract_contract_source,
};
use crate::compiler::{Diagnostic, Marker, MarkerSeverity};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest<'a> {
    contract_name: &'a str,
    source_code: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_contract_code: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceArtifact {
    name: Option<String>,
    abi: Option<Value>,
    bytecode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceResponse {
    error: Option<String>,
    details: Option<String>,
    errors: Vec<Diagnostic>,
    artifact: Option<ServiceArtifact>,
}

impl ServiceResponse {
    fn error_text(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        Some(match &self.details {
            Some(details) => format!("{error}: {details}"),
            None => error.clone(),
        })
    }

    fn into_backend_response(self, request: &CompilationRequest) -> BackendResponse {
        let markers: Vec<Marker> =
            self.errors.iter().map(|d| d.to_marker(&request.source_path)).collect();

        if let Some(error) = self.error_text() {
            let mut markers = markers;
            if markers.is_empty() {
                markers.push(Marker::at_start(error.clone(), MarkerSeverity::Error));
            }
            return BackendResponse { markers, output: None, error: Some(error) };
        }

        let output = self.artifact.and_then(|artifact| {
            let abi = artifact.abi?;
            Some(CompiledOutput {
                contract_name: artifact.name.unwrap_or_else(|| request.contract_name.clone()),
                abi,
                bytecode: artifact.bytecode,
            })
        });
        BackendResponse { markers, output, error: None }
    }
}

/// Backend talking to a remote compile service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    /// A backend posting to `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    /// The service endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CompileBackend for HttpBackend {
    async fn compile(
        &self,
        request: &CompilationRequest,
    ) -> Result<BackendResponse, TransportError> {
        let body = ServiceRequest {
            contract_name: &request.contract_name,
            source_code: &request.source_code,
            version: &request.solidity_version,
            main_contract_code: extract_contract_source(
                &request.source_code,
                &request.contract_name,
            ),
        };

        debug!(url = %self.url, contract = %request.contract_name, "posting compile request");
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(%status, "compile service returned an error status");
            // Diagnostics are data even when sent with an error status.
            if let Ok(parsed) = serde_json::from_str::<ServiceResponse>(&text) {
                if !parsed.errors.is_empty() {
                    return Ok(parsed.into_backend_response(request));
                }
                if let Some(message) = parsed.error_text() {
                    return Err(TransportError::Http { status: status.as_u16(), message });
                }
            }
            return Err(TransportError::Http { status: status.as_u16(), message: text });
        }

        let parsed: ServiceResponse =
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(parsed.into_backend_response(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn request() -> CompilationRequest {
        CompilationRequest {
            source_code: "pragma solidity ^0.8.20;\ncontract Foo { }".into(),
            solidity_version: "0.8.20".into(),
            contract_name: "Foo".into(),
            source_path: "contracts/Foo.sol".into(),
        }
    }

    async fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(format!("{}/api/compile", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_success_with_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compile"))
            .and(body_partial_json(json!({
                "contractName": "Foo",
                "version": "0.8.20",
                "mainContractCode": "contract Foo { }"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artifact": { "name": "Foo", "abi": [{ "type": "function", "name": "get" }] }
            })))
            .mount(&server)
            .await;

        let response = backend(&server).await.compile(&request()).await.unwrap();
        assert!(response.markers.is_empty());
        assert!(response.error.is_none());
        let output = response.output.unwrap();
        assert_eq!(output.contract_name, "Foo");
        assert_eq!(output.abi[0]["name"], "get");
    }

    #[tokio::test]
    async fn test_error_field_becomes_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "ParserError: Expected ';'" })),
            )
            .mount(&server)
            .await;

        let response = backend(&server).await.compile(&request()).await.unwrap();
        assert_eq!(response.error.as_deref(), Some("ParserError: Expected ';'"));
        assert_eq!(response.markers.len(), 1);
        assert!(response.markers[0].is_error());
        assert!(response.output.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": "Internal error", "details": "solc crashed" })),
            )
            .mount(&server)
            .await;

        let err = backend(&server).await.compile(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Http { status: 500, .. }));
        assert_eq!(err.to_string(), "compile service returned 500: Internal error: solc crashed");
    }

    #[tokio::test]
    async fn test_error_status_with_diagnostics_is_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{
                    "severity": "error",
                    "type": "TypeError",
                    "message": "Undeclared identifier.",
                    "formattedMessage": "TypeError: Undeclared identifier.\n --> contracts/Foo.sol:2:5:\n"
                }]
            })))
            .mount(&server)
            .await;

        let response = backend(&server).await.compile(&request()).await.unwrap();
        assert_eq!(response.markers.len(), 1);
        assert_eq!(response.markers[0].start_line_number, 2);
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = backend(&server).await.compile(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
