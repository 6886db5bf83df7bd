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

//! Standard-JSON compiler output and its translation into editor markers.
//!
//! The types here are deliberately loose: every field is optional so that
//! output from any compiler version (or a remote service) can be read.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Editor severity of a [`Marker`], on the numeric scale editors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MarkerSeverity {
    /// A warning or informational diagnostic.
    Warning = 4,
    /// An error.
    Error = 8,
}

impl From<MarkerSeverity> for u8 {
    fn from(severity: MarkerSeverity) -> Self {
        severity as Self
    }
}

impl TryFrom<u8> for MarkerSeverity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            8 => Ok(Self::Error),
            4 => Ok(Self::Warning),
            other => Err(format!("unknown marker severity {other}")),
        }
    }
}

/// An editor diagnostic annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// 1-based first line.
    pub start_line_number: u32,
    /// 1-based first column.
    pub start_column: u32,
    /// 1-based last line.
    pub end_line_number: u32,
    /// 1-based column after the last character.
    pub end_column: u32,
    /// Text shown to the user.
    pub message: String,
    /// Error or warning.
    pub severity: MarkerSeverity,
}

impl Marker {
    /// A marker spanning the first line, for failures without a location.
    pub fn at_start(message: impl Into<String>, severity: MarkerSeverity) -> Self {
        Self {
            start_line_number: 1,
            start_column: 1,
            end_line_number: 1,
            end_column: UNLOCATED_END_COLUMN,
            message: message.into(),
            severity,
        }
    }

    /// Whether this marker reports an error.
    pub fn is_error(&self) -> bool {
        self.severity == MarkerSeverity::Error
    }
}

/// End column of markers that cannot be located more precisely.
pub const UNLOCATED_END_COLUMN: u32 = 1000;

/// Location of a diagnostic in a source unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLocation {
    /// Source unit name.
    pub file: String,
    /// Start byte offset, `-1` when unknown.
    pub start: i64,
    /// End byte offset, `-1` when unknown.
    pub end: i64,
}

/// A diagnostic reported by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Diagnostic {
    /// `error`, `warning` or `info`.
    pub severity: String,
    /// Diagnostic class, e.g. `ParserError` or `TypeError`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short message.
    pub message: String,
    /// Rendered message with location and source excerpt.
    pub formatted_message: Option<String>,
    /// Primary location.
    pub source_location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Whether the diagnostic prevents code generation.
    pub fn is_error(&self) -> bool {
        self.severity.eq_ignore_ascii_case("error") ||
            matches!(self.kind.as_str(), "ParserError" | "DeclarationError")
    }

    /// The rendered message if present, otherwise the short one.
    pub fn text(&self) -> &str {
        self.formatted_message.as_deref().filter(|m| !m.is_empty()).unwrap_or(&self.message)
    }

    /// The import path of a `Source "..." not found` diagnostic.
    pub fn missing_source(&self) -> Option<&str> {
        static MISSING: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"Source "([^"]+)" not found"#).expect("valid regex")
        });
        MISSING.captures(&self.message).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    /// Translate into an editor marker for the file `source_path`.
    ///
    /// The line and column come from the `:line:col:` part of the rendered
    /// message and the width from its caret underline. Diagnostics without
    /// a location, or located in another file, are placed on line 1.
    pub fn to_marker(&self, source_path: &str) -> Marker {
        static POSITION: Lazy<Regex> =
            Lazy::new(|| Regex::new(r":(\d+):(\d+):").expect("valid regex"));
        static LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\d+):").expect("valid regex"));

        let severity =
            if self.is_error() { MarkerSeverity::Error } else { MarkerSeverity::Warning };
        let text = self.text();
        let message = self.marker_message();

        let elsewhere = self
            .source_location
            .as_ref()
            .is_some_and(|loc| !loc.file.is_empty() && loc.file != source_path);
        if elsewhere {
            return Marker::at_start(message, severity);
        }

        let (line, column) = if let Some(caps) = POSITION.captures(text) {
            (caps[1].parse().unwrap_or(1), caps[2].parse().unwrap_or(1))
        } else if let Some(caps) = LINE.captures(text) {
            (caps[1].parse().unwrap_or(1), 1)
        } else {
            return Marker::at_start(message, severity);
        };

        let width = text
            .lines()
            .map(|l| l.chars().filter(|c| *c == '^').count() as u32)
            .find(|n| *n > 0)
            .unwrap_or(1);

        Marker {
            start_line_number: line,
            start_column: column,
            end_line_number: line,
            end_column: column + width,
            message,
            severity,
        }
    }

    fn marker_message(&self) -> String {
        let mut message = if self.kind.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.kind, self.message)
        };
        if let Some(path) = self.missing_source() {
            message.push_str(&format!("\nUnable to resolve import: {path}"));
        }
        message
    }
}

/// Compiled bytecode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytecodeOutput {
    /// Hex-encoded object, with or without `0x`.
    pub object: Value,
}

/// EVM section of a compiled contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmOutput {
    /// Creation bytecode.
    pub bytecode: Option<BytecodeOutput>,
}

/// One compiled contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractOutput {
    /// ABI array.
    pub abi: Option<Value>,
    /// EVM output.
    pub evm: Option<EvmOutput>,
}

impl ContractOutput {
    /// Creation bytecode as a `0x`-prefixed hex string.
    pub fn bytecode(&self) -> Option<String> {
        let object = self.evm.as_ref()?.bytecode.as_ref()?.object.as_str()?;
        if object.is_empty() {
            return None;
        }
        Some(if object.starts_with("0x") { object.to_string() } else { format!("0x{object}") })
    }
}

/// Standard-JSON compiler output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOutput {
    /// Errors, warnings and infos.
    pub errors: Vec<Diagnostic>,
    /// `{source unit -> {contract name -> contract}}`.
    pub contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

impl CompilerOutput {
    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Diagnostic::is_error)
    }

    /// One marker per diagnostic.
    pub fn markers(&self, source_path: &str) -> Vec<Marker> {
        self.errors.iter().map(|d| d.to_marker(source_path)).collect()
    }

    /// Find a contract by name, preferring the given source unit.
    pub fn contract(&self, source_path: &str, name: &str) -> Option<&ContractOutput> {
        self.contracts
            .get(source_path)
            .and_then(|unit| unit.get(name))
            .or_else(|| self.contracts.values().find_map(|unit| unit.get(name)))
    }
}
