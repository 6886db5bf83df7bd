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

//! Notifications published by the compilation service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{artifact::ContractArtifact, compiler::Marker};

/// Severity of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// Progress information.
    Info,
    /// A compilation succeeded.
    Success,
    /// Something worth attention that did not fail the pipeline.
    Warning,
    /// A failure.
    Error,
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A source version worth keeping, published after a successful compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractVersion {
    /// Version name, `<ContractName>.sol`.
    pub name: String,
    /// Full source text that compiled.
    pub source_code: String,
    /// Inferred main contract name.
    pub contract_name: String,
    /// When the compile finished.
    pub timestamp: DateTime<Utc>,
    /// Conversation the source belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Everything the compilation service reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompilationEvent {
    /// The editor markers were replaced.
    Markers {
        /// The new markers
        markers: Vec<Marker>,
    },
    /// A line for the console panel.
    Console {
        /// Severity
        level: ConsoleLevel,
        /// Text
        message: String,
    },
    /// The current artifact was replaced.
    ArtifactUpdated {
        /// The new artifact
        artifact: Box<ContractArtifact>,
    },
    /// A compile succeeded with a complete contract.
    ContractVersionRegistered {
        /// The version to persist
        version: ContractVersion,
    },
}
