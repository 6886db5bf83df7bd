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

//! Contract artifact model derived from a compiler ABI.
//!
//! [`ContractArtifact::from_abi`] partitions the raw ABI array by entry
//! `type` and attaches a human-readable description to every function,
//! event, error and constructor. The conversion is lenient: entries that
//! cannot be understood are skipped and a malformed ABI simply yields empty
//! collections.

use std::fmt;

use alloy_json_abi::{Error as AbiError, Event as AbiEvent, Function, JsonAbi};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Name given to parameters the ABI leaves unnamed.
pub const DEFAULT_PARAM_NAME: &str = "value";

/// State mutability of a function or constructor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Does not read or modify state.
    Pure,
    /// Reads but does not modify state.
    View,
    /// Modifies state, rejects ether.
    #[default]
    NonPayable,
    /// Modifies state, accepts ether.
    Payable,
}

impl StateMutability {
    /// Whether calling the function never changes state.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }

    /// The keyword used in ABI JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pure => "pure",
            Self::View => "view",
            Self::NonPayable => "nonpayable",
            Self::Payable => "payable",
        }
    }
}

impl fmt::Display for StateMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed parameter of a function, event, error or constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    /// Parameter name, [`DEFAULT_PARAM_NAME`] when the ABI has none.
    pub name: String,
    /// Solidity type, e.g. `uint256` or `tuple[]`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the parameter is indexed (event parameters only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    /// Members of a tuple type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// `type name`, or `type indexed name` for indexed event parameters.
    pub fn signature(&self) -> String {
        if self.indexed == Some(true) {
            format!("{} indexed {}", self.ty, self.name)
        } else {
            format!("{} {}", self.ty, self.name)
        }
    }

    /// A plausible literal for this parameter, used to prefill call forms.
    pub fn example_value(&self) -> &'static str {
        generate_example_value(&self.ty)
    }
}

/// A callable function of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFunction {
    /// Function name.
    pub name: String,
    /// `name(type name, ...) returns (type name) [stateMutability]`.
    pub description: String,
    /// Declared mutability.
    pub state_mutability: StateMutability,
    /// Input parameters.
    pub inputs: Vec<AbiParam>,
    /// Return values.
    pub outputs: Vec<AbiParam>,
    /// Four-byte selector as `0x`-prefixed hex, when the entry is well formed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ContractFunction {
    /// Read functions (`view`/`pure`) never modify state.
    pub fn is_read(&self) -> bool {
        self.state_mutability.is_read()
    }

    /// Write functions (`nonpayable`/`payable`) send a transaction.
    pub fn is_write(&self) -> bool {
        !self.is_read()
    }
}

/// An event the contract may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    /// Event name.
    pub name: String,
    /// `name(type name, ...)`.
    pub description: String,
    /// Event parameters.
    pub inputs: Vec<AbiParam>,
    /// Whether the event is anonymous.
    #[serde(default)]
    pub anonymous: bool,
    /// Topic hash as `0x`-prefixed hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// A custom error the contract may revert with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractError {
    /// Error name.
    pub name: String,
    /// `name(type name, ...)`.
    pub description: String,
    /// Error parameters.
    pub inputs: Vec<AbiParam>,
    /// Four-byte selector as `0x`-prefixed hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// The contract constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConstructor {
    /// `constructor(type name, ...) [stateMutability]`.
    pub description: String,
    /// Declared mutability.
    pub state_mutability: StateMutability,
    /// Constructor parameters.
    pub inputs: Vec<AbiParam>,
}

/// Structured description of a compiled contract's interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Contract name.
    pub name: String,
    /// One-line summary.
    pub description: String,
    /// Deployment address, once deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Creation bytecode as hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
    /// The raw ABI array the rest of the artifact was derived from.
    pub abi: Vec<Value>,
    /// Functions in ABI order.
    pub functions: Vec<ContractFunction>,
    /// Events in ABI order.
    pub events: Vec<ContractEvent>,
    /// Custom errors in ABI order.
    pub errors: Vec<ContractError>,
    /// The constructor, if the ABI declares one.
    pub constructor: Option<ContractConstructor>,
}

/// Loose shape of one ABI entry; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    inputs: Vec<RawParam>,
    outputs: Vec<RawParam>,
    state_mutability: Option<String>,
    anonymous: bool,
    // Pre-0.5 compilers encoded mutability as flags.
    constant: Option<bool>,
    payable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawParam {
    name: Option<String>,
    #[serde(rename = "type")]
    ty: Option<String>,
    indexed: Option<bool>,
    components: Vec<RawParam>,
}

impl RawParam {
    fn into_param(self, role: &str) -> AbiParam {
        let name = self.name.filter(|n| !n.is_empty()).unwrap_or_else(|| DEFAULT_PARAM_NAME.to_string());
        let ty = self.ty.unwrap_or_default();
        AbiParam {
            description: format!("{role} of type {ty}"),
            name,
            ty,
            indexed: self.indexed,
            components: self.components.into_iter().map(|c| c.into_param("Component")).collect(),
        }
    }
}

impl RawEntry {
    fn mutability(&self) -> StateMutability {
        match self.state_mutability.as_deref() {
            Some("pure") => StateMutability::Pure,
            Some("view") => StateMutability::View,
            Some("payable") => StateMutability::Payable,
            Some(_) => StateMutability::NonPayable,
            None if self.constant == Some(true) => StateMutability::View,
            None if self.payable == Some(true) => StateMutability::Payable,
            None => StateMutability::NonPayable,
        }
    }
}

fn join_params(params: &[AbiParam]) -> String {
    params.iter().map(AbiParam::signature).collect::<Vec<_>>().join(", ")
}

fn into_params(raw: Vec<RawParam>, role: &str) -> Vec<AbiParam> {
    raw.into_iter().map(|p| p.into_param(role)).collect()
}

impl ContractArtifact {
    /// Build an artifact named `name` from a raw ABI array.
    ///
    /// Anything other than a JSON array yields an artifact with empty
    /// collections. Entries of unknown type (`fallback`, `receive`) are kept
    /// in [`Self::abi`] but not partitioned.
    pub fn from_abi(name: impl Into<String>, abi: &Value) -> Self {
        let name = name.into();
        let entries = match abi {
            Value::Array(entries) => entries.clone(),
            other => {
                if !other.is_null() {
                    warn!(contract = %name, "ABI is not an array, ignoring it");
                }
                Vec::new()
            }
        };

        let mut artifact = Self {
            description: format!("Smart contract {name} interface"),
            name,
            abi: entries.clone(),
            ..Default::default()
        };

        for entry in entries {
            let raw: RawEntry = match serde_json::from_value(entry.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(error = %e, "skipping malformed ABI entry");
                    continue;
                }
            };
            artifact.push_entry(raw, &entry);
        }

        artifact
    }

    fn push_entry(&mut self, raw: RawEntry, entry: &Value) {
        let mutability = raw.mutability();
        let name = raw.name.clone().unwrap_or_default();

        match raw.kind.as_deref() {
            // Entries without a type are functions in the legacy format.
            Some("function") | None => {
                let inputs = into_params(raw.inputs, "Input parameter");
                let outputs = into_params(raw.outputs, "Return value");
                let mut description = format!("{name}({})", join_params(&inputs));
                if !outputs.is_empty() {
                    description.push_str(&format!(" returns ({})", join_params(&outputs)));
                }
                description.push_str(&format!(" [{mutability}]"));

                let selector = serde_json::from_value::<Function>(entry.clone())
                    .ok()
                    .map(|f| f.selector().to_string());

                self.functions.push(ContractFunction {
                    name,
                    description,
                    state_mutability: mutability,
                    inputs,
                    outputs,
                    selector,
                });
            }
            Some("event") => {
                let inputs = into_params(raw.inputs, "Input parameter");
                let topic = serde_json::from_value::<AbiEvent>(entry.clone())
                    .ok()
                    .map(|e| e.selector().to_string());
                self.events.push(ContractEvent {
                    description: format!("{name}({})", join_params(&inputs)),
                    name,
                    inputs,
                    anonymous: raw.anonymous,
                    topic,
                });
            }
            Some("error") => {
                let inputs = into_params(raw.inputs, "Input parameter");
                let selector = serde_json::from_value::<AbiError>(entry.clone())
                    .ok()
                    .map(|e| e.selector().to_string());
                self.errors.push(ContractError {
                    description: format!("{name}({})", join_params(&inputs)),
                    name,
                    inputs,
                    selector,
                });
            }
            Some("constructor") => {
                let inputs = into_params(raw.inputs, "Input parameter");
                self.constructor = Some(ContractConstructor {
                    description: format!("constructor({}) [{mutability}]", join_params(&inputs)),
                    state_mutability: mutability,
                    inputs,
                });
            }
            Some(other) => debug!(kind = other, "ABI entry not partitioned"),
        }
    }

    /// Attach creation bytecode.
    pub fn with_bytecode(mut self, bytecode: Option<String>) -> Self {
        self.bytecode = bytecode.filter(|b| !b.is_empty());
        self
    }

    /// Functions that do not modify state.
    pub fn read_functions(&self) -> impl Iterator<Item = &ContractFunction> {
        self.functions.iter().filter(|f| f.is_read())
    }

    /// Functions that send a transaction.
    pub fn write_functions(&self) -> impl Iterator<Item = &ContractFunction> {
        self.functions.iter().filter(|f| f.is_write())
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&ContractFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The ABI as a typed [`JsonAbi`], if every entry is well formed.
    pub fn json_abi(&self) -> Option<JsonAbi> {
        serde_json::from_value(Value::Array(self.abi.clone())).ok()
    }
}

impl fmt::Display for ContractArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        if let Some(constructor) = &self.constructor {
            writeln!(f, "  {:12} {}", "[ctor]", constructor.description)?;
        }
        for function in &self.functions {
            let tag = if function.is_read() { "[read]" } else { "[write]" };
            writeln!(f, "  {:12} {}", tag, function.description)?;
        }
        for event in &self.events {
            writeln!(f, "  {:12} {}", "[event]", event.description)?;
        }
        for error in &self.errors {
            writeln!(f, "  {:12} {}", "[error]", error.description)?;
        }
        Ok(())
    }
}

/// A sample literal for a Solidity type, used to prefill call forms.
pub fn generate_example_value(ty: &str) -> &'static str {
    if ty.ends_with(']') {
        return "[]";
    }
    match ty {
        "uint256" | "uint" => "1000000000000000000",
        "address" => "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
        "bool" => "true",
        "string" => "\"Example String\"",
        t if t.starts_with("bytes") => "0x0123456789abcdef",
        t if t.starts_with("uint") || t.starts_with("int") => "100",
        _ => "\"\"",
    }
}
