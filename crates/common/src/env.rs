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

//! Environment variable name constants for Solide configuration.
//!
//! Every variable listed here overrides the corresponding key of
//! [`crate::config::SolideConfig`] after the configuration file is read.
//!
//! # Environment Variables
//!
//! - [`SOLIDE_CONFIG`] - Path of the TOML configuration file
//! - [`SOLIDE_STORE_DIR`] - Root directory of the on-disk file store
//! - [`SOLIDE_SOLC_VERSION`] - Solidity compiler version used by the local worker
//! - [`SOLIDE_COMPILER_API_URL`] - Remote compile service endpoint

/// Environment variable for the configuration file location.
///
/// # Default
///
/// `~/.solide/config.toml`. A missing file is not an error; defaults apply.
pub const SOLIDE_CONFIG: &str = "SOLIDE_CONFIG";

/// Environment variable for specifying the store directory.
///
/// The directory holds one JSON record per workspace file.
///
/// # Examples
///
/// ```bash
/// SOLIDE_STORE_DIR=/tmp/solide-ws solide ls
/// ```
///
/// # Related
///
/// Also available as the CLI argument `--store-dir`, which takes precedence.
pub const SOLIDE_STORE_DIR: &str = "SOLIDE_STORE_DIR";

/// Environment variable for the Solidity compiler version (e.g. `0.8.20`).
///
/// Invalid versions are rejected when the configuration is validated.
pub const SOLIDE_SOLC_VERSION: &str = "SOLIDE_SOLC_VERSION";

/// Environment variable for the remote compile service base URL.
///
/// When set, compile requests are sent over HTTP instead of to the local
/// compiler worker.
pub const SOLIDE_COMPILER_API_URL: &str = "SOLIDE_COMPILER_API_URL";
