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

//! Solide Common - Shared functionality for Solide components
//!
//! This crate provides the persistent path-addressed file store together with
//! configuration, environment variable names and logging setup shared by the
//! engine and the command-line front end.

/// Configuration file and environment overrides
pub mod config;
/// Environment variable names recognized by Solide
pub mod env;
/// Logging setup and utilities for consistent logging across Solide components
pub mod logging;
/// Flat, path-addressed persistent file store
pub mod store;

pub use config::*;
pub use store::*;
