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

//! # Solide engine
//!
//! The core of a Solidity workspace: a virtual file system over a
//! path-addressed store, a compiler worker with import resolution, the
//! compilation service that serializes and caches compiles, and the
//! contract artifact model derived from compiled ABIs.
//!
//! ## Layout
//!
//! - [`vfs`]: hierarchy view, moves with collision handling, import lookup
//! - [`compiler`]: single-consumer compiler worker and import service
//! - [`orchestrator`]: cooldown, single flight, last-wins queue, cache
//! - [`artifact`]: typed contract interface built from an ABI
//! - [`workspace`]: wires the above together from a configuration

pub mod artifact;
pub use artifact::*;

pub mod compiler;

pub mod orchestrator;
pub use orchestrator::{CompilationEvent, CompilationService, CompileOutcome};

pub mod vfs;
pub use vfs::{FileSystemItem, MoveOptions, VfsError, VirtualFs};

pub mod workspace;
pub use workspace::*;
