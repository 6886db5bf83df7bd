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

//! Pure helpers over normalized workspace paths.

use solide_common::normalize_path;

/// Normalize a path and drop any trailing separator.
pub fn clean_path(path: &str) -> String {
    let mut path = normalize_path(path);
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Everything before the last `/`, or `""` for top-level entries.
pub fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// The last path segment.
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map(|i| &path[i + 1..]).unwrap_or(path)
}

/// Whether `path` is `ancestor` itself or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor ||
        (path.len() > ancestor.len() &&
            path.starts_with(ancestor) &&
            path.as_bytes()[ancestor.len()] == b'/')
}

/// Whether `path` is taken in `keys`, either by a file or as a directory
/// prefix of some file.
pub fn is_occupied<'a>(path: &str, mut keys: impl Iterator<Item = &'a str>) -> bool {
    keys.any(|key| is_within(key, path))
}

/// The `n`-th rename candidate for `path`: `dir/name_n.ext`.
///
/// The extension is taken from the last `.` of the file name; names
/// without one (or dotfiles) get the suffix appended at the end.
pub fn numbered_candidate(path: &str, n: usize) -> String {
    let parent = parent_of(path);
    let name = file_name(path);
    let renamed = match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{n}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}_{n}"),
    };
    if parent.is_empty() {
        renamed
    } else {
        format!("{parent}/{renamed}")
    }
}

/// First free rename candidate for `path` according to `is_taken`.
pub fn unique_path(path: &str, is_taken: impl Fn(&str) -> bool) -> String {
    (1..)
        .map(|n| numbered_candidate(path, n))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| path.to_string())
}

/// Resolve an import specifier against the importing file.
///
/// `./` and `../` specifiers are relative to the importer's directory; any
/// other specifier is already a workspace path or a remote library path.
/// Leading `..` segments that would climb above the workspace root are
/// dropped.
pub fn resolve_import_path(importer: &str, import: &str) -> String {
    let import = normalize_path(import);
    if !(import.starts_with("./") || import.starts_with("../")) {
        return import;
    }

    let mut segments: Vec<&str> =
        parent_of(importer).split('/').filter(|s| !s.is_empty()).collect();
    for segment in import.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
