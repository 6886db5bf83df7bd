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

//! Hierarchy view derived from flat store keys.
//!
//! The store has no directories. [`build_tree`] materializes them from path
//! prefixes in two passes: first every node is created (directories for each
//! proper prefix, files for each key), then every node is linked to its
//! parent directory. Keys may arrive in any order, so a descendant can be
//! seen before its ancestor; the second pass makes the result independent of
//! that order.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Name of the placeholder that keeps an otherwise empty directory visible.
pub const PLACEHOLDER_FILE: &str = ".gitkeep";

/// Kind of a [`FileSystemItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A stored file.
    File,
    /// A directory implied by the paths below it.
    Directory,
}

/// A node of the derived hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemItem {
    /// Last path segment.
    pub name: String,
    /// Full normalized path.
    pub path: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Sorted children; `None` for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileSystemItem>>,
}

impl FileSystemItem {
    /// Whether this node is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    /// Children of a directory, empty for files.
    pub fn children(&self) -> &[Self] {
        self.children.as_deref().unwrap_or_default()
    }

    fn sort_order(a: &Self, b: &Self) -> Ordering {
        match (a.is_directory(), b.is_directory()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let suffix = if self.is_directory() { "/" } else { "" };
        writeln!(f, "{:indent$}{}{suffix}", "", self.name, indent = depth * 2)?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for FileSystemItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Paths of every file below `items`, in tree order.
pub fn file_paths(items: &[FileSystemItem]) -> Vec<String> {
    let mut paths = Vec::new();
    let mut stack: Vec<&FileSystemItem> = items.iter().rev().collect();
    while let Some(item) = stack.pop() {
        match item.kind {
            ItemKind::File => paths.push(item.path.clone()),
            ItemKind::Directory => stack.extend(item.children().iter().rev()),
        }
    }
    paths
}

struct Directory {
    name: String,
    children: Vec<(ItemKind, String)>,
}

/// Build the sorted hierarchy for a set of normalized paths.
///
/// Placeholder files are not rendered, but the directories they live in are.
/// Directories and files are kept apart, so a file stored at `a` and another
/// at `a/b.sol` both show up.
pub fn build_tree<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<FileSystemItem> {
    let mut directories: HashMap<String, Directory> = HashMap::new();
    let mut files: BTreeSet<String> = BTreeSet::new();

    // Pass 1: create every node.
    for path in paths {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = segments.split_last() else { continue };

        for depth in 1..=dirs.len() {
            directories.entry(dirs[..depth].join("/")).or_insert_with(|| Directory {
                name: dirs[depth - 1].to_string(),
                children: Vec::new(),
            });
        }

        if *name != PLACEHOLDER_FILE {
            files.insert(segments.join("/"));
        }
    }

    // Pass 2: link every node to its parent directory.
    let mut roots: Vec<(ItemKind, String)> = Vec::new();
    let nodes: Vec<(ItemKind, String)> = directories
        .keys()
        .map(|path| (ItemKind::Directory, path.clone()))
        .chain(files.iter().map(|path| (ItemKind::File, path.clone())))
        .collect();
    for (kind, path) in nodes {
        match directories.get_mut(super::path::parent_of(&path)) {
            Some(parent) => parent.children.push((kind, path)),
            None => roots.push((kind, path)),
        }
    }

    materialize_all(&roots, &directories)
}

fn materialize_all(
    entries: &[(ItemKind, String)],
    directories: &HashMap<String, Directory>,
) -> Vec<FileSystemItem> {
    let mut items: Vec<FileSystemItem> = entries
        .iter()
        .map(|(kind, path)| match kind {
            ItemKind::File => FileSystemItem {
                name: super::path::file_name(path).to_string(),
                path: path.clone(),
                kind: ItemKind::File,
                children: None,
            },
            ItemKind::Directory => {
                let dir = &directories[path.as_str()];
                FileSystemItem {
                    name: dir.name.clone(),
                    path: path.clone(),
                    kind: ItemKind::Directory,
                    children: Some(materialize_all(&dir.children, directories)),
                }
            }
        })
        .collect();
    items.sort_by(FileSystemItem::sort_order);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sorted(items: &[FileSystemItem]) {
        let mut seen_file = false;
        for pair in items.windows(2) {
            if pair[0].kind == pair[1].kind {
                assert!(pair[0].name.to_lowercase() <= pair[1].name.to_lowercase());
            }
        }
        for item in items {
            if item.is_directory() {
                assert!(!seen_file, "directory {} listed after a file", item.path);
                assert_sorted(item.children());
            } else {
                seen_file = true;
            }
        }
    }

    #[test]
    fn test_nested_tree() {
        let tree = build_tree(["contracts/tokens/T.sol", "contracts/A.sol", "README.md"]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "contracts");
        assert!(tree[0].is_directory());
        assert_eq!(tree[1].name, "README.md");

        let contracts = tree[0].children();
        assert_eq!(contracts[0].name, "tokens");
        assert_eq!(contracts[0].children()[0].path, "contracts/tokens/T.sol");
        assert_eq!(contracts[1].path, "contracts/A.sol");
    }

    #[test]
    fn test_order_independent() {
        let forward = build_tree(["a/b/c/d.sol", "a/b/x.sol", "a/y.sol", "z.sol"]);
        let backward = build_tree(["z.sol", "a/y.sol", "a/b/x.sol", "a/b/c/d.sol"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_placeholder_keeps_directory_visible() {
        let tree = build_tree(["contracts/.gitkeep", "empty/.gitkeep"]);

        assert_eq!(tree.len(), 2);
        assert!(tree.iter().all(|item| item.is_directory() && item.children().is_empty()));
        assert!(file_paths(&tree).is_empty());
    }

    #[test]
    fn test_leaf_round_trip() {
        let written = ["b/z.sol", "a/2.sol", "a/1.sol", "a/deep/er/x.sol", "top.sol", "a/.gitkeep"];
        let tree = build_tree(written);

        let mut leaves = file_paths(&tree);
        leaves.sort();
        let mut expected: Vec<String> = written
            .iter()
            .filter(|p| !p.ends_with(PLACEHOLDER_FILE))
            .map(|p| p.to_string())
            .collect();
        expected.sort();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn test_sort_invariant() {
        let tree = build_tree([
            "zeta.sol",
            "alpha/b.sol",
            "alpha/a.sol",
            "alpha/sub/c.sol",
            "beta/.gitkeep",
            "Alpha.sol",
            "m/n/o.sol",
        ]);
        assert_sorted(&tree);
        assert_eq!(tree[0].name, "alpha");
        assert_eq!(tree[0].children()[0].name, "sub");
    }

    #[test]
    fn test_file_and_directory_with_same_name() {
        let tree = build_tree(["a", "a/b.sol"]);

        assert_eq!(tree.len(), 2);
        assert!(tree[0].is_directory());
        assert_eq!(tree[0].children()[0].path, "a/b.sol");
        assert_eq!(tree[1].kind, ItemKind::File);
        assert_eq!(tree[1].path, "a");

        let mut leaves = file_paths(&tree);
        leaves.sort();
        assert_eq!(leaves, vec!["a".to_string(), "a/b.sol".to_string()]);
    }

    #[test]
    fn test_display() {
        let tree = build_tree(["contracts/Foo.sol"]);
        assert_eq!(tree[0].to_string(), "contracts/\n  Foo.sol\n");
    }
}
