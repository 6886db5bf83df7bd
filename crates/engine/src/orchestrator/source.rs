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

//! Lightweight source inspection done before compiling.
//!
//! These are text heuristics, not a parser. In particular
//! [`infer_contract_name`] guesses the main contract of a file by taking the
//! last non-abstract `contract` declaration; files with several deployable
//! contracts are inherently ambiguous.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{Version, VersionReq};

/// Contract name used when none can be inferred.
pub const FALLBACK_CONTRACT_NAME: &str = "Contract";

// String literals are matched first so `//` inside them is not a comment.
static COMMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|//[^\n]*|/\*.*?\*/"#)
        .expect("valid regex")
});

static CONTRACT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(abstract\s+)?contract\s+([A-Za-z_$][\w$]*)\s*(?:is\s+[^{]+)?\{")
        .expect("valid regex")
});

static PRAGMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"pragma\s+solidity\s+[\^~>=<]*\s*(\d+\.\d+\.\d+)").expect("valid regex")
});

static PRAGMA_REQUIREMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pragma\s+solidity\s+([^;]+);").expect("valid regex"));

static OPERATOR_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([<>=^~]+)\s+").expect("valid regex"));

/// Replace comments by spaces, keeping byte offsets and line numbers.
/// String literals are left untouched.
fn blank_comments(source: &str) -> String {
    COMMENTS
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let text = &caps[0];
            if text.starts_with('"') || text.starts_with('\'') {
                return text.to_string();
            }
            text.chars()
                .map(|c| if c == '\n' { "\n".to_string() } else { " ".repeat(c.len_utf8()) })
                .collect::<String>()
        })
        .into_owned()
}

/// Name of the main contract of `source`: the last `contract` declaration
/// not marked `abstract`. Declarations inside comments are ignored.
pub fn infer_contract_name(source: &str) -> Option<String> {
    let code = blank_comments(source);
    CONTRACT_DECL
        .captures_iter(&code)
        .filter(|caps| caps.get(1).is_none())
        .last()
        .map(|caps| caps[2].to_string())
}

/// [`infer_contract_name`], or [`FALLBACK_CONTRACT_NAME`].
pub fn contract_name_or_default(source: &str) -> String {
    infer_contract_name(source).unwrap_or_else(|| FALLBACK_CONTRACT_NAME.to_string())
}

/// The text of the declaration of contract `name`, from the `contract`
/// keyword through its closing brace. String literals and comments are
/// skipped while matching braces.
pub fn extract_contract_source<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let code = blank_comments(source);
    let start = CONTRACT_DECL
        .captures_iter(&code)
        .filter(|caps| &caps[2] == name)
        .last()
        .and_then(|caps| caps.get(0))?;

    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = start.end() - 1;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return source.get(start.start()..=i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// The first exact version named by a `pragma solidity` directive.
pub fn detect_solidity_version(source: &str) -> Option<Version> {
    let code = blank_comments(source);
    PRAGMA.captures(&code).and_then(|caps| Version::parse(&caps[1]).ok())
}

/// The version requirement of the `pragma solidity` directive, e.g.
/// `>=0.8.0 <0.9.0`. `None` without a pragma or for ranges joined by `||`.
pub fn pragma_requirement(source: &str) -> Option<VersionReq> {
    let code = blank_comments(source);
    let caps = PRAGMA_REQUIREMENT.captures(&code)?;
    let text = caps[1].trim();
    if text.contains("||") {
        return None;
    }
    let joined = OPERATOR_SPACE.replace_all(text, "$1");
    // A bare version is exact in Solidity but a caret range in semver.
    let comparators: Vec<String> = joined
        .split_whitespace()
        .map(|c| {
            if c.starts_with(|ch: char| ch.is_ascii_digit()) {
                format!("={c}")
            } else {
                c.to_string()
            }
        })
        .collect();
    VersionReq::parse(&comparators.join(", ")).ok()
}
