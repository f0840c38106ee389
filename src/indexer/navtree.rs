//! Reader for generated navigation-tree scripts.
//!
//! Each script is a single assignment of a nested array:
//!
//! ```text
//! var namespaceSayuri =
//! [
//!     [ "ChessEngine", "classSayuri_1_1ChessEngine.html", "classSayuri_1_1ChessEngine" ],
//!     [ "GET_FROM", "chess__def_8h.html#aee919cb5780bfde9c93269a7076c1870", null ],
//! ];
//! ```
//!
//! Every node is `[name, url | null, children | script-name | null]`. Nodes
//! that point at another script are not followed; pass every script of the
//! site to collect the whole tree. The builder drops the resulting duplicates.

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SymshardError};
use crate::indexer::naming::{decode_page, PageKind};
use crate::types::{Category, RawSymbol};

/// Parse one navigation-tree script into raw symbols.
pub fn parse_navtree(script: &str) -> Result<Vec<RawSymbol>> {
    let header = Regex::new(r"^\s*var\s+[A-Za-z_$][A-Za-z0-9_$]*\s*=")
        .map_err(|e| SymshardError::Other(e.to_string()))?;
    let body = header
        .find(script)
        .map(|m| &script[m.end()..])
        .ok_or_else(|| SymshardError::Parse("navtree script has no `var NAME =` header".into()))?;
    let body = body.trim().trim_end_matches(';');

    let tree: Value = serde_json::from_str(body)?;
    let nodes = tree
        .as_array()
        .ok_or_else(|| SymshardError::Parse("navtree root is not an array".into()))?;

    let mut symbols = Vec::new();
    walk(nodes, &mut symbols)?;
    Ok(symbols)
}

fn walk(nodes: &[Value], out: &mut Vec<RawSymbol>) -> Result<()> {
    for node in nodes {
        let fields = node
            .as_array()
            .ok_or_else(|| SymshardError::Parse(format!("navtree node is not an array: {node}")))?;
        let name = fields
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| SymshardError::Parse(format!("navtree node has no name: {node}")))?;

        if let Some(url) = fields.get(1).and_then(Value::as_str) {
            out.push(classify(name, url));
        }
        if let Some(children) = fields.get(2).and_then(Value::as_array) {
            walk(children, out)?;
        }
    }
    Ok(())
}

/// Turn a named link into a symbol, inferring category and scope from the
/// page it points at.
fn classify(name: &str, url: &str) -> RawSymbol {
    let (page, anchor) = match url.split_once('#') {
        Some((page, anchor)) => (page, Some(anchor)),
        None => (url, None),
    };
    let (kind, decoded) = decode_page(page);

    match anchor {
        Some(_) => {
            let category = match kind {
                PageKind::File if is_screaming(name) => Category::Macro,
                PageKind::File => Category::Typedef,
                PageKind::Other => Category::Page,
                _ => member_category(name),
            };
            let scope = match kind {
                PageKind::Class | PageKind::Struct | PageKind::Union | PageKind::Namespace => decoded,
                _ => None,
            };
            RawSymbol {
                name: name.to_string(),
                kind: category,
                scope,
                location: url.to_string(),
                signature: None,
            }
        }
        None => {
            let category = match kind {
                PageKind::Class => Category::Class,
                PageKind::Struct | PageKind::Union => Category::Struct,
                PageKind::Namespace => Category::Namespace,
                PageKind::File => Category::File,
                PageKind::Other => Category::Page,
            };
            // The page names the compound itself; its parent is the scope.
            let scope = match kind {
                PageKind::File | PageKind::Other => None,
                _ => decoded
                    .as_deref()
                    .and_then(|q| q.rsplit_once("::"))
                    .map(|(parent, _)| parent.to_string()),
            };
            RawSymbol {
                name: name.to_string(),
                kind: category,
                scope,
                location: url.to_string(),
                signature: None,
            }
        }
    }
}

/// Category of an anchored member of a namespace or class page.
fn member_category(name: &str) -> Category {
    if name.starts_with('~') || name.starts_with("operator") {
        Category::Function
    } else if is_screaming(name) {
        Category::EnumValue
    } else if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        Category::Function
    } else {
        Category::Variable
    }
}

/// `EN_PASSANT`, `C1`: has an uppercase letter and no lowercase ones.
fn is_screaming(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase()) && !name.chars().any(|c| c.is_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
