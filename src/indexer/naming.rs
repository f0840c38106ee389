//! Doxygen page naming.
//!
//! Compound pages are named after the escaped qualified name
//! (`Sayuri::ChessEngine` → `classSayuri_1_1ChessEngine.html`) and file pages
//! after the escaped file name (`chess_def.h` → `chess__def_8h.html`). Both
//! directions are needed: the C++ extractor synthesizes pages, the navtree
//! reader decodes them back into scopes.

use sha2::{Digest, Sha256};

/// What kind of page a site path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Class,
    Struct,
    Union,
    Namespace,
    File,
    Other,
}

const ESCAPES: &[(char, &str)] = &[
    ('_', "__"),
    (':', "_1"),
    ('<', "_3"),
    ('>', "_4"),
    ('*', "_5"),
    ('&', "_6"),
    ('.', "_8"),
    ('~', "_9"),
];

/// Escape a qualified or file name for use in a page file name.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        match ESCAPES.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None if c.is_whitespace() => {}
            None => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_name`]. Unknown escapes are kept verbatim.
pub fn unescape_name(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
            continue;
        }
        let Some(&next) = chars.peek() else {
            out.push('_');
            break;
        };
        let decoded = ESCAPES
            .iter()
            .find(|(_, to)| to.chars().nth(1) == Some(next))
            .map(|(from, _)| *from);
        match decoded {
            Some(from) => {
                chars.next();
                out.push(from);
            }
            None => out.push('_'),
        }
    }
    out
}

pub fn class_page(qualified: &str) -> String {
    format!("class{}.html", escape_name(qualified))
}

pub fn struct_page(qualified: &str) -> String {
    format!("struct{}.html", escape_name(qualified))
}

pub fn namespace_page(qualified: &str) -> String {
    format!("namespace{}.html", escape_name(qualified))
}

pub fn file_page(file_name: &str) -> String {
    format!("{}.html", escape_name(file_name))
}

/// Classify a page path and decode the qualified (or file) name it documents.
pub fn decode_page(page: &str) -> (PageKind, Option<String>) {
    let file = page.rsplit('/').next().unwrap_or(page);
    let Some(stem) = file.strip_suffix(".html") else {
        return (PageKind::Other, None);
    };
    for (prefix, kind) in [
        ("class", PageKind::Class),
        ("struct", PageKind::Struct),
        ("union", PageKind::Union),
        ("namespace", PageKind::Namespace),
    ] {
        if let Some(rest) = stem.strip_prefix(prefix) {
            if !rest.is_empty() && !rest.starts_with('s') {
                return (kind, Some(unescape_name(rest)));
            }
        }
    }
    // `_8` is an escaped dot, so only file pages carry it.
    if stem.contains("_8") {
        return (PageKind::File, Some(unescape_name(stem)));
    }
    (PageKind::Other, None)
}

/// Deterministic Doxygen-style member anchor: `a` + 32 hex digits.
pub fn member_anchor(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("a{}", &hex::encode(hasher.finalize())[..32])
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Sayuri::ChessEngine", "Sayuri_1_1ChessEngine" ; "nested class")]
    #[test_case("Sayuri::ChessEngine::SharedStruct", "Sayuri_1_1ChessEngine_1_1SharedStruct" ; "deep")]
    #[test_case("chess_def.h", "chess__def_8h" ; "file name")]
    #[test_case("helper_queue.h", "helper__queue_8h" ; "file with underscore")]
    fn escape_matches_site_names(input: &str, expected: &str) {
        assert_eq!(escape_name(input), expected);
        assert_eq!(unescape_name(expected), input);
    }

    #[test]
    fn pages_are_named_like_the_site() {
        assert_eq!(class_page("Sayuri::Fen"), "classSayuri_1_1Fen.html");
        assert_eq!(
            struct_page("Sayuri::EvalResult"),
            "structSayuri_1_1EvalResult.html"
        );
        assert_eq!(namespace_page("Sayuri"), "namespaceSayuri.html");
        assert_eq!(file_page("chess_engine.cpp"), "chess__engine_8cpp.html");
    }

    #[test]
    fn decode_page_classifies() {
        assert_eq!(
            decode_page("classSayuri_1_1ChessEngine.html"),
            (PageKind::Class, Some("Sayuri::ChessEngine".into()))
        );
        assert_eq!(
            decode_page("../structSayuri_1_1ChessEngine_1_1SharedStruct.html"),
            (PageKind::Struct, Some("Sayuri::ChessEngine::SharedStruct".into()))
        );
        assert_eq!(
            decode_page("namespaceSayuri.html"),
            (PageKind::Namespace, Some("Sayuri".into()))
        );
        assert_eq!(
            decode_page("chess__def_8h.html"),
            (PageKind::File, Some("chess_def.h".into()))
        );
        assert_eq!(decode_page("classes.html"), (PageKind::Other, None));
        assert_eq!(decode_page("namespaces.html"), (PageKind::Other, None));
        assert_eq!(decode_page("index.html"), (PageKind::Other, None));
        assert_eq!(decode_page("README"), (PageKind::Other, None));
    }

    #[test]
    fn member_anchor_is_stable_and_distinct() {
        let a = member_anchor(&["function", "Sayuri::ChessEngine", "ChessEngine", "()"]);
        let b = member_anchor(&["function", "Sayuri::ChessEngine", "ChessEngine", "(ChessEngine &&engine)"]);
        assert_eq!(a, member_anchor(&["function", "Sayuri::ChessEngine", "ChessEngine", "()"]));
        assert_ne!(a, b);
        assert_eq!(a.len(), 33);
        assert!(a.starts_with('a'));
    }
}
