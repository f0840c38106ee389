//! Doxygen-compatible `searchdata` export.
//!
//! Writes each shard as a `var searchData=[...]` script in the layout the
//! generated site's search box already understands:
//!
//! ```text
//! ['cancastling',['CanCastling',['../classSayuri_1_1ChessEngine.html#a0e3b',1,'Sayuri::ChessEngine']]],
//! ```
//!
//! Rows are grouped by key. A row with several targets labels each target
//! with its qualified label, always followed by a parameter list, so
//! `Sayuri::FEN::castling_rights()` reads the same as Doxygen's own output.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::index::builder::BuildOutput;
use crate::index::shard::Shard;
use crate::types::SymbolEntry;

/// Escape a key the way Doxygen names search rows: lowercase ASCII
/// alphanumerics pass through, every other byte becomes `_xx`.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_digit() || byte.is_ascii_lowercase() {
            out.push(byte as char);
        } else {
            let _ = write!(out, "_{byte:02x}");
        }
    }
    out
}

/// Quote `s` as a single-quoted JS string with HTML entities escaped.
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn target(entry: &SymbolEntry, site_base: &str, multi: bool) -> String {
    let text = if multi {
        let mut text = entry.qualified_label();
        if !entry.label.contains('(') {
            text.push_str("()");
        }
        text
    } else {
        entry.scope.clone().unwrap_or_default()
    };
    format!(
        "[{},1,{}]",
        js_string(&format!("{site_base}{}", entry.location)),
        js_string(&text)
    )
}

/// Render one shard as a `searchData` script.
pub fn render_search_data(shard: &Shard, site_base: &str) -> String {
    let mut rows = Vec::new();
    for group in shard.entries().chunk_by(|a, b| a.key == b.key) {
        let multi = group.len() > 1;
        let targets: Vec<String> = group.iter().map(|e| target(e, site_base, multi)).collect();
        rows.push(format!(
            "  [{},[{},{}]]",
            js_string(&escape_key(&group[0].key)),
            js_string(&group[0].name),
            targets.join(",")
        ));
    }
    format!("var searchData=\n[\n{}\n];\n", rows.join(",\n"))
}

/// Write `searchdata/<shard>.js` for every shard of a build.
///
/// Returns the number of files written.
pub fn export_js(output: &BuildOutput, dir: &Path, site_base: &str) -> Result<usize> {
    let js_dir = dir.join("searchdata");
    std::fs::create_dir_all(&js_dir)?;
    for (id, shard) in &output.shards {
        std::fs::write(
            js_dir.join(format!("{id}.js")),
            render_search_data(shard, site_base),
        )?;
    }
    tracing::info!(dir = %js_dir.display(), files = output.shards.len(), "searchdata exported");
    Ok(output.shards.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
