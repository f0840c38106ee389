//! C/C++ declaration extractor.
//!
//! Runs the embedded declaration query over a parsed source file and turns
//! every match into a [`RawSymbol`] whose location follows the site's page
//! naming. Locals (anything under a function body or parameter list) are
//! skipped. Scopes come from walking the enclosing namespaces and classes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::error::{Result, SymshardError};
use crate::indexer::naming::{class_page, file_page, member_anchor, namespace_page, struct_page};
use crate::indexer::parser::CodeParser;
use crate::types::{Category, RawSymbol};

/// Ancestors that make a declaration local rather than documented.
const LOCAL_CONTEXTS: &[&str] = &[
    "compound_statement",
    "parameter_list",
    "lambda_expression",
    "field_initializer_list",
    "template_argument_list",
    "condition_clause",
    "for_range_loop",
];

/// Innermost named compound around a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Container {
    Class(String),
    Struct(String),
    Namespace(String),
    File,
}

/// Extracts raw symbols from C/C++ sources.
pub struct Extractor {
    parser: CodeParser,
    query: Query,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: CodeParser::new(),
            query: CodeParser::load_query()?,
        })
    }

    /// Extract every documented declaration in `content`.
    ///
    /// `file_name` is the path shown on the site (usually the base name);
    /// it names the file page and the `File` symbol.
    pub fn extract(&self, file_name: &str, content: &str) -> Result<Vec<RawSymbol>> {
        let tree = self.parser.parse(content)?;
        let source = content.as_bytes();
        let capture_names = self.query.capture_names();
        let base_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);

        let mut symbols = vec![RawSymbol::new(base_name, Category::File, file_page(base_name))];

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            let mut name_node = None;
            let mut params_node = None;
            let mut def = None;
            for cap in m.captures {
                match capture_names[cap.index as usize] {
                    "name" => name_node = Some(cap.node),
                    "params" => params_node = Some(cap.node),
                    other => {
                        if let Some(kind) = other.strip_prefix("def.") {
                            def = Category::from_str_loose(kind).map(|k| (k, cap.node));
                        }
                    }
                }
            }
            let (Some(name_node), Some((kind, def_node))) = (name_node, def) else {
                continue;
            };
            if is_local(def_node) {
                continue;
            }
            if let Some(symbol) = self.symbol(base_name, source, kind, def_node, name_node, params_node) {
                symbols.push(symbol);
            }
        }

        relocate_namespace_members(&mut symbols);
        tracing::debug!(file = %file_name, symbols = symbols.len(), "extracted");
        Ok(symbols)
    }

    fn symbol(
        &self,
        file_name: &str,
        source: &[u8],
        kind: Category,
        def_node: Node,
        name_node: Node,
        params_node: Option<Node>,
    ) -> Option<RawSymbol> {
        let full_name = node_text(name_node, source)?;
        let (mut scope_parts, mut container) = enclosing(def_node, source);

        // Out-of-line definitions carry their class in the name. A qualifier
        // that turns out to be a namespace is fixed up by
        // `relocate_namespace_members`.
        let name = match full_name.rsplit_once("::") {
            Some((qualifier, short)) if kind == Category::Function => {
                scope_parts.extend(qualifier.split("::").map(str::trim).map(str::to_string));
                container = Container::Class(scope_parts.join("::"));
                short.trim().to_string()
            }
            _ => full_name.trim().to_string(),
        };
        if name.is_empty() || (kind == Category::Macro && is_include_guard(def_node, &name)) {
            return None;
        }

        let scope = (!scope_parts.is_empty()).then(|| scope_parts.join("::"));
        let qualified = match &scope {
            Some(s) => format!("{s}::{name}"),
            None => name.clone(),
        };
        let signature = params_node.map(|p| signature(p, def_node, source));

        let location = match kind {
            Category::Class => class_page(&qualified),
            Category::Struct => struct_page(&qualified),
            Category::Namespace => namespace_page(&qualified),
            Category::Macro => format!(
                "{}#{}",
                file_page(file_name),
                member_anchor(&[kind.as_str(), file_name, &name])
            ),
            _ => {
                let page = match &container {
                    Container::Class(q) => class_page(q),
                    Container::Struct(q) => struct_page(q),
                    Container::Namespace(q) => namespace_page(q),
                    Container::File => file_page(file_name),
                };
                let anchor = member_anchor(&[
                    kind.as_str(),
                    scope.as_deref().unwrap_or(""),
                    &name,
                    signature.as_deref().unwrap_or(""),
                ]);
                format!("{page}#{anchor}")
            }
        };

        let mut symbol = RawSymbol::new(name, kind, location);
        symbol.scope = scope;
        if kind.is_callable() {
            symbol.signature = signature;
        }
        Some(symbol)
    }

    /// Extract every supported file under the given paths in parallel.
    ///
    /// Output order follows `paths`, so builds are reproducible. Files that
    /// fail to read or parse are returned alongside instead of aborting.
    pub fn extract_paths(
        &self,
        root: &Path,
        paths: &[PathBuf],
        progress: Option<&indicatif::ProgressBar>,
    ) -> (Vec<RawSymbol>, Vec<(PathBuf, SymshardError)>) {
        let results: Vec<(PathBuf, Result<Vec<RawSymbol>>)> = paths
            .par_iter()
            .map(|path| {
                let display = path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string();
                let result = std::fs::read_to_string(path)
                    .map_err(SymshardError::from)
                    .and_then(|content| self.extract(&display, &content));
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                (path.clone(), result)
            })
            .collect();

        let mut symbols = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(found) => symbols.extend(found),
                Err(e) => {
                    tracing::warn!(file = %path.display(), "extraction failed: {e}");
                    failures.push((path, e));
                }
            }
        }
        // Namespaces declared in one file qualify definitions in another.
        relocate_namespace_members(&mut symbols);
        (symbols, failures)
    }
}

/// All supported source files under `root`, honouring `.gitignore`, sorted.
pub fn discover_sources(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| CodeParser::is_supported(path))
        .collect();
    paths.sort();
    paths
}

/// Move functions defined as `Ns::name` outside their namespace from the
/// class page assumed during extraction to the namespace page, once `Ns` is
/// known to be a namespace.
fn relocate_namespace_members(symbols: &mut [RawSymbol]) {
    let pages: HashMap<String, String> = symbols
        .iter()
        .filter(|s| s.kind == Category::Namespace)
        .map(|s| {
            let qualified = match &s.scope {
                Some(scope) => format!("{scope}::{}", s.name),
                None => s.name.clone(),
            };
            (class_page(&qualified), namespace_page(&qualified))
        })
        .collect();
    if pages.is_empty() {
        return;
    }
    for symbol in symbols.iter_mut().filter(|s| s.kind == Category::Function) {
        let relocated = symbol
            .location
            .split_once('#')
            .and_then(|(page, anchor)| pages.get(page).map(|ns| format!("{ns}#{anchor}")));
        if let Some(location) = relocated {
            symbol.location = location;
        }
    }
}

fn node_text<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    node.utf8_text(source).ok()
}

fn is_local(def_node: Node) -> bool {
    let mut current = def_node.parent();
    while let Some(node) = current {
        if LOCAL_CONTEXTS.contains(&node.kind()) {
            return true;
        }
        current = node.parent();
    }
    false
}

/// Scope path and innermost container of a declaration node.
fn enclosing(def_node: Node, source: &[u8]) -> (Vec<String>, Container) {
    let mut parts = Vec::new();
    let mut container = None;
    let mut current = def_node.parent();
    while let Some(node) = current {
        let contributes = match node.kind() {
            "namespace_definition" | "class_specifier" | "struct_specifier" | "union_specifier" => true,
            "enum_specifier" => is_scoped_enum(node),
            _ => false,
        };
        if contributes {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                parts.push((node.kind(), name.to_string()));
            }
        }
        current = node.parent();
    }
    parts.reverse();

    let names: Vec<String> = parts.iter().map(|(_, n)| n.clone()).collect();
    for (idx, (kind, _)) in parts.iter().enumerate().rev() {
        let qualified = names[..=idx].join("::");
        container = match *kind {
            "class_specifier" => Some(Container::Class(qualified)),
            "struct_specifier" | "union_specifier" => Some(Container::Struct(qualified)),
            "namespace_definition" if container.is_none() => Some(Container::Namespace(qualified)),
            _ => continue,
        };
        break;
    }
    (names, container.unwrap_or(Container::File))
}

fn is_scoped_enum(node: Node) -> bool {
    let mut cursor = node.walk();
    let scoped = node
        .children(&mut cursor)
        .any(|c| matches!(c.kind(), "class" | "struct"));
    scoped
}

/// `#define FOO_H` with no value guarding a header.
fn is_include_guard(def_node: Node, name: &str) -> bool {
    def_node.kind() == "preproc_def"
        && def_node.child_by_field_name("value").is_none()
        && (name.ends_with("_H") || name.ends_with("_H_") || name.ends_with("_HPP"))
}

/// Normalized parameter list plus trailing qualifiers, e.g. `(int depth) const`.
///
/// Default arguments are dropped so a declaration and its out-of-line
/// definition produce the same signature.
fn signature(params: Node, def_node: Node, source: &[u8]) -> String {
    let mut cursor = params.walk();
    let parts: Vec<String> = params
        .named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .filter_map(|p| {
            let end = p
                .child_by_field_name("default_value")
                .map(|d| d.start_byte())
                .unwrap_or_else(|| p.end_byte());
            let raw = std::str::from_utf8(&source[p.start_byte()..end]).ok()?;
            let text = raw.trim_end().trim_end_matches('=').trim();
            Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
        })
        .collect();

    let mut sig = format!("({})", parts.join(", "));
    if def_node.kind() == "function_declarator" {
        let mut cursor = def_node.walk();
        for child in def_node.children(&mut cursor) {
            if matches!(child.kind(), "type_qualifier" | "ref_qualifier") {
                if let Some(text) = node_text(child, source) {
                    sig.push(' ');
                    sig.push_str(text.trim());
                }
            }
        }
    }
    sig
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE_H: &str = r#"
#ifndef CHESS_ENGINE_H
#define CHESS_ENGINE_H

#define GET_FROM(move) ((move) & 0x3f)

namespace Sayuri {
  typedef unsigned long long Bitboard;
  using Castling = unsigned char;

  constexpr int C1 = 2;

  enum MoveType {
    NORMAL, CASTLING, EN_PASSANT, CAPTURE
  };

  class ChessEngine {
    public:
      ChessEngine(const SearchParams& search_params, const EvalParams& eval_params);
      ChessEngine();
      ChessEngine(const ChessEngine& engine);
      ChessEngine(ChessEngine&& engine);
      bool CanCastling(int side = 0) const;
      void Calculate(int depth) {
        int local_counter = 0;
      }

    private:
      int castling_rights_;

      struct SharedStruct {
        int castling_hash_value_table_;
      };
  };
}
#endif
"#;

    fn extract() -> Vec<RawSymbol> {
        Extractor::new().unwrap().extract("chess_engine.h", ENGINE_H).unwrap()
    }

    fn find<'a>(symbols: &'a [RawSymbol], name: &str) -> Vec<&'a RawSymbol> {
        symbols.iter().filter(|s| s.name == name).collect()
    }

    #[test]
    fn extracts_file_namespace_and_class() {
        let symbols = extract();
        let file = find(&symbols, "chess_engine.h");
        assert_eq!(file.len(), 1);
        assert_eq!(file[0].kind, Category::File);
        assert_eq!(file[0].location, "chess__engine_8h.html");

        let ns = find(&symbols, "Sayuri");
        assert_eq!(ns[0].kind, Category::Namespace);
        assert_eq!(ns[0].location, "namespaceSayuri.html");

        let class: Vec<_> = find(&symbols, "ChessEngine")
            .into_iter()
            .filter(|s| s.kind == Category::Class)
            .collect();
        assert_eq!(class.len(), 1);
        assert_eq!(class[0].scope.as_deref(), Some("Sayuri"));
        assert_eq!(class[0].location, "classSayuri_1_1ChessEngine.html");
    }

    #[test]
    fn constructors_are_overloads_with_distinct_signatures() {
        let symbols = extract();
        let ctors: Vec<_> = find(&symbols, "ChessEngine")
            .into_iter()
            .filter(|s| s.kind == Category::Function)
            .collect();
        assert_eq!(ctors.len(), 4);
        assert!(ctors.iter().all(|c| c.scope.as_deref() == Some("Sayuri::ChessEngine")));
        let mut sigs: Vec<_> = ctors.iter().filter_map(|c| c.signature.clone()).collect();
        sigs.sort();
        sigs.dedup();
        assert_eq!(sigs.len(), 4);
        assert!(sigs.contains(&"()".to_string()));
        let mut locations: Vec<_> = ctors.iter().map(|c| c.location.clone()).collect();
        locations.sort();
        locations.dedup();
        assert_eq!(locations.len(), 4);
        assert!(locations
            .iter()
            .all(|l| l.starts_with("classSayuri_1_1ChessEngine.html#a")));
    }

    #[test]
    fn default_arguments_and_qualifiers_shape_the_signature() {
        let symbols = extract();
        let can = find(&symbols, "CanCastling");
        assert_eq!(can.len(), 1);
        assert_eq!(can[0].signature.as_deref(), Some("(int side) const"));
    }

    #[test]
    fn locals_are_skipped() {
        let symbols = extract();
        assert!(find(&symbols, "local_counter").is_empty());
    }

    #[test]
    fn enum_values_live_in_the_enclosing_namespace() {
        let symbols = extract();
        let capture = find(&symbols, "CAPTURE");
        assert_eq!(capture.len(), 1);
        assert_eq!(capture[0].kind, Category::EnumValue);
        assert_eq!(capture[0].scope.as_deref(), Some("Sayuri"));
        assert!(capture[0].location.starts_with("namespaceSayuri.html#a"));
    }

    #[test]
    fn macros_typedefs_and_variables() {
        let symbols = extract();
        assert!(find(&symbols, "CHESS_ENGINE_H").is_empty(), "include guard indexed");
        let get_from = find(&symbols, "GET_FROM");
        assert_eq!(get_from[0].kind, Category::Macro);
        assert!(get_from[0].location.starts_with("chess__engine_8h.html#a"));

        assert_eq!(find(&symbols, "Bitboard")[0].kind, Category::Typedef);
        assert_eq!(find(&symbols, "Castling")[0].kind, Category::Typedef);
        assert_eq!(find(&symbols, "C1")[0].kind, Category::Variable);

        let field = find(&symbols, "castling_hash_value_table_");
        assert_eq!(field[0].kind, Category::Variable);
        assert_eq!(
            field[0].scope.as_deref(),
            Some("Sayuri::ChessEngine::SharedStruct")
        );
        assert!(field[0]
            .location
            .starts_with("structSayuri_1_1ChessEngine_1_1SharedStruct.html#a"));
    }

    #[test]
    fn out_of_line_definitions_match_their_declaration() {
        let header = "namespace Sayuri { class Evaluator { public: int CalValue(int x = 1); }; }";
        let source = "namespace Sayuri { int Evaluator::CalValue(int x) { return x; } }";
        let ex = Extractor::new().unwrap();
        let decl = ex.extract("evaluator.h", header).unwrap();
        let def = ex.extract("evaluator.cpp", source).unwrap();
        let d = decl.iter().find(|s| s.name == "CalValue").unwrap();
        let o = def.iter().find(|s| s.name == "CalValue").unwrap();
        assert_eq!(d.scope, o.scope);
        assert_eq!(d.location, o.location);
    }

    #[test]
    fn namespace_qualified_definition_lands_on_the_namespace_page() {
        let header = "namespace Sayuri { void Init(); }";
        let source = "#include \"init.h\"\nvoid Sayuri::Init() {}";
        let ex = Extractor::new().unwrap();

        let decl = ex.extract("init.h", header).unwrap();
        let d = decl.iter().find(|s| s.name == "Init").unwrap();
        assert!(d.location.starts_with("namespaceSayuri.html#"));

        // On its own the definition cannot tell the namespace from a class.
        let alone = ex.extract("init.cpp", source).unwrap();
        let a = alone.iter().find(|s| s.name == "Init").unwrap();
        assert!(a.location.starts_with("classSayuri.html#"));

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("init.h"), header).unwrap();
        std::fs::write(dir.path().join("init.cpp"), source).unwrap();
        let (symbols, failures) = ex.extract_paths(dir.path(), &discover_sources(dir.path()), None);
        assert!(failures.is_empty());
        let inits: Vec<_> = symbols.iter().filter(|s| s.name == "Init").collect();
        assert_eq!(inits.len(), 2);
        assert_eq!(inits[0].location, inits[1].location);
        assert_eq!(inits[0].scope.as_deref(), Some("Sayuri"));
    }

    #[test]
    fn definition_inside_its_namespace_block_is_relocated_in_one_file() {
        let source = "namespace Sayuri { void Init(); }\nvoid Sayuri::Init() {}";
        let symbols = Extractor::new().unwrap().extract("init.cpp", source).unwrap();
        let inits: Vec<_> = symbols.iter().filter(|s| s.name == "Init").collect();
        assert_eq!(inits.len(), 2);
        assert!(inits.iter().all(|s| s.location.starts_with("namespaceSayuri.html#")));
        assert_eq!(inits[0].location, inits[1].location);
    }

    #[test]
    fn extract_paths_collects_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("fen.h");
        std::fs::write(&good, "namespace Sayuri { class Fen {}; }").unwrap();
        let missing = dir.path().join("gone.h");

        let ex = Extractor::new().unwrap();
        let (symbols, failures) = ex.extract_paths(dir.path(), &[good, missing.clone()], None);
        assert!(symbols.iter().any(|s| s.name == "Fen"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, missing);
    }

    #[test]
    fn discover_sources_filters_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/board.h"), "").unwrap();
        std::fs::write(dir.path().join("src/board.cpp"), "").unwrap();
        std::fs::write(dir.path().join("src/notes.txt"), "").unwrap();
        let found = discover_sources(dir.path());
        assert_eq!(found.len(), 2);
        assert!(found.windows(2).all(|w| w[0] <= w[1]));
    }
}
