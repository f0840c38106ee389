//! Native tree-sitter parser wrapper for C/C++ sources.
//!
//! The grammar is statically linked and the declaration query is embedded at
//! compile time from `queries/cpp.scm`.
//!
//! # Design decisions
//!
//! - **No stored state.** `CodeParser` carries no fields. Tree-sitter's
//!   `Parser` is `!Send + !Sync`, so a fresh parser is created on every
//!   call. `Parser::new()` is a single allocation and `set_language` is a
//!   pointer swap.
//!
//! - **Headers are C++.** Documented C-family projects put C++ in `.h`
//!   files as often as not, and the C++ grammar accepts plain C headers, so
//!   every supported extension uses the C++ grammar.

use crate::error::{Result, SymshardError};

/// Embedded declaration query.
const CPP_QUERY: &str = include_str!("../../queries/cpp.scm");

/// Extensions (without the dot) handled by the C++ grammar.
const SUPPORTED_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "c", "cc", "cpp", "cxx", "inl"];

/// Thin wrapper around native tree-sitter parsing and query compilation.
pub struct CodeParser;

impl CodeParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` and return the concrete syntax tree.
    pub fn parse(&self, content: &str) -> Result<tree_sitter::Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&Self::language())
            .map_err(|e| SymshardError::Parse(format!("Language version mismatch: {e}")))?;

        parser.parse(content, None).ok_or_else(|| {
            SymshardError::Parse("tree-sitter returned None (timeout or cancellation)".into())
        })
    }

    #[must_use]
    pub fn language() -> tree_sitter::Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    /// Compile the embedded declaration query.
    pub fn load_query() -> Result<tree_sitter::Query> {
        tree_sitter::Query::new(&Self::language(), CPP_QUERY)
            .map_err(|e| SymshardError::Parse(format!("Query compilation error: {e}")))
    }

    /// Check whether the file at `file_path` has a supported extension.
    #[must_use]
    pub fn is_supported(file_path: &std::path::Path) -> bool {
        file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
