//! Core domain types for symshard.
//!
//! [`RawSymbol`] is what symbol sources produce and the index builder
//! consumes. [`SymbolEntry`] is what shards store and the search runtime
//! matches against.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Kind of documented symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Class,
    Struct,
    #[serde(alias = "method", alias = "constructor", alias = "operator")]
    Function,
    #[serde(alias = "field", alias = "property", alias = "constant")]
    Variable,
    #[serde(alias = "type_alias", alias = "alias", alias = "using")]
    Typedef,
    Enum,
    #[serde(alias = "enumvalue", alias = "enumerator")]
    EnumValue,
    #[serde(alias = "define")]
    Macro,
    Namespace,
    File,
    Page,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Class,
        Category::Struct,
        Category::Function,
        Category::Variable,
        Category::Typedef,
        Category::Enum,
        Category::EnumValue,
        Category::Macro,
        Category::Namespace,
        Category::File,
        Category::Page,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Typedef => "typedef",
            Self::Enum => "enum",
            Self::EnumValue => "enum_value",
            Self::Macro => "macro",
            Self::Namespace => "namespace",
            Self::File => "file",
            Self::Page => "page",
        }
    }

    /// Parse from a string (case-insensitive, common aliases accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "class" => Some(Self::Class),
            "struct" => Some(Self::Struct),
            "function" | "method" | "constructor" | "operator" => Some(Self::Function),
            "variable" | "field" | "property" | "constant" => Some(Self::Variable),
            "typedef" | "type_alias" | "alias" | "using" => Some(Self::Typedef),
            "enum" => Some(Self::Enum),
            "enum_value" | "enumvalue" | "enumerator" => Some(Self::EnumValue),
            "macro" | "define" => Some(Self::Macro),
            "namespace" => Some(Self::Namespace),
            "file" => Some(Self::File),
            "page" => Some(Self::Page),
            _ => None,
        }
    }

    /// Display group this category is rendered under.
    pub fn group(&self) -> CategoryGroup {
        match self {
            Self::Class | Self::Struct => CategoryGroup::Classes,
            Self::Namespace => CategoryGroup::Namespaces,
            Self::Function => CategoryGroup::Functions,
            Self::Variable => CategoryGroup::Variables,
            Self::Typedef => CategoryGroup::Typedefs,
            Self::Enum | Self::EnumValue => CategoryGroup::Enums,
            Self::Macro => CategoryGroup::Macros,
            Self::File => CategoryGroup::Files,
            Self::Page => CategoryGroup::Pages,
        }
    }

    /// Callables are the only category that forms overload groups.
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CategoryGroup
// ---------------------------------------------------------------------------

/// Fixed display groups, declared in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Classes,
    Namespaces,
    Functions,
    Variables,
    Typedefs,
    Enums,
    Macros,
    Files,
    Pages,
}

impl CategoryGroup {
    pub const ALL: [CategoryGroup; 9] = [
        CategoryGroup::Classes,
        CategoryGroup::Namespaces,
        CategoryGroup::Functions,
        CategoryGroup::Variables,
        CategoryGroup::Typedefs,
        CategoryGroup::Enums,
        CategoryGroup::Macros,
        CategoryGroup::Files,
        CategoryGroup::Pages,
    ];

    /// Lowercase identifier, also used as the shard-name stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Namespaces => "namespaces",
            Self::Functions => "functions",
            Self::Variables => "variables",
            Self::Typedefs => "typedefs",
            Self::Enums => "enums",
            Self::Macros => "macros",
            Self::Files => "files",
            Self::Pages => "pages",
        }
    }

    /// Heading shown above the group's results.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Classes => "Classes",
            Self::Namespaces => "Namespaces",
            Self::Functions => "Functions",
            Self::Variables => "Variables",
            Self::Typedefs => "Typedefs",
            Self::Enums => "Enumerations",
            Self::Macros => "Macros",
            Self::Files => "Files",
            Self::Pages => "Pages",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "classes" | "class" => Some(Self::Classes),
            "namespaces" | "namespace" => Some(Self::Namespaces),
            "functions" | "function" => Some(Self::Functions),
            "variables" | "variable" => Some(Self::Variables),
            "typedefs" | "typedef" => Some(Self::Typedefs),
            "enums" | "enum" | "enumerations" => Some(Self::Enums),
            "macros" | "macro" | "defines" => Some(Self::Macros),
            "files" | "file" => Some(Self::Files),
            "pages" | "page" => Some(Self::Pages),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Place in the generated site: a page path plus an optional in-page anchor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    page: String,
    anchor: Option<String>,
}

impl Location {
    /// Parse `page.html` or `page.html#anchor`.
    ///
    /// Rejects empty input, whitespace, an empty page, an empty anchor, and
    /// more than one `#`.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty location".into());
        }
        if s.chars().any(char::is_whitespace) {
            return Err(format!("location `{s}` contains whitespace"));
        }
        let (page, anchor) = match s.split_once('#') {
            Some((page, anchor)) => (page, Some(anchor)),
            None => (s, None),
        };
        if page.is_empty() {
            return Err(format!("location `{s}` has no page"));
        }
        if let Some(anchor) = anchor {
            if anchor.is_empty() {
                return Err(format!("location `{s}` has an empty anchor"));
            }
            if anchor.contains('#') {
                return Err(format!("location `{s}` has more than one anchor"));
            }
        }
        Ok(Self {
            page: page.to_string(),
            anchor: anchor.map(str::to_string),
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Page path with any leading `./` or `../` segments removed.
    pub fn site_page(&self) -> &str {
        let mut page = self.page.as_str();
        loop {
            if let Some(rest) = page.strip_prefix("../") {
                page = rest;
            } else if let Some(rest) = page.strip_prefix("./") {
                page = rest;
            } else {
                return page;
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.anchor {
            Some(anchor) => write!(f, "{}#{}", self.page, anchor),
            None => f.write_str(&self.page),
        }
    }
}

impl TryFrom<String> for Location {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Fold a symbol name or query into a search key.
///
/// Keys are trimmed and lowercased. Returns an empty string for blank input.
pub fn fold_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// First `n` characters of `s` (char-aware).
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// RawSymbol
// ---------------------------------------------------------------------------

/// A symbol declaration as produced by a symbol source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSymbol {
    /// Short (unqualified) name, e.g. `ChessEngine`.
    pub name: String,
    pub kind: Category,
    /// Enclosing namespace or class, e.g. `Sayuri::ChessEngine`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Canonical anchor, e.g. `classSayuri_1_1ChessEngine.html#a72b9...`.
    pub location: String,
    /// Parameter list for callables, e.g. `(const ChessEngine &engine)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl RawSymbol {
    pub fn new(name: impl Into<String>, kind: Category, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            scope: None,
            location: location.into(),
            signature: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

// ---------------------------------------------------------------------------
// SymbolEntry
// ---------------------------------------------------------------------------

/// One indexed symbol occurrence as stored in a shard.
///
/// Field order matters: the derived `Ord` sorts by `(key, scope, label)`
/// first, which is the shard order and the ranking order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub label: String,
    pub category: Category,
    pub location: Location,
    /// Short display name shared by all members of an overload group.
    pub name: String,
}

impl SymbolEntry {
    /// `scope::label`, or just the label at global scope.
    pub fn qualified_label(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}::{}", self.label),
            None => self.label.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
