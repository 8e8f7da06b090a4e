//! Structural extraction of functions, classes, methods, accessors and hook
//! bindings from JavaScript and TypeScript source.
//!
//! Two strategies produce the same [`Extraction`] shape: a tree-sitter walk
//! ([`syntax`]) for text that parses, and a layered regex scan ([`patterns`])
//! for partial or broken input. Neither aims to be a full parser; both are
//! best-effort over whatever text they are handed.

pub mod deps;
pub mod patterns;
pub mod scan;
pub mod syntax;

use std::fmt;

use fathom_core::{ExtractionStrategy, FathomError};
use serde::{Deserialize, Serialize};

pub use deps::{Dependencies, ImportDecl};

/// Source dialect, which selects the tree-sitter grammar.
///
/// # Examples
///
/// ```
/// use fathom_extract::Language;
///
/// assert_eq!(Language::from_path("src/App.jsx"), Some(Language::JavaScript));
/// assert_eq!(Language::from_path("src/App.tsx"), Some(Language::Tsx));
/// assert_eq!(Language::from_path("README.md"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }

    /// Detect language from a `/`-delimited path.
    pub fn from_path(path: &str) -> Option<Self> {
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Get the tree-sitter grammar for this language.
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Half-open byte range into the analyzed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Kind of a discovered construct.
///
/// # Examples
///
/// ```
/// use fathom_extract::ConstructKind;
///
/// assert_eq!(serde_json::to_string(&ConstructKind::HookBinding).unwrap(), "\"hookBinding\"");
/// assert_eq!(ConstructKind::Accessor.to_string(), "accessor");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstructKind {
    Function,
    Class,
    Method,
    Accessor,
    HookBinding,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConstructKind::Function => "function",
            ConstructKind::Class => "class",
            ConstructKind::Method => "method",
            ConstructKind::Accessor => "accessor",
            ConstructKind::HookBinding => "hookBinding",
        };
        f.write_str(label)
    }
}

/// Syntactic flags of a construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    pub is_async: bool,
    pub is_exported: bool,
    pub is_arrow: bool,
    pub is_getter: bool,
    pub is_setter: bool,
}

/// A method header found in a class body.
///
/// # Examples
///
/// ```
/// use fathom_extract::MethodSignature;
///
/// let sig = MethodSignature { visibility: "private".into(), is_static: true, name: "load".into() };
/// assert_eq!(sig.to_string(), "private static load");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSignature {
    /// `public` unless declared otherwise.
    pub visibility: String,
    pub is_static: bool,
    pub name: String,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            write!(f, "{} static {}", self.visibility, self.name)
        } else {
            write!(f, "{} {}", self.visibility, self.name)
        }
    }
}

/// A function- or class-like construct found in source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructCandidate {
    pub span: Span,
    pub kind: ConstructKind,
    pub name: String,
    pub parameters: Vec<String>,
    pub flags: Flags,
    pub superclass: Option<String>,
    /// Implemented interfaces (classes only).
    pub interfaces: Vec<String>,
    /// Method headers (classes only).
    pub members: Vec<MethodSignature>,
}

impl ConstructCandidate {
    /// The construct's source slice, or `""` if the span does not fit `text`.
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.span.start..self.span.end).unwrap_or("")
    }

    /// Text between the first `{` and the last `}` of the source slice.
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        scan::body_of(self.source(text))
    }
}

/// One result of extraction: a construct, or a construct whose analysis
/// failed and must be reported instead of dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ExtractedItem {
    Construct(ConstructCandidate),
    Failed { span: Span, message: String },
}

impl ExtractedItem {
    pub fn span(&self) -> Span {
        match self {
            ExtractedItem::Construct(c) => c.span,
            ExtractedItem::Failed { span, .. } => *span,
        }
    }
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    /// Constructs and failures, ordered by span start.
    pub items: Vec<ExtractedItem>,
    /// Import statements in source order.
    pub imports: Vec<ImportDecl>,
    /// Strategy that produced `items`.
    pub strategy: ExtractionStrategy,
}

impl Extraction {
    /// Import paths in source order.
    pub fn import_paths(&self) -> Vec<&str> {
        self.imports.iter().map(|i| i.path.as_str()).collect()
    }

    /// Successfully extracted constructs.
    pub fn constructs(&self) -> impl Iterator<Item = &ConstructCandidate> {
        self.items.iter().filter_map(|item| match item {
            ExtractedItem::Construct(c) => Some(c),
            ExtractedItem::Failed { .. } => None,
        })
    }
}

/// Extract constructs and imports from `text`.
///
/// With [`ExtractionStrategy::Auto`] the syntax tree is used when it parses
/// without error nodes and the pattern scan otherwise. An explicit
/// [`ExtractionStrategy::SyntaxTree`] keeps the (error-tolerant) tree even
/// when it has errors, and only falls back when no tree can be produced.
///
/// # Errors
///
/// Returns [`FathomError::Extraction`] if a grammar or pattern cannot be
/// loaded. Problems with individual constructs become
/// [`ExtractedItem::Failed`] entries instead.
///
/// # Examples
///
/// ```
/// use fathom_core::ExtractionStrategy;
/// use fathom_extract::{extract, Language};
///
/// let text = "import { api } from './api';\nexport const foo = async (id) => {\n  return api(id);\n};\n";
/// let extraction = extract(text, Language::JavaScript, ExtractionStrategy::Auto).unwrap();
/// let foo = extraction.constructs().next().unwrap();
/// assert_eq!(foo.name, "foo");
/// assert!(foo.flags.is_async && foo.flags.is_exported && foo.flags.is_arrow);
/// assert_eq!(extraction.import_paths(), vec!["./api"]);
/// ```
pub fn extract(
    text: &str,
    language: Language,
    strategy: ExtractionStrategy,
) -> Result<Extraction, FathomError> {
    let imports = deps::parse_imports(text)?;

    let (items, used) = match strategy {
        ExtractionStrategy::Patterns => (patterns::extract(text)?, ExtractionStrategy::Patterns),
        ExtractionStrategy::SyntaxTree | ExtractionStrategy::Auto => {
            match syntax::parse(text, language)? {
                Some(tree)
                    if strategy == ExtractionStrategy::SyntaxTree
                        || !tree.root_node().has_error() =>
                {
                    (syntax::collect(&tree, text), ExtractionStrategy::SyntaxTree)
                }
                _ => {
                    tracing::debug!(?language, "syntax tree unusable, using pattern scan");
                    (patterns::extract(text)?, ExtractionStrategy::Patterns)
                }
            }
        }
    };

    Ok(Extraction {
        items,
        imports,
        strategy: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert_eq!(Language::from_extension("TS"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("rs"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn broken_input_falls_back_to_patterns() {
        let text = "function ok(a) { return a; }\nfunction broken(b) { if (b {";
        let extraction = extract(text, Language::JavaScript, ExtractionStrategy::Auto).unwrap();
        assert_eq!(extraction.strategy, ExtractionStrategy::Patterns);
        let names: Vec<&str> = extraction.constructs().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ok", "broken"]);
    }

    #[test]
    fn clean_input_uses_syntax_tree() {
        let text = "function ok(a) { return a; }\n";
        let extraction = extract(text, Language::JavaScript, ExtractionStrategy::Auto).unwrap();
        assert_eq!(extraction.strategy, ExtractionStrategy::SyntaxTree);
    }

    #[test]
    fn forced_patterns_and_tree_agree_on_simple_input() {
        let text = "export function a(x, y) { return b(x); }\nclass K extends Base { run() { a(1); } }\n";
        let by_tree = extract(text, Language::JavaScript, ExtractionStrategy::SyntaxTree).unwrap();
        let by_patterns = extract(text, Language::JavaScript, ExtractionStrategy::Patterns).unwrap();
        let names = |e: &Extraction| -> Vec<String> { e.constructs().map(|c| c.name.clone()).collect() };
        assert_eq!(names(&by_tree), vec!["a", "K", "run"]);
        assert_eq!(names(&by_tree), names(&by_patterns));
    }

    #[test]
    fn candidate_body_is_between_outer_braces() {
        let text = "function f() { if (x) { y(); } }";
        let extraction = extract(text, Language::JavaScript, ExtractionStrategy::Auto).unwrap();
        let f = extraction.constructs().next().unwrap();
        assert_eq!(f.body(text), " if (x) { y(); } ");
    }
}
