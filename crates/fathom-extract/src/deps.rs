//! Import parsing and per-construct dependency analysis.

use fathom_core::FathomError;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{scan, ConstructCandidate};

/// Words that look like calls (`if (`, `catch (`) but are not.
const NON_CALL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "typeof", "instanceof", "new",
    "await", "yield", "do", "else", "try", "delete", "void", "in", "of", "case", "throw", "async",
    "super", "import", "with",
];

/// One `import` statement.
///
/// # Examples
///
/// ```
/// use fathom_extract::ImportDecl;
///
/// let decl = ImportDecl {
///     path: "./utils/format.js".into(),
///     bindings: vec!["formatDate".into()],
/// };
/// assert_eq!(decl.module_name(), "format");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    /// Module specifier as written between the quotes.
    pub path: String,
    /// Local names the statement binds. Empty for side-effect imports.
    pub bindings: Vec<String>,
}

impl ImportDecl {
    /// Identifier part of the last path segment (`"./a/b-c.js"` → `"b-c"`).
    pub fn module_name(&self) -> &str {
        let last = self.path.rsplit('/').next().unwrap_or("");
        last.split('.').next().unwrap_or("")
    }
}

/// Dependencies of one construct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// Import paths the construct refers to.
    pub imports: Vec<String>,
    /// Names called inside the construct's body.
    pub internal_calls: Vec<String>,
    /// Called names bound by an import.
    pub external_calls: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.internal_calls.is_empty() && self.external_calls.is_empty()
    }
}

/// Parse every `import` statement of a file, in source order.
///
/// # Errors
///
/// Returns [`FathomError::Extraction`] if the import pattern fails to compile.
///
/// # Examples
///
/// ```
/// use fathom_extract::deps::parse_imports;
///
/// let imports = parse_imports(
///     "import React, { useState as useS } from 'react';\nimport './styles.css';",
/// )
/// .unwrap();
/// assert_eq!(imports[0].bindings, vec!["React", "useS"]);
/// assert_eq!(imports[1].path, "./styles.css");
/// assert!(imports[1].bindings.is_empty());
/// ```
pub fn parse_imports(text: &str) -> Result<Vec<ImportDecl>, FathomError> {
    let re = Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(?:([^'";]+?)\s+from\s+)?['"]([^'"\n]+)['"]"#)
        .map_err(|e| FathomError::Extraction(format!("import pattern: {e}")))?;

    Ok(re
        .captures_iter(text)
        .filter_map(|caps| {
            let path = caps.get(2)?.as_str().to_string();
            let bindings = caps.get(1).map(|c| parse_bindings(c.as_str())).unwrap_or_default();
            Some(ImportDecl { path, bindings })
        })
        .collect())
}

fn parse_bindings(clause: &str) -> Vec<String> {
    clause
        .split(|c| c == ',' || c == '{' || c == '}')
        .filter_map(|part| {
            let part = part.trim();
            let part = part.strip_prefix("type ").unwrap_or(part);
            let local = match part.rsplit_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => part,
            };
            let ident: String = local
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            (!ident.is_empty()).then_some(ident)
        })
        .collect()
}

/// Names called inside `body`, excluding `own_name` and keywords.
///
/// Any identifier immediately followed by `(` counts, including member calls
/// such as `console.log(`. First-seen order, no duplicates.
///
/// # Examples
///
/// ```
/// use fathom_extract::deps::internal_calls;
///
/// let body = "if (n <= 0) return 0; return n + sum(n - 1) + helper(n);";
/// assert_eq!(internal_calls(body, "sum"), vec!["helper"]);
/// ```
pub fn internal_calls(body: &str, own_name: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut calls: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if !(c.is_ascii_alphabetic() || c == b'_' || c == b'$') {
            i += 1;
            continue;
        }
        if i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
            // inside a number literal or a non-ASCII identifier
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$') {
            i += 1;
        }
        let name = &body[start..i];
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) == Some(&b'(')
            && name != own_name
            && !NON_CALL_KEYWORDS.contains(&name)
            && !calls.iter().any(|c| c == name)
        {
            calls.push(name.to_string());
        }
    }
    calls
}

/// Compute the dependencies of `candidate` within the file `text`.
pub fn analyze(candidate: &ConstructCandidate, text: &str, imports: &[ImportDecl]) -> Dependencies {
    let source = candidate.source(text);
    let body = scan::body_of(source);

    let used_imports = imports
        .iter()
        .filter(|decl| {
            let module = decl.module_name();
            !module.is_empty() && (body.contains(module) || source.contains(module))
        })
        .map(|decl| decl.path.clone())
        .collect();

    let internal = internal_calls(body, &candidate.name);
    let external = internal
        .iter()
        .filter(|name| imports.iter().any(|decl| decl.bindings.iter().any(|b| b == *name)))
        .cloned()
        .collect();

    Dependencies {
        imports: used_imports,
        internal_calls: internal,
        external_calls: external,
    }
}
