use std::fmt;

use fathom_extract::{ConstructCandidate, ConstructKind, Dependencies, Flags, Span};
use serde::{Deserialize, Serialize};

use crate::schema::{EnrichmentOutcome, EnrichmentStatus, ParameterDescription, ANALYSIS_FAILED, UNKNOWN};

/// Kind of a returned record: a construct kind, or `error` for a construct
/// whose analysis failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Function,
    Class,
    Method,
    Accessor,
    HookBinding,
    Error,
}

impl From<ConstructKind> for RecordKind {
    fn from(kind: ConstructKind) -> Self {
        match kind {
            ConstructKind::Function => RecordKind::Function,
            ConstructKind::Class => RecordKind::Class,
            ConstructKind::Method => RecordKind::Method,
            ConstructKind::Accessor => RecordKind::Accessor,
            ConstructKind::HookBinding => RecordKind::HookBinding,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Function => "function",
            RecordKind::Class => "class",
            RecordKind::Method => "method",
            RecordKind::Accessor => "accessor",
            RecordKind::HookBinding => "hookBinding",
            RecordKind::Error => "error",
        };
        f.write_str(label)
    }
}

/// One analyzed construct, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructRecord {
    pub name: String,
    pub kind: RecordKind,
    /// Model-provided type label, or the kind when none was usable.
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescription>,
    pub return_description: String,
    pub flags: Flags,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    /// Method signatures such as `"private static load"`.
    pub members: Vec<String>,
    pub security_considerations: Option<String>,
    pub async_behavior: Option<String>,
    pub error_handling: Option<String>,
    pub dependencies: Dependencies,
    pub span: Option<Span>,
    pub file_path: String,
    pub status: EnrichmentStatus,
}

impl ConstructRecord {
    /// Record for a construct whose analysis failed. Never enriched.
    ///
    /// # Examples
    ///
    /// ```
    /// use fathom_enrich::record::{ConstructRecord, RecordKind};
    ///
    /// let record = ConstructRecord::failure("unterminated class", None, "src/a.js");
    /// assert_eq!(record.name, "Error");
    /// assert_eq!(record.kind, RecordKind::Error);
    /// assert_eq!(record.return_description, "Analysis failed");
    /// ```
    pub fn failure(message: impl Into<String>, span: Option<Span>, file_path: &str) -> Self {
        Self {
            name: "Error".into(),
            kind: RecordKind::Error,
            type_name: RecordKind::Error.to_string(),
            description: message.into(),
            parameters: Vec::new(),
            return_description: ANALYSIS_FAILED.into(),
            flags: Flags::default(),
            superclass: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            security_considerations: None,
            async_behavior: None,
            error_handling: None,
            dependencies: Dependencies::default(),
            span,
            file_path: file_path.to_string(),
            status: EnrichmentStatus::Skipped,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == RecordKind::Error
    }
}

/// Combine a candidate, its enrichment and its computed dependencies.
///
/// Enrichment text overrides the heuristic defaults only when non-empty;
/// `type` must also differ from `"Unknown"`. Computed dependencies come
/// first, followed by any names the enrichment adds.
pub fn merge(
    candidate: &ConstructCandidate,
    outcome: EnrichmentOutcome,
    computed: Dependencies,
    file_path: &str,
) -> ConstructRecord {
    let EnrichmentOutcome { result, status } = outcome;

    let description = non_empty(result.description)
        .unwrap_or_else(|| format!("{} found in {file_path}", heuristic_label(candidate)));
    let type_name = non_empty(result.type_name)
        .filter(|t| t != UNKNOWN)
        .unwrap_or_else(|| candidate.kind.to_string());
    let return_description = non_empty(result.return_description).unwrap_or_else(|| UNKNOWN.into());
    let parameters = if result.parameter_descriptions.is_empty() {
        candidate
            .parameters
            .iter()
            .cloned()
            .map(ParameterDescription::Text)
            .collect()
    } else {
        result.parameter_descriptions
    };

    ConstructRecord {
        name: candidate.name.clone(),
        kind: candidate.kind.into(),
        type_name,
        description,
        parameters,
        return_description,
        flags: candidate.flags,
        superclass: candidate.superclass.clone(),
        interfaces: candidate.interfaces.clone(),
        members: candidate.members.iter().map(ToString::to_string).collect(),
        security_considerations: result.security_considerations,
        async_behavior: result.async_behavior,
        error_handling: result.error_handling,
        dependencies: union(computed, result.dependencies),
        span: Some(candidate.span),
        file_path: file_path.to_string(),
        status,
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

fn heuristic_label(candidate: &ConstructCandidate) -> &'static str {
    let flags = &candidate.flags;
    match candidate.kind {
        ConstructKind::Class => "Class",
        _ if flags.is_getter => "Getter",
        _ if flags.is_setter => "Setter",
        ConstructKind::HookBinding => "Hook binding",
        ConstructKind::Method | ConstructKind::Accessor if flags.is_async => "Async method",
        ConstructKind::Method | ConstructKind::Accessor => "Method",
        ConstructKind::Function if flags.is_async => "Async function",
        ConstructKind::Function => "Function",
    }
}

fn union(mut computed: Dependencies, extra: Dependencies) -> Dependencies {
    extend_unique(&mut computed.imports, extra.imports);
    extend_unique(&mut computed.internal_calls, extra.internal_calls);
    extend_unique(&mut computed.external_calls, extra.external_calls);
    computed
}

fn extend_unique(target: &mut Vec<String>, extra: Vec<String>) {
    for name in extra {
        if !target.contains(&name) {
            target.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnrichmentResult;

    fn candidate(kind: ConstructKind, flags: Flags) -> ConstructCandidate {
        ConstructCandidate {
            span: Span::new(3, 30),
            kind,
            name: "load".into(),
            parameters: vec!["url".into(), "opts = {}".into()],
            flags,
            superclass: None,
            interfaces: vec![],
            members: vec![],
        }
    }

    fn complete(result: EnrichmentResult) -> EnrichmentOutcome {
        EnrichmentOutcome {
            result,
            status: EnrichmentStatus::Complete,
        }
    }

    #[test]
    fn empty_enrichment_keeps_heuristics() {
        let flags = Flags {
            is_async: true,
            ..Flags::default()
        };
        let record = merge(
            &candidate(ConstructKind::Function, flags),
            complete(EnrichmentResult::default()),
            Dependencies::default(),
            "src/api.js",
        );
        assert_eq!(record.description, "Async function found in src/api.js");
        assert_eq!(record.type_name, "function");
        assert_eq!(record.return_description, "Unknown");
        assert_eq!(
            record.parameters,
            vec![
                ParameterDescription::Text("url".into()),
                ParameterDescription::Text("opts = {}".into()),
            ]
        );
    }

    #[test]
    fn getter_label_wins_over_kind() {
        let flags = Flags {
            is_getter: true,
            ..Flags::default()
        };
        let record = merge(
            &candidate(ConstructKind::Accessor, flags),
            complete(EnrichmentResult::default()),
            Dependencies::default(),
            "a.ts",
        );
        assert!(record.description.starts_with("Getter found in"));
    }

    #[test]
    fn enrichment_overrides_when_present() {
        let result = EnrichmentResult {
            description: "Fetches a resource.".into(),
            type_name: "async function".into(),
            return_description: "Promise<Response>".into(),
            parameter_descriptions: vec![ParameterDescription::Text("url: target".into())],
            ..EnrichmentResult::default()
        };
        let record = merge(
            &candidate(ConstructKind::Function, Flags::default()),
            complete(result),
            Dependencies::default(),
            "a.js",
        );
        assert_eq!(record.description, "Fetches a resource.");
        assert_eq!(record.type_name, "async function");
        assert_eq!(record.return_description, "Promise<Response>");
        assert_eq!(record.parameters.len(), 1);
    }

    #[test]
    fn blank_description_does_not_override() {
        let result = EnrichmentResult {
            description: "   ".into(),
            ..EnrichmentResult::default()
        };
        let record = merge(
            &candidate(ConstructKind::Method, Flags::default()),
            complete(result),
            Dependencies::default(),
            "a.js",
        );
        assert_eq!(record.description, "Method found in a.js");
    }

    #[test]
    fn dependencies_are_computed_first_then_enriched() {
        let computed = Dependencies {
            imports: vec!["./api".into()],
            internal_calls: vec!["fetch".into()],
            external_calls: vec![],
        };
        let result = EnrichmentResult {
            dependencies: Dependencies {
                imports: vec!["react".into(), "./api".into()],
                internal_calls: vec!["fetch".into(), "parse".into()],
                external_calls: vec![],
            },
            ..EnrichmentResult::default()
        };
        let record = merge(
            &candidate(ConstructKind::Function, Flags::default()),
            complete(result),
            computed,
            "a.js",
        );
        assert_eq!(record.dependencies.imports, vec!["./api", "react"]);
        assert_eq!(record.dependencies.internal_calls, vec!["fetch", "parse"]);
    }

    #[test]
    fn degraded_outcome_keeps_status_and_failure_text() {
        let record = merge(
            &candidate(ConstructKind::Function, Flags::default()),
            EnrichmentOutcome::degraded("LLM error: 500"),
            Dependencies::default(),
            "a.js",
        );
        assert_eq!(record.return_description, ANALYSIS_FAILED);
        assert!(record.description.contains("LLM error: 500"));
        assert!(matches!(record.status, EnrichmentStatus::Degraded { .. }));
    }
}
