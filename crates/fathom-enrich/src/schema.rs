//! The fixed enrichment schema and reconciliation of untrusted objects
//! against it.

use fathom_extract::Dependencies;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sanitize::{self, SanitizeError};

pub const UNKNOWN: &str = "Unknown";
pub const ANALYSIS_FAILED: &str = "Analysis failed";

/// One parameter as described by the model: free text or a structured entry.
///
/// # Examples
///
/// ```
/// use fathom_enrich::schema::ParameterDescription;
///
/// let p: ParameterDescription = serde_json::from_str(r#""id: the user id""#).unwrap();
/// assert_eq!(p, ParameterDescription::Text("id: the user id".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterDescription {
    Text(String),
    Detailed {
        name: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        type_name: Option<String>,
        description: String,
    },
}

/// Model-provided description of one construct. After [`reconcile`] every
/// field holds a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub description: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub parameter_descriptions: Vec<ParameterDescription>,
    pub return_description: String,
    pub security_considerations: Option<String>,
    pub async_behavior: Option<String>,
    pub error_handling: Option<String>,
    pub dependencies: Dependencies,
}

impl Default for EnrichmentResult {
    fn default() -> Self {
        Self {
            description: String::new(),
            type_name: UNKNOWN.into(),
            parameter_descriptions: Vec::new(),
            return_description: UNKNOWN.into(),
            security_considerations: None,
            async_behavior: None,
            error_handling: None,
            dependencies: Dependencies::default(),
        }
    }
}

impl EnrichmentResult {
    /// Complete result standing in for an analysis that produced nothing
    /// usable.
    ///
    /// # Examples
    ///
    /// ```
    /// use fathom_enrich::schema::EnrichmentResult;
    ///
    /// let result = EnrichmentResult::degraded("timeout");
    /// assert_eq!(result.type_name, "Unknown");
    /// assert_eq!(result.return_description, "Analysis failed");
    /// assert!(result.description.contains("timeout"));
    /// ```
    pub fn degraded(reason: &str) -> Self {
        Self {
            description: format!("{ANALYSIS_FAILED}: {reason}"),
            return_description: ANALYSIS_FAILED.into(),
            ..Self::default()
        }
    }
}

/// Whether enrichment contributed to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum EnrichmentStatus {
    Complete,
    Degraded { reason: String },
    /// Never sent for enrichment (error records).
    Skipped,
}

/// A reconciled result and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub result: EnrichmentResult,
    pub status: EnrichmentStatus,
}

impl EnrichmentOutcome {
    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            result: EnrichmentResult::degraded(&reason),
            status: EnrichmentStatus::Degraded { reason },
        }
    }
}

/// Sanitize and reconcile a raw model response. Never fails: an
/// unrecoverable response yields a degraded outcome.
pub fn interpret(raw: &str) -> EnrichmentOutcome {
    match sanitize::sanitize(raw) {
        Ok(object) => EnrichmentOutcome {
            result: reconcile(&object),
            status: EnrichmentStatus::Complete,
        },
        Err(e) => {
            tracing::warn!(error = %e, "unusable enrichment response");
            EnrichmentOutcome::degraded(reason_for(&e))
        }
    }
}

fn reason_for(error: &SanitizeError) -> String {
    match error {
        SanitizeError::NoObject => "response contained no JSON".into(),
        other => other.to_string(),
    }
}

/// Type-check `object` field by field, replacing every absent or mistyped
/// field with its default.
///
/// Keys are looked up in camelCase first, then snake_case.
///
/// # Examples
///
/// ```
/// use fathom_enrich::schema::reconcile;
///
/// let empty = reconcile(&serde_json::Map::new());
/// assert_eq!(empty.type_name, "Unknown");
/// assert!(empty.parameter_descriptions.is_empty());
/// assert_eq!(empty.return_description, "Unknown");
/// ```
pub fn reconcile(object: &Map<String, Value>) -> EnrichmentResult {
    let defaults = EnrichmentResult::default();
    EnrichmentResult {
        description: string_field(object, "description").unwrap_or(defaults.description),
        type_name: string_field(object, "type").unwrap_or(defaults.type_name),
        parameter_descriptions: field(object, "parameterDescriptions")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parameter).collect())
            .unwrap_or_default(),
        return_description: string_field(object, "returnDescription")
            .unwrap_or(defaults.return_description),
        security_considerations: optional_text(object, "securityConsiderations"),
        async_behavior: optional_text(object, "asyncBehavior"),
        error_handling: optional_text(object, "errorHandling"),
        // the legacy flat array form counts as a mismatch
        dependencies: field(object, "dependencies")
            .and_then(Value::as_object)
            .map(dependencies)
            .unwrap_or_default(),
    }
}

fn field<'a>(object: &'a Map<String, Value>, camel: &str) -> Option<&'a Value> {
    object.get(camel).or_else(|| object.get(&snake_case(camel)))
}

fn snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for c in camel.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    field(object, key).and_then(Value::as_str).map(str::to_string)
}

fn optional_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    string_field(object, key).filter(|s| !s.trim().is_empty())
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    field(object, key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn dependencies(object: &Map<String, Value>) -> Dependencies {
    Dependencies {
        imports: string_list(object, "imports"),
        internal_calls: string_list(object, "internalCalls"),
        external_calls: string_list(object, "externalCalls"),
    }
}

fn parameter(value: &Value) -> Option<ParameterDescription> {
    match value {
        Value::String(text) => Some(ParameterDescription::Text(text.clone())),
        Value::Object(entry) => {
            let name = string_field(entry, "name")?;
            Some(ParameterDescription::Detailed {
                name,
                type_name: string_field(entry, "type"),
                description: string_field(entry, "description").unwrap_or_default(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn empty_reply_is_complete_with_defaults() {
        let outcome = interpret("```json\n{}\n```");
        assert_eq!(outcome.status, EnrichmentStatus::Complete);
        assert_eq!(outcome.result, EnrichmentResult::default());
    }

    #[test]
    fn empty_object_gets_defaults() {
        let result = reconcile(&Map::new());
        assert_eq!(result, EnrichmentResult::default());
        assert_eq!(result.description, "");
        assert!(result.dependencies.is_empty());
    }

    #[test]
    fn mistyped_fields_fall_back() {
        let result = reconcile(&object(json!({
            "description": 42,
            "type": ["function"],
            "parameterDescriptions": "none",
            "returnDescription": null,
            "asyncBehavior": "",
        })));
        assert_eq!(result.description, "");
        assert_eq!(result.type_name, UNKNOWN);
        assert!(result.parameter_descriptions.is_empty());
        assert_eq!(result.return_description, UNKNOWN);
        assert_eq!(result.async_behavior, None);
    }

    #[test]
    fn snake_case_keys_are_accepted() {
        let result = reconcile(&object(json!({
            "return_description": "the sum",
            "error_handling": "throws on NaN",
            "dependencies": { "internal_calls": ["add"] },
        })));
        assert_eq!(result.return_description, "the sum");
        assert_eq!(result.error_handling.as_deref(), Some("throws on NaN"));
        assert_eq!(result.dependencies.internal_calls, vec!["add"]);
    }

    #[test]
    fn camel_case_wins_over_snake_case() {
        let result = reconcile(&object(json!({
            "returnDescription": "camel",
            "return_description": "snake",
        })));
        assert_eq!(result.return_description, "camel");
    }

    #[test]
    fn legacy_dependency_array_is_ignored() {
        let result = reconcile(&object(json!({ "dependencies": ["react"] })));
        assert!(result.dependencies.is_empty());
    }

    #[test]
    fn parameters_mix_text_and_structured_entries() {
        let result = reconcile(&object(json!({
            "parameterDescriptions": [
                "a: first",
                { "name": "b", "type": "number", "description": "second" },
                { "description": "nameless" },
                7,
            ],
        })));
        assert_eq!(
            result.parameter_descriptions,
            vec![
                ParameterDescription::Text("a: first".into()),
                ParameterDescription::Detailed {
                    name: "b".into(),
                    type_name: Some("number".into()),
                    description: "second".into(),
                },
            ]
        );
    }

    #[test]
    fn garbage_response_degrades() {
        let outcome = interpret("Sorry, I can't do that.");
        assert!(matches!(outcome.status, EnrichmentStatus::Degraded { .. }));
        assert_eq!(outcome.result.type_name, UNKNOWN);
        assert_eq!(outcome.result.return_description, ANALYSIS_FAILED);
        assert!(outcome.result.description.starts_with("Analysis failed"));
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let json = serde_json::to_value(EnrichmentStatus::Degraded { reason: "x".into() }).unwrap();
        assert_eq!(json, json!({ "state": "degraded", "reason": "x" }));
    }
}
