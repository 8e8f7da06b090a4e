use fathom_extract::{ConstructCandidate, ConstructKind};

pub const SYSTEM_PROMPT: &str = "\
You are Fathom, an expert code analyst. You explain what a single JavaScript \
or TypeScript construct does, precisely and briefly. Respond with JSON only.";

const SCHEMA: &str = "\
Respond with a JSON object:
{
  \"description\": \"What the construct does, in one or two sentences\",
  \"type\": \"function\" | \"class\" | \"method\" | \"component\" | \"hook\" | ...,
  \"parameterDescriptions\": [
    { \"name\": \"param\", \"type\": \"string\", \"description\": \"What it is for\" }
  ],
  \"returnDescription\": \"What is returned\",
  \"securityConsiderations\": \"Optional: injection, secrets, unsafe input handling\",
  \"asyncBehavior\": \"Optional: what is awaited and in which order\",
  \"errorHandling\": \"Optional: what can throw and how it is handled\",
  \"dependencies\": {
    \"imports\": [\"module paths used\"],
    \"internalCalls\": [\"functions called\"],
    \"externalCalls\": [\"imported functions called\"]
  }
}";

/// Build the per-construct enrichment prompt.
///
/// The source slice is cut to at most `max_source_chars` characters.
///
/// # Examples
///
/// ```
/// use fathom_enrich::prompt::build_enrichment_prompt;
/// use fathom_extract::{ConstructCandidate, ConstructKind, Flags, Span};
///
/// let candidate = ConstructCandidate {
///     span: Span::new(0, 20),
///     kind: ConstructKind::Function,
///     name: "foo".into(),
///     parameters: vec![],
///     flags: Flags::default(),
///     superclass: None,
///     interfaces: vec![],
///     members: vec![],
/// };
/// let prompt = build_enrichment_prompt(&candidate, "const foo = () => {}", "src/a.js", &[], 6000);
/// assert!(prompt.contains("function `foo`"));
/// assert!(prompt.contains("src/a.js"));
/// ```
pub fn build_enrichment_prompt(
    candidate: &ConstructCandidate,
    source: &str,
    file_path: &str,
    imports: &[String],
    max_source_chars: usize,
) -> String {
    let mut prompt = format!(
        "Analyze the {} `{}` from `{file_path}`.\n",
        kind_label(candidate.kind),
        candidate.name
    );
    if let Some(parent) = &candidate.superclass {
        prompt.push_str(&format!("It extends `{parent}`.\n"));
    }
    if !imports.is_empty() {
        prompt.push_str("\nThe file imports:\n");
        for path in imports {
            prompt.push_str(&format!("- {path}\n"));
        }
    }

    let (slice, truncated) = truncate_chars(source, max_source_chars);
    prompt.push_str(&format!("\n```\n{slice}\n```\n"));
    if truncated {
        prompt.push_str("(source truncated)\n");
    }
    prompt.push('\n');
    prompt.push_str(SCHEMA);
    prompt
}

fn kind_label(kind: ConstructKind) -> &'static str {
    match kind {
        ConstructKind::Function => "function",
        ConstructKind::Class => "class",
        ConstructKind::Method => "method",
        ConstructKind::Accessor => "accessor",
        ConstructKind::HookBinding => "hook binding",
    }
}

fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_extract::{Flags, Span};

    fn class(name: &str) -> ConstructCandidate {
        ConstructCandidate {
            span: Span::new(0, 0),
            kind: ConstructKind::Class,
            name: name.into(),
            parameters: vec![],
            flags: Flags::default(),
            superclass: Some("Base".into()),
            interfaces: vec![],
            members: vec![],
        }
    }

    #[test]
    fn prompt_lists_imports_and_parent() {
        let imports = vec!["react".to_string(), "./api".to_string()];
        let prompt = build_enrichment_prompt(&class("Store"), "class Store {}", "s.ts", &imports, 100);
        assert!(prompt.contains("class `Store`"));
        assert!(prompt.contains("extends `Base`"));
        assert!(prompt.contains("- ./api\n"));
        assert!(prompt.contains("parameterDescriptions"));
    }

    #[test]
    fn long_source_is_truncated_on_char_boundary() {
        let source = "é".repeat(10);
        let prompt = build_enrichment_prompt(&class("A"), &source, "a.js", &[], 4);
        assert!(prompt.contains("```\néééé\n```"));
        assert!(prompt.contains("(source truncated)"));
    }

    #[test]
    fn short_source_is_not_marked() {
        let prompt = build_enrichment_prompt(&class("A"), "class A {}", "a.js", &[], 100);
        assert!(!prompt.contains("truncated"));
    }
}
