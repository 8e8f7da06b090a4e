//! Layered regex scan for text the syntax tree cannot handle.
//!
//! Every family is run over the whole text. Matches are keyed by the byte
//! offset of the construct name, so one construct matched by several
//! families yields a single candidate: the most specific family wins.

use std::collections::HashMap;

use fathom_core::FathomError;
use regex::{Captures, Regex};

use crate::{scan, ConstructCandidate, ConstructKind, ExtractedItem, Flags, MethodSignature, Span};

/// Identifiers the method family must not mistake for method names.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "with", "return", "else", "do", "try",
    "typeof", "await", "new", "super", "import",
];

/// Characters after which a `name(...) {` is an expression, not a member.
const EXPRESSION_CONTEXT: &[char] = &['(', '[', '=', '?', ':', '!', '&', '|', '+', '-'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Component,
    NamedFunction,
    Class,
    BoundFunction,
    Method,
    Accessor,
    Hook,
}

impl Family {
    /// Lower is more specific.
    fn rank(self) -> u8 {
        match self {
            Family::Class => 0,
            Family::Accessor => 1,
            Family::Method => 2,
            Family::NamedFunction => 3,
            Family::Hook => 4,
            Family::BoundFunction => 5,
            Family::Component => 6,
        }
    }

    fn kind(self) -> ConstructKind {
        match self {
            Family::Class => ConstructKind::Class,
            Family::Accessor => ConstructKind::Accessor,
            Family::Method => ConstructKind::Method,
            Family::Hook => ConstructKind::HookBinding,
            Family::Component | Family::NamedFunction | Family::BoundFunction => {
                ConstructKind::Function
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RawMatch {
    family: Family,
    start: usize,
    end: usize,
    /// Recovered name and its offset in the text.
    name: Option<(usize, String)>,
    accessor: Option<String>,
    superclass: Option<String>,
    interfaces: Vec<String>,
}

/// Where a construct's signature and body lie.
struct Extent {
    end: usize,
    /// End of the signature: the body's `{`, an arrow's `=>`, or `end`.
    prelude_end: usize,
    params: Vec<String>,
    arrow: bool,
}

/// Compiled pattern families plus the name-recovery patterns.
pub struct Patterns {
    families: Vec<(Family, Regex)>,
    names: [Regex; 4],
    member: Regex,
}

fn compile(pattern: &str) -> Result<Regex, FathomError> {
    Regex::new(pattern).map_err(|e| FathomError::Extraction(format!("pattern {pattern}: {e}")))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Patterns {
    /// Compile every family.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Extraction`] if a pattern fails to compile.
    pub fn new() -> Result<Self, FathomError> {
        let families = vec![
            (
                Family::Component,
                compile(
                    r"(?:export\s+(?:default\s+)?)?\b(?:const|let|var)\s+([\w$]+)\s*=\s*(?:React\.)?(?:memo\s*\(\s*)?(?:async\s*)?(?:\([^)]*\)|[\w$]+)\s*=>",
                )?,
            ),
            (
                Family::NamedFunction,
                compile(r"(?:export\s+(?:default\s+)?)?(?:async\s+)?\bfunction\s*\*?\s*([\w$]+)\s*\(")?,
            ),
            (
                Family::Class,
                compile(
                    r"(?:export\s+(?:default\s+)?)?(?:abstract\s+)?\bclass\s+([\w$]+)(?:\s*<[^>{]*>)?(?:\s+extends\s+([\w$.]+)(?:\s*<[^>{]*>)?)?(?:\s+implements\s+([\w$.,\s<>]+?))?\s*\{",
                )?,
            ),
            (
                Family::BoundFunction,
                compile(
                    r"(?:export\s+)?\b(?:const|let|var)\s+([\w$]+)\s*(?::[^=;]+)?=\s*(?:async\s*)?(?:function\b\s*\*?\s*[\w$]*\s*\(|\([^)]*\)\s*(?::[^=;]+)?=>|[\w$]+\s*=>)",
                )?,
            ),
            (
                Family::Method,
                compile(
                    r"(?:(?:public|private|protected)\s+)?(static\s+)?(?:async\s+)?\*?\s*([\w$]+)\s*\(([^)]*)\)\s*(?::\s*[^{;=]+)?\{",
                )?,
            ),
            (
                Family::Accessor,
                compile(r"\b(get|set)\s+([\w$]+)\s*\([^)]*\)\s*(?::\s*[^{;=]+)?\{")?,
            ),
            (
                Family::Hook,
                compile(r"\b(?:const|let|var)\s+([\w$]+)\s*=\s*use[A-Z][\w$]*\s*\(")?,
            ),
        ];

        let names = [
            compile(r"\b(?:function\s*\*?\s*|(?:const|let|var|class)\s+)([\w$]+)")?,
            compile(r"([\w$]+)\s*=")?,
            compile(r"\b(?:get|set)\s+([\w$]+)")?,
            compile(r"([\w$]+)\s*\(")?,
        ];

        let member = compile(
            r"(?m)^\s*(?:(public|private|protected)\s+)?(static\s+)?(?:readonly\s+)?(?:async\s+)?(?:(?:get|set)\s+)?\*?\s*([\w$#]+)\s*\([^)]*\)\s*(?::\s*[^{;]+)?\{",
        )?;

        Ok(Self {
            families,
            names,
            member,
        })
    }

    /// Recover a construct name from a match header, trying the name patterns
    /// in fixed priority order. Returns the name's offset in `header` and the
    /// name.
    ///
    /// # Examples
    ///
    /// ```
    /// use fathom_extract::patterns::Patterns;
    ///
    /// let p = Patterns::new().unwrap();
    /// assert_eq!(p.name_of("const foo = (").unwrap().1, "foo");
    /// assert_eq!(p.name_of("  handler = (").unwrap().1, "handler");
    /// assert_eq!(p.name_of("get total(").unwrap().1, "total");
    /// assert_eq!(p.name_of("async render(").unwrap().1, "render");
    /// assert!(p.name_of("(").is_none());
    /// ```
    pub fn name_of(&self, header: &str) -> Option<(usize, String)> {
        self.names.iter().find_map(|re| {
            let m = re.captures(header)?.get(1)?;
            (!m.as_str().is_empty()).then(|| (m.start(), m.as_str().to_string()))
        })
    }

    /// Scan `text` with every family and return deduplicated items ordered by
    /// span start.
    pub fn scan(&self, text: &str) -> Vec<ExtractedItem> {
        let mut best: HashMap<usize, RawMatch> = HashMap::new();
        let mut nameless: Vec<RawMatch> = Vec::new();

        for raw in self.raw_matches(text) {
            let Some((offset, _)) = raw.name else {
                nameless.push(raw);
                continue;
            };
            match best.get(&offset) {
                Some(kept) if kept.family.rank() <= raw.family.rank() => {}
                _ => {
                    best.insert(offset, raw);
                }
            }
        }

        let mut built: Vec<(ExtractedItem, usize)> = best
            .into_values()
            .map(|raw| self.build(text, &raw))
            .collect();

        // `const f = function g() {}` also matches the named-function family
        // at `g`; drop constructs that start inside another's signature.
        let preludes: Vec<(usize, usize)> = built
            .iter()
            .map(|(item, prelude_end)| (item.span().start, *prelude_end))
            .collect();
        built.retain(|(item, _)| {
            let start = item.span().start;
            !preludes.iter().any(|&(s, e)| start > s && start < e)
        });

        let mut items: Vec<ExtractedItem> = built.into_iter().map(|(item, _)| item).collect();
        items.extend(nameless.into_iter().map(|raw| ExtractedItem::Failed {
            span: Span::new(raw.start, raw.end),
            message: "no construct name could be recovered".into(),
        }));
        items.sort_by_key(|item| item.span().start);
        items
    }

    fn raw_matches(&self, text: &str) -> Vec<RawMatch> {
        let mut raw = Vec::new();
        for (family, re) in &self.families {
            for caps in re.captures_iter(text) {
                if let Some(m) = self.raw_match(*family, text, &caps) {
                    raw.push(m);
                }
            }
        }
        raw
    }

    fn raw_match(&self, family: Family, text: &str, caps: &Captures<'_>) -> Option<RawMatch> {
        let whole = caps.get(0)?;
        let (start, end) = (whole.start(), whole.end());
        let mut raw = RawMatch {
            family,
            start,
            end,
            name: None,
            accessor: None,
            superclass: None,
            interfaces: Vec::new(),
        };

        match family {
            Family::Class => {
                let name = caps.get(1)?;
                raw.name = Some((name.start(), name.as_str().to_string()));
                raw.superclass = caps.get(2).map(|m| m.as_str().to_string());
                raw.interfaces = caps
                    .get(3)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .map(|i| i.trim().to_string())
                            .filter(|i| !i.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                return Some(raw);
            }
            Family::Method => {
                let name = caps.get(2)?;
                if caps.get(1).is_some() || CONTROL_KEYWORDS.contains(&name.as_str()) {
                    return None;
                }
                let before = text[..name.start()].trim_end().trim_end_matches('*').trim_end();
                if before.ends_with("function") || before.ends_with('.') {
                    return None;
                }
                // `setTimeout(function () {` and `describe('x', () => {` are calls
                let params = caps.get(3).map_or("", |m| m.as_str());
                if params.contains("=>") || params.split(|c| !is_ident_char(c)).any(|w| w == "function") {
                    return None;
                }
                if before.ends_with(EXPRESSION_CONTEXT) || trailing_ident(before) == "return" {
                    return None;
                }
            }
            Family::Accessor => {
                if text[..start].trim_end().ends_with("static") {
                    return None;
                }
                raw.accessor = caps.get(1).map(|m| m.as_str().to_string());
            }
            _ => {}
        }

        let matched = whole.as_str();
        let header_end = matched.find('(').map_or(matched.len(), |p| p + 1);
        raw.name = self
            .name_of(&matched[..header_end])
            .map(|(offset, name)| (start + offset, name));
        Some(raw)
    }

    /// Turn a named match into an item plus the end of its signature.
    fn build(&self, text: &str, raw: &RawMatch) -> (ExtractedItem, usize) {
        let Some((offset, name)) = &raw.name else {
            return (
                ExtractedItem::Failed {
                    span: Span::new(raw.start, raw.end),
                    message: "no construct name could be recovered".into(),
                },
                raw.end,
            );
        };

        let extent = extent(text, raw.family, offset + name.len(), raw.end);
        if extent.end <= raw.start || extent.end > text.len() {
            return (
                ExtractedItem::Failed {
                    span: Span::new(raw.start, raw.end),
                    message: format!("span of '{name}' is out of range"),
                },
                raw.end,
            );
        }

        let prelude = text.get(raw.start..extent.prelude_end).unwrap_or("");
        let flags = Flags {
            is_async: prelude.split(|c| !is_ident_char(c)).any(|w| w == "async"),
            is_exported: is_exported(text, raw.start, prelude),
            is_arrow: extent.arrow,
            is_getter: raw.accessor.as_deref() == Some("get"),
            is_setter: raw.accessor.as_deref() == Some("set"),
        };

        let members = if raw.family == Family::Class {
            self.class_members(scan::body_of(&text[raw.start..extent.end]))
        } else {
            Vec::new()
        };

        let candidate = ConstructCandidate {
            span: Span::new(raw.start, extent.end),
            kind: raw.family.kind(),
            name: name.clone(),
            parameters: extent.params,
            flags,
            superclass: raw.superclass.clone(),
            interfaces: raw.interfaces.clone(),
            members,
        };
        (ExtractedItem::Construct(candidate), extent.prelude_end)
    }

    fn class_members(&self, body: &str) -> Vec<MethodSignature> {
        let nested = scan::nested_blocks(body);
        self.member
            .captures_iter(body)
            .filter_map(|caps| {
                let name = caps.get(3)?;
                let at = name.start();
                if nested.iter().any(|&(s, e)| at > s && at < e) {
                    return None;
                }
                if CONTROL_KEYWORDS.contains(&name.as_str()) {
                    return None;
                }
                Some(MethodSignature {
                    visibility: caps
                        .get(1)
                        .map_or_else(|| "public".to_string(), |m| m.as_str().to_string()),
                    is_static: caps.get(2).is_some(),
                    name: name.as_str().to_string(),
                })
            })
            .collect()
    }
}

fn is_exported(text: &str, start: usize, prelude: &str) -> bool {
    if prelude.trim_start().starts_with("export") {
        return true;
    }
    let before = text[..start].trim_end();
    let before = before.strip_suffix("default").map_or(before, str::trim_end);
    before.ends_with("export")
        && before[..before.len() - "export".len()]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c))
}

fn extent(text: &str, family: Family, name_end: usize, match_end: usize) -> Extent {
    match family {
        Family::Class => {
            let open = match_end.saturating_sub(1);
            Extent {
                end: scan::matching(text, open).unwrap_or(text.len()),
                prelude_end: open,
                params: Vec::new(),
                arrow: false,
            }
        }
        Family::Hook => {
            let open = match_end.saturating_sub(1);
            let close = scan::matching(text, open).unwrap_or(text.len());
            Extent {
                end: scan::statement_end(text, close),
                prelude_end: open,
                params: Vec::new(),
                arrow: false,
            }
        }
        _ => function_extent(text, name_end),
    }
}

/// Trailing identifier of `s`, ignoring trailing whitespace.
fn trailing_ident(s: &str) -> &str {
    let s = s.trim_end();
    let start = s
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_ident_char(c))
        .last()
        .map_or(s.len(), |(i, _)| i);
    &s[start..]
}

/// Walk forward from the end of a function-like name: the parameter list,
/// then either a block body or an arrow body.
fn function_extent(text: &str, from: usize) -> Extent {
    let mut cursor = from;
    let mut params: Option<Vec<String>> = None;

    while let Some((at, which)) = scan::find_outside_literals(text, cursor, &["(", "=>", "{", ";"]) {
        match which {
            0 if params.is_none() => {
                let lead = &text[from..at];
                let callee = trailing_ident(lead);
                // `= memo(` or `= React.memo(` wraps the real function
                if !lead.contains("function") && !callee.is_empty() && callee != "async" {
                    cursor = at + 1;
                    continue;
                }
                let close = scan::matching(text, at).unwrap_or(text.len());
                let inner = text.get(at + 1..close.saturating_sub(1)).unwrap_or("");
                params = Some(scan::split_params(inner));
                cursor = close;
            }
            0 => cursor = at + 1,
            1 => {
                let params = params.unwrap_or_else(|| {
                    let single = trailing_ident(&text[from..at]);
                    if single.is_empty() || single == "async" {
                        Vec::new()
                    } else {
                        vec![single.to_string()]
                    }
                });
                let after = at + 2;
                let body_start = text[after..]
                    .find(|c: char| !c.is_whitespace())
                    .map_or(text.len(), |p| after + p);
                let end = if text.as_bytes().get(body_start) == Some(&b'{') {
                    scan::matching(text, body_start).unwrap_or(text.len())
                } else {
                    scan::statement_end(text, body_start)
                };
                return Extent {
                    end,
                    prelude_end: at,
                    params,
                    arrow: true,
                };
            }
            2 => {
                return Extent {
                    end: scan::matching(text, at).unwrap_or(text.len()),
                    prelude_end: at,
                    params: params.unwrap_or_default(),
                    arrow: false,
                };
            }
            _ => {
                return Extent {
                    end: at + 1,
                    prelude_end: at,
                    params: params.unwrap_or_default(),
                    arrow: false,
                };
            }
        }
    }

    Extent {
        end: text.len(),
        prelude_end: text.len(),
        params: params.unwrap_or_default(),
        arrow: false,
    }
}

/// Run the pattern scan over `text`.
///
/// # Errors
///
/// Returns [`FathomError::Extraction`] if a pattern fails to compile.
///
/// # Examples
///
/// ```
/// use fathom_extract::{patterns, ExtractedItem};
///
/// let items = patterns::extract("const foo = () => {}").unwrap();
/// assert_eq!(items.len(), 1);
/// let ExtractedItem::Construct(foo) = &items[0] else { panic!() };
/// assert_eq!(foo.name, "foo");
/// ```
pub fn extract(text: &str) -> Result<Vec<ExtractedItem>, FathomError> {
    Ok(Patterns::new()?.scan(text))
}
