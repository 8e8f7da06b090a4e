//! Repair of near-JSON model output.
//!
//! Model responses arrive wrapped in prose and markdown fences, with
//! unquoted keys, single-quoted strings, trailing commas, Python-style
//! literals and stray backslashes. [`sanitize`] cuts out the object, strips
//! presentation noise and runs one string-aware pass ([`repair`]) that
//! rewrites structure outside string literals and leaves their text alone.

use serde_json::{Map, Value};

/// Why a response could not be turned into a JSON object.
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("response contains no JSON object")]
    NoObject,

    #[error("response is not valid JSON after repair: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotObject,
}

/// Turn a raw model response into a JSON object.
///
/// # Errors
///
/// Returns [`SanitizeError`] when no object can be recovered. Callers turn
/// this into a degraded result; it never aborts an analysis.
///
/// # Examples
///
/// ```
/// use fathom_enrich::sanitize::sanitize;
///
/// let raw = "Here is the JSON:\n```json\n{description: 'x', type: \"Y\",}\n```";
/// let object = sanitize(raw).unwrap();
/// assert_eq!(object["description"], "x");
/// assert_eq!(object["type"], "Y");
/// ```
pub fn sanitize(raw: &str) -> Result<Map<String, Value>, SanitizeError> {
    let object = object_slice(raw).ok_or(SanitizeError::NoObject)?;
    let repaired = repair(&clean(object));
    match serde_json::from_str(&repaired)? {
        Value::Object(map) => Ok(map),
        _ => Err(SanitizeError::NotObject),
    }
}

/// From the first `{` to the last `}`, or to the end when never closed.
fn object_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    match raw.rfind('}') {
        Some(end) if end > start => Some(&raw[start..=end]),
        _ => Some(&raw[start..]),
    }
}

/// Control characters other than newline become spaces; backticks and `**`
/// emphasis go. Newlines survive so [`repair`] can end bare values at them.
fn clean(text: &str) -> String {
    text.replace("**", "")
        .chars()
        .filter(|&c| c != '`')
        .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
        .collect()
}

/// Rewrite near-JSON into JSON in a single pass.
///
/// Outside string literals: keys and bare word values (which end at a
/// delimiter or a newline) are quoted, `NaN`,
/// `undefined` and `None` become `null`, literal casing is normalized,
/// trailing and doubled commas are dropped, missing commas between members
/// are inserted and unclosed brackets are closed. Inside string literals:
/// single quotes become double quotes, unescaped inner quotes are escaped
/// and invalid escapes are doubled. Text after the top-level value is
/// ignored.
///
/// # Examples
///
/// ```
/// use fathom_enrich::sanitize::repair;
///
/// assert_eq!(repair("{a: True, b: [1, 2,], c: 'it\\'s'}"), r#"{"a": true, "b": [1, 2], "c": "it's"}"#);
/// assert_eq!(repair(r#"{"path": "C:\temp\x"#), r#"{"path": "C:\temp\\x"}"#);
/// ```
pub fn repair(text: &str) -> String {
    let mut repair = Repair::new(text);
    repair.run();
    repair.out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    Delimiter,
}

struct Repair {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<Container>,
    expect: Expect,
}

impl Repair {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len() + 16),
            stack: Vec::new(),
            expect: Expect::Value,
        }
    }

    fn run(&mut self) {
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                c if c.is_whitespace() => {
                    self.out.push(c);
                    self.pos += 1;
                }
                '{' | '[' => self.open(c),
                '}' | ']' => {
                    self.close();
                    if self.stack.is_empty() {
                        return;
                    }
                }
                ',' => self.comma(),
                ':' => self.colon(),
                '"' | '\'' => self.string(c),
                _ => self.bare(),
            }
        }
        self.finish();
    }

    fn top(&self) -> Option<Container> {
        self.stack.last().copied()
    }

    fn significant_from(&self, from: usize) -> Option<(usize, char)> {
        self.chars
            .get(from..)
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(i, &c)| (from + i, c))
    }

    /// Emit the comma a missing delimiter implies. `false` when the current
    /// container cannot take another member.
    fn insert_comma(&mut self) -> bool {
        match self.top() {
            Some(Container::Object) => {
                self.out.push(',');
                self.expect = Expect::Key;
                true
            }
            Some(Container::Array) => {
                self.out.push(',');
                self.expect = Expect::Value;
                true
            }
            None => false,
        }
    }

    fn open(&mut self, c: char) {
        self.pos += 1;
        match self.expect {
            // an object member needs a key first
            Expect::Key => return,
            Expect::Colon => self.out.push(':'),
            Expect::Delimiter => {
                if self.top() != Some(Container::Array) || !self.insert_comma() {
                    return;
                }
            }
            Expect::Value => {}
        }
        self.out.push(c);
        if c == '{' {
            self.stack.push(Container::Object);
            self.expect = Expect::Key;
        } else {
            self.stack.push(Container::Array);
            self.expect = Expect::Value;
        }
    }

    fn close(&mut self) {
        self.pos += 1;
        let Some(top) = self.stack.pop() else {
            return;
        };
        match (self.expect, top) {
            (Expect::Colon, _) => self.out.push_str(": null"),
            (Expect::Value, Container::Object) => self.out.push_str("null"),
            _ => {}
        }
        self.out.push(match top {
            Container::Object => '}',
            Container::Array => ']',
        });
        self.expect = Expect::Delimiter;
    }

    fn comma(&mut self) {
        self.pos += 1;
        if matches!(self.significant_from(self.pos), None | Some((_, ',' | '}' | ']'))) {
            return;
        }
        match self.expect {
            Expect::Key => return,
            Expect::Value if self.top() == Some(Container::Array) => return,
            Expect::Colon => self.out.push_str(": null"),
            Expect::Value => self.out.push_str("null"),
            Expect::Delimiter => {}
        }
        self.insert_comma();
    }

    fn colon(&mut self) {
        self.pos += 1;
        if self.expect == Expect::Colon {
            self.out.push(':');
            self.expect = Expect::Value;
        }
    }

    fn string(&mut self, quote: char) {
        match self.expect {
            Expect::Delimiter => {
                if !self.insert_comma() {
                    self.pos += 1;
                    return;
                }
            }
            Expect::Colon => {
                self.out.push(':');
                self.expect = Expect::Value;
            }
            Expect::Key | Expect::Value => {}
        }
        let is_key = self.expect == Expect::Key;

        self.pos += 1;
        self.out.push('"');
        while let Some(&c) = self.chars.get(self.pos) {
            if c == '\\' {
                self.escape();
                continue;
            }
            if c == quote && self.closes_string() {
                self.pos += 1;
                break;
            }
            if c == '"' {
                self.out.push_str("\\\"");
            } else if c.is_control() {
                self.out.push(' ');
            } else {
                self.out.push(c);
            }
            self.pos += 1;
        }
        self.out.push('"');
        self.expect = if is_key { Expect::Colon } else { Expect::Delimiter };
    }

    /// A quote at `pos` ends its string when structure follows it.
    fn closes_string(&self) -> bool {
        match self.significant_from(self.pos + 1) {
            None | Some((_, ',' | '}' | ']' | ':')) => true,
            Some((at, q @ ('"' | '\''))) => self.starts_key(at, q),
            Some(_) => false,
        }
    }

    /// Whether a quoted key followed by `:` starts at `at`.
    fn starts_key(&self, at: usize, quote: char) -> bool {
        let rest = self.chars.get(at + 1..).unwrap_or(&[]);
        let Some(offset) = rest.iter().position(|&c| c == quote) else {
            return false;
        };
        matches!(self.significant_from(at + 1 + offset + 1), Some((_, ':')))
    }

    fn escape(&mut self) {
        match self.chars.get(self.pos + 1).copied() {
            Some(n @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                self.out.push('\\');
                self.out.push(n);
                self.pos += 2;
            }
            Some('u') if self.is_hex4(self.pos + 2) => {
                self.out.push('\\');
                self.out.extend(&self.chars[self.pos + 1..self.pos + 6]);
                self.pos += 6;
            }
            Some('\'') => {
                self.out.push('\'');
                self.pos += 2;
            }
            _ => {
                self.out.push_str("\\\\");
                self.pos += 1;
            }
        }
    }

    fn is_hex4(&self, from: usize) -> bool {
        self.chars
            .get(from..from + 4)
            .is_some_and(|digits| digits.iter().all(char::is_ascii_hexdigit))
    }

    /// An unquoted key or value.
    fn bare(&mut self) {
        match self.expect {
            Expect::Colon => {
                self.pos += 1;
                return;
            }
            Expect::Delimiter => {
                if !self.insert_comma() {
                    self.pos += 1;
                    return;
                }
            }
            Expect::Key | Expect::Value => {}
        }

        let is_key = self.expect == Expect::Key;
        let stops: &[char] = if is_key {
            &[':', ',', '{', '}', '[', ']', '"']
        } else {
            &[',', '}', ']', '\n']
        };
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| !stops.contains(c)) {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        let token = token.trim();

        if is_key {
            self.out.push_str(&quoted(token));
            self.expect = Expect::Colon;
        } else {
            self.out.push_str(&literal(token));
            self.expect = Expect::Delimiter;
        }
    }

    fn finish(&mut self) {
        match self.expect {
            Expect::Colon => self.out.push_str(": null"),
            Expect::Value if self.top() == Some(Container::Object) => self.out.push_str("null"),
            _ => {}
        }
        while let Some(top) = self.stack.pop() {
            self.out.push(match top {
                Container::Object => '}',
                Container::Array => ']',
            });
        }
    }
}

fn literal(token: &str) -> String {
    match token.to_ascii_lowercase().as_str() {
        "true" => "true".into(),
        "false" => "false".into(),
        "null" | "none" | "nan" | "undefined" => "null".into(),
        _ if serde_json::from_str::<serde_json::Number>(token).is_ok() => token.into(),
        _ => quoted(token),
    }
}

fn quoted(token: &str) -> String {
    Value::String(token.to_string()).to_string()
}
