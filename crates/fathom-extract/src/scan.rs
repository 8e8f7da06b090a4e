//! Byte-level scanning helpers shared by both extraction strategies.
//!
//! All offsets are byte offsets into the original text and always land on
//! ASCII delimiters, so slicing at them is UTF-8 safe.

/// If a string literal or comment starts at `i`, return the offset just past
/// its end (or the end of input when it is unterminated).
fn skip_literal(bytes: &[u8], i: usize) -> Option<usize> {
    match bytes[i] {
        quote @ (b'"' | b'\'' | b'`') => {
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => j += 2,
                    b'\n' if quote != b'`' => return Some(j),
                    c if c == quote => return Some(j + 1),
                    _ => j += 1,
                }
            }
            Some(bytes.len())
        }
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
            let end = bytes[i..]
                .iter()
                .position(|&c| c == b'\n')
                .map_or(bytes.len(), |p| i + p);
            Some(end)
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let end = bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |p| i + 2 + p + 2);
            Some(end)
        }
        _ => None,
    }
}

/// Offset just past the delimiter closing the one at `open`.
///
/// Works for `{`, `(` and `[`. Strings and comments are skipped; `None` when
/// the delimiter is never closed.
///
/// # Examples
///
/// ```
/// use fathom_extract::scan::matching;
///
/// let text = "f(a, g(b), \")\") + 1";
/// assert_eq!(matching(text, 1), Some(15));
/// ```
pub fn matching(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (opener, closer) = match bytes.get(open)? {
        b'{' => (b'{', b'}'),
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        let c = bytes[i];
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

/// Offset just past the end of the statement starting at or after `from`.
///
/// The statement ends at the first `;` (inclusive) or newline at bracket
/// depth zero, or at the end of input.
pub fn statement_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = from;
    while i < bytes.len() {
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return i;
                }
            }
            b';' if depth == 0 => return i + 1,
            b'\n' if depth == 0 && i > from => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Find the first occurrence of any of `targets` at or after `from`, outside
/// strings and comments.
pub fn find_outside_literals(text: &str, from: usize, targets: &[&str]) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        for (which, target) in targets.iter().enumerate() {
            if bytes[i..].starts_with(target.as_bytes()) {
                return Some((i, which));
            }
        }
        i += 1;
    }
    None
}

/// Ranges of the top-level `{...}` blocks inside `text`.
pub fn nested_blocks(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        if bytes[i] == b'{' {
            let end = matching(text, i).unwrap_or(bytes.len());
            blocks.push((i, end));
            i = end;
            continue;
        }
        i += 1;
    }
    blocks
}

/// Split a parameter list on commas at nesting depth zero.
///
/// Generic arguments (`Map<string, number>`) are treated as nested; an arrow
/// `=>` inside a default value does not close one.
///
/// # Examples
///
/// ```
/// use fathom_extract::scan::split_params;
///
/// assert_eq!(
///     split_params("a, { b, c } = {}, cb = (x, y) => x, ...rest"),
///     vec!["a", "{ b, c } = {}", "cb = (x, y) => x", "...rest"]
/// );
/// assert!(split_params("  ").is_empty());
/// ```
pub fn split_params(params: &str) -> Vec<String> {
    let bytes = params.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'=' => {}
            b')' | b']' | b'}' | b'>' => depth -= 1,
            b',' if depth <= 0 => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&params[start..]);

    parts
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Text between the first `{` and the last `}` of `span`, or `""`.
///
/// # Examples
///
/// ```
/// use fathom_extract::scan::body_of;
///
/// assert_eq!(body_of("function f() { return g(); }"), " return g(); ");
/// assert_eq!(body_of("x => x + 1"), "");
/// ```
pub fn body_of(span: &str) -> &str {
    match (span.find('{'), span.rfind('}')) {
        (Some(open), Some(close)) if close > open => &span[open + 1..close],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_skips_braces_in_strings_and_comments() {
        let text = "{ const s = '}'; /* } */ // }\n return `}`; } tail";
        let end = matching(text, 0).unwrap();
        assert_eq!(&text[end..], " tail");
    }

    #[test]
    fn matching_unclosed_is_none() {
        assert_eq!(matching("{ if (x) {", 0), None);
    }

    #[test]
    fn matching_requires_opener() {
        assert_eq!(matching("abc", 0), None);
        assert_eq!(matching("abc", 10), None);
    }

    #[test]
    fn statement_end_stops_at_semicolon() {
        let text = "a + f(1; 2);\nnext";
        assert_eq!(&text[..statement_end(text, 0)], "a + f(1; 2);");
    }

    #[test]
    fn statement_end_stops_at_newline_or_closer() {
        let text = "x * 2\nconst y = 1;";
        assert_eq!(statement_end(text, 0), 5);
        let text = "x * 2) more";
        assert_eq!(statement_end(text, 0), 5);
    }

    #[test]
    fn find_ignores_targets_in_strings() {
        let text = "'=>' + \"{\" => {";
        let (at, which) = find_outside_literals(text, 0, &["{", "=>"]).unwrap();
        assert_eq!(which, 1);
        assert_eq!(at, 11);
    }

    #[test]
    fn nested_blocks_are_top_level_only() {
        let text = "a { b { c } } d { e }";
        assert_eq!(nested_blocks(text), vec![(2, 13), (16, 21)]);
    }

    #[test]
    fn split_keeps_generic_commas_together() {
        assert_eq!(
            split_params("m: Map<string, number>, n?: number"),
            vec!["m: Map<string, number>", "n?: number"]
        );
    }
}
