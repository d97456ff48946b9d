//! Keyword obfuscation
//!
//! Some very old reader browsers refuse any script containing certain keyword
//! substrings, even inside strings or comments. Each substring is rewritten
//! with a JS unicode escape that evaluates to the same text at runtime but
//! never matches the literal substring.
//!
//! Escapes are only valid inside identifiers and string, template or regex
//! bodies, so [`ObfuscationTable::apply_within`] confines the rewrite to
//! ranges the JS engine marks as escapable. Existing escape sequences are
//! copied verbatim.

use std::ops::Range;

/// Ordered substring→encoding table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationTable {
    entries: Vec<(String, String)>,
}

impl Default for ObfuscationTable {
    fn default() -> Self {
        Self::new([
            ("async", "\\u0061sync"),
            ("await", "\\u0061wait"),
            ("class", "cl\\u0061ss"),
            ("fetch", "f\\u0065tch"),
            ("Promise", "\\u0050romise"),
            ("promise", "\\u0070romise"),
            ("=>", "=\\u003e"),
            ("`", "\\u0060"),
        ])
    }
}

impl ObfuscationTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Replace every forbidden substring, in table order
    pub fn apply(&self, code: &str) -> String {
        self.entries
            .iter()
            .fold(code.to_string(), |acc, (needle, encoded)| {
                acc.replace(needle.as_str(), encoded)
            })
    }

    /// Replace forbidden substrings inside `ranges` only
    ///
    /// Ranges are byte offsets into `code`; overlapping ranges are merged and
    /// ranges that do not fall on char boundaries are skipped.
    pub fn apply_within(&self, code: &str, ranges: &[Range<usize>]) -> String {
        let mut ranges = ranges.to_vec();
        ranges.sort_by_key(|r| r.start);

        let mut out = String::with_capacity(code.len());
        let mut cursor = 0;
        for range in ranges {
            let start = range.start.max(cursor);
            if start >= range.end {
                continue;
            }
            let (Some(before), Some(region)) = (code.get(cursor..start), code.get(start..range.end))
            else {
                continue;
            };
            out.push_str(before);
            out.push_str(&self.apply_outside_escapes(region));
            cursor = range.end;
        }
        out.push_str(code.get(cursor..).unwrap_or_default());
        out
    }

    fn apply_outside_escapes(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some(offset) = text[cursor..].find('\\') {
            let at = cursor + offset;
            out.push_str(&self.apply(&text[cursor..at]));
            let end = (at + 1 + escape_len(&text[at + 1..])).min(text.len());
            out.push_str(&text[at..end]);
            cursor = end;
        }
        out.push_str(&self.apply(&text[cursor..]));
        out
    }

    /// Forbidden substrings still present in `code`
    pub fn remaining<'a>(&'a self, code: &str) -> Vec<&'a str> {
        self.forbidden().filter(|needle| code.contains(needle)).collect()
    }

    pub fn forbidden(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(needle, _)| needle.as_str())
    }
}

/// Length of the escape sequence after a backslash, in bytes
///
/// Over-approximates: covers string, identifier and regex escapes, so text
/// an escape might own is never rewritten.
fn escape_len(rest: &str) -> usize {
    let Some(first) = rest.chars().next() else {
        return 0;
    };
    let after = &rest[first.len_utf8()..];
    match first {
        'u' | 'p' | 'P' if after.starts_with('{') => rest.find('}').map_or(rest.len(), |i| i + 1),
        'k' if after.starts_with('<') => rest.find('>').map_or(rest.len(), |i| i + 1),
        'u' => 1 + hex_digits(after, 4),
        'x' => 1 + hex_digits(after, 2),
        'c' => 1 + after.chars().next().map_or(0, char::len_utf8),
        '\r' if after.starts_with('\n') => 2,
        '0'..='9' => rest.bytes().take(3).take_while(u8::is_ascii_digit).count(),
        other => other.len_utf8(),
    }
}

fn hex_digits(text: &str, max: usize) -> usize {
    text.bytes().take(max).take_while(u8::is_ascii_hexdigit).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_removes_every_forbidden_substring() {
        let table = ObfuscationTable::default();
        let code = "async function f(){await fetch(`x`);new Promise(r=>r());class A{} // promise\n}";
        let out = table.apply(code);
        assert!(table.remaining(&out).is_empty(), "left: {:?}", table.remaining(&out));
    }

    #[test]
    fn test_encodings_do_not_reform_forbidden_substrings() {
        let table = ObfuscationTable::default();
        for (_, encoded) in &table.entries {
            assert!(
                table.remaining(encoded).is_empty(),
                "{encoded} contains a forbidden substring"
            );
        }
    }

    #[test]
    fn test_adjacent_matches_do_not_reform() {
        let table = ObfuscationTable::default();
        // every pair of forbidden substrings written back to back
        let needles: Vec<_> = table.forbidden().map(str::to_string).collect();
        for a in &needles {
            for b in &needles {
                let out = table.apply(&format!("{a}{b}"));
                assert!(table.remaining(&out).is_empty(), "{a}{b} -> {out}");
            }
        }
    }

    #[test]
    fn test_apply_is_stable() {
        let table = ObfuscationTable::default();
        let once = table.apply("fetch('/api').then(r => r.json())");
        assert_eq!(table.apply(&once), once);
        assert_eq!(once, "f\\u0065tch('/api').then(r =\\u003e r.json())");
    }

    #[test]
    fn test_apply_within_leaves_code_outside_ranges() {
        let table = ObfuscationTable::default();
        let code = r#"class A{}var s="class";"#;
        let start = code.find('"').unwrap();
        let out = table.apply_within(code, &[start..code.len() - 1]);
        assert_eq!(out, r#"class A{}var s="cl\u0061ss";"#);
    }

    #[test]
    fn test_apply_within_merges_overlapping_ranges() {
        let table = ObfuscationTable::default();
        let out = table.apply_within("({fetch})", &[2..7, 2..7, 3..7]);
        assert_eq!(out, "({f\\u0065tch})");
    }

    #[test]
    fn test_existing_escapes_are_not_rewritten() {
        let table = ObfuscationTable::default();
        // `\fetch` is a form feed followed by "etch"
        assert_eq!(table.apply_within(r#""\fetch""#, &[0..8]), r#""\fetch""#);
        // `\x0a` owns the first `a`
        assert_eq!(table.apply_within(r#""\x0async""#, &[0..10]), r#""\x0async""#);
        // an escaped backslash does not own what follows
        assert_eq!(
            table.apply_within(r#""\\fetch""#, &[0..9]),
            r#""\\f\u0065tch""#
        );
    }

    #[test]
    fn test_escape_len() {
        assert_eq!(escape_len("u0061sync"), 5);
        assert_eq!(escape_len("u{61}sync"), 5);
        assert_eq!(escape_len("x0async"), 3);
        assert_eq!(escape_len("nfetch"), 1);
        assert_eq!(escape_len("\r\nx"), 2);
        assert_eq!(escape_len("k<async>x"), 8);
        assert_eq!(escape_len(""), 0);
    }

    #[test]
    fn test_custom_table() {
        let table = ObfuscationTable::new([("eval", "\\u0065val")]);
        assert_eq!(table.apply("eval(x)"), "\\u0065val(x)");
        assert_eq!(table.apply("async"), "async");
    }
}
