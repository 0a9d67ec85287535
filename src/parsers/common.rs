//! Shared helpers for the per-language regex-pipeline parsers (§4.1).
//!
//! None of these helpers ever panic on malformed input — worst case they
//! return an empty/default result, preserving the "parsers are pure and
//! MUST NOT throw" contract.

use std::collections::HashSet;

/// Find the end line (0-based, inclusive) of a brace-delimited body that
/// starts at or after `start_line` (0-based). Returns `None` if no opening
/// brace is found within `search_window` lines, or if braces never balance
/// before EOF.
pub fn find_brace_body_end(lines: &[&str], start_line: usize, search_window: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut opened = false;
    let scan_start = start_line;
    let scan_end = (start_line + search_window).min(lines.len());

    for (i, line) in lines.iter().enumerate().take(scan_end).skip(scan_start) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Find the end line (0-based, inclusive) of a Python-style indented body
/// starting right after `def_line` (0-based), using the indentation of the
/// `def`/`class` line itself as the baseline.
pub fn find_indented_body_end(lines: &[&str], def_line: usize) -> usize {
    let base_indent = indent_of(lines.get(def_line).copied().unwrap_or(""));
    let mut end = def_line;
    for (i, line) in lines.iter().enumerate().skip(def_line + 1) {
        if line.trim().is_empty() {
            end = i;
            continue;
        }
        if indent_of(line) <= base_indent {
            break;
        }
        end = i;
    }
    end
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Scan a body of text for `identifier(` call sites, excluding language
/// keywords and a caller-supplied blacklist (e.g. `sizeof`, `new`, `await`).
/// Shared by every brace-delimited language family (§4.1).
pub fn scan_call_identifiers(body: &str, keywords: &HashSet<&'static str>) -> Vec<String> {
    let mut calls = Vec::new();
    let mut seen = HashSet::new();
    let bytes = body.as_bytes();
    let mut i = 0usize;
    let chars: Vec<char> = body.chars().collect();
    let n = chars.len();
    let _ = bytes;

    while i < n {
        let c = chars[i];
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            // skip whitespace before checking for '('
            let mut j = i;
            while j < n && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            if j < n && chars[j] == '(' && !keywords.contains(ident.as_str()) && !seen.contains(&ident) {
                seen.insert(ident.clone());
                calls.push(ident);
            }
            continue;
        }
        i += 1;
    }
    calls
}

/// JS/TS-specific addition: `.method(` call sites, excluding a small
/// builtin blacklist (§4.1).
pub fn scan_method_calls(body: &str, blacklist: &HashSet<&'static str>) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let n = chars.len();
    let mut calls = Vec::new();
    let mut seen = HashSet::new();
    let mut i = 0usize;

    while i < n {
        if chars[i] == '.' {
            let start = i + 1;
            let mut j = start;
            while j < n && (chars[j].is_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            if j > start {
                let ident: String = chars[start..j].iter().collect();
                let mut k = j;
                while k < n && (chars[k] == ' ' || chars[k] == '\t') {
                    k += 1;
                }
                if k < n && chars[k] == '(' && !blacklist.contains(ident.as_str()) && !seen.contains(&ident) {
                    seen.insert(ident.clone());
                    calls.push(ident);
                }
            }
            i = j.max(i + 1);
            continue;
        }
        i += 1;
    }
    calls
}

/// Common keyword/builtin filter words shared across C-like languages.
pub const COMMON_CALL_BLACKLIST: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "typeof",
    "new", "delete", "throw", "await", "yield", "function", "async",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_body_end_simple() {
        let text = "int foo() {\n  bar();\n}\n";
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(find_brace_body_end(&lines, 0, 50), Some(2));
    }

    #[test]
    fn brace_body_end_nested() {
        let text = "int foo() {\n  if (x) {\n    bar();\n  }\n}\n";
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(find_brace_body_end(&lines, 0, 50), Some(4));
    }

    #[test]
    fn brace_body_end_unbalanced_returns_none() {
        let text = "int foo() {\n  bar();\n";
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(find_brace_body_end(&lines, 0, 50), None);
    }

    #[test]
    fn indented_body_end_basic() {
        let text = "def foo():\n    bar()\n    baz()\ndef next_fn():\n    pass\n";
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(find_indented_body_end(&lines, 0), 2);
    }

    #[test]
    fn scan_call_identifiers_filters_keywords() {
        let blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
        let body = "if (x) { foo(); bar(y); sizeof(z); }";
        let calls = scan_call_identifiers(body, &blacklist);
        assert!(calls.contains(&"foo".to_string()));
        assert!(calls.contains(&"bar".to_string()));
        assert!(!calls.contains(&"if".to_string()));
        assert!(!calls.contains(&"sizeof".to_string()));
    }

    #[test]
    fn scan_call_identifiers_dedupes() {
        let blacklist: HashSet<&'static str> = HashSet::new();
        let body = "foo(); foo(); foo();";
        let calls = scan_call_identifiers(body, &blacklist);
        assert_eq!(calls, vec!["foo".to_string()]);
    }

    #[test]
    fn scan_method_calls_basic() {
        let blacklist: HashSet<&'static str> = ["toString", "map"].into_iter().collect();
        let body = "foo.bar().toString(); list.map(x => x);";
        let calls = scan_method_calls(body, &blacklist);
        assert!(calls.contains(&"bar".to_string()));
        assert!(!calls.contains(&"toString".to_string()));
        assert!(!calls.contains(&"map".to_string()));
    }
}
