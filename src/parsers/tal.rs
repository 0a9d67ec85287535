//! TAL (Transaction Application Language) parser (§4.1): `PROC`/`SUBPROC`
//! declarations and call-edge extraction between matching `BEGIN...END;`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::symbol::{Scope, Symbol, SymbolKind};

fn proc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*(?:[A-Za-z_][A-Za-z0-9_\.]*\s+)?(PROC|SUBPROC)\s+([A-Za-z_][A-Za-z0-9_\^]*)\s*(?:\(([^)]*)\))?").unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in proc_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kind = if cap[1].eq_ignore_ascii_case("proc") { SymbolKind::Procedure } else { SymbolKind::Subproc };
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind,
            file: String::new(),
            line,
            signature: Some(cap[0].trim().to_string()),
            params: cap.get(3).map(|m| m.as_str().trim().to_string()),
            return_type: None,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        });
    }

    symbols
}

const TAL_KEYWORDS: &[&str] = &[
    "begin", "end", "if", "then", "else", "while", "do", "for", "to", "downto",
    "case", "of", "proc", "subproc", "call", "pcal", "return", "int", "string",
    "fixed", "real", "struct", "literal", "define",
];

/// §4.1 TAL call-edge rule: scan between the procedure's matching
/// `BEGIN...END;` for `CALL name`, `PCAL name`, and `name(args)` calls.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    let Some(end_line) = find_begin_end_body(&lines, start_line) else {
        return Vec::new();
    };
    let body = lines[start_line..=end_line].join("\n");

    let mut calls = Vec::new();
    let mut seen = HashSet::new();

    for re in [call_re(), pcal_re()] {
        for cap in re.captures_iter(&body) {
            let name = cap[1].to_string();
            if seen.insert(name.clone()) {
                calls.push(name);
            }
        }
    }

    let keywords: HashSet<&'static str> = TAL_KEYWORDS.iter().copied().collect();
    for cap in func_call_re().captures_iter(&body) {
        let name = cap[1].to_string();
        if keywords.contains(name.to_lowercase().as_str()) {
            continue;
        }
        if seen.insert(name.clone()) {
            calls.push(name);
        }
    }

    calls
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bCALL\s+([A-Za-z_][A-Za-z0-9_\^]*)").unwrap())
}

fn pcal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bPCAL\s+([A-Za-z_][A-Za-z0-9_\^]*)").unwrap())
}

fn func_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_\^]*)\s*\(").unwrap())
}

/// Find the matching `END;` (0-based, inclusive) for the first `BEGIN`
/// found at or after `start_line`, tracking nested BEGIN/END pairs.
fn find_begin_end_body(lines: &[&str], start_line: usize) -> Option<usize> {
    let begin_re = Regex::new(r"(?i)\bBEGIN\b").unwrap();
    let end_re = Regex::new(r"(?i)\bEND\s*;").unwrap();
    let mut depth: i32 = 0;
    let mut opened = false;

    for (i, line) in lines.iter().enumerate().skip(start_line) {
        let begins = begin_re.find_iter(line).count() as i32;
        let ends = end_re.find_iter(line).count() as i32;
        if begins > 0 {
            opened = true;
        }
        depth += begins;
        depth -= ends;
        if opened && depth <= 0 {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_proc_and_subproc() {
        let src = "PROC MAIN\nBEGIN\n  CALL_HELPER;\nEND;\nINT PROC COMPUTE(A, B)\nBEGIN\n  RETURN A + B;\nEND;\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "MAIN" && s.kind == SymbolKind::Procedure));
        assert!(syms.iter().any(|s| s.name == "COMPUTE" && s.kind == SymbolKind::Procedure));
    }

    #[test]
    fn find_calls_between_begin_end() {
        let src = "PROC MAIN\nBEGIN\n  CALL HELPER;\n  PCAL OTHERPROC;\n  result := compute(x, y);\nEND;\n";
        let symbol = Symbol {
            name: "MAIN".into(),
            kind: SymbolKind::Procedure,
            file: "x.tal".into(),
            line: 1,
            signature: None,
            params: None,
            return_type: None,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        };
        let calls = find_calls(src, &symbol);
        assert!(calls.contains(&"HELPER".to_string()));
        assert!(calls.contains(&"OTHERPROC".to_string()));
        assert!(calls.contains(&"compute".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("PROC ((( BEGIN not valid");
    }
}
