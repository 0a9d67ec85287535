//! Python parser (§4.1): function/method `def`s, classes, module-level
//! variables; call-body scanning by indentation rather than brace depth.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_indented_body_end, scan_call_identifiers};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*)(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(?:->\s*([A-Za-z_][A-Za-z0-9_\[\],\.\s]*))?\s*:").unwrap())
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*)class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(([^)]*)\))?\s*:").unwrap())
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([A-Za-z_][A-Za-z0-9_]*)\s*(?::\s*[A-Za-z_][A-Za-z0-9_\[\],\.\s]*)?\s*=[^=]").unwrap())
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in class_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let indent = cap[1].len();
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind: SymbolKind::Class,
            file: String::new(),
            line,
            signature: None,
            params: None,
            return_type: None,
            data_type: None,
            scope: if indent == 0 { Scope::Global } else { Scope::Member },
            attributes: vec![],
            summary: None,
        });
    }

    for cap in def_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let indent = cap[1].len();
        let kind = if indent == 0 { SymbolKind::Function } else { SymbolKind::Method };
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind,
            file: String::new(),
            line,
            signature: Some(cap[0].trim_end_matches(':').trim().to_string()),
            params: Some(cap[3].trim().to_string()),
            return_type: cap.get(4).map(|m| m.as_str().trim().to_string()),
            data_type: None,
            scope: if indent == 0 { Scope::Global } else { Scope::Member },
            attributes: vec![],
            summary: None,
        });
    }

    for cap in assign_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let name = cap[1].to_string();
        if name == "self" || is_reserved(&name) {
            continue;
        }
        symbols.push(Symbol {
            name,
            kind: SymbolKind::Variable,
            file: String::new(),
            line,
            signature: None,
            params: None,
            return_type: None,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        });
    }

    symbols
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "True" | "False" | "None")
}

/// §4.1: Python call bodies are scanned by indentation, not brace depth.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    if start_line >= lines.len() {
        return Vec::new();
    }
    let end_line = find_indented_body_end(&lines, start_line);
    let body = lines[start_line..=end_line].join("\n");
    let keywords: HashSet<&'static str> = [
        "if", "for", "while", "with", "except", "return", "yield", "print",
        "lambda", "def", "class", "isinstance", "super", "len", "type",
        "elif", "else", "try", "raise", "assert",
    ]
    .into_iter()
    .collect();
    scan_call_identifiers(&body, &keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_and_class() {
        let src = "class Repo:\n    def find(self, id):\n        return self.db.get(id)\n\ndef top_level():\n    pass\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "Repo" && s.kind == SymbolKind::Class));
        assert!(syms.iter().any(|s| s.name == "find" && s.kind == SymbolKind::Method));
        assert!(syms.iter().any(|s| s.name == "top_level" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn find_calls_respects_indentation() {
        let src = "def run():\n    helper_one()\n    if True:\n        helper_two()\ndef other():\n    unrelated_call()\n";
        let symbol = Symbol {
            name: "run".into(),
            kind: SymbolKind::Function,
            file: "a.py".into(),
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
        assert!(calls.contains(&"helper_one".to_string()));
        assert!(calls.contains(&"helper_two".to_string()));
        assert!(!calls.contains(&"unrelated_call".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("def (((");
    }
}
