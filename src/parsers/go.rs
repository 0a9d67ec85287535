//! Go parser (§4.1): `func` declarations (plain and method-receiver form),
//! `type` struct/interface declarations.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^func\s*(?:\(\s*\w+\s+\*?([A-Za-z_][A-Za-z0-9_]*)\s*\))?\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)").unwrap()
    })
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^type\s+([A-Za-z_][A-Za-z0-9_]*)\s+(struct|interface)\s*\{").unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in func_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let receiver = cap.get(1).map(|m| m.as_str().to_string());
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind: if receiver.is_some() { SymbolKind::Method } else { SymbolKind::Function },
            file: String::new(),
            line,
            signature: Some(cap[0].trim().to_string()),
            params: Some(cap[3].trim().to_string()),
            return_type: None,
            data_type: receiver,
            scope: if receiver.is_some() { Scope::Member } else { Scope::Global },
            attributes: vec![],
            summary: None,
        });
    }

    for cap in type_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kind = if &cap[2] == "struct" { SymbolKind::Struct } else { SymbolKind::Interface };
        symbols.push(Symbol {
            name: cap[1].to_string(),
            kind,
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

pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    let Some(end_line) = find_brace_body_end(&lines, start_line, 2000) else {
        return Vec::new();
    };
    let body = lines[start_line..=end_line].join("\n");
    let mut blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
    for kw in ["func", "go", "defer", "select", "range", "chan", "make", "len", "cap"] {
        blacklist.insert(kw);
    }
    scan_call_identifiers(&body, &blacklist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_and_method_funcs() {
        let src = "func Plain(a int) int {\n  return helper(a)\n}\nfunc (s *Server) Serve(addr string) error {\n  return nil\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "Plain" && s.kind == SymbolKind::Function));
        assert!(syms.iter().any(|s| s.name == "Serve" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn extracts_struct_and_interface() {
        let src = "type User struct {\n  Name string\n}\ntype Reader interface {\n  Read() error\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "User" && s.kind == SymbolKind::Struct));
        assert!(syms.iter().any(|s| s.name == "Reader" && s.kind == SymbolKind::Interface));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("func ((( {{{ broken");
    }
}
