//! Java parser (§4.1): classes, interfaces, enums, methods, fields.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|private|protected|static|final|abstract|\s)*\s*(class|interface|enum)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .unwrap()
    })
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:@\w+(?:\([^)]*\))?\s*)*(?:public|private|protected|static|final|abstract|synchronized|\s)*\s*([A-Za-z_][A-Za-z0-9_<>\[\],\s\.]*?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^;{}]*)\)\s*(?:throws[^{]*)?\{",
        )
        .unwrap()
    })
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|private|protected|static|final|\s)+([A-Za-z_][A-Za-z0-9_<>\[\],\.]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:=[^;]*)?;",
        )
        .unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in type_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kind = match &cap[1] {
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            _ => SymbolKind::Enum,
        };
        symbols.push(Symbol {
            name: cap[2].to_string(),
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

    for cap in method_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let return_ty = cap[1].trim().to_string();
        let name = cap[2].to_string();
        if matches!(return_ty.as_str(), "new" | "return" | "throw") {
            continue;
        }
        symbols.push(Symbol {
            name,
            kind: SymbolKind::Method,
            file: String::new(),
            line,
            signature: Some(cap[0].trim_end_matches('{').trim().to_string()),
            params: Some(cap[3].trim().to_string()),
            return_type: Some(return_ty),
            data_type: None,
            scope: Scope::Member,
            attributes: vec![],
            summary: None,
        });
    }

    for cap in field_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind: SymbolKind::Field,
            file: String::new(),
            line,
            signature: None,
            params: None,
            return_type: None,
            data_type: Some(cap[1].trim().to_string()),
            scope: Scope::Member,
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
    for kw in ["instanceof", "super", "this", "class", "extends", "implements"] {
        blacklist.insert(kw);
    }
    scan_call_identifiers(&body, &blacklist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_and_method() {
        let src = "public class UserService {\n  public User getUser(int id) {\n    return repo.find(id);\n  }\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "UserService" && s.kind == SymbolKind::Class));
        assert!(syms.iter().any(|s| s.name == "getUser" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn find_calls_within_method_body() {
        let src = "class A {\n  void run() {\n    helper();\n    other.thing();\n  }\n}\n";
        let symbol = Symbol {
            name: "run".into(),
            kind: SymbolKind::Method,
            file: "A.java".into(),
            line: 2,
            signature: None,
            params: None,
            return_type: None,
            data_type: None,
            scope: Scope::Member,
            attributes: vec![],
            summary: None,
        };
        let calls = find_calls(src, &symbol);
        assert!(calls.contains(&"helper".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("class { broken");
    }
}
