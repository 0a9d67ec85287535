//! JavaScript/TypeScript parser (§4.1): functions, arrow-function const
//! bindings, classes, methods, interfaces/types (TS).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, scan_method_calls, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)\)").unwrap()
    })
}

fn arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::\s*[^=]+)?=\s*(?:async\s+)?\(([^)]*)\)\s*(?::\s*[A-Za-z_$][A-Za-z0-9_$<>\[\],\.\s]*)?\s*=>").unwrap()
    })
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
    })
}

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
    })
}

fn type_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:export\s+)?type\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=").unwrap())
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:public|private|protected|static|async|readonly|\s)*\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^;{}()]*)\)\s*(?::\s*[A-Za-z_$][A-Za-z0-9_$<>\[\],\.\s]*)?\s*\{").unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in function_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Function, Some(cap[2].trim().to_string()), Scope::Global);
    }
    for cap in arrow_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Function, Some(cap[2].trim().to_string()), Scope::Global);
    }
    for cap in class_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Class, None, Scope::Global);
    }
    for cap in interface_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Interface, None, Scope::Global);
    }
    for cap in type_alias_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Typedef, None, Scope::Global);
    }
    for cap in method_re().captures_iter(content) {
        let name = cap[1].to_string();
        if matches!(name.as_str(), "if" | "for" | "while" | "switch" | "catch" | "function" | "constructor") {
            if name != "constructor" {
                continue;
            }
        }
        let kind = SymbolKind::Method;
        push(&mut symbols, content, cap.get(0).unwrap().start(), name, kind, Some(cap[2].trim().to_string()), Scope::Member);
    }

    symbols
}

#[allow(clippy::too_many_arguments)]
fn push(symbols: &mut Vec<Symbol>, content: &str, start: usize, name: String, kind: SymbolKind, params: Option<String>, scope: Scope) {
    let line = 1 + content[..start].matches('\n').count() as u32;
    symbols.push(Symbol {
        name,
        kind,
        file: String::new(),
        line,
        signature: None,
        params,
        return_type: None,
        data_type: None,
        scope,
        attributes: vec![],
        summary: None,
    });
}

/// §4.1: JS/TS additionally scans `.method(` call sites via `scan_method_calls`.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    let Some(end_line) = find_brace_body_end(&lines, start_line, 2000) else {
        return Vec::new();
    };
    let body = lines[start_line..=end_line].join("\n");

    let mut blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
    for kw in ["require", "import", "super", "constructor"] {
        blacklist.insert(kw);
    }
    let mut calls = scan_call_identifiers(&body, &blacklist);

    let method_blacklist: HashSet<&'static str> = ["then", "catch", "finally"].into_iter().collect();
    for call in scan_method_calls(&body, &method_blacklist) {
        if !calls.contains(&call) {
            calls.push(call);
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_arrow_and_class() {
        let src = "export function doThing(a, b) {\n  return helper(a);\n}\nconst other = (x) => x + 1;\nexport class Widget {\n  render() {\n    this.paint();\n  }\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "doThing" && s.kind == SymbolKind::Function));
        assert!(syms.iter().any(|s| s.name == "other" && s.kind == SymbolKind::Function));
        assert!(syms.iter().any(|s| s.name == "Widget" && s.kind == SymbolKind::Class));
        assert!(syms.iter().any(|s| s.name == "render" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn extracts_interface_and_type_alias() {
        let src = "export interface Props {\n  id: number;\n}\nexport type Id = string | number;\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "Props" && s.kind == SymbolKind::Interface));
        assert!(syms.iter().any(|s| s.name == "Id" && s.kind == SymbolKind::Typedef));
    }

    #[test]
    fn find_calls_includes_method_calls() {
        let src = "function run() {\n  helper();\n  obj.doThing();\n}\n";
        let symbol = Symbol {
            name: "run".into(),
            kind: SymbolKind::Function,
            file: "a.ts".into(),
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
        assert!(calls.contains(&"helper".to_string()));
        assert!(calls.contains(&"doThing".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("function ((( {{{ broken");
    }
}
