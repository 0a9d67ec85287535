//! C# parser (§4.1): classes, interfaces, structs, records, enums, methods,
//! properties, delegates, events.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:\[[^\]]*\]\s*)*(?:public|private|protected|internal|static|sealed|abstract|partial|\s)*\s*(class|interface|struct|record|enum)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .unwrap()
    })
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:\[[^\]]*\]\s*)*(?:public|private|protected|internal|static|virtual|override|async|sealed|\s)*\s*([A-Za-z_][A-Za-z0-9_<>\[\],\.\?]*?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^;{}]*)\)\s*\{",
        )
        .unwrap()
    })
}

fn delegate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:public|private|protected|internal|\s)*delegate\s+\S+\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
    })
}

fn event_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:public|private|protected|internal|\s)*event\s+\S+\s+([A-Za-z_][A-Za-z0-9_]*)\s*;").unwrap()
    })
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|private|protected|internal|static|virtual|override|\s)*\s*([A-Za-z_][A-Za-z0-9_<>\[\],\.\?]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{\s*get;",
        )
        .unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    push_all(&mut symbols, content);
    symbols
}

fn push_all(symbols: &mut Vec<Symbol>, content: &str) {
    for cap in type_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kind = match &cap[1] {
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "struct" => SymbolKind::Struct,
            "record" => SymbolKind::Record,
            _ => SymbolKind::Enum,
        };
        symbols.push(mk(cap[2].to_string(), kind, line, None, None, None, Scope::Global));
    }

    for cap in method_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let return_ty = cap[1].trim().to_string();
        let name = cap[2].to_string();
        if matches!(return_ty.as_str(), "new" | "get" | "set") {
            continue;
        }
        symbols.push(mk(
            name,
            SymbolKind::Method,
            line,
            Some(cap[0].trim_end_matches('{').trim().to_string()),
            Some(cap[3].trim().to_string()),
            Some(return_ty),
            Scope::Member,
        ));
    }

    for cap in delegate_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(mk(cap[1].to_string(), SymbolKind::Delegate, line, None, None, None, Scope::Global));
    }

    for cap in event_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(mk(cap[1].to_string(), SymbolKind::Event, line, None, None, None, Scope::Member));
    }

    for cap in property_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(mk(
            cap[2].to_string(),
            SymbolKind::Property,
            line,
            None,
            None,
            Some(cap[1].trim().to_string()),
            Scope::Member,
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn mk(
    name: String,
    kind: SymbolKind,
    line: u32,
    signature: Option<String>,
    params: Option<String>,
    return_type: Option<String>,
    scope: Scope,
) -> Symbol {
    Symbol {
        name,
        kind,
        file: String::new(),
        line,
        signature,
        params,
        return_type,
        data_type: None,
        scope,
        attributes: vec![],
        summary: None,
    }
}

pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    let Some(end_line) = find_brace_body_end(&lines, start_line, 2000) else {
        return Vec::new();
    };
    let body = lines[start_line..=end_line].join("\n");
    let mut blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
    for kw in ["nameof", "typeof", "using", "base", "this", "is", "as"] {
        blacklist.insert(kw);
    }
    scan_call_identifiers(&body, &blacklist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_interface_method_property() {
        let src = "public class UserService : IUserService {\n  public User GetUser(int id) {\n    return _repo.Find(id);\n  }\n  public int Count { get; set; }\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "UserService" && s.kind == SymbolKind::Class));
        assert!(syms.iter().any(|s| s.name == "GetUser" && s.kind == SymbolKind::Method));
        assert!(syms.iter().any(|s| s.name == "Count" && s.kind == SymbolKind::Property));
    }

    #[test]
    fn extracts_delegate_and_event() {
        let src = "public delegate void Handler(object sender);\npublic event Handler Changed;\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "Handler" && s.kind == SymbolKind::Delegate));
        assert!(syms.iter().any(|s| s.name == "Changed" && s.kind == SymbolKind::Event));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("class {{{ not valid (((");
    }
}
