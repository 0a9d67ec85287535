//! C/C++ parser (§4.1): function/method definitions, struct/class/enum/typedef
//! declarations, and call-edge extraction by brace-depth scanning.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            (?:(?:static|inline|extern|virtual|explicit|constexpr)\s+)*
            ([A-Za-z_][A-Za-z0-9_:<>,\s\*&]*?)\s+
            (?:\*|&)?\s*
            ([A-Za-z_~][A-Za-z0-9_]*)\s*
            \(([^;{}]*)\)
            (?:\s*const)?\s*\{",
        )
        .unwrap()
    })
}

fn type_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(class|struct|enum(?:\s+class)?|union)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
    })
}

fn typedef_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*typedef\s+.+?\s+([A-Za-z_][A-Za-z0-9_]*)\s*;").unwrap())
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in function_re().captures_iter(content) {
        let whole_match_start = cap.get(0).unwrap().start();
        let line = 1 + content[..whole_match_start].matches('\n').count() as u32;
        let return_type = cap.get(1).map(|m| m.as_str().trim().to_string());
        let name = cap[2].to_string();
        let params = cap.get(3).map(|m| m.as_str().trim().to_string());
        if is_control_keyword(&name) {
            continue;
        }
        symbols.push(Symbol {
            name,
            kind: SymbolKind::Function,
            file: String::new(),
            line,
            signature: Some(cap[0].trim_end_matches('{').trim().to_string()),
            params,
            return_type,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        });
    }

    for cap in type_decl_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kw = &cap[1];
        let kind = if kw.starts_with("class") {
            SymbolKind::Class
        } else if kw.starts_with("struct") {
            SymbolKind::Struct
        } else if kw.starts_with("union") {
            SymbolKind::Struct
        } else {
            SymbolKind::Enum
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

    for cap in typedef_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(Symbol {
            name: cap[1].to_string(),
            kind: SymbolKind::Typedef,
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

fn is_control_keyword(name: &str) -> bool {
    matches!(name, "if" | "for" | "while" | "switch" | "catch" | "return")
}

/// §4.1 call-edge extraction: scan the function body delimited by brace
/// depth for `identifier(` calls.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    let Some(end_line) = find_brace_body_end(&lines, start_line, 2000) else {
        return Vec::new();
    };
    let body = lines[start_line..=end_line].join("\n");
    let mut blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
    for kw in [
        "int", "char", "float", "double", "void", "long", "short", "unsigned",
        "signed", "struct", "union", "enum", "const", "static", "class",
    ] {
        blacklist.insert(kw);
    }
    scan_call_identifiers(&body, &blacklist)
}
