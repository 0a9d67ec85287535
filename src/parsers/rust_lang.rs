//! Rust parser (§4.1): `fn`, `struct`, `enum`, `trait`, `impl` blocks.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
use crate::symbol::{Scope, Symbol, SymbolKind};

fn fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)\s*(?:->\s*[^\{]+)?\{").unwrap()
    })
}

fn struct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn enum_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn trait_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn impl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*impl(?:<[^>]*>)?\s+(?:([A-Za-z_][A-Za-z0-9_]*)(?:<[^>]*>)?\s+for\s+)?([A-Za-z_][A-Za-z0-9_]*)").unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in fn_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        symbols.push(Symbol {
            name: cap[1].to_string(),
            kind: SymbolKind::Function,
            file: String::new(),
            line,
            signature: Some(cap[0].trim_end_matches('{').trim().to_string()),
            params: Some(cap[2].trim().to_string()),
            return_type: None,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        });
    }

    for (re, kind) in [(struct_re(), SymbolKind::Struct), (enum_re(), SymbolKind::Enum), (trait_re(), SymbolKind::Interface)] {
        for cap in re.captures_iter(content) {
            let start = cap.get(0).unwrap().start();
            let line = 1 + content[..start].matches('\n').count() as u32;
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
    }

    for cap in impl_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let target = cap[2].to_string();
        symbols.push(Symbol {
            name: format!("impl {}", target),
            kind: SymbolKind::Impl,
            file: String::new(),
            line,
            signature: None,
            params: None,
            return_type: None,
            data_type: cap.get(1).map(|m| m.as_str().to_string()),
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
    for kw in ["fn", "let", "match", "impl", "unsafe", "mod", "use", "pub", "move", "loop", "Some", "None", "Ok", "Err"] {
        blacklist.insert(kw);
    }
    scan_call_identifiers(&body, &blacklist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fn_struct_enum_trait() {
        let src = "pub struct Foo {}\nenum Bar { A, B }\ntrait Baz {}\npub fn run(x: i32) -> i32 {\n  helper(x)\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "Foo" && s.kind == SymbolKind::Struct));
        assert!(syms.iter().any(|s| s.name == "Bar" && s.kind == SymbolKind::Enum));
        assert!(syms.iter().any(|s| s.name == "Baz" && s.kind == SymbolKind::Interface));
        assert!(syms.iter().any(|s| s.name == "run" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn extracts_impl_block() {
        let src = "impl Display for Foo {\n  fn fmt(&self) {}\n}\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.kind == SymbolKind::Impl));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("fn ((( {{{ broken");
    }
}
