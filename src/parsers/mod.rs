//! C3 — Parsers: per-language regex pipelines that extract `Symbol`s from
//! source text and, for callable symbols, their outgoing call edges.
//!
//! §4.1's own design note prefers these regex pipelines uniformly over a
//! tree-sitter-backed parser: two of the ten required languages here
//! (COBOL, TAL) have no usable tree-sitter grammar in the ecosystem, and a
//! single consistent strategy is easier to reason about than a split one.
//! Every parser here is pure and never panics on malformed input.

pub mod c_cpp;
pub mod cobol;
pub mod common;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust_lang;
pub mod sql;
pub mod tal;

use crate::language::Language;
use crate::symbol::Symbol;

/// Extract symbols for `content` written in `language`.
pub fn parse(content: &str, language: Language) -> Vec<Symbol> {
    match language {
        Language::C | Language::Cpp => c_cpp::parse(content),
        Language::Java => java::parse(content),
        Language::CSharp => csharp::parse(content),
        Language::Python => python::parse(content),
        Language::JavaScript | Language::TypeScript => javascript::parse(content),
        Language::Go => go::parse(content),
        Language::Rust => rust_lang::parse(content),
        Language::Cobol => cobol::parse(content),
        Language::Tal => tal::parse(content),
        Language::Sql => sql::parse(content),
        Language::Kotlin | Language::Scala | Language::Ruby | Language::Php | Language::Swift => {
            generic::parse(content)
        }
    }
}

/// Call-edge extraction for a callable `symbol`, per §4.1's per-language
/// call rules.
pub fn find_calls(content: &str, symbol: &Symbol, language: Language) -> Vec<String> {
    match language {
        Language::C | Language::Cpp => c_cpp::find_calls(content, symbol),
        Language::Java => java::find_calls(content, symbol),
        Language::CSharp => csharp::find_calls(content, symbol),
        Language::Python => python::find_calls(content, symbol),
        Language::JavaScript | Language::TypeScript => javascript::find_calls(content, symbol),
        Language::Go => go::find_calls(content, symbol),
        Language::Rust => rust_lang::find_calls(content, symbol),
        Language::Cobol => cobol::find_calls(content, symbol),
        Language::Tal => tal::find_calls(content, symbol),
        Language::Sql => sql::find_calls(content, symbol),
        Language::Kotlin | Language::Scala | Language::Ruby | Language::Php | Language::Swift => {
            generic::find_calls(content, symbol)
        }
    }
}

/// Best-effort brace-family parser for languages without a dedicated
/// grammar (Kotlin, Scala, Ruby, PHP, Swift): a single regex broad enough
/// to catch `fn`/`def`/`func`/method-style declarations across that
/// family, reusing the C-like brace-body call scanner.
mod generic {
    use std::collections::HashSet;
    use std::sync::OnceLock;

    use regex::Regex;

    use crate::parsers::common::{find_brace_body_end, scan_call_identifiers, COMMON_CALL_BLACKLIST};
    use crate::symbol::{Scope, Symbol, SymbolKind};

    fn callable_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?m)^\s*(?:public|private|protected|internal|static|final|override|open|fun|def|func|sub|\s)*\s*(?:fun|def|func|sub)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)").unwrap()
        })
    }

    fn type_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?m)^\s*(?:public|private|protected|internal|final|open|abstract|\s)*\s*(class|struct|module|trait|protocol|interface)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
        })
    }

    pub fn parse(content: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();

        for cap in callable_re().captures_iter(content) {
            let start = cap.get(0).unwrap().start();
            let line = 1 + content[..start].matches('\n').count() as u32;
            symbols.push(Symbol {
                name: cap[1].to_string(),
                kind: SymbolKind::Function,
                file: String::new(),
                line,
                signature: Some(cap[0].trim().to_string()),
                params: Some(cap[2].trim().to_string()),
                return_type: None,
                data_type: None,
                scope: Scope::Global,
                attributes: vec![],
                summary: None,
            });
        }

        for cap in type_re().captures_iter(content) {
            let start = cap.get(0).unwrap().start();
            let line = 1 + content[..start].matches('\n').count() as u32;
            let kind = match &cap[1] {
                "class" => SymbolKind::Class,
                "struct" => SymbolKind::Struct,
                "module" => SymbolKind::Namespace,
                "trait" | "protocol" | "interface" => SymbolKind::Interface,
                _ => SymbolKind::Class,
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

        symbols
    }

    pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
        let lines: Vec<&str> = content.lines().collect();
        let start_line = symbol.line.saturating_sub(1) as usize;
        let Some(end_line) = find_brace_body_end(&lines, start_line, 2000) else {
            return Vec::new();
        };
        let body = lines[start_line..=end_line].join("\n");
        let blacklist: HashSet<&'static str> = COMMON_CALL_BLACKLIST.iter().copied().collect();
        scan_call_identifiers(&body, &blacklist)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn extracts_fun_and_class_generic() {
            let src = "class Widget {\n  fun render() {\n    paint()\n  }\n}\n";
            let syms = parse(src);
            assert!(syms.iter().any(|s| s.name == "Widget" && s.kind == SymbolKind::Class));
            assert!(syms.iter().any(|s| s.name == "render" && s.kind == SymbolKind::Function));
        }

        #[test]
        fn malformed_input_never_panics() {
            let _ = parse("fun ((( {{{ broken");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_python_by_language_tag() {
        let src = "def run():\n    helper()\n";
        let syms = parse(src, Language::Python);
        assert!(syms.iter().any(|s| s.name == "run"));
    }

    #[test]
    fn dispatches_cobol_by_language_tag() {
        let src = "       PROGRAM-ID. FOO.\n";
        let syms = parse(src, Language::Cobol);
        assert!(syms.iter().any(|s| s.name == "FOO"));
    }

    #[test]
    fn falls_back_to_generic_for_kotlin() {
        let src = "class Foo {\n  fun bar() {\n    baz()\n  }\n}\n";
        let syms = parse(src, Language::Kotlin);
        assert!(syms.iter().any(|s| s.name == "Foo"));
        assert!(syms.iter().any(|s| s.name == "bar"));
    }
}
