//! SQL parser (§4.1): tables, views, CTEs, triggers, indexes, stored
//! procedures/functions.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::symbol::{Scope, Symbol, SymbolKind};

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z0-9_\.]+)").unwrap()
    })
}

fn create_view_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?VIEW\s+([A-Za-z0-9_\.]+)").unwrap()
    })
}

fn cte_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)\bWITH\s+([A-Za-z0-9_]+)\s+AS\s*\(").unwrap())
}

fn trigger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?TRIGGER\s+([A-Za-z0-9_\.]+)").unwrap())
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\s+([A-Za-z0-9_\.]+)\s+ON\s+([A-Za-z0-9_\.]+)").unwrap()
    })
}

fn proc_func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(PROCEDURE|FUNCTION)\s+([A-Za-z0-9_\.]+)\s*\(([^)]*)\)").unwrap()
    })
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in create_table_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Type, None);
    }
    for cap in create_view_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::View, None);
    }
    for cap in cte_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Cte, None);
    }
    for cap in trigger_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Trigger, None);
    }
    for cap in index_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Index, Some(cap[2].to_string()));
    }
    for cap in proc_func_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let line = 1 + content[..start].matches('\n').count() as u32;
        let kind = if cap[1].eq_ignore_ascii_case("procedure") { SymbolKind::Procedure } else { SymbolKind::Function };
        symbols.push(Symbol {
            name: cap[2].to_string(),
            kind,
            file: String::new(),
            line,
            signature: Some(cap[0].trim().to_string()),
            params: Some(cap[3].trim().to_string()),
            return_type: None,
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        });
    }

    symbols
}

fn push(symbols: &mut Vec<Symbol>, content: &str, start: usize, name: String, kind: SymbolKind, data_type: Option<String>) {
    let line = 1 + content[..start].matches('\n').count() as u32;
    symbols.push(Symbol {
        name,
        kind,
        file: String::new(),
        line,
        signature: None,
        params: None,
        return_type: None,
        data_type,
        scope: Scope::Global,
        attributes: vec![],
        summary: None,
    });
}

const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "insert", "update", "delete", "values", "set",
    "and", "or", "not", "null", "order", "group", "by", "having", "join",
    "inner", "outer", "left", "right", "on", "as", "distinct", "count", "sum",
    "avg", "min", "max", "case", "when", "then", "else", "end", "cast",
    "coalesce", "exists", "in", "between", "like",
];

/// §4.1 SQL call-edge rule: `EXEC[UTE] [PROCEDURE] name`, `CALL name`, and
/// function calls in expressions, excluding SQL keywords.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    if !matches!(symbol.kind, SymbolKind::Procedure | SymbolKind::Function) {
        return Vec::new();
    }
    let mut calls = Vec::new();
    let mut seen = HashSet::new();

    for cap in exec_re().captures_iter(content) {
        let name = cap[1].to_string();
        if seen.insert(name.clone()) {
            calls.push(name);
        }
    }
    for cap in call_re().captures_iter(content) {
        let name = cap[1].to_string();
        if seen.insert(name.clone()) {
            calls.push(name);
        }
    }
    let keywords: HashSet<&'static str> = SQL_KEYWORDS.iter().copied().collect();
    for cap in func_call_re().captures_iter(content) {
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

fn exec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bEXEC(?:UTE)?\s+(?:PROCEDURE\s+)?([A-Za-z0-9_\.]+)").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bCALL\s+([A-Za-z0-9_\.]+)").unwrap())
}

fn func_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_table_view_and_index() {
        let src = "CREATE TABLE ACCOUNTS (id INT);\nCREATE VIEW ACTIVE_ACCOUNTS AS SELECT * FROM ACCOUNTS;\nCREATE INDEX IDX_ACC ON ACCOUNTS (id);\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "ACCOUNTS" && s.kind == SymbolKind::Type));
        assert!(syms.iter().any(|s| s.name == "ACTIVE_ACCOUNTS" && s.kind == SymbolKind::View));
        assert!(syms.iter().any(|s| s.name == "IDX_ACC" && s.kind == SymbolKind::Index));
    }

    #[test]
    fn extracts_procedure_and_calls() {
        let src = "CREATE PROCEDURE DO_TRANSFER(acct INT)\nBEGIN\n  EXEC PROCEDURE VALIDATE_ACCT;\n  CALL LOG_TRANSFER;\n  total := compute_total(acct);\nEND;\n";
        let syms = parse(src);
        let proc = syms.iter().find(|s| s.name == "DO_TRANSFER").expect("procedure symbol");
        let calls = find_calls(src, proc);
        assert!(calls.contains(&"VALIDATE_ACCT".to_string()));
        assert!(calls.contains(&"LOG_TRANSFER".to_string()));
        assert!(calls.contains(&"compute_total".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("CREATE TABLE ((( not valid");
    }
}
