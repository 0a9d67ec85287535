//! COBOL parser (§4.1): PROGRAM-ID, paragraphs/sections, 01-level data
//! items (including `OCCURS ... INDEXED BY`), COPY statements.
//!
//! Call-edge extraction scans a paragraph body (from its own start line
//! until the next paragraph/section header or `END PROGRAM`) for
//! `PERFORM name [THRU name]`, `CALL 'name'`, `GO TO name`, `COPY name`.

use std::sync::OnceLock;

use regex::Regex;

use crate::symbol::{Scope, Symbol, SymbolKind};

fn program_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*PROGRAM-ID\.\s*([A-Za-z0-9\-_]+)").unwrap())
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([A-Z0-9][A-Z0-9\-]*)\.\s*$").unwrap())
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^([A-Za-z0-9\-]+)\s+SECTION\.").unwrap())
}

fn data_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*01\s+([A-Za-z0-9\-_]+)(?:\s+PIC\s+(\S+))?(?:.*?OCCURS\s+(\d+)\s+TIMES(?:.*?INDEXED\s+BY\s+([A-Za-z0-9\-_]+))?)?").unwrap()
    })
}

fn copy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*COPY\s+([A-Za-z0-9\-_]+)").unwrap())
}

fn perform_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bPERFORM\s+([A-Za-z0-9\-_]+)(?:\s+THRU\s+([A-Za-z0-9\-_]+))?").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bCALL\s+'([A-Za-z0-9\-_]+)'"#).unwrap())
}

fn goto_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bGO\s+TO\s+([A-Za-z0-9\-_]+)").unwrap())
}

fn next_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^(?:[A-Z0-9][A-Z0-9\-]*\.\s*$|[A-Za-z0-9\-]+\s+SECTION\.|\s*END\s+PROGRAM\b)").unwrap())
}

/// `EXEC SQL ... END-EXEC` blocks, scanned for the table(s) referenced so
/// the §4.9 `FIND_DATABASE`/`LIST_SQL_TABLES` intents have something to
/// index (§4.1 SQL call-edge rule's embedded-SQL counterpart).
fn exec_sql_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)EXEC\s+SQL\b(.*?)END-EXEC").unwrap())
}

fn sql_select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)SELECT\b.*?\bFROM\s+([A-Za-z0-9_]+)").unwrap())
}

fn sql_insert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)INSERT\s+INTO\s+([A-Za-z0-9_]+)").unwrap())
}

fn sql_update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)UPDATE\s+([A-Za-z0-9_]+)\s+SET").unwrap())
}

fn sql_delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DELETE\s+FROM\s+([A-Za-z0-9_]+)").unwrap())
}

pub fn parse(content: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    if let Some(cap) = program_id_re().captures(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Program, Scope::Global, None);
    }

    for cap in section_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Section, Scope::Global, None);
    }

    for cap in paragraph_re().captures_iter(content) {
        let name = &cap[1];
        if name.eq_ignore_ascii_case("END") {
            continue;
        }
        push(&mut symbols, content, cap.get(0).unwrap().start(), name.to_string(), SymbolKind::Paragraph, Scope::Global, None);
    }

    for cap in data_item_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let data_type = cap.get(2).map(|m| m.as_str().to_string());
        let mut symbol = mk_symbol(content, start, cap[1].to_string(), SymbolKind::Record, Scope::Global, data_type);
        if let Some(occurs) = cap.get(3) {
            let mut attrs = vec![format!("occurs={}", occurs.as_str())];
            if let Some(idx) = cap.get(4) {
                attrs.push(format!("indexed_by={}", idx.as_str()));
            }
            symbol.attributes = attrs;
        }
        symbols.push(symbol);
    }

    for cap in copy_re().captures_iter(content) {
        push(&mut symbols, content, cap.get(0).unwrap().start(), cap[1].to_string(), SymbolKind::Copybook, Scope::Global, None);
    }

    for cap in exec_sql_block_re().captures_iter(content) {
        let start = cap.get(0).unwrap().start();
        let body = &cap[1];
        let hits: [(&str, Option<&str>); 4] = [
            ("SELECT", sql_select_re().captures(body).map(|c| c.get(1).unwrap().as_str())),
            ("INSERT", sql_insert_re().captures(body).map(|c| c.get(1).unwrap().as_str())),
            ("UPDATE", sql_update_re().captures(body).map(|c| c.get(1).unwrap().as_str())),
            ("DELETE", sql_delete_re().captures(body).map(|c| c.get(1).unwrap().as_str())),
        ];
        for (op, table) in hits {
            let Some(table) = table else { continue };
            let mut symbol = mk_symbol(content, start, table.to_uppercase(), SymbolKind::Type, Scope::Global, None);
            symbol.attributes = vec!["sql".to_string(), format!("operations={op}")];
            symbols.push(symbol);
        }
    }

    symbols
}

fn push(symbols: &mut Vec<Symbol>, content: &str, start: usize, name: String, kind: SymbolKind, scope: Scope, data_type: Option<String>) {
    symbols.push(mk_symbol(content, start, name, kind, scope, data_type));
}

fn mk_symbol(content: &str, start: usize, name: String, kind: SymbolKind, scope: Scope, data_type: Option<String>) -> Symbol {
    let line = 1 + content[..start].matches('\n').count() as u32;
    Symbol {
        name,
        kind,
        file: String::new(),
        line,
        signature: None,
        params: None,
        return_type: None,
        data_type,
        scope,
        attributes: vec![],
        summary: None,
    }
}

/// §4.1 COBOL call-edge rule: scan the paragraph body up to the next
/// paragraph/section header or `END PROGRAM`.
pub fn find_calls(content: &str, symbol: &Symbol) -> Vec<String> {
    if !matches!(symbol.kind, SymbolKind::Paragraph | SymbolKind::Section | SymbolKind::Program) {
        return Vec::new();
    }
    let lines: Vec<&str> = content.lines().collect();
    let start_line = symbol.line.saturating_sub(1) as usize;
    if start_line >= lines.len() {
        return Vec::new();
    }
    let mut end_line = lines.len() - 1;
    for (i, line) in lines.iter().enumerate().skip(start_line + 1) {
        if next_header_re().is_match(line) {
            end_line = i - 1;
            break;
        }
    }
    let body = lines[start_line..=end_line.max(start_line)].join("\n");

    let mut calls = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for cap in perform_re().captures_iter(&body) {
        for name in [cap.get(1), cap.get(2)].into_iter().flatten() {
            let upper = name.as_str().to_uppercase();
            if seen.insert(upper.clone()) {
                calls.push(upper);
            }
        }
    }
    for cap in call_re().captures_iter(&body) {
        let upper = cap[1].to_uppercase();
        if seen.insert(upper.clone()) {
            calls.push(upper);
        }
    }
    for cap in goto_re().captures_iter(&body) {
        let upper = cap[1].to_uppercase();
        if seen.insert(upper.clone()) {
            calls.push(upper);
        }
    }
    for cap in copy_re().captures_iter(&body) {
        let upper = cap[1].to_uppercase();
        if seen.insert(upper.clone()) {
            calls.push(upper);
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_program_id_and_data_item() {
        let src = "       PROGRAM-ID. PAYROLL.\n       01 EMP-TABLE OCCURS 100 TIMES INDEXED BY I-EMP.\n";
        let syms = parse(src);
        assert!(syms.iter().any(|s| s.name == "PAYROLL" && s.kind == SymbolKind::Program));
        let table = syms.iter().find(|s| s.name == "EMP-TABLE").expect("table symbol");
        assert!(table.attributes.iter().any(|a| a == "occurs=100"));
        assert!(table.attributes.iter().any(|a| a == "indexed_by=I-EMP"));
    }

    #[test]
    fn extracts_paragraph_and_calls() {
        let src = "MAIN-PARA.\n    PERFORM VALIDATE-INPUT THRU VALIDATE-EXIT.\n    CALL 'SUBPGM'.\n    GO TO CLEANUP.\nCLEANUP.\n    STOP RUN.\n";
        let syms = parse(src);
        let main = syms.iter().find(|s| s.name == "MAIN-PARA").expect("paragraph");
        let calls = find_calls(src, main);
        assert!(calls.contains(&"VALIDATE-INPUT".to_string()));
        assert!(calls.contains(&"VALIDATE-EXIT".to_string()));
        assert!(calls.contains(&"SUBPGM".to_string()));
        assert!(calls.contains(&"CLEANUP".to_string()));
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = parse("PROGRAM-ID.\n01 (((");
    }

    #[test]
    fn extracts_sql_table_from_embedded_exec_sql() {
        let src = "       PROGRAM-ID. PAYROLL.\n       EXEC SQL\n           SELECT * FROM ACCOUNTS\n       END-EXEC.\n";
        let syms = parse(src);
        let table = syms.iter().find(|s| s.name == "ACCOUNTS").expect("sql table symbol");
        assert_eq!(table.kind, SymbolKind::Type);
        assert!(table.attributes.iter().any(|a| a == "sql"));
        assert!(table.attributes.iter().any(|a| a == "operations=SELECT"));
    }
}
