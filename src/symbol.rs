//! §3 Data model — Symbol, FileRecord, and the supporting value types shared
//! by the parsers (C3) and CodeIndex (C4).

use serde::{Deserialize, Serialize};

/// §3 Symbol — a named entity discovered by a parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symbol {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    pub file: String,
    /// 1-based line number.
    pub line: u32,
    pub signature: Option<String>,
    pub params: Option<String>,
    pub return_type: Option<String>,
    pub data_type: Option<String>,
    pub scope: Scope,
    pub attributes: Vec<String>,
    pub summary: Option<String>,
}

impl Symbol {
    /// The stable, authoritative per-occurrence key (§3 "dual symbol keys").
    pub fn qualified_key(&self) -> String {
        format!("{}@{}", self.name, self.file)
    }

    /// Whether this kind participates in call-graph edges and gets a
    /// §4.7 summary (used by CodeIndex invariant (iv)).
    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::Procedure
                | SymbolKind::Subproc
                | SymbolKind::Paragraph
                | SymbolKind::Program
        )
    }
}

/// A key of the form `name@path`. `key.contains('@')` is the spec's own
/// documented way to distinguish an authoritative qualified key from a
/// best-effort unqualified `name` alias (§3, Open Questions).
pub fn is_qualified_key(key: &str) -> bool {
    key.contains('@')
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Method,
    Procedure,
    Subproc,
    Section,
    Paragraph,
    Program,
    Macro,
    Define,
    External,
    Forward,
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    Type,
    Typedef,
    Variable,
    Field,
    Parameter,
    Constant,
    Literal,
    Condition,
    File,
    Copybook,
    Cte,
    View,
    Trigger,
    Index,
    Package,
    Delegate,
    Event,
    Impl,
    Namespace,
    Property,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Procedure => "procedure",
            Self::Subproc => "subproc",
            Self::Section => "section",
            Self::Paragraph => "paragraph",
            Self::Program => "program",
            Self::Macro => "macro",
            Self::Define => "define",
            Self::External => "external",
            Self::Forward => "forward",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Record => "record",
            Self::Type => "type",
            Self::Typedef => "typedef",
            Self::Variable => "variable",
            Self::Field => "field",
            Self::Parameter => "parameter",
            Self::Constant => "constant",
            Self::Literal => "literal",
            Self::Condition => "condition",
            Self::File => "file",
            Self::Copybook => "copybook",
            Self::Cte => "cte",
            Self::View => "view",
            Self::Trigger => "trigger",
            Self::Index => "index",
            Self::Package => "package",
            Self::Delegate => "delegate",
            Self::Event => "event",
            Self::Impl => "impl",
            Self::Namespace => "namespace",
            Self::Property => "property",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Local,
    Parameter,
    Member,
}

/// §3 FileRecord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub line_count: u32,
    pub symbols: Vec<Symbol>,
}

/// A single variable access recorded by §4.3 variable-access tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableAccess {
    pub file: String,
    pub line: u32,
    pub kind: AccessKind,
    /// First 80 chars of the line, per §4.3.
    pub context: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// §3 VariableInfo — tracked per `name@path` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableInfo {
    pub accesses: Vec<VariableAccess>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Symbol {
        Symbol {
            name: "doInsert".to_string(),
            kind: SymbolKind::Function,
            file: "src/nbtinsert.c".to_string(),
            line: 42,
            signature: Some("int doInsert(Relation rel)".to_string()),
            params: Some("Relation rel".to_string()),
            return_type: Some("int".to_string()),
            data_type: None,
            scope: Scope::Global,
            attributes: vec![],
            summary: None,
        }
    }

    #[test]
    fn qualified_key_format() {
        assert_eq!(sample().qualified_key(), "doInsert@src/nbtinsert.c");
    }

    #[test]
    fn is_qualified_key_detects_at_sign() {
        assert!(is_qualified_key("doInsert@src/nbtinsert.c"));
        assert!(!is_qualified_key("doInsert"));
    }

    #[test]
    fn callable_kinds() {
        assert!(sample().is_callable());
        let mut var = sample();
        var.kind = SymbolKind::Variable;
        assert!(!var.is_callable());
        let mut para = sample();
        para.kind = SymbolKind::Paragraph;
        assert!(para.is_callable());
    }

    #[test]
    fn symbol_round_trips_through_bincode() {
        let original = sample();
        let encoded = bincode::serialize(&original).unwrap();
        let decoded: Symbol = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.name, original.name);
        assert_eq!(decoded.kind, original.kind);
        assert_eq!(decoded.file, original.file);
        assert_eq!(decoded.line, original.line);
    }
}
