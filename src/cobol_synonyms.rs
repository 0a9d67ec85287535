//! COBOL synonym overlay used by the QueryClassifier (§4.9): a first-class
//! table mapping everyday verbs/concepts onto their COBOL division/verb
//! vocabulary, plus the specialized-intent keyword triggers.

/// `(concept, [COBOL vocabulary terms])`. Order matters only for test
/// stability; lookups are a linear scan over this small table.
pub const COBOL_SYNONYMS: &[(&str, &[&str])] = &[
    ("loop", &["PERFORM UNTIL", "PERFORM VARYING", "PERFORM TIMES"]),
    ("if", &["IF", "EVALUATE", "WHEN"]),
    ("table", &["OCCURS", "INDEXED BY", "TABLE"]),
    ("call", &["CALL", "PERFORM"]),
    ("database", &["EXEC SQL", "SELECT", "CURSOR", "FETCH"]),
    ("file", &["SELECT", "FD", "READ", "WRITE", "OPEN", "CLOSE"]),
    ("copy", &["COPY", "COPYBOOK", "REPLACING"]),
    ("validate", &["88", "CONDITION-NAME", "VALID"]),
    ("error", &["ON ERROR", "INVALID KEY", "AT END", "ON EXCEPTION"]),
    ("move", &["MOVE", "CORRESPONDING"]),
    ("compute", &["COMPUTE", "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE"]),
    ("section", &["SECTION", "PARAGRAPH"]),
    ("program", &["PROGRAM-ID", "PROCEDURE DIVISION"]),
];

/// Expand a single token into any COBOL vocabulary terms it maps to.
/// Returns an empty vec for unmapped tokens.
pub fn expand(token: &str) -> Vec<&'static str> {
    let lower = token.to_lowercase();
    COBOL_SYNONYMS
        .iter()
        .find(|(concept, _)| *concept == lower)
        .map(|(_, terms)| terms.to_vec())
        .unwrap_or_default()
}

/// §4.9 specialized COBOL intents, routed directly to precomputed indexes
/// and short-circuiting normal search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CobolIntent {
    ListTablesInModule,
    ListAllTables,
    ListSqlTables,
    ModuleOverview,
    FindDefinition,
    FindCallers,
    FindCallees,
    FindDatabase,
    FindFileIo,
    FindCopybooks,
    FindValidation,
    FindErrorHandling,
}

impl CobolIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListTablesInModule => "LIST_TABLES_IN_MODULE",
            Self::ListAllTables => "LIST_ALL_TABLES",
            Self::ListSqlTables => "LIST_SQL_TABLES",
            Self::ModuleOverview => "MODULE_OVERVIEW",
            Self::FindDefinition => "FIND_DEFINITION",
            Self::FindCallers => "FIND_CALLERS",
            Self::FindCallees => "FIND_CALLEES",
            Self::FindDatabase => "FIND_DATABASE",
            Self::FindFileIo => "FIND_FILE_IO",
            Self::FindCopybooks => "FIND_COPYBOOKS",
            Self::FindValidation => "FIND_VALIDATION",
            Self::FindErrorHandling => "FIND_ERROR_HANDLING",
        }
    }
}

/// Detect a specialized COBOL intent from the lowercased query text, if any.
/// Intentionally keyword-driven and ordered most-specific-first: "tables in
/// X" must win over the bare "tables" catch-all.
pub fn detect_intent(query_lower: &str) -> Option<CobolIntent> {
    let has = |w: &str| query_lower.contains(w);

    if has("table") && has(" in ") {
        return Some(CobolIntent::ListTablesInModule);
    }
    if has("sql table") || (has("table") && has("sql")) {
        return Some(CobolIntent::ListSqlTables);
    }
    if has("table") {
        return Some(CobolIntent::ListAllTables);
    }
    if has("overview") || has("summary of module") {
        return Some(CobolIntent::ModuleOverview);
    }
    if has("where is") || has("defined") || has("definition") {
        return Some(CobolIntent::FindDefinition);
    }
    if has("who calls") || has("callers of") || has("caller") {
        return Some(CobolIntent::FindCallers);
    }
    if has("what does") && has("call") || has("callees") {
        return Some(CobolIntent::FindCallees);
    }
    if has("database") || has("exec sql") || has("sql") {
        return Some(CobolIntent::FindDatabase);
    }
    if has("file io") || has("read") && has("write") {
        return Some(CobolIntent::FindFileIo);
    }
    if has("copybook") || has("copy book") {
        return Some(CobolIntent::FindCopybooks);
    }
    if has("validation") || has("validate") {
        return Some(CobolIntent::FindValidation);
    }
    if has("error handling") || has("exception") {
        return Some(CobolIntent::FindErrorHandling);
    }
    None
}
