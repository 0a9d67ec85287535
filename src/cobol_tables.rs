//! §4.9 precomputed `cobolTableIndex` / `sqlTableIndex` / `moduleIndex`: the
//! specialized COBOL query intents (`CobolIntent`) route directly here and
//! short-circuit normal `comprehensiveSearch`, rather than falling through
//! to the general retrieval pipeline.
//!
//! Built on demand from the already-loaded `CodeIndex` (cheap relative to a
//! query's own search/synthesis cost, so no separate persistence or
//! incremental-maintenance story is needed, unlike the four §3 singleton
//! indexes).

use std::collections::HashMap;

use crate::code_index::CodeIndex;
use crate::cobol_synonyms::CobolIntent;
use crate::path_utils::module_token;
use crate::symbol::SymbolKind;

/// A COBOL-native table: a `01`-level data item with an `OCCURS` clause
/// (`parsers/cobol.rs`'s `occurs=`/`indexed_by=` attributes).
#[derive(Debug, Clone, PartialEq)]
pub struct CobolTableEntry {
    pub name: String,
    pub size: Option<u32>,
    pub indexed_by: Option<String>,
    pub file: String,
    pub line: u32,
}

/// A table referenced through an embedded `EXEC SQL` statement (or, for a
/// standalone `.sql` file, a `CREATE TABLE`).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTableEntry {
    pub name: String,
    pub operations: Vec<String>,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub files: Vec<String>,
    pub symbol_count: usize,
}

/// The three precomputed indexes, keyed by `path_utils::module_token`.
#[derive(Debug, Clone, Default)]
pub struct CobolTableIndex {
    tables: HashMap<String, Vec<CobolTableEntry>>,
    sql_tables: HashMap<String, Vec<SqlTableEntry>>,
    modules: HashMap<String, ModuleInfo>,
}

impl CobolTableIndex {
    /// Build from every COBOL-language file in `index`. SQL table
    /// references are also picked up from `.sql` files (`SymbolKind::Type`
    /// symbols from `parsers/sql.rs`'s `CREATE TABLE` recognition) so
    /// `LIST_SQL_TABLES`/`FIND_DATABASE` see tables defined either way.
    pub fn build(index: &CodeIndex) -> Self {
        let mut tables: HashMap<String, Vec<CobolTableEntry>> = HashMap::new();
        let mut sql_tables: HashMap<String, Vec<SqlTableEntry>> = HashMap::new();
        let mut modules: HashMap<String, ModuleInfo> = HashMap::new();

        for file in index.files().values() {
            let module = module_token(&file.path).unwrap_or_else(|| "root".to_string());
            let info = modules.entry(module.clone()).or_insert_with(|| ModuleInfo { files: Vec::new(), symbol_count: 0 });
            info.files.push(file.path.clone());
            info.symbol_count += file.symbols.len();

            if file.language != "cobol" && file.language != "sql" {
                continue;
            }

            for symbol in &file.symbols {
                if file.language == "cobol" && symbol.kind == SymbolKind::Record && symbol.attributes.iter().any(|a| a.starts_with("occurs=")) {
                    let size = symbol.attributes.iter().find_map(|a| a.strip_prefix("occurs=")).and_then(|v| v.parse().ok());
                    let indexed_by = symbol.attributes.iter().find_map(|a| a.strip_prefix("indexed_by=")).map(str::to_string);
                    tables.entry(module.clone()).or_default().push(CobolTableEntry { name: symbol.name.clone(), size, indexed_by, file: file.path.clone(), line: symbol.line });
                }

                let is_sql_ref = symbol.kind == SymbolKind::Type && (symbol.attributes.iter().any(|a| a == "sql") || file.language == "sql");
                if is_sql_ref {
                    let ops: Vec<String> = symbol.attributes.iter().filter_map(|a| a.strip_prefix("operations=")).flat_map(|v| v.split(',').map(str::to_string)).collect();
                    let entries = sql_tables.entry(module.clone()).or_default();
                    if let Some(existing) = entries.iter_mut().find(|e: &&mut SqlTableEntry| e.name == symbol.name) {
                        for op in ops {
                            if !existing.operations.contains(&op) {
                                existing.operations.push(op);
                            }
                        }
                    } else {
                        entries.push(SqlTableEntry { name: symbol.name.clone(), operations: ops, file: file.path.clone(), line: symbol.line });
                    }
                }
            }
        }

        Self { tables, sql_tables, modules }
    }

    pub fn tables_in_module(&self, module: &str) -> &[CobolTableEntry] {
        self.tables.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sql_tables_in_module(&self, module: &str) -> &[SqlTableEntry] {
        self.sql_tables.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn module_info(&self, module: &str) -> Option<&ModuleInfo> {
        self.modules.get(module)
    }

    /// All module tokens that have at least one indexed file.
    pub fn all_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = self.modules.keys().cloned().collect();
        modules.sort();
        modules
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.sql_tables.is_empty()
    }
}

/// §4.9/§8 scenario 1's COBOL table answer format: one bullet per table,
/// COBOL-native (`OCCURS`) tables first, then `EXEC SQL`/SQL-file tables.
/// `LIST_TABLES_IN_MODULE` scopes to `module_hints` when non-empty;
/// `LIST_ALL_TABLES`/`LIST_SQL_TABLES` always look across every module.
pub fn render_table_answer(intent: CobolIntent, module_hints: &[String], index: &CobolTableIndex) -> String {
    let include_cobol = !matches!(intent, CobolIntent::ListSqlTables);
    let include_sql = true;
    let scoped = matches!(intent, CobolIntent::ListTablesInModule);

    let target_modules: Vec<String> = if scoped && !module_hints.is_empty() { module_hints.to_vec() } else { index.all_modules() };

    let mut out = String::from("## Tables\n\n");
    let mut any = false;

    if include_cobol {
        for module in &target_modules {
            for t in index.tables_in_module(module) {
                any = true;
                let mut parts = Vec::new();
                if let Some(size) = t.size {
                    parts.push(format!("size {size}"));
                }
                if let Some(idx) = &t.indexed_by {
                    parts.push(format!("indexed by {idx}"));
                }
                parts.push(format!("line {}", t.line));
                out.push_str(&format!("- `{}` ({})\n", t.name, parts.join(", ")));
            }
        }
    }
    if include_sql {
        for module in &target_modules {
            for t in index.sql_tables_in_module(module) {
                any = true;
                out.push_str(&format!("- `{}` (SQL, operations: {})\n", t.name, t.operations.join(", ")));
            }
        }
    }
    if !any {
        out.push_str("_No tables found._\n");
    }
    out
}

/// §4.9 `MODULE_OVERVIEW`: file count and symbol count per module, scoped
/// to `module_hints` when non-empty.
pub fn render_module_overview(module_hints: &[String], index: &CobolTableIndex) -> String {
    let target_modules: Vec<String> = if module_hints.is_empty() { index.all_modules() } else { module_hints.to_vec() };

    let mut out = String::from("## Module Overview\n\n");
    if target_modules.is_empty() {
        out.push_str("_No modules found._\n");
        return out;
    }
    for module in &target_modules {
        match index.module_info(module) {
            Some(info) => out.push_str(&format!("- `{module}`: {} file(s), {} symbol(s)\n", info.files.len(), info.symbol_count)),
            None => out.push_str(&format!("- `{module}`: no data\n")),
        }
    }
    out
}
