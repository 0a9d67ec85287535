//! C4 — CodeIndex: in-memory symbol table, call graph, reverse call graph,
//! per-file records, variable-access tracking, summaries, and domain
//! discovery (§3, §4.2).

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AstraError;
use crate::language::Language;
use crate::parsers;
use crate::path_utils;
use crate::symbol::{AccessKind, FileRecord, Symbol, VariableAccess, VariableInfo};

/// Files are yielded to the scheduler every `BATCH_SIZE` during `build_async`.
pub const BATCH_SIZE: usize = 50;
const LIGHTWEIGHT_MAX_SYMBOLS_PER_FILE: usize = 500;
const LIGHTWEIGHT_MAX_VARS_PER_FILE: usize = 100;
const LIGHTWEIGHT_CALLGRAPH_SKIP_BYTES: usize = 50 * 1024;
const KEY_TERMS_LIMIT: usize = 30;
const MODULES_LIMIT: usize = 15;

/// §4.2 `discoverDomain()` output, stored on the index and cleared with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainFingerprint {
    pub languages: HashMap<String, usize>,
    pub key_terms: Vec<String>,
    pub modules: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub lightweight: bool,
    pub force_rebuild: bool,
}

/// §3's process-wide CodeIndex singleton. Single-writer: only indexing code
/// mutates it; queries read it (usually through `CoreServices`'s lock).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CodeIndex {
    files: HashMap<String, FileRecord>,
    /// Dual-keyed: both `name` (last writer wins) and `name@path` (stable).
    symbols: HashMap<String, Symbol>,
    variables: HashMap<String, VariableInfo>,
    call_graph: HashMap<String, HashSet<String>>,
    reverse_call_graph: HashMap<String, HashSet<String>>,
    dependencies: HashMap<String, HashSet<String>>,
    summaries: HashMap<String, Symbol>,
    file_summaries: HashMap<String, String>,
    overall_summary: Option<String>,
    discovered_domain: Option<DomainFingerprint>,
    last_updated: u64,
}

/// One file's raw content plus its detected language, the unit of work fed
/// into `build_sync`/`build_async`.
pub struct ContextFile {
    pub path: String,
    pub content: String,
    pub language: Language,
}

impl CodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &HashMap<String, FileRecord> {
        &self.files
    }

    pub fn symbols(&self) -> &HashMap<String, Symbol> {
        &self.symbols
    }

    pub fn variables(&self) -> &HashMap<String, VariableInfo> {
        &self.variables
    }

    pub fn call_graph(&self) -> &HashMap<String, HashSet<String>> {
        &self.call_graph
    }

    pub fn reverse_call_graph(&self) -> &HashMap<String, HashSet<String>> {
        &self.reverse_call_graph
    }

    pub fn summaries(&self) -> &HashMap<String, Symbol> {
        &self.summaries
    }

    pub fn file_summaries(&self) -> &HashMap<String, String> {
        &self.file_summaries
    }

    pub fn overall_summary(&self) -> Option<&str> {
        self.overall_summary.as_deref()
    }

    pub fn discovered_domain(&self) -> Option<&DomainFingerprint> {
        self.discovered_domain.as_ref()
    }

    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    pub fn set_file_summary(&mut self, path: &str, summary: String) {
        self.file_summaries.insert(path.to_string(), summary);
    }

    pub fn set_overall_summary(&mut self, summary: String) {
        self.overall_summary = Some(summary);
    }

    /// §4.7: record a function summary under its qualified `name@path` key
    /// (invariant (iv) — only qualified keys belong in `summaries`).
    pub fn record_summary(&mut self, qualified_key: String, symbol: Symbol) {
        self.summaries.insert(qualified_key, symbol);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// §4.2 `buildSync` — small sets, no yielding, single pass then a second
    /// pass for variable accesses.
    pub fn build_sync(&mut self, context_files: &[ContextFile], opts: BuildOptions) {
        self.clear();
        for file in context_files {
            self.index_one_file(file, opts);
        }
        for file in context_files {
            self.compute_variable_accesses(file, opts);
        }
        self.touch();
    }

    /// §4.2 `buildAsync` — large sets, yielding to the scheduler every
    /// `BATCH_SIZE` files. `on_progress(files_indexed, total)` is called once
    /// per batch. Honors `opts.force_rebuild` by always clearing first (the
    /// caller is responsible for deciding whether a rebuild is needed at
    /// all; this method always (re)builds what it's given).
    pub async fn build_async<F>(&mut self, context_files: &[ContextFile], opts: BuildOptions, mut on_progress: F)
    where
        F: FnMut(usize, usize),
    {
        self.clear();
        let total = context_files.len();

        for (i, file) in context_files.iter().enumerate() {
            self.index_one_file(file, opts);
            if (i + 1) % BATCH_SIZE == 0 {
                on_progress(i + 1, total);
                tokio::task::yield_now().await;
            }
        }
        on_progress(total, total);

        for (i, file) in context_files.iter().enumerate() {
            self.compute_variable_accesses(file, opts);
            if (i + 1) % BATCH_SIZE == 0 {
                tokio::task::yield_now().await;
            }
        }

        self.touch();
    }

    fn index_one_file(&mut self, file: &ContextFile, opts: BuildOptions) {
        let line_count = file.content.lines().count() as u32;
        let mut symbols = parsers::parse(&file.content, file.language);

        if opts.lightweight && symbols.len() > LIGHTWEIGHT_MAX_SYMBOLS_PER_FILE {
            symbols.truncate(LIGHTWEIGHT_MAX_SYMBOLS_PER_FILE);
        }
        for symbol in &mut symbols {
            symbol.file = file.path.clone();
        }

        let skip_call_graph = opts.lightweight && file.content.len() > LIGHTWEIGHT_CALLGRAPH_SKIP_BYTES;

        for symbol in &symbols {
            self.symbols.insert(symbol.name.clone(), symbol.clone());
            self.symbols.insert(symbol.qualified_key(), symbol.clone());

            if !skip_call_graph && symbol.is_callable() {
                let callees = parsers::find_calls(&file.content, symbol, file.language);
                for callee in callees {
                    self.add_call_edge(&symbol.name, &callee);
                }
            }
        }

        for dep in extract_dependency_tokens(&file.content, file.language) {
            self.dependencies.entry(file.path.clone()).or_default().insert(dep);
        }

        self.files.insert(
            file.path.clone(),
            FileRecord {
                path: file.path.clone(),
                language: file.language.as_str().to_string(),
                line_count,
                symbols,
            },
        );
    }

    /// §4.2 "reverse call graph is maintained incrementally": insert `(a→b)`
    /// and `(b←a)` atomically (invariant (i)).
    pub fn add_call_edge(&mut self, caller: &str, callee: &str) {
        self.call_graph.entry(caller.to_string()).or_default().insert(callee.to_string());
        self.reverse_call_graph.entry(callee.to_string()).or_default().insert(caller.to_string());
    }

    /// §4.3 variable access tracking — second pass over each file's content,
    /// run after symbol extraction so declaration lines are already known.
    fn compute_variable_accesses(&mut self, file: &ContextFile, opts: BuildOptions) {
        let Some(record) = self.files.get(&file.path) else { return };
        let var_names: Vec<(String, u32)> = record
            .symbols
            .iter()
            .filter(|s| matches!(s.kind, crate::symbol::SymbolKind::Variable | crate::symbol::SymbolKind::Field))
            .map(|s| (s.name.clone(), s.line))
            .collect();

        let mut tracked = 0usize;
        for (name, decl_line) in var_names {
            if opts.lightweight && tracked >= LIGHTWEIGHT_MAX_VARS_PER_FILE {
                break;
            }
            let key = format!("{}@{}", name, file.path);
            let Ok(word_re) = Regex::new(&format!(r"\b{}\b", regex::escape(&name))) else {
                continue;
            };

            for (idx, line) in file.content.lines().enumerate() {
                let line_no = (idx + 1) as u32;
                if line_no == decl_line || !word_re.is_match(line) {
                    continue;
                }
                let kind = if is_write_pattern(line, &name, file.language) { AccessKind::Write } else { AccessKind::Read };
                let context: String = line.chars().take(80).collect();
                self.variables.entry(key.clone()).or_default().accesses.push(VariableAccess {
                    file: file.path.clone(),
                    line: line_no,
                    kind,
                    context,
                });
            }
            tracked += 1;
        }
    }

    /// §4.2 `discoverDomain()`.
    pub fn discover_domain(&mut self) -> &DomainFingerprint {
        let mut languages: HashMap<String, usize> = HashMap::new();
        let mut module_counts: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for record in self.files.values() {
            *languages.entry(record.language.clone()).or_insert(0) += 1;
            let module = path_utils::module_token(&record.path).unwrap_or_else(|| "root".to_string());
            *module_counts.entry(module).or_insert(0) += 1;
        }

        for symbol in self.symbols.values() {
            for token in split_identifier(&symbol.name) {
                if token.len() < 3 || is_stopword(&token) {
                    continue;
                }
                *term_freq.entry(token.to_lowercase()).or_insert(0) += 1;
            }
        }

        let mut key_terms: Vec<(String, usize)> = term_freq.into_iter().collect();
        key_terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let key_terms: Vec<String> = key_terms.into_iter().take(KEY_TERMS_LIMIT).map(|(t, _)| t).collect();

        let mut modules: Vec<(String, usize)> = module_counts.into_iter().collect();
        modules.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let modules: Vec<String> = modules.into_iter().take(MODULES_LIMIT).map(|(m, _)| m).collect();

        let dominant_lang = languages.iter().max_by_key(|(_, count)| **count).map(|(lang, _)| lang.clone());
        let description = match dominant_lang {
            Some(lang) => format!("{} codebase with {} indexed files across {} modules", lang, self.files.len(), modules.len()),
            None => "empty codebase".to_string(),
        };

        self.discovered_domain = Some(DomainFingerprint { languages, key_terms, modules, description });
        self.discovered_domain.as_ref().unwrap()
    }

    /// Invariant checks (§3 (i)-(iv)), exposed for tests and for the
    /// persistence restore path (§8's round-trip property).
    pub fn check_invariants(&self) -> Result<(), AstraError> {
        for (caller, callees) in &self.call_graph {
            for callee in callees {
                let back = self.reverse_call_graph.get(callee);
                if !back.is_some_and(|set| set.contains(caller)) {
                    return Err(AstraError::IndexCorruption {
                        kind: "call_graph".to_string(),
                        message: format!("missing reverse edge {} <- {}", callee, caller),
                    });
                }
            }
        }
        for (callee, callers) in &self.reverse_call_graph {
            for caller in callers {
                let fwd = self.call_graph.get(caller);
                if !fwd.is_some_and(|set| set.contains(callee)) {
                    return Err(AstraError::IndexCorruption {
                        kind: "call_graph".to_string(),
                        message: format!("missing forward edge {} -> {}", caller, callee),
                    });
                }
            }
        }
        for symbol in self.symbols.values() {
            if !self.files.contains_key(&symbol.file) {
                return Err(AstraError::IndexCorruption {
                    kind: "symbols".to_string(),
                    message: format!("symbol '{}' references unknown file '{}'", symbol.name, symbol.file),
                });
            }
        }
        for key in self.summaries.keys() {
            if !crate::symbol::is_qualified_key(key) {
                return Err(AstraError::IndexCorruption {
                    kind: "summaries".to_string(),
                    message: format!("summary key '{}' is not a qualified name@path key", key),
                });
            }
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_updated = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    }
}

fn split_identifier(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' || c == '@' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() && !current.chars().last().unwrap().is_uppercase() {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_stopword(token: &str) -> bool {
    matches!(
        token.to_lowercase().as_str(),
        "the" | "and" | "for" | "with" | "from" | "into" | "this" | "that" | "get" | "set" | "new"
    )
}

fn extract_dependency_tokens(content: &str, language: Language) -> Vec<String> {
    let re = match language {
        Language::C | Language::Cpp => Regex::new(r#"^\s*#include\s*[<"]([^>"]+)[>"]"#),
        Language::Java | Language::Kotlin | Language::Scala => Regex::new(r"^\s*import\s+([A-Za-z0-9_.\*]+)"),
        Language::Python => Regex::new(r"^\s*(?:from\s+(\S+)\s+import|import\s+(\S+))"),
        Language::JavaScript | Language::TypeScript => Regex::new(r#"(?:import .* from|require\()\s*['"]([^'"]+)['"]"#),
        Language::Go => Regex::new(r#"^\s*"([^"]+)"\s*$"#),
        Language::Rust => Regex::new(r"^\s*use\s+([A-Za-z0-9_:]+)"),
        Language::CSharp => Regex::new(r"^\s*using\s+([A-Za-z0-9_.]+)\s*;"),
        Language::Cobol => Regex::new(r"(?i)^\s*COPY\s+([A-Za-z0-9\-_]+)"),
        _ => return Vec::new(),
    };
    let Ok(re) = re else { return Vec::new() };
    let mut deps = Vec::new();
    for line in content.lines() {
        if let Some(cap) = re.captures(line) {
            let token = cap.iter().skip(1).flatten().next().map(|m| m.as_str().to_string());
            if let Some(token) = token {
                deps.push(token);
            }
        }
    }
    deps
}

fn is_write_pattern(line: &str, name: &str, language: Language) -> bool {
    let escaped = regex::escape(name);
    let patterns: &[String] = &match language {
        Language::Cobol => vec![
            format!(r"(?i)\bMOVE\s+.+\s+TO\s+{}\b", escaped),
            format!(r"(?i)\bADD\s+.+\s+TO\s+{}\b", escaped),
            format!(r"(?i)\bCOMPUTE\s+{}\s*=", escaped),
            format!(r"(?i)\bINTO\s+{}\b", escaped),
            format!(r"(?i)\bACCEPT\s+{}\b", escaped),
            format!(r"(?i)\bUNSTRING\s+.+\s+INTO\s+.*{}\b", escaped),
        ],
        Language::Tal => vec![format!(r"{}\s*:=", escaped), format!(r"@{}\s*:=", escaped)],
        Language::Sql => vec![format!(r"(?i)\bSET\s+{}\s*=", escaped), format!(r"(?i)\bINTO\s+{}\b", escaped), format!(r"(?i)\bFETCH\s+.+\s+INTO\s+.*{}\b", escaped)],
        Language::Python => vec![format!(r"\bfor\s+{}\s+in\b", escaped), format!(r"{}\s*[\+\-\*/]?=[^=]", escaped)],
        _ => vec![format!(r"{}\s*[\+\-\*/]?=[^=]", escaped), format!(r"{}\s*(\+\+|--)", escaped), format!(r"(\+\+|--)\s*{}", escaped)],
    };
    patterns.iter().filter_map(|p| Regex::new(p).ok()).any(|re| re.is_match(line))
}
