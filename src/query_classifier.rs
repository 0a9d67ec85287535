//! C10 — QueryClassifier: learns a module map and term clusters from the
//! corpus, then classifies and expands user queries (§4.9).

use std::collections::{HashMap, HashSet};

use crate::cobol_synonyms::{self, CobolIntent};
use crate::code_index::CodeIndex;
use crate::path_utils::module_token;
use crate::tfidf::tokenize;

/// §4.9's general query types, plus the COBOL specialized intents which
/// short-circuit into `QueryClassification::cobol_intent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Concept,
    Structure,
    CallGraph,
    Implementation,
    Flow,
    FilesTrace,
    CrossModule,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Structure => "structure",
            Self::CallGraph => "call_graph",
            Self::Implementation => "implementation",
            Self::Flow => "flow",
            Self::FilesTrace => "files_trace",
            Self::CrossModule => "cross_module",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryClassification {
    pub query_type: QueryType,
    pub entities: Vec<String>,
    pub expanded_terms: Vec<String>,
    pub module_hints: Vec<String>,
    pub confidence: f32,
    /// Set only when a specialized COBOL query intent was detected; the
    /// caller should route directly to the precomputed indexes and skip
    /// normal `comprehensiveSearch` when this is `Some`.
    pub cobol_intent: Option<CobolIntent>,
}

/// §4.9's cap on `expandTerms` output.
const MAX_EXPANDED_TERMS: usize = 25;

/// Task verbs and stop words dropped before expansion (§4.9, §8 boundary
/// behavior "keyword extractor drops task verbs").
const TASK_VERBS: &[&str] = &[
    "explain", "describe", "find", "review", "show", "list", "summarize", "trace", "document",
    "generate", "translate", "compare", "analyze", "implement", "create", "write",
];
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "for", "to", "is", "are", "how", "what", "does", "do",
    "this", "that", "it", "and", "or", "with", "by", "from", "at", "as", "be", "been",
];

/// Module-alias table (§4.9 `expandTerms`: "btree" → file-stem prefixes)
/// and executor-style implementation-query prefixes.
const MODULE_ALIASES: &[(&str, &[&str])] = &[
    ("btree", &["nbtinsert", "nbtsearch", "nbtree"]),
    ("hash", &["nodeHashjoin", "ExecHashJoin", "HashJoinState"]),
];

/// §4.9 "how … implemented" executor-style prefix pairs: (base, prefix).
const EXECUTOR_PREFIXES: &[&str] = &["node", "Exec"];

/// A learned QueryClassifier: module map + term clusters + the static
/// synonym overlay. Built once per index build/rebuild via `learn`.
#[derive(Debug, Clone, Default)]
pub struct QueryClassifier {
    /// top-two-directory-components module token → identifier tokens seen
    /// in symbols from that module.
    module_map: HashMap<String, HashSet<String>>,
    /// tokens that co-occur in the same file above the frequency threshold.
    term_clusters: HashMap<String, HashSet<String>>,
}

/// §4.9: tokens co-occurring in ≥ this many shared files are clustered
/// together.
const CLUSTER_COOCCURRENCE_THRESHOLD: usize = 2;

impl QueryClassifier {
    /// Learning phase (§4.9), run after indexing and re-run after summaries.
    pub fn learn(index: &CodeIndex) -> Self {
        let mut module_map: HashMap<String, HashSet<String>> = HashMap::new();
        let mut file_tokens: HashMap<String, HashSet<String>> = HashMap::new();

        for file in index.files().values() {
            let module = module_token(&file.path).unwrap_or_else(|| "root".to_string());
            let entry = module_map.entry(module).or_default();
            let mut tokens = HashSet::new();
            for symbol in &file.symbols {
                for tok in tokenize(&symbol.name) {
                    entry.insert(tok.clone());
                    tokens.insert(tok);
                }
            }
            file_tokens.insert(file.path.clone(), tokens);
        }

        let mut cooccurrence: HashMap<(String, String), usize> = HashMap::new();
        for tokens in file_tokens.values() {
            let mut sorted: Vec<&String> = tokens.iter().collect();
            sorted.sort();
            for i in 0..sorted.len() {
                for j in (i + 1)..sorted.len() {
                    *cooccurrence.entry((sorted[i].clone(), sorted[j].clone())).or_insert(0) += 1;
                }
            }
        }

        let mut term_clusters: HashMap<String, HashSet<String>> = HashMap::new();
        for ((a, b), count) in cooccurrence {
            if count >= CLUSTER_COOCCURRENCE_THRESHOLD {
                term_clusters.entry(a.clone()).or_default().insert(b.clone());
                term_clusters.entry(b).or_default().insert(a);
            }
        }

        Self { module_map, term_clusters }
    }

    /// Module tokens whose identifier set intersects the query's tokens.
    fn module_hints(&self, query_tokens: &[String]) -> Vec<String> {
        let mut hints = Vec::new();
        for (module, idents) in &self.module_map {
            if query_tokens.iter().any(|t| idents.contains(t)) {
                hints.push(module.clone());
            }
        }
        hints.sort();
        hints
    }

    /// `expandTerms(query)`: camelCase split, module aliases, executor-style
    /// prefixes, domain dictionaries, COBOL synonyms, term clusters; deduped
    /// and capped at 25 terms (§4.9).
    pub fn expand_terms(&self, query: &str, is_cobol_context: bool) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut terms: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut push = |term: String, seen: &mut HashSet<String>, terms: &mut Vec<String>| {
            if seen.len() >= MAX_EXPANDED_TERMS {
                return;
            }
            if seen.insert(term.clone()) {
                terms.push(term);
            }
        };

        for tok in tokenize(&query) {
            if TASK_VERBS.contains(&tok.as_str()) || STOP_WORDS.contains(&tok.as_str()) {
                continue;
            }
            push(tok.clone(), &mut seen, &mut terms);

            for (alias, expansions) in MODULE_ALIASES {
                if tok == *alias {
                    for e in *expansions {
                        push(e.to_string(), &mut seen, &mut terms);
                    }
                }
            }

            if query_lower.contains("implement") {
                for prefix in EXECUTOR_PREFIXES {
                    push(format!("{prefix}{}", capitalize(&tok)), &mut seen, &mut terms);
                }
            }

            if is_cobol_context {
                for syn in cobol_synonyms::expand(&tok) {
                    push(syn.to_string(), &mut seen, &mut terms);
                }
            }

            if let Some(cluster) = self.term_clusters.get(&tok) {
                for related in cluster {
                    push(related.clone(), &mut seen, &mut terms);
                }
            }
        }

        terms.truncate(MAX_EXPANDED_TERMS);
        terms
    }

    /// Classify a query into `{type, entities, expandedTerms, moduleHints,
    /// confidence}`, detecting a COBOL specialized intent first.
    pub fn classify(&self, query: &str, is_cobol_context: bool) -> QueryClassification {
        let query_lower = query.to_lowercase();
        let cobol_intent = if is_cobol_context { cobol_synonyms::detect_intent(&query_lower) } else { None };

        let query_tokens: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| !TASK_VERBS.contains(&t.as_str()) && !STOP_WORDS.contains(&t.as_str()))
            .collect();

        let query_type = classify_type(&query_lower);
        let expanded_terms = self.expand_terms(query, is_cobol_context);
        let module_hints = self.module_hints(&query_tokens);

        let confidence = if cobol_intent.is_some() {
            0.95
        } else if !module_hints.is_empty() {
            0.8
        } else if query_type != QueryType::General {
            0.6
        } else {
            0.4
        };

        QueryClassification {
            query_type,
            entities: query_tokens,
            expanded_terms,
            module_hints,
            confidence,
            cobol_intent,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// §4.9 heuristic query-type classification over documented trigger phrases.
fn classify_type(query_lower: &str) -> QueryType {
    let has = |w: &str| query_lower.contains(w);

    if has("trace") || has("flow") || has("step") || has("sequence") {
        return QueryType::Flow;
    }
    if has("calls") || has("calling") || has("invoke") || has("caller") || has("callee") || has("call graph") {
        return QueryType::CallGraph;
    }
    if has("across module") || has("between module") || has("cross-module") {
        return QueryType::CrossModule;
    }
    if has("where is") || has("which file") || has("find file") || has("located") {
        return QueryType::FilesTrace;
    }
    if has("structure") || has("architecture") || has("organized") || has("layout") {
        return QueryType::Structure;
    }
    if has("how") && (has("implement") || has("work")) {
        return QueryType::Implementation;
    }
    if has("what is") || has("what does") || has("concept") || has("mean") {
        return QueryType::Concept;
    }
    QueryType::General
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index() -> CodeIndex {
        use crate::code_index::{BuildOptions, ContextFile};
        use crate::language::Language;
        let mut index = CodeIndex::new();
        let file = ContextFile {
            path: "src/btree/nbtinsert.c".to_string(),
            content: "int _bt_doinsert() { _bt_search(); return 0; }\nint _bt_search() { return 1; }\n".to_string(),
            language: Language::C,
        };
        index.build_sync(&[file], BuildOptions::default());
        index
    }

    #[test]
    fn classify_type_detects_call_graph() {
        assert_eq!(classify_type("who calls validate record"), QueryType::CallGraph);
    }

    #[test]
    fn classify_type_detects_implementation() {
        assert_eq!(classify_type("how is btree insertion implemented"), QueryType::Implementation);
    }

    #[test]
    fn classify_type_defaults_to_general() {
        assert_eq!(classify_type("random unrelated text"), QueryType::General);
    }

    #[test]
    fn expand_terms_includes_module_alias() {
        let classifier = QueryClassifier::default();
        let terms = classifier.expand_terms("explain btree insertion", false);
        assert!(terms.iter().any(|t| t == "nbtinsert"));
    }

    #[test]
    fn expand_terms_drops_task_verbs_and_stop_words() {
        let classifier = QueryClassifier::default();
        let terms = classifier.expand_terms("explain the main loop", false);
        assert!(!terms.contains(&"explain".to_string()));
        assert!(!terms.contains(&"the".to_string()));
    }

    #[test]
    fn expand_terms_caps_at_25() {
        let classifier = QueryClassifier::default();
        let long_query: String = (0..40).map(|i| format!("term{i} ")).collect();
        let terms = classifier.expand_terms(&long_query, false);
        assert!(terms.len() <= MAX_EXPANDED_TERMS);
    }

    #[test]
    fn learn_builds_module_map_from_index() {
        let index = build_index();
        let classifier = QueryClassifier::learn(&index);
        let hints = classifier.module_hints(&["doinsert".to_string()]);
        assert!(!hints.is_empty());
    }

    #[test]
    fn cobol_context_detects_table_intent() {
        let classifier = QueryClassifier::default();
        let classification = classifier.classify("show tables in payroll", true);
        assert_eq!(classification.cobol_intent, Some(CobolIntent::ListTablesInModule));
    }

    #[test]
    fn non_cobol_context_never_sets_cobol_intent() {
        let classifier = QueryClassifier::default();
        let classification = classifier.classify("show tables in payroll", false);
        assert_eq!(classification.cobol_intent, None);
    }
}
