//! C11 — SearchPipeline: the seven-phase `comprehensiveSearch` (§4.10).

use std::collections::HashMap;

use regex::Regex;

use crate::code_index::CodeIndex;
use crate::inverted_summary::InvertedSummaryIndex;
use crate::language::is_excluded_path;
use crate::path_utils::{common_prefix_len, dir_name, file_name, file_stem};
use crate::query_classifier::{QueryClassification, QueryType};
use crate::tfidf::TfIdfVocab;
use crate::trigram_index::{SearchOptions, TrigramIndex};
use crate::vector_index::VectorIndex;

#[derive(Debug, Clone, PartialEq)]
pub enum ResultSource {
    Summary,
    FilenameDir,
    Symbol,
    Trigram,
    Grep,
    Vector,
    CallGraph,
    Fuzzy,
}

/// §4.10's `{name, type, source, score, content?}` accumulated search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub name: String,
    pub result_type: &'static str,
    pub file: String,
    pub line: u32,
    pub sources: Vec<ResultSource>,
    pub score: f32,
    pub content: Option<String>,
}

/// Per-query-type boost multipliers (§4.10 table). Phases not listed in the
/// table (grep/vector/call-graph/fuzzy) use their own fixed base scores.
struct Boosts {
    summary: f32,
    symbol: f32,
    trigram: f32,
    filename_dir: f32,
}

fn boosts_for(query_type: QueryType) -> Boosts {
    match query_type {
        QueryType::Concept => Boosts { summary: 2.5, symbol: 1.2, trigram: 0.5, filename_dir: 1.0 },
        QueryType::Structure => Boosts { summary: 0.5, symbol: 3.0, trigram: 1.5, filename_dir: 0.8 },
        QueryType::CallGraph => Boosts { summary: 0.8, symbol: 2.5, trigram: 0.8, filename_dir: 0.5 },
        QueryType::Implementation => Boosts { summary: 2.0, symbol: 2.5, trigram: 1.5, filename_dir: 1.2 },
        QueryType::Flow => Boosts { summary: 2.0, symbol: 1.5, trigram: 0.8, filename_dir: 1.0 },
        QueryType::FilesTrace => Boosts { summary: 1.5, symbol: 1.0, trigram: 0.8, filename_dir: 3.0 },
        QueryType::CrossModule => Boosts { summary: 1.0, symbol: 2.0, trigram: 0.5, filename_dir: 1.5 },
        QueryType::General => Boosts { summary: 1.5, symbol: 1.2, trigram: 1.5, filename_dir: 1.0 },
    }
}

fn call_graph_trigger() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)trace|flow|calls?|calling|invokes?").unwrap())
}

/// The C11 search pipeline: a read-only view over the process-wide indexes.
pub struct SearchPipeline<'a> {
    pub code_index: &'a CodeIndex,
    pub trigram_index: Option<&'a TrigramIndex>,
    pub vector_index: Option<&'a VectorIndex>,
    pub vocab: Option<&'a TfIdfVocab>,
    pub inverted_summary: &'a InvertedSummaryIndex,
}

impl<'a> SearchPipeline<'a> {
    pub fn comprehensive_search(&self, query: &str, classification: &QueryClassification) -> Vec<SearchResult> {
        let boosts = boosts_for(classification.query_type);
        let mut acc: HashMap<(String, u32), SearchResult> = HashMap::new();

        self.phase0_summary(query, classification, &boosts, &mut acc);
        self.phase1_filename_dir(classification, &boosts, &mut acc);
        self.phase2_symbol(classification, &boosts, &mut acc);
        self.phase3_trigram(classification, &boosts, &mut acc);
        if self.trigram_index.is_none() {
            self.phase4_grep(classification, &mut acc);
        }
        self.phase5_vector(query, &mut acc);
        if call_graph_trigger().is_match(query) {
            self.phase6_call_graph(classification, &mut acc);
        }
        if acc.len() < 5 {
            self.phase7_fuzzy(classification, &mut acc);
        }

        let mut results: Vec<SearchResult> = acc.into_values().collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results
    }

    fn merge(acc: &mut HashMap<(String, u32), SearchResult>, mut result: SearchResult) {
        let key = (result.file.clone(), result.line);
        acc.entry(key)
            .and_modify(|existing| {
                existing.score += result.score;
                for source in result.sources.drain(..) {
                    if !existing.sources.contains(&source) {
                        existing.sources.push(source);
                    }
                }
            })
            .or_insert(result);
    }

    /// Phase 0 — inverted-summary / concept: base `2.0 + 0.3 * rawScore`.
    fn phase0_summary(&self, query: &str, classification: &QueryClassification, boosts: &Boosts, acc: &mut HashMap<(String, u32), SearchResult>) {
        let mut terms = vec![query.to_string()];
        terms.extend(classification.expanded_terms.iter().cloned());
        let joined = terms.join(" ");
        for posting in self.inverted_summary.search_concept(&joined, 30) {
            if is_excluded_path(&posting.file) {
                continue;
            }
            let base = 2.0 + 0.3 * posting.score;
            Self::merge(
                acc,
                SearchResult {
                    name: posting.symbol.clone(),
                    result_type: "summary",
                    file: posting.file,
                    line: posting.line,
                    sources: vec![ResultSource::Summary],
                    score: base * boosts.summary,
                    content: None,
                },
            );
        }
    }

    /// Phase 1 — filename & directory match.
    fn phase1_filename_dir(&self, classification: &QueryClassification, boosts: &Boosts, acc: &mut HashMap<(String, u32), SearchResult>) {
        for file in self.code_index.files().values() {
            if is_excluded_path(&file.path) {
                continue;
            }
            let stem = file_stem(&file.path).to_lowercase();
            let dir = dir_name(&file.path).to_lowercase();
            let lower_path = file.path.to_lowercase();

            for keyword in &classification.expanded_terms {
                let kw = keyword.to_lowercase();
                if kw.len() < 2 {
                    continue;
                }
                let mut base = 0.0f32;
                if dir.split('/').any(|seg| seg == kw) {
                    base = 1.7;
                } else if stem == kw {
                    base = 1.5;
                } else if common_prefix_len(&stem, &kw) >= 4 {
                    base = 1.4;
                } else if lower_path.contains(&kw) {
                    base = 1.0;
                }
                if base > 0.0 {
                    Self::merge(
                        acc,
                        SearchResult {
                            name: file_name(&file.path),
                            result_type: "file",
                            file: file.path.clone(),
                            line: 1,
                            sources: vec![ResultSource::FilenameDir],
                            score: base * boosts.filename_dir,
                            content: None,
                        },
                    );
                }
            }
        }
    }

    /// Phase 2 — symbol exact/partial match.
    fn phase2_symbol(&self, classification: &QueryClassification, boosts: &Boosts, acc: &mut HashMap<(String, u32), SearchResult>) {
        for symbol in self.code_index.symbols().values() {
            if is_excluded_path(&symbol.file) {
                continue;
            }
            let name_lower = symbol.name.to_lowercase();
            for keyword in &classification.entities {
                let kw = keyword.to_lowercase();
                let base = if name_lower == kw {
                    1.3
                } else if kw.len() >= 3 && name_lower.contains(&kw) {
                    1.0
                } else {
                    continue;
                };
                Self::merge(
                    acc,
                    SearchResult {
                        name: symbol.name.clone(),
                        result_type: symbol.kind.as_str(),
                        file: symbol.file.clone(),
                        line: symbol.line,
                        sources: vec![ResultSource::Symbol],
                        score: base * boosts.symbol,
                        content: None,
                    },
                );
            }
        }
    }

    /// Phase 3 — trigram, on the top 3 keywords with `|kw| >= 3`.
    fn phase3_trigram(&self, classification: &QueryClassification, boosts: &Boosts, acc: &mut HashMap<(String, u32), SearchResult>) {
        let Some(trigram_index) = self.trigram_index else { return };
        let keywords: Vec<&String> = classification.expanded_terms.iter().filter(|k| k.len() >= 3).take(3).collect();
        let opts = SearchOptions::default();
        for keyword in keywords {
            for hit in trigram_index.search(keyword, &opts) {
                for m in &hit.matches {
                    if is_excluded_path(&m.file) {
                        continue;
                    }
                    Self::merge(
                        acc,
                        SearchResult {
                            name: keyword.clone(),
                            result_type: "trigram",
                            file: m.file.clone(),
                            line: m.line,
                            sources: vec![ResultSource::Trigram],
                            score: 0.8 * boosts.trigram,
                            content: Some(m.context.clone()),
                        },
                    );
                }
            }
        }
    }

    /// Phase 4 — grep fallback (linear scan), only when no trigram index.
    fn phase4_grep(&self, classification: &QueryClassification, acc: &mut HashMap<(String, u32), SearchResult>) {
        for file in self.code_index.files().values() {
            if is_excluded_path(&file.path) {
                continue;
            }
            for keyword in &classification.expanded_terms {
                if file.path.to_lowercase().contains(&keyword.to_lowercase()) {
                    Self::merge(
                        acc,
                        SearchResult {
                            name: keyword.clone(),
                            result_type: "grep",
                            file: file.path.clone(),
                            line: 1,
                            sources: vec![ResultSource::Grep],
                            score: 0.6,
                            content: None,
                        },
                    );
                }
            }
        }
    }

    /// Phase 5 — hybrid vector search, top-20, base `0.5 + similarity * 0.5`.
    fn phase5_vector(&self, query: &str, acc: &mut HashMap<(String, u32), SearchResult>) {
        let Some(vector_index) = self.vector_index else { return };
        for hit in vector_index.search(query, 20, self.vocab) {
            let Some(chunk) = vector_index.chunks.iter().find(|c| c.id == hit.chunk_id) else { continue };
            Self::merge(
                acc,
                SearchResult {
                    name: chunk.symbol_name.clone().unwrap_or_else(|| chunk.file_name.clone()),
                    result_type: "vector",
                    file: chunk.file.clone(),
                    line: chunk.start_line,
                    sources: vec![ResultSource::Vector],
                    score: 0.5 + hit.score * 0.5,
                    content: Some(chunk.text.clone()),
                },
            );
        }
    }

    /// Phase 6 — call-graph traversal when the query hints at tracing calls.
    fn phase6_call_graph(&self, classification: &QueryClassification, acc: &mut HashMap<(String, u32), SearchResult>) {
        for keyword in &classification.entities {
            let Some(symbol) = self.code_index.symbols().get(keyword) else { continue };
            if is_excluded_path(&symbol.file) {
                continue;
            }
            let mut related = Vec::new();
            if let Some(callees) = self.code_index.call_graph().get(keyword) {
                related.extend(callees.iter().cloned());
            }
            if let Some(callers) = self.code_index.reverse_call_graph().get(keyword) {
                related.extend(callers.iter().cloned());
            }
            for name in related {
                let Some(related_symbol) = self.code_index.symbols().get(&name) else { continue };
                Self::merge(
                    acc,
                    SearchResult {
                        name: name.clone(),
                        result_type: related_symbol.kind.as_str(),
                        file: related_symbol.file.clone(),
                        line: related_symbol.line,
                        sources: vec![ResultSource::CallGraph],
                        score: 0.7,
                        content: None,
                    },
                );
            }
        }
    }

    /// Phase 7 — fuzzy symbol search, last resort when `|results| < 5`.
    fn phase7_fuzzy(&self, classification: &QueryClassification, acc: &mut HashMap<(String, u32), SearchResult>) {
        for symbol in self.code_index.symbols().values() {
            if is_excluded_path(&symbol.file) {
                continue;
            }
            for keyword in &classification.entities {
                let score = fuzzy_score(keyword, &symbol.name);
                if score <= 0.0 {
                    continue;
                }
                Self::merge(
                    acc,
                    SearchResult {
                        name: symbol.name.clone(),
                        result_type: symbol.kind.as_str(),
                        file: symbol.file.clone(),
                        line: symbol.line,
                        sources: vec![ResultSource::Fuzzy],
                        score: (score / 100.0 * 0.5).min(0.4),
                        content: None,
                    },
                );
            }
        }
    }
}

/// Fuzzy match combining CamelCase-abbreviation, word-boundary, and
/// subsequence matching, scaled 0..100 before the caller normalizes it.
fn fuzzy_score(keyword: &str, candidate: &str) -> f32 {
    let kw = keyword.to_lowercase();
    let cand_lower = candidate.to_lowercase();
    if kw.is_empty() {
        return 0.0;
    }

    // CamelCase-abbreviation: keyword letters match candidate's uppercase
    // initials in order (e.g. "gfc" -> "getFunctionContext").
    let initials: String = candidate.chars().filter(|c| c.is_uppercase()).collect::<String>().to_lowercase();
    if !initials.is_empty() && initials.contains(&kw) {
        return 90.0;
    }

    // Word-boundary: keyword matches a `_`/case-boundary-delimited word.
    if cand_lower.split(|c: char| c == '_' || c == '-').any(|w| w == kw) {
        return 80.0;
    }

    // Subsequence: every keyword char appears in candidate, in order.
    let mut chars = cand_lower.chars();
    if kw.chars().all(|c| chars.by_ref().any(|cc| cc == c)) {
        let ratio = kw.len() as f32 / cand_lower.len().max(1) as f32;
        return 40.0 + ratio * 30.0;
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_index::{BuildOptions, CodeIndex, ContextFile};
    use crate::language::Language;
    use crate::query_classifier::QueryClassifier;

    fn sample_index() -> CodeIndex {
        let mut index = CodeIndex::new();
        let file = ContextFile {
            path: "src/btree/nbtinsert.c".to_string(),
            content: "int _bt_doinsert() { _bt_search(); _bt_insertonpg(); return 0; }\nint _bt_search() { return 1; }\nint _bt_insertonpg() { return 2; }\n".to_string(),
            language: Language::C,
        };
        index.build_sync(&[file], BuildOptions::default());
        index
    }

    #[test]
    fn comprehensive_search_finds_symbol_by_exact_name() {
        let index = sample_index();
        let classifier = QueryClassifier::learn(&index);
        let classification = classifier.classify("_bt_doinsert", false);
        let inverted = InvertedSummaryIndex::new();
        let pipeline = SearchPipeline { code_index: &index, trigram_index: None, vector_index: None, vocab: None, inverted_summary: &inverted };
        let results = pipeline.comprehensive_search("_bt_doinsert", &classification);
        assert!(results.iter().any(|r| r.name == "_bt_doinsert"));
    }

    #[test]
    fn call_graph_phase_triggers_on_trace_keyword() {
        let index = sample_index();
        let classifier = QueryClassifier::learn(&index);
        let classification = classifier.classify("trace _bt_doinsert calls", false);
        let inverted = InvertedSummaryIndex::new();
        let pipeline = SearchPipeline { code_index: &index, trigram_index: None, vector_index: None, vocab: None, inverted_summary: &inverted };
        let results = pipeline.comprehensive_search("trace _bt_doinsert calls", &classification);
        assert!(results.iter().any(|r| r.name == "_bt_search"));
    }

    #[test]
    fn fuzzy_subsequence_scores_positive() {
        assert!(fuzzy_score("gfc", "getFunctionContext") > 0.0);
        assert_eq!(fuzzy_score("zzz", "getFunctionContext"), 0.0);
    }
}
