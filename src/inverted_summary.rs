//! C7 — InvertedSummaryIndex: term → (symbol, score) postings over symbol
//! names and their summaries, for concept search (§3, §4.8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tfidf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryPosting {
    pub symbol: String,
    pub file: String,
    pub line: u32,
    pub score: f32,
}

/// §3 InvertedSummaryIndex — `Map<term, [{symbol,file,line,score}]>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedSummaryIndex {
    postings: HashMap<String, Vec<SummaryPosting>>,
}

pub struct SummaryDocument<'a> {
    pub symbol: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub summary: &'a str,
}

impl InvertedSummaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
    }

    /// Rebuilds the index from scratch out of `(symbol.name + " " + summary)`
    /// documents, tokenized the same way as §4.5.
    pub fn build<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = SummaryDocument<'a>>,
    {
        self.postings.clear();
        let docs: Vec<SummaryDocument> = documents.into_iter().collect();
        let num_docs = docs.len().max(1);

        let mut df: HashMap<String, usize> = HashMap::new();
        let mut per_doc_terms: Vec<HashMap<String, usize>> = Vec::with_capacity(docs.len());
        for doc in &docs {
            let text = format!("{} {}", doc.symbol, doc.summary);
            let mut counts: HashMap<String, usize> = HashMap::new();
            for token in tfidf::tokenize(&text) {
                *counts.entry(token).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            per_doc_terms.push(counts);
        }

        for (doc, counts) in docs.iter().zip(per_doc_terms.iter()) {
            let symbol_tokens: std::collections::HashSet<String> = tfidf::tokenize(doc.symbol).into_iter().collect();
            for (term, &tf) in counts {
                let doc_freq = *df.get(term).unwrap_or(&1);
                let idf_light = ((num_docs as f32 + 1.0) / (doc_freq as f32 + 1.0)).ln() + 1.0;
                let mut score = tf as f32 * idf_light;
                if symbol_tokens.contains(term) {
                    score *= 2.0;
                }
                self.postings.entry(term.clone()).or_default().push(SummaryPosting {
                    symbol: doc.symbol.to_string(),
                    file: doc.file.to_string(),
                    line: doc.line,
                    score,
                });
            }
        }

        for list in self.postings.values_mut() {
            list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    /// §4.8 `searchConcept(q, maxResults)` — ranks by combined term-hit
    /// score across all query terms; exact symbol-name matches are boosted.
    pub fn search_concept(&self, query: &str, max_results: usize) -> Vec<SummaryPosting> {
        self.search(query, max_results, true)
    }

    /// §4.8 `searchByKeyword(q)` — same ranking, summary content only
    /// (no name-match boost).
    pub fn search_by_keyword(&self, query: &str, max_results: usize) -> Vec<SummaryPosting> {
        self.search(query, max_results, false)
    }

    fn search(&self, query: &str, max_results: usize, boost_name_match: bool) -> Vec<SummaryPosting> {
        let query_terms = tfidf::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut combined: HashMap<String, SummaryPosting> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else { continue };
            for posting in postings {
                let key = format!("{}@{}", posting.symbol, posting.file);
                let mut boosted = posting.clone();
                if boost_name_match && posting.symbol.to_lowercase() == query.to_lowercase() {
                    boosted.score *= 1.5;
                }
                combined.entry(key).and_modify(|existing| existing.score += boosted.score).or_insert(boosted);
            }
        }

        let mut results: Vec<SummaryPosting> = combined.into_values().collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(max_results);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_concept_finds_matching_terms() {
        let mut index = InvertedSummaryIndex::new();
        index.build(vec![
            SummaryDocument { symbol: "parseConfig", file: "a.rs", line: 1, summary: "Parses the configuration file into a struct." },
            SummaryDocument { symbol: "writeLog", file: "b.rs", line: 5, summary: "Writes a message to the log file." },
        ]);
        let hits = index.search_concept("config", 10);
        assert!(hits.iter().any(|h| h.symbol == "parseConfig"));
    }

    #[test]
    fn exact_name_match_is_boosted() {
        let mut index = InvertedSummaryIndex::new();
        index.build(vec![
            SummaryDocument { symbol: "parse", file: "a.rs", line: 1, summary: "Handles generic work." },
            SummaryDocument { symbol: "other", file: "b.rs", line: 1, summary: "Also does parse related work." },
        ]);
        let hits = index.search_concept("parse", 10);
        assert_eq!(hits[0].symbol, "parse");
    }

    #[test]
    fn empty_query_returns_empty() {
        let mut index = InvertedSummaryIndex::new();
        index.build(vec![SummaryDocument { symbol: "x", file: "a.rs", line: 1, summary: "does a thing" }]);
        assert!(index.search_concept("", 10).is_empty());
    }

    #[test]
    fn clear_empties_index() {
        let mut index = InvertedSummaryIndex::new();
        index.build(vec![SummaryDocument { symbol: "x", file: "a.rs", line: 1, summary: "does a thing" }]);
        index.clear();
        assert!(index.is_empty());
    }
}
