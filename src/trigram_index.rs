//! C5 — TrigramIndex: a Zoekt-style 3-gram inverted index over file content
//! (§3, §4.4).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// §8: files larger than this are skipped by the trigram index (and by
/// full-file vector chunking).
pub const MAX_FILE_SIZE: usize = 500_000;
/// Cap on positions recorded per (trigram, file) pair, to keep pathologically
/// repetitive files (e.g. generated data) from blowing up posting lists.
pub const MAX_POSITIONS_PER_FILE: usize = 1000;
const MAX_MATCHES_PER_FILE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Posting {
    pub file: String,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub max_results: usize,
    pub context_chars: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { case_sensitive: false, max_results: 20, context_chars: 40 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrigramMatch {
    pub file: String,
    pub line: u32,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrigramSearchResult {
    pub file: String,
    pub matches: Vec<TrigramMatch>,
}

/// §3 TrigramIndex — `Map<3-char string, [{file, positions}]>` plus the raw
/// file content needed for literal re-scans at query time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrigramIndex {
    trigrams: HashMap<String, Vec<Posting>>,
    file_content: HashMap<String, String>,
}

impl TrigramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.file_content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_content.is_empty()
    }

    pub fn trigram_count(&self) -> usize {
        self.trigrams.len()
    }

    pub fn clear(&mut self) {
        self.trigrams.clear();
        self.file_content.clear();
    }

    /// §4.4 `indexFile` — rejects files over `MAX_FILE_SIZE`, skips
    /// whitespace-only trigrams, caps positions per (trigram, file).
    pub fn index_file(&mut self, path: &str, content: &str) {
        if content.len() > MAX_FILE_SIZE {
            return;
        }

        let lower = content.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let mut per_trigram_positions: HashMap<String, Vec<u32>> = HashMap::new();

        for i in 0..chars.len().saturating_sub(2) {
            let trigram: String = chars[i..i + 3].iter().collect();
            if trigram.trim().is_empty() {
                continue;
            }
            let positions = per_trigram_positions.entry(trigram).or_default();
            if positions.len() < MAX_POSITIONS_PER_FILE {
                positions.push(i as u32);
            }
        }

        for (trigram, positions) in per_trigram_positions {
            self.trigrams.entry(trigram).or_default().push(Posting { file: path.to_string(), positions });
        }

        self.file_content.insert(path.to_string(), content.to_string());
    }

    /// The lightweight variant: preferentially indexes smaller code files
    /// first, stopping at `max_files`, so startup search is available before
    /// the full index finishes building.
    pub fn build_lightweight<'a, I>(&mut self, files: I, max_files: usize, max_file_size: usize)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut sorted: Vec<(&str, &str)> = files.into_iter().filter(|(_, c)| c.len() <= max_file_size).collect();
        sorted.sort_by_key(|(_, content)| content.len());
        for (path, content) in sorted.into_iter().take(max_files) {
            self.index_file(path, content);
        }
    }

    /// §4.4 `search` — returns empty for queries under 3 chars or when any
    /// trigram of the query has no postings at all.
    pub fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TrigramSearchResult> {
        if query.chars().count() < 3 {
            return Vec::new();
        }

        let lookup_query = if opts.case_sensitive { query.to_string() } else { query.to_lowercase() };
        let trigrams = query_trigrams(&lookup_query);
        if trigrams.is_empty() {
            return Vec::new();
        }

        let mut candidate_files: Option<std::collections::HashSet<String>> = None;
        for trigram in &trigrams {
            let files: std::collections::HashSet<String> = match self.trigrams.get(trigram) {
                Some(postings) => postings.iter().map(|p| p.file.clone()).collect(),
                None => return Vec::new(),
            };
            candidate_files = Some(match candidate_files {
                Some(existing) => existing.intersection(&files).cloned().collect(),
                None => files,
            });
        }
        let Some(candidate_files) = candidate_files else { return Vec::new() };

        let mut results: Vec<TrigramSearchResult> = Vec::new();
        for file in candidate_files {
            let Some(content) = self.file_content.get(&file) else { continue };
            let matches = scan_literal_occurrences(content, query, opts);
            if !matches.is_empty() {
                results.push(TrigramSearchResult { file, matches });
            }
        }

        results.sort_by(|a, b| b.matches.len().cmp(&a.matches.len()).then_with(|| a.file.cmp(&b.file)));
        results.truncate(opts.max_results);
        results
    }
}

fn query_trigrams(query: &str) -> Vec<String> {
    let chars: Vec<char> = query.chars().collect();
    let mut trigrams = Vec::new();
    for i in 0..chars.len().saturating_sub(2) {
        let tri: String = chars[i..i + 3].iter().collect();
        if !tri.trim().is_empty() {
            trigrams.push(tri);
        }
    }
    trigrams
}

fn scan_literal_occurrences(content: &str, query: &str, opts: &SearchOptions) -> Vec<TrigramMatch> {
    let mut matches = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if matches.len() >= MAX_MATCHES_PER_FILE {
            break;
        }
        let found = if opts.case_sensitive { line.contains(query) } else { line.to_lowercase().contains(&query.to_lowercase()) };
        if !found {
            continue;
        }
        let context = windowed_context(line, query, opts.context_chars);
        matches.push(TrigramMatch { file: String::new(), line: (idx + 1) as u32, context });
    }
    matches
}

fn windowed_context(line: &str, query: &str, context_chars: usize) -> String {
    let lower_line = line.to_lowercase();
    let lower_query = query.to_lowercase();
    let Some(byte_pos) = lower_line.find(&lower_query) else {
        return line.chars().take(context_chars * 2 + query.len()).collect();
    };
    let chars: Vec<char> = line.chars().collect();
    let char_pos = line[..byte_pos].chars().count();
    let start = char_pos.saturating_sub(context_chars);
    let end = (char_pos + query.chars().count() + context_chars).min(chars.len());
    chars[start..end].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_query_returns_empty() {
        let mut index = TrigramIndex::new();
        index.index_file("a.rs", "fn helper() {}\n");
        assert!(index.search("fn", &SearchOptions::default()).is_empty());
    }

    #[test]
    fn finds_literal_occurrence_and_line() {
        let mut index = TrigramIndex::new();
        index.index_file("a.rs", "fn helper() {\n    call_target();\n}\n");
        let results = index.search("call_target", &SearchOptions::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, "a.rs");
        assert_eq!(results[0].matches[0].line, 2);
    }

    #[test]
    fn missing_trigram_posting_returns_empty() {
        let mut index = TrigramIndex::new();
        index.index_file("a.rs", "fn helper() {}\n");
        assert!(index.search("zzzzz", &SearchOptions::default()).is_empty());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let mut index = TrigramIndex::new();
        let huge = "x".repeat(MAX_FILE_SIZE + 1);
        index.index_file("huge.rs", &huge);
        assert!(index.is_empty());
    }

    #[test]
    fn results_sorted_by_match_count_descending() {
        let mut index = TrigramIndex::new();
        index.index_file("few.rs", "needle\n");
        index.index_file("many.rs", "needle\nneedle\nneedle\n");
        let results = index.search("needle", &SearchOptions::default());
        assert_eq!(results[0].file, "many.rs");
    }

    #[test]
    fn build_lightweight_respects_max_files() {
        let mut index = TrigramIndex::new();
        let files = vec![("a.rs", "small one"), ("b.rs", "small two"), ("c.rs", "small three file content")];
        index.build_lightweight(files, 2, MAX_FILE_SIZE);
        assert_eq!(index.len(), 2);
    }
}
