//! C6 (part 2) — VectorIndex: chunking, hashed/TF-IDF embeddings, cosine
//! similarity search (§3, §4.5).

use serde::{Deserialize, Serialize};

use crate::symbol::{FileRecord, Symbol, SymbolKind};
use crate::tfidf::{self, TfIdfVocab};
use crate::trigram_index::MAX_FILE_SIZE;

/// Embedding dimensionality (§4.5).
pub const DIM: usize = 384;
/// §8: a chunk under this many characters is never emitted.
pub const MIN_CHUNK_SIZE: usize = 50;
/// Cap on symbol-derived chunks per file, so pathological files with
/// thousands of tiny functions don't dominate the index.
pub const MAX_CHUNKS_PER_FILE: usize = 200;
const SYMBOL_CHUNK_MAX_LINES: usize = 100;
const SLIDING_WINDOW_LINES: usize = 30;
const SLIDING_WINDOW_OVERLAP: usize = 5;
const HEADER_CHUNK_LINES: usize = 50;
/// §4.5 `searchVector` similarity floor.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    Function,
    Class,
    Method,
    Struct,
    Header,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub file: String,
    pub file_name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub chunk_type: ChunkType,
    pub symbol_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmbeddingModel {
    Tfidf,
    Hash,
}

/// §3 VectorIndex — chunks plus their flat embedding matrix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    pub chunks: Vec<Chunk>,
    /// Row-major `chunks.len() * DIM` flattened matrix.
    pub embeddings: Vec<f32>,
    pub dim: usize,
    pub model: Option<EmbeddingModel>,
    pub last_updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f32,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self { dim: DIM, ..Self::default() }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// §4.5 chunking: prefer function/class symbol spans, bounded at 100
    /// lines each; fall back to sliding windows when there are no callable
    /// symbols; always include a header chunk of the first 50 lines.
    pub fn chunk_file(record: &FileRecord, content: &str) -> Vec<Chunk> {
        if content.len() > MAX_FILE_SIZE {
            return header_chunk(record, content).into_iter().collect();
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        chunks.extend(header_chunk(record, content));

        let callable_symbols: Vec<&Symbol> = record
            .symbols
            .iter()
            .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method | SymbolKind::Class | SymbolKind::Struct))
            .collect();

        if callable_symbols.is_empty() {
            chunks.extend(sliding_window_chunks(record, &lines));
        } else {
            for symbol in callable_symbols {
                if chunks.len() >= MAX_CHUNKS_PER_FILE {
                    break;
                }
                let start = symbol.line.saturating_sub(1) as usize;
                if start >= lines.len() {
                    continue;
                }
                let end = (start + SYMBOL_CHUNK_MAX_LINES).min(lines.len());
                let text = lines[start..end].join("\n");
                if text.len() < MIN_CHUNK_SIZE {
                    continue;
                }
                let chunk_type = match symbol.kind {
                    SymbolKind::Class => ChunkType::Class,
                    SymbolKind::Method => ChunkType::Method,
                    SymbolKind::Struct => ChunkType::Struct,
                    _ => ChunkType::Function,
                };
                chunks.push(Chunk {
                    id: format!("{}:{}:{}", record.path, symbol.name, symbol.line),
                    text,
                    file: record.path.clone(),
                    file_name: crate::path_utils::file_name(&record.path),
                    start_line: symbol.line,
                    end_line: end as u32,
                    chunk_type,
                    symbol_name: Some(symbol.name.clone()),
                });
            }
        }

        chunks.truncate(MAX_CHUNKS_PER_FILE);
        chunks
    }

    pub fn add_chunks(&mut self, chunks: Vec<Chunk>, vocab: Option<&TfIdfVocab>) {
        for chunk in chunks {
            let embedding = embed_text(&chunk.text, vocab);
            self.embeddings.extend(embedding);
            self.chunks.push(chunk);
        }
        self.model = Some(if vocab.is_some_and(TfIdfVocab::is_built) { EmbeddingModel::Tfidf } else { EmbeddingModel::Hash });
    }

    /// §4.5/§6: after a persistence restore, chunk `text` comes back empty
    /// (it is intentionally not persisted). Reload it on demand from the
    /// file content under `root`, by line range, so search result snippets
    /// and retrieval (§4.11) work against a freshly-loaded index exactly as
    /// they would against one built in-process this run.
    pub fn rehydrate_from_disk(&mut self, root: &std::path::Path) {
        use std::collections::HashMap;
        let mut file_cache: HashMap<String, Vec<String>> = HashMap::new();
        for chunk in &mut self.chunks {
            if !chunk.text.is_empty() {
                continue;
            }
            let lines = file_cache.entry(chunk.file.clone()).or_insert_with(|| {
                std::fs::read_to_string(root.join(&chunk.file))
                    .map(|c| c.lines().map(str::to_string).collect())
                    .unwrap_or_default()
            });
            if lines.is_empty() {
                continue;
            }
            let start = (chunk.start_line.saturating_sub(1)) as usize;
            let end = (chunk.end_line as usize).min(lines.len());
            if start < end {
                chunk.text = lines[start..end].join("\n");
            }
        }
    }

    fn embedding_of(&self, idx: usize) -> &[f32] {
        &self.embeddings[idx * self.dim..(idx + 1) * self.dim]
    }

    /// §4.5 `searchVector(q, topK)`.
    pub fn search(&self, query: &str, top_k: usize, vocab: Option<&TfIdfVocab>) -> Vec<VectorHit> {
        if self.chunks.is_empty() {
            return Vec::new();
        }
        let query_embedding = embed_text(query, vocab);
        let mut scored: Vec<VectorHit> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| VectorHit { chunk_id: chunk.id.clone(), score: cosine_similarity(&query_embedding, self.embedding_of(i)) })
            .filter(|hit| hit.score >= SIMILARITY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

fn header_chunk(record: &FileRecord, content: &str) -> Option<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let end = HEADER_CHUNK_LINES.min(lines.len());
    let text = lines[..end].join("\n");
    if text.len() < MIN_CHUNK_SIZE {
        return None;
    }
    Some(Chunk {
        id: format!("{}:header", record.path),
        text,
        file: record.path.clone(),
        file_name: crate::path_utils::file_name(&record.path),
        start_line: 1,
        end_line: end as u32,
        chunk_type: ChunkType::Header,
        symbol_name: None,
    })
}

fn sliding_window_chunks(record: &FileRecord, lines: &[&str]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if lines.is_empty() {
        return chunks;
    }
    let step = SLIDING_WINDOW_LINES - SLIDING_WINDOW_OVERLAP;
    let mut start = 0usize;
    while start < lines.len() {
        let end = (start + SLIDING_WINDOW_LINES).min(lines.len());
        let text = lines[start..end].join("\n");
        if text.len() >= MIN_CHUNK_SIZE {
            chunks.push(Chunk {
                id: format!("{}:block:{}", record.path, start + 1),
                text,
                file: record.path.clone(),
                file_name: crate::path_utils::file_name(&record.path),
                start_line: (start + 1) as u32,
                end_line: end as u32,
                chunk_type: ChunkType::Block,
                symbol_name: None,
            });
        }
        if end == lines.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// §4.5 embedding: log-normalized TF weighted by IDF, scattered across
/// `DIM` dimensions via two hashes plus per-term trigrams; falls back to a
/// pure hashed bag-of-words when no vocabulary is built. L2-normalized.
pub fn embed_text(text: &str, vocab: Option<&TfIdfVocab>) -> Vec<f32> {
    let mut emb = vec![0f32; DIM];
    let tokens = tfidf::tokenize(text);

    let built_vocab = vocab.filter(|v| v.is_built());

    if let Some(vocab) = built_vocab {
        let mut counts = std::collections::HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0usize) += 1;
        }
        for (term, tf) in counts {
            let Some(idf) = vocab.idf_of(&term) else { continue };
            let w = tfidf::term_weight(tf, idf);
            scatter(&mut emb, &term, w);
        }
    } else {
        for token in &tokens {
            scatter(&mut emb, token, 1.0);
        }
    }

    l2_normalize(&mut emb);
    emb
}

fn scatter(emb: &mut [f32], term: &str, w: f32) {
    let dim = emb.len();
    emb[(tfidf::hash1(term) as usize) % dim] += w;
    emb[(tfidf::hash2(term) as usize) % dim] += 0.5 * w;
    for trigram in tfidf::trigrams_of(term) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        use std::hash::{Hash, Hasher};
        trigram.hash(&mut hasher);
        emb[(hasher.finish() as usize) % dim] += 0.3 * w;
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Scope;

    fn sample_record() -> FileRecord {
        FileRecord {
            path: "a.rs".to_string(),
            language: "rust".to_string(),
            line_count: 10,
            symbols: vec![Symbol {
                name: "run".to_string(),
                kind: SymbolKind::Function,
                file: "a.rs".to_string(),
                line: 1,
                signature: None,
                params: None,
                return_type: None,
                data_type: None,
                scope: Scope::Global,
                attributes: vec![],
                summary: None,
            }],
        }
    }

    #[test]
    fn chunk_file_produces_header_and_symbol_chunks() {
        let content = (0..60).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let record = sample_record();
        let chunks = VectorIndex::chunk_file(&record, &content);
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Header));
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Function));
    }

    #[test]
    fn chunk_file_falls_back_to_sliding_windows_without_symbols() {
        let mut record = sample_record();
        record.symbols.clear();
        let content = (0..100).map(|i| format!("line number {}", i)).collect::<Vec<_>>().join("\n");
        let chunks = VectorIndex::chunk_file(&record, &content);
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Block));
    }

    #[test]
    fn search_filters_below_similarity_threshold() {
        let mut index = VectorIndex::new();
        let chunk = Chunk {
            id: "a.rs:run:1".to_string(),
            text: "fn run() { call_helper(); }".to_string(),
            file: "a.rs".to_string(),
            file_name: "a.rs".to_string(),
            start_line: 1,
            end_line: 3,
            chunk_type: ChunkType::Function,
            symbol_name: Some("run".to_string()),
        };
        index.add_chunks(vec![chunk], None);
        let hits = index.search("completely unrelated query about nothing", 5, None);
        assert!(hits.is_empty() || hits[0].score < 1.0);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = embed_text("function run calls helper", None);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hashed_fallback_used_without_vocab() {
        let mut index = VectorIndex::new();
        index.add_chunks(
            vec![Chunk {
                id: "x".to_string(),
                text: "some text".to_string(),
                file: "x.rs".to_string(),
                file_name: "x.rs".to_string(),
                start_line: 1,
                end_line: 1,
                chunk_type: ChunkType::Block,
                symbol_name: None,
            }],
            None,
        );
        assert_eq!(index.model, Some(EmbeddingModel::Hash));
    }

    #[test]
    fn rehydrate_from_disk_refills_empty_chunk_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn one() {}\nfn two() {}\nfn three() {}\n").unwrap();
        let mut index = VectorIndex::new();
        index.chunks.push(Chunk {
            id: "c1".to_string(),
            text: String::new(),
            file: "a.rs".to_string(),
            file_name: "a.rs".to_string(),
            start_line: 2,
            end_line: 2,
            chunk_type: ChunkType::Function,
            symbol_name: Some("two".to_string()),
        });
        index.rehydrate_from_disk(dir.path());
        assert_eq!(index.chunks[0].text, "fn two() {}");
    }
}
