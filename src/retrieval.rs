//! C12 — Retrieval + Chunking: loading source context around search hits and
//! packing results/context into LLM-sized chunks (§4.11).

use crate::code_index::CodeIndex;
use crate::llm::{CallOptions, LlmProvider, ModelTask};
use crate::search_pipeline::SearchResult;
use crate::task_controller::TaskController;

/// §4.11: context window around a hit's line.
const CONTEXT_LINES: usize = 40;
/// §4.11 `chunkSearchResults` defaults.
const DEFAULT_MAX_CHUNK_SIZE: usize = 10_000;
const DEFAULT_MAX_CHUNKS: usize = 8;
/// Per-result metadata overhead counted against `maxChunkSize`.
const METADATA_OVERHEAD: usize = 200;
/// §4.11 `chunkContext` default.
const DEFAULT_CONTEXT_CHUNK_SIZE: usize = 18_000;
/// Hierarchical reduction batch size and safety cap.
const MAX_BATCH_SIZE: usize = 3;
const MAX_REDUCE_ROUNDS: usize = 5;
/// Threshold above which hierarchical reduction kicks in.
const REDUCE_TRIGGER_BYTES: usize = 15_000;

/// Loads 40 lines of context around each hit's line from its owning file,
/// grouping by file to avoid re-reading. Results with no loadable source
/// (file missing from `file_contents`) are dropped, per §4.11.
pub fn load_result_content(results: Vec<SearchResult>, file_contents: &std::collections::HashMap<String, String>) -> Vec<SearchResult> {
    let mut out = Vec::with_capacity(results.len());
    for mut result in results {
        if result.content.is_some() {
            out.push(result);
            continue;
        }
        let Some(content) = file_contents.get(&result.file) else { continue };
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            continue;
        }
        let center = result.line.saturating_sub(1) as usize;
        let half = CONTEXT_LINES / 2;
        let start = center.saturating_sub(half);
        let end = (center + half).min(lines.len().saturating_sub(1));
        result.content = Some(lines[start..=end.max(start)].join("\n"));
        out.push(result);
    }
    out
}

/// `chunkSearchResults(results, maxChunkSize)`: greedily packs results into
/// chunks without ever splitting a single result across chunks, up to
/// `maxChunks` chunks.
pub fn chunk_search_results(results: &[SearchResult], max_chunk_size: Option<usize>, max_chunks: Option<usize>) -> Vec<Vec<usize>> {
    let max_chunk_size = max_chunk_size.unwrap_or(DEFAULT_MAX_CHUNK_SIZE);
    let max_chunks = max_chunks.unwrap_or(DEFAULT_MAX_CHUNKS);

    let mut chunks: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_size = 0usize;

    for (i, result) in results.iter().enumerate() {
        let size = result.content.as_deref().map(str::len).unwrap_or(0) + METADATA_OVERHEAD;
        if !current.is_empty() && current_size + size > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
            if chunks.len() >= max_chunks {
                break;
            }
        }
        current.push(i);
        current_size += size;
    }
    if !current.is_empty() && chunks.len() < max_chunks {
        chunks.push(current);
    }
    chunks.truncate(max_chunks);
    chunks
}

/// `chunkContext(text, maxChunkSize)`: splits at natural boundaries,
/// preferring `### ` headers, then blank lines, never producing a chunk
/// under 50% of `maxChunkSize` unless it's the final remainder.
pub fn chunk_context(text: &str, max_chunk_size: Option<usize>) -> Vec<String> {
    let max_chunk_size = max_chunk_size.unwrap_or(DEFAULT_CONTEXT_CHUNK_SIZE);
    if text.len() <= max_chunk_size {
        return vec![text.to_string()];
    }

    let min_chunk_size = max_chunk_size / 2;
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > max_chunk_size {
        let window = &remaining[..max_chunk_size];
        let split_at = find_header_boundary(window, min_chunk_size)
            .or_else(|| find_blank_line_boundary(window, min_chunk_size))
            .unwrap_or(max_chunk_size);
        let split_at = split_at.max(min_chunk_size.min(remaining.len()));
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest;
    }
    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

fn find_header_boundary(window: &str, min_chunk_size: usize) -> Option<usize> {
    window.rmatch_indices("\n### ").map(|(idx, _)| idx + 1).filter(|idx| *idx >= min_chunk_size).next()
}

fn find_blank_line_boundary(window: &str, min_chunk_size: usize) -> Option<usize> {
    window.rmatch_indices("\n\n").map(|(idx, _)| idx + 2).filter(|idx| *idx >= min_chunk_size).next()
}

/// Hierarchical map-reduce synthesis (§4.11): repeatedly merges groups of
/// `MAX_BATCH_SIZE` analyses via a merge prompt until the residual count is
/// at most `MAX_BATCH_SIZE`, capped at `MAX_REDUCE_ROUNDS` rounds.
pub async fn reduce_analyses(provider: &dyn LlmProvider, controller: &TaskController, analyses: Vec<String>) -> Result<String, crate::error::AstraError> {
    let combined_len: usize = analyses.iter().map(|a| a.len()).sum();
    if combined_len <= REDUCE_TRIGGER_BYTES || analyses.len() <= 1 {
        return Ok(analyses.join("\n\n"));
    }

    let mut current = analyses;
    let mut round = 0;
    while current.len() > MAX_BATCH_SIZE && round < MAX_REDUCE_ROUNDS {
        controller.check_cancelled()?;
        let mut next = Vec::new();
        for group in current.chunks(MAX_BATCH_SIZE) {
            if group.len() == 1 {
                next.push(group[0].clone());
                continue;
            }
            let prompt = format!(
                "Merge these sections preserving all specific references:\n\n{}",
                group.iter().enumerate().map(|(i, g)| format!("--- Section {} ---\n{}", i + 1, g)).collect::<Vec<_>>().join("\n\n")
            );
            match provider.call_model(&prompt, &CallOptions::new(ModelTask::Analysis)).await {
                Ok(merged) => next.push(merged),
                Err(_) => next.push(group.join("\n\n")),
            }
            tokio::task::yield_now().await;
        }
        current = next;
        round += 1;
    }

    Ok(current.join("\n\n"))
}

/// Loaded source content, keyed by file path, used for `load_result_content`.
pub fn collect_file_contents(index: &CodeIndex, files: &std::collections::HashMap<String, String>) -> std::collections::HashMap<String, String> {
    index.files().keys().filter_map(|path| files.get(path).map(|content| (path.clone(), content.clone()))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_pipeline::ResultSource;
    use std::collections::HashMap;

    fn result(file: &str, line: u32) -> SearchResult {
        SearchResult { name: "x".to_string(), result_type: "function", file: file.to_string(), line, sources: vec![ResultSource::Symbol], score: 1.0, content: None }
    }

    #[test]
    fn load_result_content_extracts_window_around_line() {
        let mut files = HashMap::new();
        let body: String = (1..=100).map(|i| format!("line {i}\n")).collect();
        files.insert("a.rs".to_string(), body);
        let results = vec![result("a.rs", 50)];
        let loaded = load_result_content(results, &files);
        assert_eq!(loaded.len(), 1);
        let content = loaded[0].content.as_ref().unwrap();
        assert!(content.contains("line 50"));
        assert!(!content.contains("line 1\n"));
    }

    #[test]
    fn load_result_content_drops_results_with_no_source() {
        let files = HashMap::new();
        let results = vec![result("missing.rs", 1)];
        assert!(load_result_content(results, &files).is_empty());
    }

    #[test]
    fn chunk_search_results_never_splits_across_chunks_unnecessarily() {
        let mut results = Vec::new();
        for i in 0..5 {
            let mut r = result("a.rs", i);
            r.content = Some("x".repeat(100));
            results.push(r);
        }
        let chunks = chunk_search_results(&results, Some(250), Some(8));
        assert!(chunks.len() > 1);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn chunk_search_results_respects_max_chunks() {
        let mut results = Vec::new();
        for i in 0..20 {
            let mut r = result("a.rs", i);
            r.content = Some("x".repeat(1000));
            results.push(r);
        }
        let chunks = chunk_search_results(&results, Some(1200), Some(3));
        assert!(chunks.len() <= 3);
    }

    #[test]
    fn chunk_context_returns_whole_text_when_small() {
        let text = "short text";
        assert_eq!(chunk_context(text, Some(18_000)), vec![text.to_string()]);
    }

    #[test]
    fn chunk_context_splits_large_text() {
        let text: String = (0..2000).map(|i| format!("line {i}\n")).collect();
        let chunks = chunk_context(&text, Some(5000));
        assert!(chunks.len() > 1);
        let rejoined: String = chunks.concat();
        assert_eq!(rejoined, text);
    }

    #[tokio::test]
    async fn reduce_analyses_passthrough_when_small() {
        struct NeverCalled;
        #[async_trait::async_trait]
        impl LlmProvider for NeverCalled {
            async fn call_model(&self, _p: &str, _o: &CallOptions) -> Result<String, crate::error::AstraError> {
                panic!("should not be called for small input");
            }
            fn model_id(&self, _t: ModelTask) -> String {
                "never".to_string()
            }
        }
        let controller = TaskController::new();
        let result = reduce_analyses(&NeverCalled, &controller, vec!["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(result, "a\n\nb");
    }
}
