//! Indexing orchestration (§2's indexing data flow): wires the per-language
//! parsers (C3) into `CodeIndex` (C4), fans that out into the trigram (C5)
//! and vector/TF-IDF (C6) indexes, optionally runs the summarizer (C9) and
//! rebuilds the inverted summary index (C7), then re-learns the query
//! classifier (C10) — all driven through the `IndexingStateMachine` (C8)
//! so callers observe the same phase/progress/counters contract the CLI
//! and MCP server both depend on.

use std::path::Path;

use ignore::WalkBuilder;
use tracing::{info, warn};

use crate::code_index::{BuildOptions, ContextFile};
use crate::core_services::CoreServices;
use crate::error::AstraError;
use crate::indexing_state::Counters;
use crate::inverted_summary::SummaryDocument;
use crate::language;
use crate::path_utils;
use crate::query_classifier::QueryClassifier;
use crate::summarizer::{SummaryTarget, Summarizer};

/// Walk `root` and load every recognized source file into a `ContextFile`,
/// skipping binaries and non-code/excluded paths per §6's vocabulary table.
/// Paths are stored relative to `root` with `/`-normalized separators, so
/// they double as stable map keys (§3's `name@path` contract).
pub fn discover_context_files(root: &Path) -> Vec<ContextFile> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).hidden(true).build();

    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let path_str = path_utils::normalize_separators(&path.to_string_lossy());
        if language::is_excluded_path(&path_str) {
            continue;
        }
        let Some(lang) = language::detect_language(&path_str) else { continue };
        let Ok((content, _lossy)) = path_utils::read_file_lossy(path) else { continue };
        if language::looks_binary(content.as_bytes()) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        files.push(ContextFile {
            path: path_utils::normalize_separators(&rel.to_string_lossy()),
            content,
            language: lang,
        });
    }

    files
}

/// Best-effort body text for a callable symbol, used as summarizer input:
/// up to 100 lines starting at the symbol's declaration line, matching the
/// span the vector index chunks the same symbol into (§4.5).
fn symbol_body(content: &str, line: u32) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = (line.saturating_sub(1)) as usize;
    if start >= lines.len() {
        return String::new();
    }
    let end = (start + 100).min(lines.len());
    lines[start..end].join("\n")
}

/// Full rebuild (§2, §4.6): drives every phase transition, repopulates the
/// trigram/vector/inverted indexes, and re-learns the classifier. Summaries
/// only run when `enable_auto_summary` is set (§6 `indexing.enableAutoSummary`).
pub async fn rebuild(
    core: &CoreServices,
    context_files: Vec<ContextFile>,
    opts: BuildOptions,
    enable_auto_summary: bool,
) -> Result<(), AstraError> {
    core.task_controller.begin("indexing");
    core.indexing_state.write().await.reset();

    let file_contents: std::collections::HashMap<String, String> =
        context_files.iter().map(|f| (f.path.clone(), f.content.clone())).collect();

    // Phase: parsing -> symbols (CodeIndex::build_async covers both passes).
    {
        let mut index = core.code_index.write().await;
        index
            .build_async(&context_files, opts, |_done, _total| {})
            .await;
        index.check_invariants()?;
    }
    core.task_controller.check_cancelled()?;
    {
        let index = core.code_index.read().await;
        let counters = Counters { files_indexed: index.files().len(), symbols_found: index.symbols().len(), ..Default::default() };
        let mut state = core.indexing_state.write().await;
        state.advance(counters, 15); // -> parsing
        state.advance(counters, 35); // -> symbols
    }

    // Phase: trigrams.
    {
        let mut trigram = core.trigram_index.write().await;
        trigram.clear();
        for file in &context_files {
            trigram.index_file(&file.path, &file.content);
            tokio::task::yield_now().await;
        }
    }
    core.task_controller.check_cancelled()?;
    {
        let index = core.code_index.read().await;
        let counters = Counters { files_indexed: index.files().len(), symbols_found: index.symbols().len(), ..Default::default() };
        core.indexing_state.write().await.advance(counters, 55); // -> trigrams
    }

    // Phase: search indexes (vector + TF-IDF vocabulary).
    {
        let index = core.code_index.read().await;
        let mut all_chunks = Vec::new();
        for record in index.files().values() {
            let Some(content) = file_contents.get(&record.path) else { continue };
            all_chunks.extend(crate::vector_index::VectorIndex::chunk_file(record, content));
        }

        let mut vocab = crate::tfidf::TfIdfVocab::new();
        vocab.build(all_chunks.iter().map(|c| c.text.as_str()));

        let mut vector = core.vector_index.write().await;
        vector.clear();
        vector.add_chunks(all_chunks, Some(&vocab));
        *core.vocab.write().await = Some(vocab);
    }
    core.task_controller.check_cancelled()?;
    {
        let index = core.code_index.read().await;
        let counters = Counters { files_indexed: index.files().len(), symbols_found: index.symbols().len(), ..Default::default() };
        core.indexing_state.write().await.advance(counters, 75); // -> search
    }

    // Re-learn the query classifier now that symbols/summaries exist (§4.9).
    {
        let index = core.code_index.read().await;
        *core.classifier.write().await = QueryClassifier::learn(&index);
    }

    if enable_auto_summary {
        run_summaries(core, &file_contents).await?;
    } else {
        let index = core.code_index.read().await;
        let counters = Counters { files_indexed: index.files().len(), symbols_found: index.symbols().len(), ..Default::default() };
        core.indexing_state.write().await.advance(counters, 100); // -> ready
    }

    info!("index rebuild complete");
    core.task_controller.finish();
    Ok(())
}

/// §4.7 summarization pass, run after the core indexes are ready: prioritize
/// callables, batch them through the LLM (or the name-based fallback when
/// none is configured), build file/overall summaries, then rebuild the
/// inverted summary index (§4.8) and re-learn the classifier (§4.9).
pub async fn run_summaries(core: &CoreServices, file_contents: &std::collections::HashMap<String, String>) -> Result<(), AstraError> {
    // Iterate only the `name@path` qualified keys — the bare `name` alias
    // points at the same underlying occurrence and would double-summarize it.
    let targets: Vec<SummaryTarget> = {
        let index = core.code_index.read().await;
        index
            .symbols()
            .iter()
            .filter(|(key, s)| crate::symbol::is_qualified_key(key) && s.is_callable())
            .map(|(_, s)| SummaryTarget {
                name: s.name.clone(),
                file: s.file.clone(),
                line: s.line,
                body: file_contents.get(&s.file).map(|c| symbol_body(c, s.line)).unwrap_or_default(),
            })
            .collect()
    };

    {
        let index = core.code_index.read().await;
        let counters = Counters { files_indexed: index.files().len(), symbols_found: index.symbols().len(), ..Default::default() };
        core.indexing_state.write().await.begin_summarizing(counters, 80);
    }

    let summarizer = Summarizer::new(core.llm.as_ref(), &core.task_controller);
    let result = {
        let index = core.code_index.read().await;
        match summarizer.summarize_functions(&index, targets, None).await {
            Ok(r) => r,
            Err(AstraError::TaskCancelled) => return Err(AstraError::TaskCancelled),
            Err(e) => {
                warn!(error = %e, "summarization pass failed; continuing with name-based summaries only");
                crate::summarizer::SummaryResult::default()
            }
        }
    };

    // File summaries are built structurally (no LLM calls) from per-function
    // summaries already computed above.
    let file_summaries: Vec<(String, String)> = {
        let index = core.code_index.read().await;
        // Only the `name@path` keys are one-symbol-per-occurrence; the bare
        // `name` alias would double-count overloaded/shadowed names.
        let mut by_file: std::collections::HashMap<String, Vec<&crate::symbol::Symbol>> = std::collections::HashMap::new();
        for (key, symbol) in index.symbols() {
            if crate::symbol::is_qualified_key(key) && symbol.is_callable() {
                by_file.entry(symbol.file.clone()).or_default().push(symbol);
            }
        }
        by_file
            .into_iter()
            .map(|(file, symbols)| (file.clone(), Summarizer::file_summary(&file, &symbols, &result.summaries)))
            .collect()
    };

    let overall = {
        let index = core.code_index.read().await;
        summarizer.overall_summary(&index).await
    };

    {
        let mut index = core.code_index.write().await;
        for (file, summary) in file_summaries {
            index.set_file_summary(&file, summary);
        }
        index.set_overall_summary(overall);

        // §3: `summaries` map keys are `name@path` qualified keys referring
        // to callable symbols only (invariant iv).
        let qualified: Vec<(String, crate::symbol::Symbol)> = index
            .symbols()
            .iter()
            .filter(|(k, s)| crate::symbol::is_qualified_key(k) && s.is_callable())
            .map(|(k, s)| {
                let mut sym = s.clone();
                sym.summary = result.summaries.get(&s.name).cloned().or_else(|| Some(crate::summarizer::summary_from_name(&s.name)));
                (k.clone(), sym)
            })
            .collect();
        for (key, sym) in qualified {
            index.record_summary(key, sym);
        }
    }

    // Rebuild the inverted summary index (§4.8) from every summarized symbol.
    {
        let index = core.code_index.read().await;
        let mut inverted = core.inverted_summary.write().await;
        inverted.build(index.summaries().values().map(|s| SummaryDocument {
            symbol: s.name.as_str(),
            file: s.file.as_str(),
            line: s.line,
            summary: s.summary.as_deref().unwrap_or(""),
        }));
    }

    // Re-learn the classifier now that summaries exist (§4.7's "after
    // function summaries finish... the classifier is re-learned").
    {
        let index = core.code_index.read().await;
        *core.classifier.write().await = QueryClassifier::learn(&index);
    }

    {
        let index = core.code_index.read().await;
        let counters = Counters {
            files_indexed: index.files().len(),
            symbols_found: index.symbols().len(),
            summaries_generated: result.summaries.len(),
            inverted_terms: core.inverted_summary.read().await.term_count(),
        };
        let mut state = core.indexing_state.write().await;
        state.advance(counters, 95); // -> inverted
        state.advance(counters, 100); // -> ready
    }

    Ok(())
}
