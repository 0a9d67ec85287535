//! §4.13 index/search tools: `search_calls`, `search_index`,
//! `search_trigram`, `search_semantic`, `search_code`,
//! `get_function_context`, `get_symbol_info`, `get_call_graph`,
//! `list_symbols`, `analyze_code_structure`.

use serde_json::json;

use super::{p, pu, ToolOutput, ToolParams};
use crate::core_services::CoreServices;
use crate::language::Language;
use crate::parsers::common::{find_brace_body_end, find_indented_body_end};
use crate::search_pipeline::SearchPipeline;
use crate::trigram_index::SearchOptions;

async fn file_content(core: &CoreServices, path: &str) -> Option<String> {
    if let Some(content) = core.context_files.read().await.get(path) {
        return Some(content.clone());
    }
    std::fs::read_to_string(path).ok()
}

pub async fn search_calls(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(function) = p(params, "function") else { return ToolOutput::err("function is required") };
    let direction = p(params, "direction").unwrap_or("both");
    let index = core.code_index.read().await;
    let callers: Vec<String> = index.reverse_call_graph().get(function).map(|s| s.iter().cloned().collect()).unwrap_or_default();
    let callees: Vec<String> = index.call_graph().get(function).map(|s| s.iter().cloned().collect()).unwrap_or_default();
    match direction {
        "callers" => ToolOutput::ok(json!({ "callers": callers })),
        "callees" => ToolOutput::ok(json!({ "callees": callees })),
        _ => ToolOutput::ok(json!({ "callers": callers, "callees": callees })),
    }
}

pub async fn search_index(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(pattern) = p(params, "pattern") else { return ToolOutput::err("pattern is required") };
    let kind_filter = p(params, "type");
    let index = core.code_index.read().await;
    let lower = pattern.to_lowercase();
    let matches: Vec<_> = index
        .symbols()
        .values()
        .filter(|s| s.name.to_lowercase().contains(&lower))
        .filter(|s| kind_filter.is_none_or(|k| s.kind.as_str().eq_ignore_ascii_case(k)))
        .map(|s| json!({ "name": s.name, "type": s.kind.as_str(), "file": s.file, "line": s.line }))
        .collect();
    ToolOutput::ok(json!({ "matches": matches }))
}

pub async fn search_trigram(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(pattern) = p(params, "pattern") else { return ToolOutput::err("pattern is required") };
    let trigram_index = core.trigram_index.read().await;
    let results = trigram_index.search(pattern, &SearchOptions::default());
    ToolOutput::ok(json!({ "results": results.iter().map(|r| json!({ "file": r.file, "matches": r.matches.len() })).collect::<Vec<_>>() }))
}

pub async fn search_semantic(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(query) = p(params, "query") else { return ToolOutput::err("query is required") };
    let vocab = core.vocab.read().await;
    let vector_index = core.vector_index.read().await;
    let hits = vector_index.search(query, 20, vocab.as_ref());
    let results: Vec<_> = hits
        .iter()
        .filter_map(|hit| vector_index.chunks.iter().find(|c| c.id == hit.chunk_id).map(|chunk| json!({ "file": chunk.file, "startLine": chunk.start_line, "endLine": chunk.end_line, "score": hit.score })))
        .collect();
    ToolOutput::ok(json!({ "results": results }))
}

/// Combined index + trigram search, via the full comprehensiveSearch
/// pipeline; the preferred tool for implementation queries (§4.13).
pub async fn search_code(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(query) = p(params, "query") else { return ToolOutput::err("query is required") };
    run_pipeline(core, query).await
}

async fn run_pipeline(core: &CoreServices, query: &str) -> ToolOutput {
    let index = core.code_index.read().await;
    let trigram_index = core.trigram_index.read().await;
    let vector_index = core.vector_index.read().await;
    let vocab = core.vocab.read().await;
    let inverted_summary = core.inverted_summary.read().await;
    let classifier = core.classifier.read().await;

    let classification = classifier.classify(query, false);
    let pipeline = SearchPipeline { code_index: &index, trigram_index: Some(&trigram_index), vector_index: Some(&vector_index), vocab: vocab.as_ref(), inverted_summary: &inverted_summary };
    let results = pipeline.comprehensive_search(query, &classification);

    let data: Vec<_> = results.iter().take(50).map(|r| json!({ "name": r.name, "type": r.result_type, "file": r.file, "line": r.line, "score": r.score })).collect();
    ToolOutput::ok(json!({ "results": data, "queryType": classification.query_type.as_str() }))
}

pub async fn get_function_context(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(name) = p(params, "functionName") else { return ToolOutput::err("functionName is required") };
    let index = core.code_index.read().await;
    let Some(symbol) = index.symbols().get(name) else { return ToolOutput::err(format!("unknown function '{name}'")) };
    let callers: Vec<String> = index.reverse_call_graph().get(name).map(|s| s.iter().cloned().collect()).unwrap_or_default();
    let callees: Vec<String> = index.call_graph().get(name).map(|s| s.iter().cloned().collect()).unwrap_or_default();

    let source = match file_content(core, &symbol.file).await {
        Some(content) => {
            let lines: Vec<&str> = content.lines().collect();
            let def_line = symbol.line.saturating_sub(1) as usize;
            let language = crate::language::detect_language(&symbol.file).unwrap_or(Language::JavaScript);
            let end = if language.uses_brace_bodies() { find_brace_body_end(&lines, def_line, 100).unwrap_or(def_line) } else { find_indented_body_end(&lines, def_line) };
            let end = end.min(def_line + 100).min(lines.len().saturating_sub(1));
            lines.get(def_line..=end.max(def_line)).map(|s| s.join("\n")).unwrap_or_default()
        }
        None => String::new(),
    };

    ToolOutput::ok(json!({ "function": name, "file": symbol.file, "line": symbol.line, "source": source, "callers": callers, "callees": callees }))
}

pub async fn get_symbol_info(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(name) = p(params, "symbolName") else { return ToolOutput::err("symbolName is required") };
    let index = core.code_index.read().await;
    match index.symbols().get(name) {
        Some(s) => ToolOutput::ok(json!({ "name": s.name, "type": s.kind.as_str(), "file": s.file, "line": s.line, "signature": s.signature, "scope": format!("{:?}", s.scope), "summary": s.summary })),
        None => ToolOutput::err(format!("unknown symbol '{name}'")),
    }
}

pub async fn get_call_graph(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(name) = p(params, "functionName") else { return ToolOutput::err("functionName is required") };
    let depth = pu(params, "depth", 3);
    let index = core.code_index.read().await;

    let mut edges = Vec::new();
    let mut frontier = vec![name.to_string()];
    let mut visited = std::collections::HashSet::new();
    visited.insert(name.to_string());

    for _ in 0..depth {
        let mut next = Vec::new();
        for node in &frontier {
            if let Some(callees) = index.call_graph().get(node) {
                for callee in callees {
                    edges.push(json!({ "from": node, "to": callee }));
                    if visited.insert(callee.clone()) {
                        next.push(callee.clone());
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    ToolOutput::ok(json!({ "root": name, "depth": depth, "edges": edges }))
}

pub async fn list_symbols(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let kind_filter = p(params, "kind");
    let file_filter = p(params, "file");
    let index = core.code_index.read().await;
    let symbols: Vec<_> = index
        .symbols()
        .values()
        .filter(|s| kind_filter.is_none_or(|k| s.kind.as_str().eq_ignore_ascii_case(k)))
        .filter(|s| file_filter.is_none_or(|f| s.file == f))
        .map(|s| json!({ "name": s.name, "type": s.kind.as_str(), "file": s.file, "line": s.line }))
        .collect();
    ToolOutput::ok(json!({ "symbols": symbols }))
}

pub async fn analyze_code_structure(core: &CoreServices) -> ToolOutput {
    let index = core.code_index.read().await;
    let domain = index.discovered_domain();
    ToolOutput::ok(json!({
        "fileCount": index.files().len(),
        "symbolCount": index.symbols().len(),
        "languages": domain.map(|d| d.languages.clone()).unwrap_or_default(),
        "modules": domain.map(|d| d.modules.clone()).unwrap_or_default(),
        "description": domain.map(|d| d.description.clone()),
    }))
}
