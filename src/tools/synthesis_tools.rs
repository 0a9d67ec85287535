//! §4.13 synthesis tools: `answer_question`, `explain_code`, `document_code`,
//! `generate_full_documentation`, `review_code`, `review_file`, `trace_code`.
//!
//! All of these share the same spine: comprehensive search → load source
//! around the hits → chunk → two-stage synthesize (§4.12). They differ only
//! in the query fed to the pipeline and whether a Call Graph section is
//! rendered (explain/trace only, drawn from the index per §4.12).

use std::collections::{HashMap, HashSet};

use serde_json::json;

use super::{p, pb, ToolOutput, ToolParams};
use crate::cobol_synonyms::CobolIntent;
use crate::cobol_tables;
use crate::code_index::CodeIndex;
use crate::config::{self, Config};
use crate::core_services::CoreServices;
use crate::llm::{CallOptions, ModelTask};
use crate::retrieval;
use crate::search_pipeline::SearchPipeline;
use crate::symbol::SymbolKind;
use crate::synthesizer;

/// Render the §4.12 "Call Graph" section for an explain/trace query: direct
/// callees and callers of every exact symbol match, drawn from the index.
async fn call_graph_section(core: &CoreServices, entities: &[String]) -> Option<String> {
    let index = core.code_index.read().await;
    let mut lines = Vec::new();
    for entity in entities {
        if let Some(callees) = index.call_graph().get(entity) {
            for callee in callees {
                lines.push(format!("- `{entity}` → `{callee}`"));
            }
        }
        if let Some(callers) = index.reverse_call_graph().get(entity) {
            for caller in callers {
                lines.push(format!("- `{caller}` → `{entity}`"));
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// §4.9 `FIND_CALLERS`/`FIND_CALLEES`: direct lookup against the
/// already-maintained call-graph/reverse-call-graph indexes (§3), rather
/// than a dedicated `CobolTableIndex` entry — the call graph already *is*
/// the precomputed index for this intent.
fn call_graph_intent_answer(index: &CodeIndex, intent: CobolIntent, entities: &[String]) -> String {
    let heading = if matches!(intent, CobolIntent::FindCallers) { "## Callers" } else { "## Callees" };
    let mut out = format!("{heading}\n\n");
    let mut any = false;
    for entity in entities {
        let names = if matches!(intent, CobolIntent::FindCallers) { index.reverse_call_graph().get(entity) } else { index.call_graph().get(entity) };
        if let Some(names) = names {
            for name in names {
                any = true;
                out.push_str(&format!("- `{name}`\n"));
            }
        }
    }
    if !any {
        out.push_str("_None found._\n");
    }
    out
}

/// §4.9 `FIND_COPYBOOKS`: every `SymbolKind::Copybook` symbol discovered by
/// the COBOL parser's `COPY` extraction.
fn copybook_intent_answer(index: &CodeIndex) -> String {
    let mut out = String::from("## Copybooks\n\n");
    let mut any = false;
    // Skip the unqualified `name` alias key (§3 "dual symbol keys") so a
    // copybook copied by one file isn't listed twice.
    for (key, symbol) in index.symbols() {
        if crate::symbol::is_qualified_key(key) && symbol.kind == SymbolKind::Copybook {
            any = true;
            out.push_str(&format!("- `{}` ({}:{})\n", symbol.name, symbol.file, symbol.line));
        }
    }
    if !any {
        out.push_str("_None found._\n");
    }
    out
}

/// The shared extract→validate→render pipeline behind every Q&A-shaped
/// tool. `is_explain_or_trace` controls the Call Graph section.
async fn synthesize(core: &CoreServices, question: &str, extra_context: Option<&str>, is_explain_or_trace: bool) -> String {
    if core.should_block_queries().await {
        return core.blocking_message().await.unwrap_or_else(|| "Indexing in progress.".to_string());
    }

    let context_files = core.context_files.read().await;
    if context_files.is_empty() && extra_context.is_none() {
        return "No files in context. Add files before asking a question.".to_string();
    }

    let is_cobol_context = core.code_index.read().await.files().values().any(|f| f.language == "cobol");

    let classifier = core.classifier.read().await;
    let classification = classifier.classify(question, is_cobol_context);

    // §4.9: specialized COBOL intents route directly to the precomputed
    // table/module indexes and short-circuit `comprehensiveSearch`. Intents
    // with no precomputed-index backing (no parser support yet for FD/SELECT
    // file I/O, 88-level condition names, or ON ERROR/INVALID KEY handlers)
    // fall through to the generic pipeline below, same as a `None` intent.
    if let Some(intent) = classification.cobol_intent {
        let index = core.code_index.read().await;
        let table_index = cobol_tables::CobolTableIndex::build(&index);
        let short_circuited = match intent {
            CobolIntent::ListTablesInModule | CobolIntent::ListAllTables | CobolIntent::ListSqlTables => {
                Some(cobol_tables::render_table_answer(intent, &classification.module_hints, &table_index))
            }
            CobolIntent::ModuleOverview => Some(cobol_tables::render_module_overview(&classification.module_hints, &table_index)),
            CobolIntent::FindCallers | CobolIntent::FindCallees => Some(call_graph_intent_answer(&index, intent, &classification.entities)),
            CobolIntent::FindCopybooks => Some(copybook_intent_answer(&index)),
            CobolIntent::FindDatabase => Some(cobol_tables::render_table_answer(CobolIntent::ListSqlTables, &[], &table_index)),
            CobolIntent::FindDefinition | CobolIntent::FindFileIo | CobolIntent::FindValidation | CobolIntent::FindErrorHandling => None,
        };
        drop(index);
        if let Some(answer) = short_circuited {
            return answer;
        }
    }

    let results = {
        let index = core.code_index.read().await;
        let trigram_index = core.trigram_index.read().await;
        let vector_index = core.vector_index.read().await;
        let vocab = core.vocab.read().await;
        let inverted_summary = core.inverted_summary.read().await;
        let pipeline = SearchPipeline { code_index: &index, trigram_index: Some(&trigram_index), vector_index: Some(&vector_index), vocab: vocab.as_ref(), inverted_summary: &inverted_summary };
        pipeline.comprehensive_search(question, &classification)
    };

    let file_contents: HashMap<String, String> = context_files.clone();
    let loaded = retrieval::load_result_content(results, &file_contents);
    let chunks = retrieval::chunk_search_results(&loaded, None, None);

    let mut context = String::new();
    if let Some(extra) = extra_context {
        context.push_str(extra);
        context.push_str("\n\n");
    }
    for group in &chunks {
        for &idx in group {
            let r = &loaded[idx];
            if let Some(content) = &r.content {
                context.push_str(&format!("### {}:{}\n```\n{}\n```\n\n", r.file, r.line, content));
            }
        }
    }

    let system_prompt = core.config.get(config::keys::SYSTEM_PROMPT);
    let prompt = format!(
        "{}Question: {question}\n\nContext:\n{context}\n\nRespond with a single JSON object matching this schema: {{summary, entry_point, data_structures, key_functions, code_flow, key_files, answers, config_options, notes}}.",
        system_prompt.map(|p| format!("{p}\n\n")).unwrap_or_default()
    );

    let facts = match synthesizer::extract_facts(core.llm.as_ref(), &prompt).await {
        Ok(facts) => facts,
        Err(crate::error::AstraError::LlmUnavailable(_)) => structural_fallback(question, &loaded),
        Err(_) => synthesizer::try_extract_partial_facts(&context),
    };

    let known_files: HashSet<String> = context_files.keys().cloned().collect();
    let facts = {
        let index = core.code_index.read().await;
        synthesizer::validate_extracted_facts(facts, &index, &known_files)
    };

    let cg_section = if is_explain_or_trace { call_graph_section(core, &classification.entities).await } else { None };
    synthesizer::render_answer(&facts, is_explain_or_trace, cg_section.as_deref(), None)
}

/// §7 LLMUnavailable fallback: a structural summary built entirely from
/// search hits, with no model call.
fn structural_fallback(question: &str, results: &[crate::search_pipeline::SearchResult]) -> synthesizer::ExtractedFacts {
    let mut facts = synthesizer::ExtractedFacts { summary: format!("LLM unavailable; showing the top matches found for \"{question}\"."), ..Default::default() };
    for r in results.iter().take(10) {
        facts.key_files.push(synthesizer::KeyFileFact { file: r.file.clone(), purpose: format!("Matched via {:?}", r.sources), functions: vec![r.name.clone()] });
    }
    facts.notes.push("Structural fallback used: no LLM provider was configured.".to_string());
    facts
}

pub async fn answer_question(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(question) = p(params, "question") else { return ToolOutput::err("question is required") };
    let extra_context = p(params, "context");
    let use_provided_context = pb(params, "useProvidedContext", extra_context.is_some());
    let answer = synthesize(core, question, if use_provided_context { extra_context } else { None }, false).await;
    ToolOutput::ok(json!({ "answer": answer }))
}

pub async fn explain_code(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(query) = p(params, "query") else { return ToolOutput::err("query is required") };
    let answer = synthesize(core, query, None, true).await;
    ToolOutput::ok(json!({ "explanation": answer }))
}

pub async fn trace_code(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(query) = p(params, "query") else { return ToolOutput::err("query is required") };
    let trace_query = format!("trace the call flow for {query}");
    let answer = synthesize(core, &trace_query, None, true).await;
    ToolOutput::ok(json!({ "trace": answer }))
}

pub async fn document_code(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(target) = p(params, "target") else { return ToolOutput::err("target is required") };
    let question = format!("document {target}");
    let documentation = synthesize(core, &question, None, false).await;
    ToolOutput::ok(json!({ "documentation": documentation }))
}

pub async fn generate_full_documentation(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let project_name = p(params, "projectName").unwrap_or("project");
    let index = core.code_index.read().await;

    let mut out = format!("# {project_name} Documentation\n\n");
    if let Some(overall) = index.overall_summary() {
        out.push_str(overall);
        out.push_str("\n\n");
    }
    out.push_str("## Files\n\n");
    for (path, record) in index.files() {
        out.push_str(&format!("### {path} ({} lines, {})\n\n", record.line_count, record.language));
        if let Some(summary) = index.file_summaries().get(path) {
            out.push_str(summary);
            out.push_str("\n\n");
        }
        for sym in &record.symbols {
            if sym.is_callable() {
                let summary = sym.summary.clone().unwrap_or_else(|| "No summary available.".to_string());
                out.push_str(&format!("- `{}` ({}:{}): {}\n", sym.name, sym.file, sym.line, summary));
            }
        }
        out.push('\n');
    }

    // §6: generated filenames carry a UTC timestamp.
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let file_name = format!("{project_name}-documentation-{timestamp}.md");
    ToolOutput::ok(json!({ "fileName": file_name, "documentation": out }))
}

fn review_prompt(target: &str, source: &str) -> String {
    format!(
        "Review the following code from {target} for bugs, focusing on correctness issues such as null/nil dereferences, \
         off-by-one errors, resource leaks, and unchecked error paths. Respond with sections headed `## 🔴 Critical`, \
         `## 🟠 High`, and `## 🟡 Medium`, each listing findings as `- <file>:<line> — <description>`. Omit a section \
         if it has no findings.\n\n```\n{source}\n```"
    )
}

/// A conservative, LLM-free heuristic pass used when no provider is
/// configured (§7 LLMUnavailable): flags the textbook NULL-pointer-deref
/// shape a test corpus is expected to exercise (§8 scenario 3).
fn heuristic_review(target: &str, source: &str) -> String {
    let mut critical = Vec::new();
    let mut prev_null_assignee: Option<String> = None;
    for (i, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(eq) = trimmed.find('=') {
            let (lhs, rhs) = trimmed.split_at(eq);
            if rhs.trim_start_matches('=').trim().starts_with("NULL") || rhs.trim_start_matches('=').trim().starts_with("nullptr") {
                let var = lhs.trim().trim_start_matches('*').split_whitespace().last().unwrap_or("").to_string();
                if !var.is_empty() {
                    prev_null_assignee = Some(var);
                }
            }
        }
        if let Some(var) = &prev_null_assignee {
            if trimmed.starts_with(&format!("*{var}")) {
                critical.push(format!("- {target}:{} — dereference of `{var}`, which was assigned NULL", i + 1));
            }
        }
    }

    let mut out = String::new();
    if !critical.is_empty() {
        out.push_str("## 🔴 Critical\n\n");
        for c in &critical {
            out.push_str(c);
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str("_Heuristic review: no LLM provider was configured, so only a structural NULL-dereference check ran._\n");
    out
}

pub async fn review_code(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(function) = p(params, "functionName") else { return ToolOutput::err("functionName is required") };
    let index = core.code_index.read().await;
    let Some(symbol) = index.symbols().get(function) else { return ToolOutput::err(format!("unknown function '{function}'")) };
    let Some(content) = core.context_files.read().await.get(&symbol.file).cloned() else {
        return ToolOutput::err(format!("file '{}' not in context", symbol.file));
    };
    drop(index);

    let prompt = review_prompt(function, &content);
    let review = match core.llm.call_model(&prompt, &CallOptions::new(ModelTask::Analysis)).await {
        Ok(text) => text,
        Err(crate::error::AstraError::LlmUnavailable(_)) => heuristic_review(function, &content),
        Err(e) => return ToolOutput::err(e.to_string()),
    };
    ToolOutput::ok(json!({ "review": review }))
}

pub async fn review_file(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(file_name) = p(params, "fileName") else { return ToolOutput::err("fileName is required") };
    let Some(content) = core.context_files.read().await.get(file_name).cloned() else {
        return ToolOutput::err(format!("file '{file_name}' not in context"));
    };

    let prompt = review_prompt(file_name, &content);
    let review = match core.llm.call_model(&prompt, &CallOptions::new(ModelTask::Analysis)).await {
        Ok(text) => text,
        Err(crate::error::AstraError::LlmUnavailable(_)) => heuristic_review(file_name, &content),
        Err(e) => return ToolOutput::err(e.to_string()),
    };
    ToolOutput::ok(json!({ "review": review }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answer_question_requires_question_param() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let out = answer_question(&core, &ToolParams::new()).await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn answer_question_reports_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let mut params = ToolParams::new();
        params.insert("question".to_string(), "what does this do?".to_string());
        let out = answer_question(&core, &params).await;
        assert!(out.success);
        assert!(out.data.unwrap()["answer"].as_str().unwrap().contains("No files in context"));
    }

    #[tokio::test]
    async fn answer_question_short_circuits_cobol_table_intent() {
        use crate::code_index::{BuildOptions, ContextFile};
        use crate::language::Language;

        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let source = "       PROGRAM-ID. PAYROLL.\n       01 EMP-TABLE OCCURS 100 TIMES INDEXED BY I-EMP.\n       EXEC SQL\n           SELECT * FROM ACCOUNTS\n       END-EXEC.\n";
        core.context_files.write().await.insert("PAYROLL.CBL".to_string(), source.to_string());
        core.code_index.write().await.build_sync(&[ContextFile { path: "PAYROLL.CBL".to_string(), content: source.to_string(), language: Language::Cobol }], BuildOptions::default());

        let mut params = ToolParams::new();
        params.insert("question".to_string(), "show tables in payroll".to_string());
        let out = answer_question(&core, &params).await;
        assert!(out.success);
        let answer = out.data.unwrap()["answer"].as_str().unwrap().to_string();
        assert!(answer.contains("EMP-TABLE"));
        assert!(answer.contains("size 100"));
        assert!(answer.contains("indexed by I-EMP"));
        assert!(answer.contains("ACCOUNTS"));
        assert!(answer.contains("SQL, operations: SELECT"));
    }

    #[tokio::test]
    async fn review_code_rejects_unknown_function() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let mut params = ToolParams::new();
        params.insert("functionName".to_string(), "nope".to_string());
        let out = review_code(&core, &params).await;
        assert!(!out.success);
    }

    #[test]
    fn heuristic_review_flags_null_dereference() {
        let src = "char *p = NULL;\n*p = 1;\n";
        let review = heuristic_review("parse.c", src);
        assert!(review.contains("🔴 Critical"));
        assert!(review.contains("parse.c:2"));
    }

    #[test]
    fn review_prompt_embeds_target_and_source() {
        let prompt = review_prompt("a.c", "int x;");
        assert!(prompt.contains("a.c"));
        assert!(prompt.contains("int x;"));
    }
}
