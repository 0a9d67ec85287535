//! C13 — AnswerSynthesizer: two-stage extract + render, with validation and
//! an optional judge/critique pass (§4.12).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::code_index::CodeIndex;
use crate::error::AstraError;
use crate::llm::{is_pure_refusal, strip_trailing_refusal, CallOptions, LlmProvider, ModelTask};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EntryPoint {
    pub function: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DataStructureFact {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub definition: String,
    pub purpose: String,
    #[serde(default)]
    pub key_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KeyFunctionFact {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub signature: String,
    pub purpose: String,
    pub key_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CodeFlowFact {
    pub caller: String,
    pub callee: String,
    pub file: String,
    pub line: u32,
    pub call_code: String,
    pub purpose: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KeyFileFact {
    pub file: String,
    pub purpose: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AnswerFact {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigOptionFact {
    pub param: String,
    #[serde(default)]
    pub values: Vec<String>,
    pub effect: String,
}

/// §4.12 Stage 1 extraction schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractedFacts {
    pub summary: String,
    pub entry_point: Option<EntryPoint>,
    #[serde(default)]
    pub data_structures: Vec<DataStructureFact>,
    #[serde(default)]
    pub key_functions: Vec<KeyFunctionFact>,
    #[serde(default)]
    pub code_flow: Vec<CodeFlowFact>,
    #[serde(default)]
    pub key_files: Vec<KeyFileFact>,
    #[serde(default)]
    pub answers: Vec<AnswerFact>,
    #[serde(default)]
    pub config_options: Vec<ConfigOptionFact>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Set when `tryExtractPartialFacts` had to salvage a malformed response.
    #[serde(default)]
    pub partial: bool,
}

/// Placeholder entry-point / function names an extraction sometimes
/// hallucinates; these are dropped by `validate_extracted_facts`.
const HALLUCINATED_PATTERNS: &[&str] = &["main_function_name", "entry_function", "main_x_function", "entry_x"];

fn is_hallucinated_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    HALLUCINATED_PATTERNS.iter().any(|p| lower == *p || lower.contains("placeholder"))
}

/// Stage 1: call the model with the strict JSON schema, strip code fences,
/// extract the first `{ … }` object, and parse it. Falls back to
/// `try_extract_partial_facts` on parse failure (§7 JSONExtractionError).
pub async fn extract_facts(provider: &dyn LlmProvider, prompt: &str) -> Result<ExtractedFacts, AstraError> {
    let raw = provider.call_model(prompt, &CallOptions::new(ModelTask::Analysis)).await?;
    if is_pure_refusal(&raw) {
        return Err(AstraError::LlmRefusal(raw));
    }
    let cleaned = strip_trailing_refusal(&raw);

    match extract_json_object(&cleaned) {
        Some(json) => match serde_json::from_str::<ExtractedFacts>(&json) {
            Ok(facts) => Ok(facts),
            Err(_) => Ok(try_extract_partial_facts(&cleaned)),
        },
        None => Ok(try_extract_partial_facts(&cleaned)),
    }
}

/// Strip fenced code blocks (```...```/```json) and return the first
/// balanced `{ … }` substring, if any.
pub(crate) fn extract_json_object(text: &str) -> Option<String> {
    let without_fences = text.replace("```json", "```");
    let unfenced: String = without_fences.split("```").enumerate().filter(|(i, _)| i % 2 == 0).map(|(_, s)| s).collect();
    let source = if unfenced.trim().is_empty() { text } else { &unfenced };

    let start = source.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in source[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(source[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// §7 JSONExtractionError recovery: regex-ish salvage of `summary`,
/// `entry_point`, `key_files`, `key_functions` from raw prose, pairing
/// question text to sub-questions. Always succeeds (never empty summary).
pub fn try_extract_partial_facts(raw: &str) -> ExtractedFacts {
    let mut facts = ExtractedFacts { partial: true, ..Default::default() };

    facts.summary = raw.lines().find(|l| !l.trim().is_empty()).map(str::trim).unwrap_or("Partial data was extracted from an unstructured model response.").to_string();

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("entry_point:").or_else(|| trimmed.strip_prefix("Entry point:")) {
            if let Some((function, tail)) = rest.trim().split_once(" in ") {
                let (file, line_no) = tail.split_once(':').unwrap_or((tail, "0"));
                facts.entry_point = Some(EntryPoint { function: function.trim().to_string(), file: file.trim().to_string(), line: line_no.trim().parse().unwrap_or(0) });
            }
        }
        if trimmed.to_lowercase().starts_with("file:") || trimmed.ends_with(".rs") || trimmed.ends_with(".c") {
            let file = trimmed.trim_start_matches("File:").trim_start_matches("file:").trim().to_string();
            if !file.is_empty() && !facts.key_files.iter().any(|f| f.file == file) {
                facts.key_files.push(KeyFileFact { file, purpose: "Referenced in the model's raw response.".to_string(), functions: vec![] });
            }
        }
    }

    if facts.key_files.is_empty() && facts.entry_point.is_none() {
        facts.notes.push("Partial data was extracted; structured facts could not be fully recovered.".to_string());
    }

    facts
}

/// §4.12 Validation: drop any function/file/structure/flow fact not
/// grounded in `index`/`context_files`; drop hallucinated entry points;
/// mark `code_flow.verified` from the call graph.
pub fn validate_extracted_facts(mut facts: ExtractedFacts, index: &CodeIndex, context_files: &HashSet<String>) -> ExtractedFacts {
    let known_function = |name: &str| index.symbols().contains_key(name) || index.symbols().values().any(|s| s.name == name);
    let known_file = |file: &str| index.files().contains_key(file) || context_files.contains(file);

    if let Some(ep) = &facts.entry_point {
        if is_hallucinated_name(&ep.function) || (!known_function(&ep.function) && !known_file(&ep.file)) {
            facts.entry_point = None;
        }
    }

    facts.key_functions.retain(|f| !is_hallucinated_name(&f.name) && (known_function(&f.name) || known_file(&f.file)));
    facts.key_files.retain(|f| known_file(&f.file));
    facts.data_structures.retain(|d| known_function(&d.name) || known_file(&d.file));

    for flow in &mut facts.code_flow {
        flow.verified = index.call_graph().get(&flow.caller).is_some_and(|callees| callees.contains(&flow.callee));
    }
    facts.code_flow.retain(|f| !is_hallucinated_name(&f.caller) && !is_hallucinated_name(&f.callee) && (known_function(&f.caller) || known_file(&f.file)));

    facts
}

/// File names cleaned of emoji, leading bullets, and path prefixes, before
/// a single stable emoji prefix is added uniformly (§4.12).
pub fn clean_file_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !is_emoji(*c)).collect();
    let trimmed = stripped.trim_start_matches(['-', '*', '•', ' ']).trim();
    crate::path_utils::file_name(trimmed)
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32, 0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F0FF)
}

/// Stage 2 render: deterministic assembly into the fixed markdown template.
/// Section headings are part of the external contract (§6) and must match
/// exactly.
pub fn render_answer(facts: &ExtractedFacts, is_explain_or_trace: bool, call_graph_section: Option<&str>, reduced_findings: Option<&str>) -> String {
    let mut out = String::new();

    out.push_str("## Direct Answers\n\n");
    if facts.answers.is_empty() {
        out.push_str(&facts.summary);
        out.push('\n');
    } else {
        for answer in &facts.answers {
            out.push_str(&format!("**{}**\n{}\n", answer.question, answer.answer));
            if !answer.references.is_empty() {
                out.push_str(&format!("References: {}\n", answer.references.join(", ")));
            }
            out.push('\n');
        }
    }

    out.push_str("\n## Quick Summary\n\n");
    out.push_str(&facts.summary);
    out.push('\n');
    match &facts.entry_point {
        Some(ep) => out.push_str(&format!("\nEntry point: `{}()` in {}:{}\n", ep.function, ep.file, ep.line)),
        None => {
            if let Some(top) = facts.key_functions.first() {
                out.push_str(&format!("\nEntry point (inferred): `{}()` in {}:{}\n", top.name, top.file, top.line));
            }
        }
    }

    out.push_str("\n## Key Files\n\n");
    if facts.key_files.is_empty() {
        out.push_str("_No key files identified._\n");
    } else {
        out.push_str("| File | Purpose | Functions |\n|---|---|---|\n");
        for kf in &facts.key_files {
            out.push_str(&format!("| 📄 {} | {} | {} |\n", clean_file_name(&kf.file), kf.purpose, kf.functions.join(", ")));
        }
    }

    out.push_str("\n## Code Flow\n\n");
    if facts.code_flow.is_empty() {
        out.push_str("_No call sequence recovered._\n");
    } else {
        for edge in facts.code_flow.iter().take(6) {
            let marker = if edge.verified { "" } else { " (unverified)" };
            out.push_str(&format!("- `{}` → `{}`{} — {}\n", edge.caller, edge.callee, marker, edge.purpose));
        }
    }

    out.push_str("\n## Data Structures\n\n");
    if facts.data_structures.is_empty() {
        out.push_str("_None identified._\n");
    } else {
        out.push_str("| Name | File | Purpose |\n|---|---|---|\n");
        for ds in &facts.data_structures {
            out.push_str(&format!("| {} | {} | {} |\n", ds.name, clean_file_name(&ds.file), ds.purpose));
        }
        for ds in facts.data_structures.iter().take(3) {
            out.push_str(&format!("\n```\n{}\n```\n", ds.definition));
        }
    }

    out.push_str("\n## Key Functions\n\n");
    if facts.key_functions.is_empty() {
        out.push_str("_None identified._\n");
    } else {
        out.push_str("| Name | File | Signature |\n|---|---|---|\n");
        for f in &facts.key_functions {
            out.push_str(&format!("| {} | {}:{} | `{}` |\n", f.name, clean_file_name(&f.file), f.line, f.signature));
        }
        for f in &facts.key_functions {
            out.push_str(&format!("\n### {}\n{}\n```\n{}\n```\n", f.name, f.purpose, f.key_code));
        }
    }

    if is_explain_or_trace {
        out.push_str("\n## Call Graph\n\n");
        out.push_str(call_graph_section.unwrap_or("_Not available._"));
        out.push('\n');
    }

    out.push_str("\n## Configurability\n\n");
    if facts.config_options.is_empty() {
        out.push_str("_No configurable parameters identified._\n");
    } else {
        for opt in &facts.config_options {
            out.push_str(&format!("- `{}` ({}) — {}\n", opt.param, opt.values.join("/"), opt.effect));
        }
    }

    out.push_str("\n## Where to Start\n\n");
    match facts.key_functions.first() {
        Some(f) => out.push_str(&format!("Start at `{}` in {}.\n", f.name, clean_file_name(&f.file))),
        None => out.push_str("_No clear starting point identified._\n"),
    }

    out.push_str("\n## Related Topics\n\n");
    if facts.key_files.len() > 1 {
        for kf in facts.key_files.iter().skip(1).take(5) {
            out.push_str(&format!("- {}\n", clean_file_name(&kf.file)));
        }
    } else {
        out.push_str("_None._\n");
    }

    out.push_str("\n## Notes\n\n");
    if facts.notes.is_empty() {
        out.push_str("_None._\n");
    } else {
        for note in &facts.notes {
            out.push_str(&format!("- {}\n", note));
        }
    }

    if let Some(reduced) = reduced_findings {
        out.push_str("\n<details>\n<summary>Detailed Technical Analysis</summary>\n\n");
        out.push_str(reduced);
        out.push_str("\n</details>\n");
    }

    out
}

/// Judge pass (§4.12): the model either confirms `VALIDATION: PASS` or
/// appends a critique section. Returns the (possibly unchanged) answer.
pub async fn validate_and_refine_answer(provider: &dyn LlmProvider, question: &str, answer: &str, full_code_context: &str) -> Result<String, AstraError> {
    let prompt = format!(
        "Question: {question}\n\nProposed answer:\n{answer}\n\nFull context:\n{full_code_context}\n\nIf the answer is accurate and complete, respond with exactly `VALIDATION: PASS`. Otherwise append a `## 🧐 Critique` section and a `## 🔍 Additional Findings` table."
    );
    let response = provider.call_model(&prompt, &CallOptions::new(ModelTask::Analysis)).await?;
    if response.trim() == "VALIDATION: PASS" {
        return Ok(answer.to_string());
    }
    Ok(format!("{answer}\n\n{response}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_index::{BuildOptions, CodeIndex, ContextFile};
    use crate::language::Language;

    fn sample_index() -> CodeIndex {
        let mut index = CodeIndex::new();
        let file = ContextFile { path: "a.rs".to_string(), content: "fn do_work() { helper(); }\nfn helper() {}\n".to_string(), language: Language::Rust };
        index.build_sync(&[file], BuildOptions::default());
        index
    }

    #[test]
    fn extract_json_object_handles_fenced_response() {
        let text = "Here you go:\n```json\n{\"summary\": \"does things\"}\n```\nThanks.";
        let json = extract_json_object(text).unwrap();
        assert!(json.contains("summary"));
    }

    #[test]
    fn extract_json_object_finds_balanced_braces_with_nesting() {
        let text = "{\"a\": {\"b\": 1}, \"c\": 2}";
        assert_eq!(extract_json_object(text).unwrap(), text);
    }

    #[test]
    fn try_extract_partial_facts_never_has_empty_summary() {
        let facts = try_extract_partial_facts("");
        assert!(!facts.summary.is_empty());
        assert!(facts.partial);
    }

    #[test]
    fn validate_drops_hallucinated_entry_point() {
        let index = sample_index();
        let mut facts = ExtractedFacts::default();
        facts.entry_point = Some(EntryPoint { function: "main_function_name".to_string(), file: "a.rs".to_string(), line: 1 });
        let validated = validate_extracted_facts(facts, &index, &HashSet::new());
        assert!(validated.entry_point.is_none());
    }

    #[test]
    fn validate_keeps_known_entry_point() {
        let index = sample_index();
        let mut facts = ExtractedFacts::default();
        facts.entry_point = Some(EntryPoint { function: "do_work".to_string(), file: "a.rs".to_string(), line: 1 });
        let validated = validate_extracted_facts(facts, &index, &HashSet::new());
        assert!(validated.entry_point.is_some());
    }

    #[test]
    fn validate_marks_code_flow_verified_from_call_graph() {
        let index = sample_index();
        let mut facts = ExtractedFacts::default();
        facts.code_flow.push(CodeFlowFact { caller: "do_work".to_string(), callee: "helper".to_string(), file: "a.rs".to_string(), line: 1, call_code: "helper()".to_string(), purpose: "delegate".to_string(), verified: false });
        let validated = validate_extracted_facts(facts, &index, &HashSet::new());
        assert!(validated.code_flow[0].verified);
    }

    #[test]
    fn render_answer_includes_all_required_sections_in_order() {
        let facts = ExtractedFacts { summary: "Does a thing.".to_string(), ..Default::default() };
        let rendered = render_answer(&facts, false, None, None);
        for heading in ["## Direct Answers", "## Quick Summary", "## Key Files", "## Code Flow", "## Data Structures", "## Key Functions", "## Configurability", "## Where to Start", "## Related Topics", "## Notes"] {
            assert!(rendered.contains(heading), "missing section {heading}");
        }
        assert!(!rendered.contains("## Call Graph"));
    }

    #[test]
    fn render_answer_includes_call_graph_for_explain_queries() {
        let facts = ExtractedFacts { summary: "x".to_string(), ..Default::default() };
        let rendered = render_answer(&facts, true, Some("root -> child"), None);
        assert!(rendered.contains("## Call Graph"));
        assert!(rendered.contains("root -> child"));
    }

    #[test]
    fn clean_file_name_strips_emoji_and_bullets() {
        assert_eq!(clean_file_name("- 📄 src/main.rs"), "main.rs");
    }
}
