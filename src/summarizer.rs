//! C9 — Summarizer: name-based and LLM-based summaries for functions,
//! files, and the codebase overall (§4.7).

use std::collections::HashMap;

use crate::code_index::CodeIndex;
use crate::error::AstraError;
use crate::llm::{CallOptions, LlmProvider, ModelTask};
use crate::symbol::Symbol;
use crate::task_controller::TaskController;

/// §4.7 batching: up to 10 functions per LLM call.
pub const SUMMARY_BATCH_SIZE: usize = 10;
/// §4.7: function bodies are truncated to this many characters before
/// being included in a batch prompt.
pub const MAX_FUNCTION_SIZE: usize = 5000;
/// §4.7/§7 failure policy: after this many consecutive batch failures,
/// abandon LLM calls and fall back to name-based summaries for the rest.
pub const MAX_CONSECUTIVE_FAILURES: usize = 5;

/// §4.7 path 1 — `summaryFromName`. MUST always produce a non-empty string;
/// used both when no LLM is available and as the last-resort per-function
/// fallback when LLM batching can't account for a function.
pub fn summary_from_name(name: &str) -> String {
    let words = split_name(name);
    if words.is_empty() {
        return "Handles unnamed logic.".to_string();
    }
    let first = words[0].to_lowercase();
    let rest: Vec<String> = words[1..].iter().map(|w| w.to_lowercase()).collect();
    let rest_joined = rest.join(" ");

    let verb_table: &[(&str, &str)] = &[
        ("get", "Gets"),
        ("set", "Sets"),
        ("is", "Checks if"),
        ("has", "Checks if"),
        ("init", "Initializes"),
        ("create", "Creates"),
        ("build", "Builds"),
        ("parse", "Parses"),
        ("validate", "Validates"),
        ("update", "Updates"),
        ("delete", "Deletes"),
        ("remove", "Removes"),
        ("find", "Finds"),
        ("load", "Loads"),
        ("save", "Saves"),
        ("write", "Writes"),
        ("read", "Reads"),
        ("compute", "Computes"),
        ("calculate", "Calculates"),
        ("process", "Processes"),
        ("handle", "Handles"),
        ("run", "Runs"),
        ("execute", "Executes"),
        ("render", "Renders"),
        ("fetch", "Fetches"),
        ("send", "Sends"),
        ("convert", "Converts"),
        ("format", "Formats"),
        ("register", "Registers"),
        ("close", "Closes"),
        ("open", "Opens"),
        ("start", "Starts"),
        ("stop", "Stops"),
        ("clear", "Clears"),
        ("reset", "Resets"),
    ];

    for (prefix, verb) in verb_table {
        if first == *prefix {
            return if rest_joined.is_empty() {
                format!("{}.", verb)
            } else {
                format!("{} {}.", verb, rest_joined)
            };
        }
    }

    let all_lower = words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join(" ");
    format!("Handles {}.", all_lower)
}

fn split_name(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() && current.chars().last().is_some_and(|l| l.is_lowercase() || l.is_ascii_digit()) {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// §4.2's `2*|callers| + |callees|` priority score, used to order which
/// functions get an LLM summary first when `max_functions` caps the total.
pub fn priority_score(index: &CodeIndex, name: &str) -> usize {
    let callers = index.reverse_call_graph().get(name).map(|s| s.len()).unwrap_or(0);
    let callees = index.call_graph().get(name).map(|s| s.len()).unwrap_or(0);
    2 * callers + callees
}

pub struct SummaryTarget {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub body: String,
}

/// §4.7 `summarizeBatch` outcome.
#[derive(Debug, Default)]
pub struct SummaryResult {
    pub summaries: HashMap<String, String>,
    pub llm_calls_made: usize,
    pub llm_abandoned: bool,
}

/// Orchestrates §4.7 end to end: prioritize callables, batch them through
/// the LLM with the three-strategy parse cascade, fall back to name-based
/// summaries on parse misses or after too many consecutive failures, then
/// build file summaries structurally and one overall summary.
pub struct Summarizer<'a> {
    provider: &'a dyn LlmProvider,
    controller: &'a TaskController,
}

impl<'a> Summarizer<'a> {
    pub fn new(provider: &'a dyn LlmProvider, controller: &'a TaskController) -> Self {
        Self { provider, controller }
    }

    /// §4.7 function-summary pass. `max_functions` caps the total (`None`
    /// = no cap). Honors `controller`'s cancellation between batches.
    pub async fn summarize_functions(&self, index: &CodeIndex, targets: Vec<SummaryTarget>, max_functions: Option<usize>) -> Result<SummaryResult, AstraError> {
        let mut targets = targets;
        targets.sort_by(|a, b| priority_score(index, &b.name).cmp(&priority_score(index, &a.name)));
        if let Some(max) = max_functions {
            targets.truncate(max);
        }

        let mut result = SummaryResult::default();
        let mut consecutive_failures = 0usize;

        for batch in targets.chunks(SUMMARY_BATCH_SIZE) {
            self.controller.check_cancelled()?;

            if result.llm_abandoned {
                for target in batch {
                    result.summaries.insert(target.name.clone(), summary_from_name(&target.name));
                }
                continue;
            }

            match self.call_batch(batch).await {
                Ok(raw) => {
                    consecutive_failures = 0;
                    result.llm_calls_made += 1;
                    let parsed = parse_batch_response(&raw, batch);
                    for target in batch {
                        let summary = parsed.get(&target.name).cloned().unwrap_or_else(|| summary_from_name(&target.name));
                        result.summaries.insert(target.name.clone(), summary);
                    }
                }
                Err(_) => {
                    consecutive_failures += 1;
                    for target in batch {
                        result.summaries.insert(target.name.clone(), summary_from_name(&target.name));
                    }
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        result.llm_abandoned = true;
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        Ok(result)
    }

    async fn call_batch(&self, batch: &[SummaryTarget]) -> Result<String, AstraError> {
        let mut prompt = String::from("Summarize each of the following functions in 1-2 sentences. Respond with one block per function in the form:\nFUNCTION: <name>\nSUMMARY: <summary>\n---\n\n");
        for target in batch {
            let truncated: String = target.body.chars().take(MAX_FUNCTION_SIZE).collect();
            prompt.push_str(&format!("FUNCTION: {}\n{}\n\n", target.name, truncated));
        }
        self.provider.call_model(&prompt, &CallOptions::new(ModelTask::Summary)).await
    }

    /// §4.7: structural file summaries (list of member summaries, no LLM
    /// calls), then a single LLM call for the overall summary with a
    /// structural fallback.
    pub fn file_summary(file_path: &str, symbols: &[&Symbol], function_summaries: &HashMap<String, String>) -> String {
        if symbols.is_empty() {
            return format!("{} contains no indexed symbols.", file_path);
        }
        let members: Vec<String> = symbols
            .iter()
            .map(|s| {
                let summary = function_summaries.get(&s.name).cloned().unwrap_or_else(|| summary_from_name(&s.name));
                format!("{} ({}): {}", s.name, s.kind.as_str(), summary)
            })
            .collect();
        format!("{} defines {} symbol(s):\n{}", file_path, symbols.len(), members.join("\n"))
    }

    pub async fn overall_summary(&self, index: &CodeIndex) -> String {
        let domain = index.discovered_domain();
        let structural_fallback = match domain {
            Some(d) => d.description.clone(),
            None => format!("Codebase with {} indexed files.", index.files().len()),
        };

        let Some(domain) = domain else { return structural_fallback };
        let prompt = format!(
            "Write a one-paragraph overview of this codebase. Languages: {:?}. Key terms: {}. Modules: {}.",
            domain.languages,
            domain.key_terms.join(", "),
            domain.modules.join(", "),
        );
        match self.provider.call_model(&prompt, &CallOptions::new(ModelTask::Summary)).await {
            Ok(text) if !text.trim().is_empty() => crate::llm::strip_trailing_refusal(&text),
            _ => structural_fallback,
        }
    }
}

/// §4.7 three cascading parse strategies: (a) per-function regex anchored
/// on the function name, (b) order-based split on delimiters if fewer than
/// half matched, (c) guaranteed name-based fallback for anything still
/// unmatched (applied by the caller, not here).
fn parse_batch_response(raw: &str, batch: &[SummaryTarget]) -> HashMap<String, String> {
    let mut parsed = HashMap::new();

    for target in batch {
        if let Some(summary) = extract_anchored(raw, &target.name) {
            parsed.insert(target.name.clone(), summary);
        }
    }

    if parsed.len() * 2 < batch.len() {
        let blocks = split_on_delimiters(raw);
        for (target, block) in batch.iter().zip(blocks.iter()) {
            if !parsed.contains_key(&target.name) {
                let cleaned = block.trim();
                if !cleaned.is_empty() {
                    parsed.insert(target.name.clone(), cleaned.to_string());
                }
            }
        }
    }

    parsed
}

fn extract_anchored(raw: &str, name: &str) -> Option<String> {
    let marker = format!("FUNCTION: {}", name);
    let start = raw.find(&marker)?;
    let after = &raw[start + marker.len()..];
    let summary_start = after.find("SUMMARY:")? + "SUMMARY:".len();
    let after_summary = &after[summary_start..];
    let end = after_summary.find("---").unwrap_or(after_summary.len());
    let summary = after_summary[..end].trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary.to_string())
    }
}

fn split_on_delimiters(raw: &str) -> Vec<String> {
    let normalized = raw.replace("###", "---");
    let mut blocks: Vec<String> = normalized.split("---").map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if blocks.len() <= 1 {
        blocks = normalized
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim_start_matches(|c: char| c.is_numeric() || c == '.' || c == ')' || c == ' ').to_string())
            .collect();
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        response: String,
        fail_count: AtomicUsize,
        always_fail: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn call_model(&self, _prompt: &str, _opts: &CallOptions) -> Result<String, AstraError> {
            if self.always_fail {
                self.fail_count.fetch_add(1, Ordering::SeqCst);
                return Err(AstraError::LlmUnavailable("stub failure".to_string()));
            }
            Ok(self.response.clone())
        }
        fn model_id(&self, _task: ModelTask) -> String {
            "stub".to_string()
        }
    }

    #[test]
    fn summary_from_name_handles_verb_prefixes() {
        assert_eq!(summary_from_name("getUserName"), "Gets user name.");
        assert_eq!(summary_from_name("isValid"), "Checks if valid.");
        assert_eq!(summary_from_name("init_connection"), "Initializes connection.");
    }

    #[test]
    fn summary_from_name_falls_back_to_handles() {
        assert_eq!(summary_from_name("frobnicate"), "Handles frobnicate.");
    }

    #[test]
    fn summary_from_name_never_empty() {
        assert!(!summary_from_name("").is_empty());
        assert!(!summary_from_name("_").is_empty());
    }

    #[tokio::test]
    async fn summarize_functions_uses_llm_response() {
        let provider = StubProvider {
            response: "FUNCTION: doWork\nSUMMARY: Does the main unit of work.\n---\n".to_string(),
            fail_count: AtomicUsize::new(0),
            always_fail: false,
        };
        let controller = TaskController::new();
        let summarizer = Summarizer::new(&provider, &controller);
        let index = CodeIndex::new();
        let targets = vec![SummaryTarget { name: "doWork".to_string(), file: "a.rs".to_string(), line: 1, body: "fn doWork() {}".to_string() }];
        let result = summarizer.summarize_functions(&index, targets, None).await.unwrap();
        assert_eq!(result.summaries.get("doWork").unwrap(), "Does the main unit of work.");
        assert!(!result.llm_abandoned);
    }

    #[tokio::test]
    async fn consecutive_failures_trigger_abandonment() {
        let provider = StubProvider { response: String::new(), fail_count: AtomicUsize::new(0), always_fail: true };
        let controller = TaskController::new();
        let summarizer = Summarizer::new(&provider, &controller);
        let index = CodeIndex::new();
        let targets: Vec<SummaryTarget> = (0..(MAX_CONSECUTIVE_FAILURES + 2) * SUMMARY_BATCH_SIZE)
            .map(|i| SummaryTarget { name: format!("fn{i}"), file: "a.rs".to_string(), line: 1, body: "fn x() {}".to_string() })
            .collect();
        let result = summarizer.summarize_functions(&index, targets, None).await.unwrap();
        assert!(result.llm_abandoned);
        // Every function still gets a non-empty summary via name-based fallback.
        assert!(result.summaries.values().all(|s| !s.is_empty()));
    }

    #[test]
    fn file_summary_lists_members() {
        let symbol = Symbol {
            name: "run".to_string(),
            kind: crate::symbol::SymbolKind::Function,
            file: "a.rs".to_string(),
            line: 1,
            signature: None,
            params: None,
            return_type: None,
            data_type: None,
            scope: crate::symbol::Scope::Global,
            attributes: vec![],
            summary: None,
        };
        let mut summaries = HashMap::new();
        summaries.insert("run".to_string(), "Runs the main loop.".to_string());
        let out = Summarizer::file_summary("a.rs", &[&symbol], &summaries);
        assert!(out.contains("Runs the main loop."));
    }

    #[test]
    fn parse_batch_response_falls_back_to_order_split() {
        let batch = vec![
            SummaryTarget { name: "a".to_string(), file: "x.rs".to_string(), line: 1, body: String::new() },
            SummaryTarget { name: "b".to_string(), file: "x.rs".to_string(), line: 2, body: String::new() },
        ];
        let raw = "1. Handles a things.\n2. Handles b things.";
        let parsed = parse_batch_response(raw, &batch);
        assert_eq!(parsed.len(), 2);
    }
}
