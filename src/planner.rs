//! C15 — Planner/Executor/Judge: `analyzeQuery` preclassification, an
//! LLM-authored JSON plan validated against the mandatory tool-mapping
//! table, and a non-aborting step executor with `$stepN.<path>`
//! substitution (§4.14).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;

use crate::code_index::CodeIndex;
use crate::core_services::CoreServices;
use crate::error::AstraError;
use crate::llm::{CallOptions, ModelTask};
use crate::synthesizer::extract_json_object;
use crate::tools::{ToolOutput, ToolParams, ToolRegistry};

/// `analyzeQuery`'s deterministic task classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Review,
    Explain,
    Trace,
    Search,
    Generate,
    Translate,
    Document,
    Compare,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "REVIEW",
            Self::Explain => "EXPLAIN",
            Self::Trace => "TRACE",
            Self::Search => "SEARCH",
            Self::Generate => "GENERATE",
            Self::Translate => "TRANSLATE",
            Self::Document => "DOCUMENT",
            Self::Compare => "COMPARE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    File,
    Function,
    Concept,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub target_type: TargetType,
    pub value: String,
    pub exists: bool,
}

/// `analyzeQuery(query) -> {taskType, target, scope, suggestedTool, keywords, confidence}`.
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub task_type: TaskType,
    pub target: Target,
    pub scope: &'static str,
    pub suggested_tool: &'static str,
    pub keywords: Vec<String>,
    pub confidence: f32,
}

fn classify_task_type(lower: &str) -> TaskType {
    if lower.contains("review") {
        TaskType::Review
    } else if lower.contains("translate") {
        TaskType::Translate
    } else if lower.contains("document") {
        TaskType::Document
    } else if lower.contains("compare") || lower.contains("difference between") {
        TaskType::Compare
    } else if lower.contains("generate") || lower.contains("create") {
        TaskType::Generate
    } else if lower.contains("trace") || lower.contains("flow") {
        TaskType::Trace
    } else if lower.contains("explain") || (lower.contains("how") && lower.contains("work")) {
        TaskType::Explain
    } else {
        TaskType::Search
    }
}

/// Best-effort target detection: a file-extension token present in the
/// index wins, then an exact symbol-name token, else the whole query is
/// treated as a concept.
fn detect_target(query: &str, index: &CodeIndex) -> Target {
    for word in query.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/' && c != '_' && c != '-');
        if trimmed.contains('.') && crate::language::detect_language(trimmed).is_some() {
            let exists = index.files().keys().any(|f| f == trimmed || f.ends_with(&format!("/{trimmed}")));
            return Target { target_type: TargetType::File, value: trimmed.to_string(), exists };
        }
    }
    for word in query.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if trimmed.len() >= 3 && index.symbols().contains_key(trimmed) {
            return Target { target_type: TargetType::Function, value: trimmed.to_string(), exists: true };
        }
    }
    Target { target_type: TargetType::Concept, value: query.trim().to_string(), exists: false }
}

/// §4.14's mandatory tool mapping table, keyed on `(taskType, target.type)`.
/// `None` means the table doesn't constrain this combination.
fn mandatory_tool_chain(task: TaskType, target: TargetType) -> Option<&'static [&'static str]> {
    match (task, target) {
        (TaskType::Review, TargetType::File) => Some(&["review_file"]),
        (TaskType::Review, _) => Some(&["review_code"]),
        (TaskType::Explain, TargetType::File) => Some(&["search_code", "answer_question"]),
        (TaskType::Explain, TargetType::Function) => Some(&["get_function_context", "answer_question"]),
        (TaskType::Explain, TargetType::Concept) => Some(&["search_code", "answer_question"]),
        (TaskType::Trace, _) => Some(&["search_code", "answer_question"]),
        (TaskType::Search, _) => Some(&["search_code"]),
        _ => None,
    }
}

fn default_tool_for(task: TaskType) -> &'static str {
    match task {
        TaskType::Generate => "generate_code",
        TaskType::Translate => "translate_code",
        TaskType::Document => "document_code",
        _ => "answer_question",
    }
}

pub fn analyze_query(query: &str, index: &CodeIndex) -> QueryAnalysis {
    let lower = query.to_lowercase();
    let task_type = classify_task_type(&lower);
    let target = detect_target(query, index);
    let scope = match target.target_type {
        TargetType::File => "file",
        TargetType::Function => "function",
        TargetType::Concept => "codebase",
    };
    let suggested_tool = mandatory_tool_chain(task_type, target.target_type).and_then(|c| c.first()).copied().unwrap_or_else(|| default_tool_for(task_type));
    let keywords = crate::tfidf::tokenize(query);
    let confidence = if target.exists { 0.8 } else if task_type != TaskType::Search { 0.6 } else { 0.4 };
    QueryAnalysis { task_type, target, scope, suggested_tool, keywords, confidence }
}

/// One step of a plan (§4.14's `{step, tool, purpose, parameters}`).
#[derive(Debug, Clone, Default)]
pub struct PlanStep {
    pub step: u32,
    pub tool: String,
    pub purpose: String,
    pub parameters: ToolParams,
}

/// The model-authored plan (§4.14's JSON shape).
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub domain: Option<String>,
    pub domain_notes: Option<String>,
    pub understanding: String,
    pub strategy: String,
    pub steps: Vec<PlanStep>,
    pub final_output: String,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawPlanStep {
    step: u32,
    tool: String,
    #[serde(default)]
    purpose: String,
    #[serde(default)]
    parameters: HashMap<String, Value>,
}

impl From<RawPlanStep> for PlanStep {
    fn from(raw: RawPlanStep) -> Self {
        let parameters = raw
            .parameters
            .into_iter()
            .map(|(k, v)| {
                let s = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, s)
            })
            .collect();
        PlanStep { step: raw.step, tool: raw.tool, purpose: raw.purpose, parameters }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawPlan {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    domain_notes: Option<String>,
    #[serde(default)]
    understanding: String,
    #[serde(default)]
    strategy: String,
    #[serde(default)]
    steps: Vec<RawPlanStep>,
    #[serde(default)]
    final_output: String,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
}

impl From<RawPlan> for Plan {
    fn from(raw: RawPlan) -> Self {
        Plan {
            domain: raw.domain,
            domain_notes: raw.domain_notes,
            understanding: raw.understanding,
            strategy: raw.strategy,
            steps: raw.steps.into_iter().map(PlanStep::from).collect(),
            final_output: raw.final_output,
            needs_clarification: raw.needs_clarification,
            clarification_question: raw.clarification_question,
            options: raw.options,
        }
    }
}

/// Rewrite `plan.steps` to the canonical chain for `analysis` whenever the
/// model didn't honor §4.14's mandatory tool mapping table (Open Question
/// 3's resolution: reject/rewrite rather than execute the step as authored).
fn validate_plan(mut plan: Plan, analysis: &QueryAnalysis) -> Plan {
    let Some(chain) = mandatory_tool_chain(analysis.task_type, analysis.target.target_type) else { return plan };
    let actual: Vec<&str> = plan.steps.iter().map(|s| s.tool.as_str()).collect();
    if actual == *chain {
        return plan;
    }
    tracing::warn!(task_type = analysis.task_type.as_str(), scope = analysis.scope, "rewriting plan to match mandatory tool mapping");
    plan.steps = chain.iter().enumerate().map(|(i, tool)| canonical_step((i + 1) as u32, tool, analysis)).collect();
    plan
}

fn canonical_step(step: u32, tool: &str, analysis: &QueryAnalysis) -> PlanStep {
    let mut parameters = ToolParams::new();
    match tool {
        "review_file" => {
            parameters.insert("fileName".to_string(), analysis.target.value.clone());
        }
        "review_code" => {
            parameters.insert("functionName".to_string(), analysis.target.value.clone());
        }
        "search_code" => {
            parameters.insert("query".to_string(), analysis.keywords.join(" "));
        }
        "get_function_context" => {
            parameters.insert("functionName".to_string(), analysis.target.value.clone());
        }
        "answer_question" => {
            parameters.insert("question".to_string(), analysis.target.value.clone());
            if step > 1 {
                parameters.insert("context".to_string(), format!("$step{}", step - 1));
            }
            parameters.insert("useProvidedContext".to_string(), "true".to_string());
        }
        _ => {}
    }
    PlanStep { step, tool: tool.to_string(), purpose: format!("Mandatory {tool} step for {} queries.", analysis.task_type.as_str()), parameters }
}

fn fallback_plan(query: &str, analysis: &QueryAnalysis) -> Plan {
    let mut parameters = ToolParams::new();
    parameters.insert("question".to_string(), query.to_string());
    parameters.insert("context".to_string(), "$context".to_string());
    parameters.insert("useProvidedContext".to_string(), "true".to_string());
    Plan {
        domain: None,
        domain_notes: Some(format!("task_type={}", analysis.task_type.as_str())),
        understanding: format!("Falling back to direct question answering for: {query}"),
        strategy: "single-step answer_question fallback (no LLM planner available)".to_string(),
        steps: vec![PlanStep { step: 1, tool: "answer_question".to_string(), purpose: "Answer directly over available context.".to_string(), parameters }],
        final_output: "answer".to_string(),
        needs_clarification: false,
        clarification_question: None,
        options: vec![],
    }
}

fn build_plan_prompt(query: &str, recent_history: &[String], analysis: &QueryAnalysis, tool_summary: &str, resources_summary: &str) -> String {
    format!(
        "You are planning how to answer a code question using a fixed tool registry.\n\n\
        Query: {query}\n\
        Recent history: {history}\n\n\
        Preclassification: taskType={task}, target={{type: {target_type}, value: {target_value}, exists: {target_exists}}}, scope={scope}, suggestedTool={suggested}, confidence={confidence}\n\n\
        Tools available:\n{tool_summary}\n\n\
        Resources: {resources_summary}\n\n\
        Respond with JSON only: {{domain, domain_notes, understanding, strategy, steps:[{{step,tool,purpose,parameters:{{...}}}}], final_output, needs_clarification?, clarification_question?, options?}}",
        query = query,
        history = recent_history.join(" | "),
        task = analysis.task_type.as_str(),
        target_type = match analysis.target.target_type { TargetType::File => "file", TargetType::Function => "function", TargetType::Concept => "concept" },
        target_value = analysis.target.value,
        target_exists = analysis.target.exists,
        scope = analysis.scope,
        suggested = analysis.suggested_tool,
        confidence = analysis.confidence,
        tool_summary = tool_summary,
        resources_summary = resources_summary,
    )
}

/// `createPlan(query, recentHistory) -> Plan` (§4.14).
pub async fn create_plan(core: &CoreServices, registry: &ToolRegistry, query: &str, recent_history: &[String]) -> Result<Plan, AstraError> {
    let analysis = {
        let index = core.code_index.read().await;
        analyze_query(query, &index)
    };

    let tool_summary: String = registry.list().iter().map(|t| format!("- {}: {}", t.name, t.description)).collect::<Vec<_>>().join("\n");
    let resources_summary = {
        let index = core.code_index.read().await;
        index.discovered_domain().map(|d| d.description.clone()).unwrap_or_else(|| "No domain discovered yet.".to_string())
    };

    let prompt = build_plan_prompt(query, recent_history, &analysis, &tool_summary, &resources_summary);

    let raw = match core.llm.call_model(&prompt, &CallOptions::new(ModelTask::Analysis)).await {
        Ok(text) => text,
        Err(_) => return Ok(fallback_plan(query, &analysis)),
    };

    let plan = match extract_json_object(&raw).and_then(|json| serde_json::from_str::<RawPlan>(&json).ok()) {
        Some(raw_plan) => Plan::from(raw_plan),
        None => return Ok(fallback_plan(query, &analysis)),
    };

    Ok(validate_plan(plan, &analysis))
}

/// Result of one executed step: either a `ToolOutput` or an error message,
/// never both, never aborting the rest of the plan (§4.14).
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: u32,
    pub tool: String,
    pub output: Option<ToolOutput>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlanExecution {
    pub step_outcomes: Vec<StepOutcome>,
    pub final_output: String,
}

const MAX_CONTEXT_CHARS: usize = 20_000;

fn step_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$step(\d+)(?:\.([A-Za-z0-9_.]+))?").unwrap())
}

fn natural_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)result from step (\d+)|previous result").unwrap())
}

fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Groups a JSON array of grep-shaped results by their `file` field into a
/// readable text block, per §4.14's `$stepN.<path>` substitution rule.
fn format_grouped_array(items: &[Value]) -> String {
    let mut by_file: HashMap<String, Vec<String>> = HashMap::new();
    for item in items {
        let file = item.get("file").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let line = item.get("line").and_then(Value::as_u64);
        let entry = match line {
            Some(l) => format!("  line {l}: {item}"),
            None => format!("  {item}"),
        };
        by_file.entry(file).or_default().push(entry);
    }
    let mut files: Vec<&String> = by_file.keys().collect();
    files.sort();
    files.into_iter().map(|f| format!("{f}:\n{}", by_file[f].join("\n"))).collect::<Vec<_>>().join("\n\n")
}

fn step_output_text(outcome: &StepOutcome, path: Option<&str>) -> String {
    let Some(output) = &outcome.output else { return outcome.error.clone().unwrap_or_default() };
    let Some(data) = &output.data else { return String::new() };
    let value = match path {
        Some(p) => walk_path(data, p).unwrap_or(data),
        None => data,
    };
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format_grouped_array(items),
        other => other.to_string(),
    }
}

fn resolve_step_value(n: usize, path: Option<&str>, outcomes: &[StepOutcome]) -> String {
    match outcomes.get(n.saturating_sub(1)) {
        Some(outcome) => step_output_text(outcome, path),
        None => format!("<unresolved step {n}>"),
    }
}

/// Templated-parameter substitution (§4.14): `$context`, `$stepN.<path>`,
/// and the natural-language forms `"result from step N"` / `"previous result"`.
fn substitute_references(raw: &str, context_files: &HashMap<String, String>, outcomes: &[StepOutcome]) -> String {
    let mut text = raw.to_string();

    if text.contains("$context") {
        let joined: String = context_files.values().cloned().collect::<Vec<_>>().join("\n\n");
        let bounded: String = joined.chars().take(MAX_CONTEXT_CHARS).collect();
        text = text.replace("$context", &bounded);
    }

    text = step_ref_re()
        .replace_all(&text, |caps: &Captures| {
            let n: usize = caps[1].parse().unwrap_or(0);
            let path = caps.get(2).map(|m| m.as_str());
            resolve_step_value(n, path, outcomes)
        })
        .into_owned();

    if natural_ref_re().is_match(&text) {
        text = natural_ref_re()
            .replace_all(&text, |caps: &Captures| match caps.get(1) {
                Some(m) => resolve_step_value(m.as_str().parse().unwrap_or(0), None, outcomes),
                None => outcomes.last().map(|o| step_output_text(o, None)).unwrap_or_default(),
            })
            .into_owned();
    }

    text
}

fn inject_domain(params: &mut ToolParams, plan: &Plan) {
    if let Some(domain) = &plan.domain {
        params.entry("domain".to_string()).or_insert_with(|| domain.clone());
    }
    if let Some(notes) = &plan.domain_notes {
        params.entry("domainNotes".to_string()).or_insert_with(|| notes.clone());
    }
}

/// Keys the executor looks for when picking a successful step's primary
/// output to synthesize a final answer from (§4.14).
const OUTPUT_KEYS: &[&str] = &["translatedCode", "translatedFiles", "documentation", "review", "explanation", "answer", "trace", "results"];

fn select_final_output(outcomes: &[StepOutcome], plan: &Plan) -> String {
    for outcome in outcomes.iter().rev() {
        let Some(output) = &outcome.output else { continue };
        if !output.success {
            continue;
        }
        let Some(data) = &output.data else { continue };
        for key in OUTPUT_KEYS {
            if let Some(v) = data.get(*key) {
                return match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
    if outcomes.iter().all(|o| o.output.as_ref().is_none_or(|out| !out.success)) {
        return format!("All plan steps failed. {}", plan.final_output);
    }
    plan.final_output.clone()
}

/// `executePlan` (§4.14): runs every step in order, never aborting on a
/// step failure, checking cancellation at each await point (§5).
pub async fn execute_plan(core: &CoreServices, registry: &ToolRegistry, plan: &Plan) -> Result<PlanExecution, AstraError> {
    let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(plan.steps.len());

    for step in &plan.steps {
        core.task_controller.check_cancelled()?;

        let mut params = {
            let context_files = core.context_files.read().await;
            step.parameters.iter().map(|(k, v)| (k.clone(), substitute_references(v, &context_files, &outcomes))).collect::<ToolParams>()
        };
        inject_domain(&mut params, plan);

        match registry.execute(core, &step.tool, &params).await {
            Ok(output) => {
                tracing::info!(step = step.step, tool = %step.tool, success = output.success, "plan step executed");
                outcomes.push(StepOutcome { step: step.step, tool: step.tool.clone(), output: Some(output), error: None });
            }
            Err(e) => {
                tracing::warn!(step = step.step, tool = %step.tool, error = %e, "plan step failed");
                outcomes.push(StepOutcome { step: step.step, tool: step.tool.clone(), output: None, error: Some(e.to_string()) });
            }
        }
        tokio::task::yield_now().await;
    }

    let final_output = select_final_output(&outcomes, plan);
    Ok(PlanExecution { step_outcomes: outcomes, final_output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_index::{BuildOptions, ContextFile};
    use crate::language::Language;

    fn index_with_function() -> CodeIndex {
        let mut index = CodeIndex::new();
        index.build_sync(&[ContextFile { path: "a.rs".to_string(), content: "fn do_work() {}\n".to_string(), language: Language::Rust }], BuildOptions::default());
        index
    }

    #[test]
    fn analyze_query_detects_review_on_file() {
        let index = index_with_function();
        let analysis = analyze_query("review a.rs for issues", &index);
        assert_eq!(analysis.task_type, TaskType::Review);
        assert_eq!(analysis.target.target_type, TargetType::File);
    }

    #[test]
    fn analyze_query_detects_existing_function_target() {
        let index = index_with_function();
        let analysis = analyze_query("explain do_work in detail", &index);
        assert_eq!(analysis.task_type, TaskType::Explain);
        assert_eq!(analysis.target.target_type, TargetType::Function);
        assert!(analysis.target.exists);
    }

    #[test]
    fn analyze_query_defaults_to_search_and_concept() {
        let index = CodeIndex::new();
        let analysis = analyze_query("random unrelated text", &index);
        assert_eq!(analysis.task_type, TaskType::Search);
        assert_eq!(analysis.target.target_type, TargetType::Concept);
    }

    #[test]
    fn validate_plan_rewrites_wrong_tool_for_review_file() {
        let index = index_with_function();
        let analysis = analyze_query("review a.rs", &index);
        let plan = Plan { steps: vec![PlanStep { step: 1, tool: "answer_question".to_string(), purpose: String::new(), parameters: ToolParams::new() }], ..Default::default() };
        let fixed = validate_plan(plan, &analysis);
        assert_eq!(fixed.steps.len(), 1);
        assert_eq!(fixed.steps[0].tool, "review_file");
    }

    #[test]
    fn validate_plan_leaves_conformant_plan_untouched() {
        let index = index_with_function();
        let analysis = analyze_query("search for do_work", &index);
        let plan = Plan { steps: vec![PlanStep { step: 1, tool: "search_code".to_string(), purpose: "ok".to_string(), parameters: ToolParams::new() }], ..Default::default() };
        let fixed = validate_plan(plan, &analysis);
        assert_eq!(fixed.steps[0].purpose, "ok");
    }

    #[test]
    fn substitute_context_replaces_token() {
        let mut files = HashMap::new();
        files.insert("a.rs".to_string(), "fn run() {}".to_string());
        let text = substitute_references("Context: $context", &files, &[]);
        assert!(text.contains("fn run()"));
    }

    #[test]
    fn substitute_step_reference_walks_dotted_path() {
        let outcome = StepOutcome { step: 1, tool: "search_code".to_string(), output: Some(ToolOutput::ok(serde_json::json!({"queryType": "general"}))), error: None };
        let text = substitute_references("type=$step1.queryType", &HashMap::new(), &[outcome]);
        assert_eq!(text, "type=general");
    }

    #[test]
    fn substitute_step_reference_groups_array_by_file() {
        let outcome = StepOutcome {
            step: 1,
            tool: "search_code".to_string(),
            output: Some(ToolOutput::ok(serde_json::json!({"results": [{"file": "a.rs", "line": 3}, {"file": "a.rs", "line": 9}]}))),
            error: None,
        };
        let text = substitute_references("$step1.results", &HashMap::new(), &[outcome]);
        assert!(text.contains("a.rs:"));
        assert!(text.contains("line 3"));
        assert!(text.contains("line 9"));
    }

    #[test]
    fn natural_language_previous_result_resolves_last_step() {
        let outcome = StepOutcome { step: 1, tool: "x".to_string(), output: Some(ToolOutput::ok(serde_json::json!({"answer": "hi"}))), error: None };
        let text = substitute_references("use the previous result here", &HashMap::new(), &[outcome]);
        assert!(text.contains("hi"));
    }

    #[tokio::test]
    async fn create_plan_falls_back_when_llm_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let registry = ToolRegistry;
        let plan = create_plan(&core, &registry, "what does this do", &[]).await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "answer_question");
    }

    #[tokio::test]
    async fn execute_plan_runs_every_step_even_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let registry = ToolRegistry;
        let mut bad_params = ToolParams::new();
        bad_params.insert("function".to_string(), "nope".to_string());
        let plan = Plan {
            steps: vec![
                PlanStep { step: 1, tool: "search_calls".to_string(), purpose: String::new(), parameters: bad_params },
                PlanStep { step: 2, tool: "list_context_files".to_string(), purpose: String::new(), parameters: ToolParams::new() },
            ],
            final_output: "none".to_string(),
            ..Default::default()
        };
        let execution = execute_plan(&core, &registry, &plan).await.unwrap();
        assert_eq!(execution.step_outcomes.len(), 2);
        assert!(execution.step_outcomes[1].output.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn execute_plan_reports_explanatory_message_when_everything_fails() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreServices::new(dir.path());
        let registry = ToolRegistry;
        let plan = Plan {
            steps: vec![PlanStep { step: 1, tool: "get_symbol_info".to_string(), purpose: String::new(), parameters: ToolParams::new() }],
            final_output: "no answer".to_string(),
            ..Default::default()
        };
        let execution = execute_plan(&core, &registry, &plan).await.unwrap();
        assert!(execution.final_output.contains("All plan steps failed") || execution.final_output.contains("no answer"));
    }
}
