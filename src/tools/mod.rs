//! C14 — ToolRegistry (§4.13). Each tool is `{name, description,
//! parameters, execute(params) -> {success, data?, error?}}`; the registry
//! is a flat dispatch table rather than one struct per tool, matching the
//! single `handle_request` dispatch the MCP server already uses (§9.1).

mod context_tools;
mod generation_tools;
mod search_tools;
mod synthesis_tools;

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::core_services::CoreServices;

/// `{success, data?, error?}` (§4.13).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

/// Parameters are always plain strings; the executor templates
/// `$context` / `$stepN.<path>` / natural-language references into them
/// before `execute` is called (§4.14).
pub type ToolParams = HashMap<String, String>;

fn param<'a>(params: &'a ToolParams, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn param_bool(params: &ToolParams, key: &str, default: bool) -> bool {
    params.get(key).map(|v| v == "true" || v == "1").unwrap_or(default)
}

fn param_usize(params: &ToolParams, key: &str, default: usize) -> usize {
    params.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// One entry in the registry's catalog: the metadata surfaced to the
/// planner/MCP tools-list, independent of the dispatch implementation.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [(&'static str, &'static str)],
}

/// §4.13's required tool set (canonical names and parameter shapes).
pub const TOOL_CATALOG: &[ToolSpec] = &[
    ToolSpec { name: "read_context_file", description: "Read the content of a named context file.", parameters: &[("fileName", "string")] },
    ToolSpec { name: "list_context_files", description: "List all files currently in context.", parameters: &[] },
    ToolSpec { name: "grep_context", description: "Search context files for a pattern, returning merged code blocks.", parameters: &[("pattern", "string"), ("caseSensitive", "boolean"), ("contextLines", "number")] },
    ToolSpec { name: "search_calls", description: "Find callers and/or callees of a function.", parameters: &[("function", "string"), ("direction", "string")] },
    ToolSpec { name: "search_index", description: "Search the symbol index by pattern.", parameters: &[("pattern", "string"), ("type", "string"), ("fuzzy", "boolean")] },
    ToolSpec { name: "search_trigram", description: "Search the trigram index for a literal substring.", parameters: &[("pattern", "string")] },
    ToolSpec { name: "search_semantic", description: "Search the vector index for semantically similar code.", parameters: &[("query", "string")] },
    ToolSpec { name: "search_code", description: "Combined index + trigram search; preferred for implementation queries.", parameters: &[("query", "string")] },
    ToolSpec { name: "get_function_context", description: "Get a function's source, callers, and callees.", parameters: &[("functionName", "string")] },
    ToolSpec { name: "get_symbol_info", description: "Get metadata for a symbol.", parameters: &[("symbolName", "string")] },
    ToolSpec { name: "get_call_graph", description: "Get the call graph around a function up to a depth.", parameters: &[("functionName", "string"), ("depth", "number")] },
    ToolSpec { name: "list_symbols", description: "List symbols, optionally filtered by kind or file.", parameters: &[("kind", "string"), ("file", "string")] },
    ToolSpec { name: "analyze_code_structure", description: "Summarize the structure of the indexed codebase.", parameters: &[] },
    ToolSpec { name: "explain_code", description: "Explain how a piece of code works.", parameters: &[("query", "string")] },
    ToolSpec { name: "document_code", description: "Generate documentation for a function or file.", parameters: &[("target", "string")] },
    ToolSpec { name: "generate_full_documentation", description: "Generate full project documentation.", parameters: &[("projectName", "string")] },
    ToolSpec { name: "review_code", description: "Review a function for issues.", parameters: &[("functionName", "string")] },
    ToolSpec { name: "review_file", description: "Review a file for issues.", parameters: &[("fileName", "string")] },
    ToolSpec { name: "trace_code", description: "Trace the execution path through a codebase for a query.", parameters: &[("query", "string")] },
    ToolSpec { name: "translate_code", description: "Translate a code snippet to a target language.", parameters: &[("code", "string"), ("targetLanguage", "string")] },
    ToolSpec { name: "translate_file", description: "Translate a file to a target language.", parameters: &[("fileName", "string"), ("targetLanguage", "string")] },
    ToolSpec { name: "translate_all_files", description: "Translate every context file to a target language.", parameters: &[("targetLanguage", "string")] },
    ToolSpec { name: "generate_code", description: "Generate new code from a natural-language description.", parameters: &[("description", "string")] },
    ToolSpec { name: "create_from_example", description: "Generate code modeled on an example.", parameters: &[("exampleFile", "string"), ("description", "string")] },
    ToolSpec { name: "answer_question", description: "Answer a question using the synthesizer over retrieved context.", parameters: &[("question", "string"), ("context", "string"), ("domain", "string"), ("requireCodeCitations", "boolean"), ("useProvidedContext", "boolean")] },
];

fn json_schema(spec: &ToolSpec) -> Value {
    let properties: serde_json::Map<String, Value> = spec.parameters.iter().map(|(name, ty)| (name.to_string(), json!({"type": ty}))).collect();
    json!({ "type": "object", "properties": properties })
}

pub struct ToolRegistry;

impl ToolRegistry {
    /// §4.13/MCP `tools/list`: the catalog rendered as protocol tool
    /// definitions.
    pub fn list(&self) -> Vec<crate::mcp::protocol::ToolDefinition> {
        TOOL_CATALOG
            .iter()
            .map(|spec| crate::mcp::protocol::ToolDefinition { name: spec.name.to_string(), description: spec.description.to_string(), input_schema: json_schema(spec) })
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        TOOL_CATALOG.iter().any(|s| s.name == name)
    }

    /// Dispatch a tool call by name (§4.13). Unknown tool names are an
    /// executor-level error (`AstraError::UnknownTool`), not a `ToolOutput`.
    pub async fn execute(&self, core: &CoreServices, name: &str, params: &ToolParams) -> Result<ToolOutput, crate::error::AstraError> {
        if !self.has(name) {
            return Err(crate::error::AstraError::UnknownTool(name.to_string()));
        }
        Ok(match name {
            "read_context_file" => context_tools::read_context_file(core, params).await,
            "list_context_files" => context_tools::list_context_files(core).await,
            "grep_context" => context_tools::grep_context(core, params).await,
            "search_calls" => search_tools::search_calls(core, params).await,
            "search_index" => search_tools::search_index(core, params).await,
            "search_trigram" => search_tools::search_trigram(core, params).await,
            "search_semantic" => search_tools::search_semantic(core, params).await,
            "search_code" => search_tools::search_code(core, params).await,
            "get_function_context" => search_tools::get_function_context(core, params).await,
            "get_symbol_info" => search_tools::get_symbol_info(core, params).await,
            "get_call_graph" => search_tools::get_call_graph(core, params).await,
            "list_symbols" => search_tools::list_symbols(core, params).await,
            "analyze_code_structure" => search_tools::analyze_code_structure(core).await,
            "answer_question" => synthesis_tools::answer_question(core, params).await,
            "explain_code" => synthesis_tools::explain_code(core, params).await,
            "document_code" => synthesis_tools::document_code(core, params).await,
            "generate_full_documentation" => synthesis_tools::generate_full_documentation(core, params).await,
            "review_code" => synthesis_tools::review_code(core, params).await,
            "review_file" => synthesis_tools::review_file(core, params).await,
            "trace_code" => synthesis_tools::trace_code(core, params).await,
            "translate_code" => generation_tools::translate_code(core, params).await,
            "translate_file" => generation_tools::translate_file(core, params).await,
            "translate_all_files" => generation_tools::translate_all_files(core, params).await,
            "generate_code" => generation_tools::generate_code(core, params).await,
            "create_from_example" => generation_tools::create_from_example(core, params).await,
            _ => unreachable!("checked by has() above"),
        })
    }
}

pub(crate) use param as p;
pub(crate) use param_bool as pb;
pub(crate) use param_usize as pu;
