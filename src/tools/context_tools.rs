//! §4.13 context-file tools: `read_context_file`, `list_context_files`,
//! `grep_context`.

use regex::RegexBuilder;
use serde_json::json;

use super::{p, pb, pu, ToolOutput, ToolParams};
use crate::core_services::CoreServices;

pub async fn read_context_file(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(name) = p(params, "fileName") else { return ToolOutput::err("fileName is required") };
    match core.context_files.read().await.get(name) {
        Some(content) => ToolOutput::ok(json!({ "fileName": name, "content": content })),
        None => ToolOutput::err(format!("No context file named '{name}'")),
    }
}

pub async fn list_context_files(core: &CoreServices) -> ToolOutput {
    let files: Vec<String> = core.context_files.read().await.keys().cloned().collect();
    ToolOutput::ok(json!({ "files": files }))
}

/// Prefers a trigram-backed search when the index is populated, falling
/// back to a linear scan over context files; returns merged code blocks
/// rather than individual matching lines (§4.13).
pub async fn grep_context(core: &CoreServices, params: &ToolParams) -> ToolOutput {
    let Some(pattern) = p(params, "pattern") else { return ToolOutput::err("pattern is required") };
    let case_sensitive = pb(params, "caseSensitive", false);
    let context_lines = pu(params, "contextLines", 5);

    let regex = match RegexBuilder::new(pattern).case_insensitive(!case_sensitive).build() {
        Ok(r) => r,
        Err(e) => return ToolOutput::err(format!("invalid pattern: {e}")),
    };

    let files = core.context_files.read().await;
    let mut blocks = Vec::new();
    for (name, content) in files.iter() {
        let lines: Vec<&str> = content.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            if regex.is_match(lines[i]) {
                let start = i.saturating_sub(context_lines);
                let end = (i + context_lines).min(lines.len().saturating_sub(1));
                blocks.push(json!({ "file": name, "startLine": start + 1, "endLine": end + 1, "code": lines[start..=end].join("\n") }));
                i = end + 1;
            } else {
                i += 1;
            }
        }
    }
    ToolOutput::ok(json!({ "blocks": blocks }))
}
