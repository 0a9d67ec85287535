//! Single source of truth for best practices and tips.
//! Used by: CLI `astra tips`, MCP `instructions` field.

use serde_json::{json, Value};

/// A single best practice tip.
pub struct Tip {
    pub rule: &'static str,
    pub why: &'static str,
    pub example: &'static str,
}

/// Performance tier description.
pub struct PerfTier {
    pub name: &'static str,
    pub range: &'static str,
    pub operations: &'static [&'static str],
}

/// Tool priority entry.
pub struct ToolPriority {
    pub rank: u8,
    pub tool: &'static str,
    pub description: &'static str,
}

// ─── Single source of truth ─────────────────────────────────────────

pub fn tips() -> Vec<Tip> {
    vec![
        Tip {
            rule: "Implementation questions: use search_code, not search_index alone",
            why: "search_code runs the symbol index and the trigram index together in one call, so it catches both named symbols and literal substrings.",
            example: "MCP: search_code query='retry backoff' | CLI: astra search-code \"retry backoff\"",
        },
        Tip {
            rule: "Conceptual questions: use search_semantic",
            why: "The vector index matches on meaning, not exact tokens — good for 'where is X handled' questions that don't name a symbol.",
            example: "MCP: search_semantic query='where do we validate incoming webhooks' | CLI: astra search-semantic \"...\"",
        },
        Tip {
            rule: "Call chain tracing: search_calls or get_call_graph",
            why: "One call replaces chaining search_code + read_context_file across every caller/callee. direction='callers' or direction='callees' (default both).",
            example: "MCP: search_calls function='processOrder', direction='callers'",
        },
        Tip {
            rule: "Function context in one call",
            why: "get_function_context returns a function's source plus its callers and callees together, instead of separate get_symbol_info and search_calls round-trips.",
            example: "MCP: get_function_context functionName='processOrder'",
        },
        Tip {
            rule: "Unfamiliar codebase: analyze_code_structure first",
            why: "Returns the discovered domain, languages, and modules in one call — useful before deep-diving with other tools.",
            example: "MCP: analyze_code_structure",
        },
        Tip {
            rule: "Prefer synthesis tools over manual search chains",
            why: "answer_question, explain_code, and trace_code already run comprehensive search plus two-stage synthesis; hand-assembling the same thing from search_* calls wastes round-trips.",
            example: "MCP: answer_question question='how does the retry queue work?'",
        },
        Tip {
            rule: "Context files are separate from the indexed codebase",
            why: "grep_context/read_context_file/list_context_files operate only on files explicitly added to context, not the full index.",
            example: "CLI: astra context add notes.md | MCP: grep_context pattern='TODO'",
        },
        Tip {
            rule: "Queries made while indexing is in progress are blocked",
            why: "isIndexing blocks tool dispatch until the rebuild reaches the ready phase; summarization alone does not block.",
            example: "Check astra stats — retry once `indexing` is false.",
        },
        Tip {
            rule: "Translate/generate tools need an explicit target language",
            why: "translate_code/translate_file/translate_all_files require targetLanguage; omitting it is a validation error, not a guess.",
            example: "MCP: translate_file fileName='parser.py' targetLanguage='rust'",
        },
    ]
}

pub fn performance_tiers() -> Vec<PerfTier> {
    vec![
        PerfTier {
            name: "Instant",
            range: "<1ms",
            operations: &["search_calls", "search_index", "list_symbols"],
        },
        PerfTier {
            name: "Fast",
            range: "1-10ms",
            operations: &["search_trigram", "search_code", "grep_context"],
        },
        PerfTier {
            name: "Model-bound",
            range: ">1s",
            operations: &["answer_question", "explain_code", "trace_code", "review_code", "generate_code"],
        },
    ]
}

pub fn tool_priority() -> Vec<ToolPriority> {
    vec![
        ToolPriority { rank: 1, tool: "search_code", description: "combined symbol + trigram search (preferred default)" },
        ToolPriority { rank: 2, tool: "search_calls / get_call_graph", description: "call tree up/down" },
        ToolPriority { rank: 3, tool: "search_semantic", description: "conceptual/fuzzy questions over the vector index" },
        ToolPriority { rank: 4, tool: "answer_question / explain_code / trace_code", description: "full synthesis pipeline for prose answers" },
        ToolPriority { rank: 5, tool: "grep_context", description: "pattern search over explicitly added context files" },
    ]
}

// ─── Renderers ──────────────────────────────────────────────────────

/// Render tips as human-readable CLI output.
pub fn render_cli() -> String {
    let mut out = String::new();
    out.push_str("\nastra — Best Practices & Tips\n");
    out.push_str("═══════════════════════════════\n\n");

    out.push_str("BEST PRACTICES\n");
    out.push_str("──────────────\n");
    for (i, tip) in tips().iter().enumerate() {
        out.push_str(&format!("{:2}. {}\n", i + 1, tip.rule));
        out.push_str(&format!("    Why: {}\n", tip.why));
        out.push_str(&format!("    Example: {}\n\n", tip.example));
    }

    out.push_str("PERFORMANCE TIERS\n");
    out.push_str("─────────────────\n");
    for tier in performance_tiers() {
        out.push_str(&format!("  {:>12}  {}\n", tier.range, tier.operations.join(", ")));
    }
    out.push('\n');

    out.push_str("TOOL PRIORITY\n");
    out.push_str("─────────────\n");
    for tp in tool_priority() {
        out.push_str(&format!("  {}. {:32} — {}\n", tp.rank, tp.tool, tp.description));
    }
    out.push('\n');

    out
}

/// Render tips as JSON.
pub fn render_json() -> Value {
    let best_practices: Vec<Value> = tips().iter().map(|t| {
        json!({
            "rule": t.rule,
            "why": t.why,
            "example": t.example,
        })
    }).collect();

    let mut tiers = serde_json::Map::new();
    for tier in performance_tiers() {
        let key = format!("{}_{}", tier.name.to_lowercase().replace(' ', "_"), tier.range.replace(['<', '>', ' '], ""));
        tiers.insert(key, json!(tier.operations));
    }

    let priority: Vec<Value> = tool_priority().iter().map(|tp| {
        json!(format!("{}. {} — {}", tp.rank, tp.tool, tp.description))
    }).collect();

    json!({
        "bestPractices": best_practices,
        "performanceTiers": tiers,
        "toolPriority": priority,
    })
}

/// Render tips as compact text for an MCP initialize instructions field.
pub fn render_instructions() -> String {
    let mut out = String::new();
    out.push_str("astra MCP server — Best Practices for Tool Selection\n\n");

    for (i, tip) in tips().iter().enumerate() {
        out.push_str(&format!("{}. {}: {}\n", i + 1, tip.rule.to_uppercase(), tip.why));
    }

    out.push_str("\nTOOL PRIORITY:\n");
    for tp in tool_priority() {
        out.push_str(&format!("  {}. {} — {}\n", tp.rank, tp.tool, tp.description));
    }

    out
}
