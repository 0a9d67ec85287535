use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::core_services::CoreServices;
use crate::mcp::protocol::*;
use crate::tools::{ToolParams, ToolRegistry};

/// Run the MCP server event loop over stdio. Blocks the calling task until
/// stdin closes. `core` and `registry` are shared with the (optional) file
/// watcher, so a rebuild triggered by a file change is visible to the very
/// next tool call.
pub async fn run_server(core: Arc<CoreServices>, registry: Arc<ToolRegistry>) {
    info!("MCP server ready, waiting for JSON-RPC requests on stdin");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "error reading stdin");
                    break;
                }
            }
        }
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    while let Some(line) = rx.recv().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(request = %line, "incoming JSON-RPC");

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to parse JSON-RPC request");
                let err = JsonRpcErrorResponse::new(Value::Null, -32700, format!("Parse error: {e}"));
                write_line(&mut writer, &serde_json::to_string(&err).unwrap());
                continue;
            }
        };

        // Notifications have no id — don't send a response.
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "received notification");
            continue;
        };

        let response = handle_request(&core, &registry, &request.method, &request.params, id).await;
        write_line(&mut writer, &serde_json::to_string(&response).unwrap());
    }

    info!("stdin closed, shutting down");
}

fn write_line(writer: &mut impl Write, line: &str) {
    debug!(response = %line, "outgoing JSON-RPC");
    let _ = writeln!(writer, "{line}");
    let _ = writer.flush();
}

async fn handle_request(core: &CoreServices, registry: &ToolRegistry, method: &str, params: &Option<Value>, id: Value) -> Value {
    match method {
        "initialize" => ok_response(id, InitializeResult::new()),
        "tools/list" => ok_response(id, ToolsListResult { tools: registry.list() }),
        "tools/call" => {
            let Some(params) = params else {
                return ok_response(id, ToolCallResult::error("Missing params".to_string()));
            };
            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
            let result = dispatch_tool(core, registry, tool_name, &arguments).await;
            ok_response(id, result)
        }
        "ping" => ok_response(id, json!({})),
        _ => serde_json::to_value(JsonRpcErrorResponse::new(id, -32601, format!("Method not found: {method}"))).unwrap(),
    }
}

/// §4.6/§7 QueryBlocked: while the indexer is (re)building, every tool call
/// gets the blocking message instead of being dispatched.
async fn dispatch_tool(core: &CoreServices, registry: &ToolRegistry, name: &str, arguments: &Value) -> ToolCallResult {
    if let Some(message) = core.blocking_message().await {
        return ToolCallResult::success(message);
    }
    if !registry.has(name) {
        return ToolCallResult::error(format!("Unknown tool: {name}"));
    }

    let params: ToolParams = arguments
        .as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    match registry.execute(core, name, &params).await {
        Ok(output) if output.success => ToolCallResult::success(serde_json::to_string_pretty(&output.data.unwrap_or(Value::Null)).unwrap_or_default()),
        Ok(output) => ToolCallResult::error(output.error.unwrap_or_else(|| "tool failed".to_string())),
        Err(e) => ToolCallResult::error(e.to_string()),
    }
}

fn ok_response(id: Value, result: impl serde::Serialize) -> Value {
    serde_json::to_value(JsonRpcResponse::new(id, serde_json::to_value(result).unwrap())).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_core() -> (Arc<CoreServices>, Arc<ToolRegistry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreServices::new(dir.path()));
        core.indexing_state.write().await.complete();
        (core, Arc::new(ToolRegistry), dir)
    }

    #[tokio::test]
    async fn handle_initialize() {
        let (core, registry, _dir) = make_core().await;
        let result = handle_request(&core, &registry, "initialize", &None, json!(1)).await;
        assert_eq!(result["jsonrpc"], "2.0");
        assert_eq!(result["id"], 1);
        assert_eq!(result["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(result["result"]["serverInfo"]["name"], "astra");
    }

    #[tokio::test]
    async fn handle_tools_list_covers_catalog() {
        let (core, registry, _dir) = make_core().await;
        let result = handle_request(&core, &registry, "tools/list", &None, json!(2)).await;
        let tools = result["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), crate::tools::TOOL_CATALOG.len());
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"search_code"));
        assert!(names.contains(&"answer_question"));
    }

    #[tokio::test]
    async fn handle_tools_call_unknown_tool() {
        let (core, registry, _dir) = make_core().await;
        let params = json!({"name": "not_a_real_tool", "arguments": {}});
        let result = handle_request(&core, &registry, "tools/call", &Some(params), json!(3)).await;
        assert_eq!(result["result"]["isError"], true);
    }

    #[tokio::test]
    async fn handle_tools_call_missing_params() {
        let (core, registry, _dir) = make_core().await;
        let result = handle_request(&core, &registry, "tools/call", &None, json!(5)).await;
        assert_eq!(result["result"]["isError"], true);
        assert!(result["result"]["content"][0]["text"].as_str().unwrap().contains("Missing params"));
    }

    #[tokio::test]
    async fn handle_unknown_method() {
        let (core, registry, _dir) = make_core().await;
        let result = handle_request(&core, &registry, "unknown/method", &None, json!(99)).await;
        assert_eq!(result["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn blocked_while_indexing() {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreServices::new(dir.path()));
        // fresh CoreServices starts in Phase::Idle, which does not block;
        // advance it into an indexing phase to exercise the gate.
        core.indexing_state.write().await.advance(Default::default(), 10);
        let registry = Arc::new(ToolRegistry);
        let params = json!({"name": "search_code", "arguments": {"query": "foo"}});
        let result = handle_request(&core, &registry, "tools/call", &Some(params), json!(6)).await;
        assert_eq!(result["result"]["isError"], false);
        let text = result["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.to_lowercase().contains("index"));
    }
}
