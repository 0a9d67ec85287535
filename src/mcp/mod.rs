//! C9/§9.1 — the MCP JSON-RPC 2.0 server surface: wire protocol types,
//! the stdio request loop, and the debounced file watcher that triggers
//! rebuilds while the server is running.

pub mod protocol;
pub mod server;
pub mod watcher;
