//! CLI argument structs for all `astra` subcommands.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "astra", version, about = "Code-intelligence core: multi-layer indexing + plan/execute/synthesize orchestration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build (or rebuild) every index for a directory and persist it under `.astra/`.
    Index(IndexArgs),
    /// Run the MCP server (JSON-RPC 2.0 over stdio) against a directory.
    Serve(ServeArgs),
    /// One-shot plan/execute/synthesize over an already-built index.
    Ask(AskArgs),
    /// Show indexing state, counters, and domain fingerprint for a directory.
    Stats(StatsArgs),
    /// Print best-practice tips for tool selection (same content the MCP
    /// server exposes via `initialize`'s `instructions` field).
    Tips,
}

#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Directory to index.
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Include hidden files.
    #[arg(long)]
    pub hidden: bool,

    /// Also index paths matched by `.gitignore`.
    #[arg(long)]
    pub no_ignore: bool,

    /// Use the lightweight build profile (caps symbols/variables per file,
    /// skips call-graph construction for files > 50 KB; §4.2).
    #[arg(long)]
    pub lightweight: bool,

    /// Run the summarizer (§4.7) after the core indexes are built. Without
    /// an LLM provider configured this still produces name-based summaries.
    #[arg(long)]
    pub summaries: bool,

    /// Log level for stderr output (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"WHAT IS MCP:
  Model Context Protocol (MCP) is a JSON-RPC 2.0 protocol over stdio that
  lets an agent host (editor, CLI, chat client) call tools natively. The
  server reads JSON requests from stdin and writes responses to stdout;
  all logging goes to stderr so it never pollutes the JSON-RPC stream.

EXAMPLES:
  astra serve --dir . --summaries
  astra serve --dir /path/to/repo --watch --debounce-ms 750

VS CODE CONFIGURATION (.vscode/mcp.json):
  {
    "servers": {
      "astra": {
        "command": "astra",
        "args": ["serve", "--dir", "/path/to/repo", "--summaries"]
      }
    }
  }
"#)]
pub struct ServeArgs {
    /// Directory to index and serve.
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Watch for file changes and trigger a debounced rebuild (§5).
    #[arg(long)]
    pub watch: bool,

    /// Debounce delay in ms for the file watcher.
    #[arg(long, default_value = "500")]
    pub debounce_ms: u64,

    /// Run the summarizer after every (re)build.
    #[arg(long)]
    pub summaries: bool,

    /// Log level for stderr output (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Question to ask.
    pub query: String,

    /// Directory whose persisted index to load (must be indexed first).
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Skip the planner and call `answer_question` directly over the
    /// comprehensive-search pipeline, rather than an LLM-authored plan.
    #[arg(long)]
    pub no_plan: bool,

    /// Log level for stderr output (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Directory whose persisted index to inspect.
    #[arg(short, long, default_value = ".")]
    pub dir: String,
}
