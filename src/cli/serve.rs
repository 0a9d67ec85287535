//! `astra serve` — index (or restore) a directory, then run the MCP
//! server over stdio, optionally with a debounced file watcher (§5/§9.1).

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{self, Config};
use crate::core_services::CoreServices;
use crate::mcp::{server, watcher};
use crate::tools::ToolRegistry;

use super::args::ServeArgs;
use super::{init_logging, install_ctrlc, load_or_rebuild, runtime};

pub fn cmd_serve(args: ServeArgs) {
    init_logging(&args.log_level);
    let dir = Path::new(&args.dir);
    if !dir.is_dir() {
        error!(dir = %args.dir, "directory does not exist");
        return;
    }

    runtime().block_on(async {
        let core = Arc::new(CoreServices::new(dir));
        install_ctrlc(&core);

        let enable_summaries = args.summaries || core.config.get_bool(config::keys::ENABLE_AUTO_SUMMARY, true);
        if let Err(e) = load_or_rebuild(&core, dir, enable_summaries).await {
            error!(error = %e, "initial index build failed");
            return;
        }

        // Keep the watcher handle alive for the lifetime of the server; it
        // stops watching the instant it's dropped.
        let _watcher = if args.watch {
            match watcher::start_watcher(core.clone(), dir.to_path_buf(), args.debounce_ms, enable_summaries) {
                Ok(w) => Some(w),
                Err(e) => {
                    error!(error = %e, "failed to start file watcher, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        info!(dir = %args.dir, watch = args.watch, "astra MCP server starting");
        let registry = Arc::new(ToolRegistry);
        server::run_server(core, registry).await;
    });
}
