//! §5 file watcher: debounced full rebuild on any source-file change while
//! the MCP server is running (`astra serve --watch`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::cli;
use crate::code_index::BuildOptions;
use crate::core_services::CoreServices;
use crate::indexer;

/// Start watching `dir` for changes. Returns the `RecommendedWatcher`
/// itself — the caller must keep it alive (dropping it stops watching).
/// Any create/modify/remove event within the debounce window collapses
/// into a single full rebuild, since the indexed call graph and trigram
/// postings aren't amenable to incremental per-file patching (§5).
pub fn start_watcher(core: Arc<CoreServices>, dir: PathBuf, debounce_ms: u64, enable_auto_summary: bool) -> notify::Result<RecommendedWatcher> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(move |res| {
        let _ = tx.send(res);
    }, Config::default())?;
    watcher.watch(&dir, RecursiveMode::Recursive)?;

    info!(dir = %dir.display(), debounce_ms, "file watcher started");

    tokio::spawn(async move {
        let mut pending = false;
        loop {
            let event = tokio::time::timeout(Duration::from_millis(debounce_ms), rx.recv()).await;
            match event {
                Ok(Some(Ok(_))) => pending = true,
                Ok(Some(Err(e))) => warn!(error = %e, "file watcher error"),
                Ok(None) => break, // sender dropped, watcher gone
                Err(_elapsed) => {
                    if pending {
                        pending = false;
                        rebuild(&core, &dir, enable_auto_summary).await;
                    }
                }
            }
        }
    });

    Ok(watcher)
}

async fn rebuild(core: &CoreServices, dir: &std::path::Path, enable_auto_summary: bool) {
    info!(dir = %dir.display(), "change detected, rebuilding index");
    let files = indexer::discover_context_files(dir);
    if let Err(e) = indexer::rebuild(core, files, BuildOptions { lightweight: false, force_rebuild: true }, enable_auto_summary).await {
        warn!(error = %e, "rebuild after file-change event failed");
        return;
    }
    if let Err(e) = cli::persist_all(core).await {
        warn!(error = %e, "failed to persist index after watcher rebuild");
    }
}
