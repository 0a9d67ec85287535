//! CLI dispatch: `astra index|serve|ask|stats|tips`.

pub mod args;
mod serve;

use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use crate::code_index::BuildOptions;
use crate::config::{self, Config};
use crate::core_services::CoreServices;
use crate::error::AstraError;
use crate::indexer;
use crate::planner;
use crate::query_classifier::QueryClassifier;
use crate::tools::{ToolParams, ToolRegistry};

use args::{AskArgs, Cli, Commands, IndexArgs, StatsArgs};

pub fn run() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Index(args) => cmd_index(args),
        Commands::Serve(args) => {
            serve::cmd_serve(args);
            Ok(())
        }
        Commands::Ask(args) => cmd_ask(args),
        Commands::Stats(args) => cmd_stats(args),
        Commands::Tips => {
            print!("{}", crate::tips::render_cli());
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

pub(crate) fn init_logging(level: &str) {
    let log_level = match level {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };
    let _ = tracing_subscriber::fmt().with_max_level(log_level).with_target(true).with_writer(std::io::stderr).try_init();
}

pub(crate) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to start tokio runtime")
}

/// §5 TaskController: wire the process's Ctrl-C signal to the core's
/// cancellation token so a long-running index/ask/serve run can be
/// interrupted cleanly at its next suspension point.
pub(crate) fn install_ctrlc(core: &CoreServices) {
    let controller = core.task_controller.clone();
    let _ = ctrlc::set_handler(move || {
        warn!("received Ctrl-C, cancelling current task");
        controller.cancel();
    });
}

/// §5/§6: persist every singleton index at the end of a (re)build.
pub(crate) async fn persist_all(core: &CoreServices) -> Result<(), AstraError> {
    core.persistence.save_code_index(&*core.code_index.read().await)?;
    core.persistence.save_trigram_index(&*core.trigram_index.read().await)?;
    core.persistence.save_vector_index(&*core.vector_index.read().await)?;
    core.persistence.save_inverted_summary_index(&*core.inverted_summary.read().await)?;
    Ok(())
}

/// §7 IndexCorruption policy: try to restore a previously-persisted index;
/// on any failure (missing files, corrupt snapshot), log and fall through to
/// a full rebuild rather than surfacing a fatal error.
async fn try_restore(core: &CoreServices, root: &Path) -> Result<(), AstraError> {
    let code_index = core.persistence.restore_code_index()?;
    let trigram = core.persistence.restore_trigram_index()?;
    let mut vector = core.persistence.restore_vector_index()?;
    vector.rehydrate_from_disk(root);
    let inverted = core.persistence.restore_inverted_summary_index()?;

    *core.code_index.write().await = code_index;
    *core.trigram_index.write().await = trigram;
    *core.vector_index.write().await = vector;
    *core.inverted_summary.write().await = inverted;
    {
        let index = core.code_index.read().await;
        *core.classifier.write().await = QueryClassifier::learn(&index);
    }
    core.indexing_state.write().await.complete();
    Ok(())
}

/// Load a persisted index for `root`, falling back to a from-scratch build
/// (and re-persisting it) when nothing usable is on disk.
pub(crate) async fn load_or_rebuild(core: &CoreServices, root: &Path, enable_auto_summary: bool) -> Result<(), AstraError> {
    match try_restore(core, root).await {
        Ok(()) => {
            info!(dir = %root.display(), "restored persisted index");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, dir = %root.display(), "no usable persisted index found; building from scratch");
            let files = indexer::discover_context_files(root);
            indexer::rebuild(core, files, BuildOptions::default(), enable_auto_summary).await?;
            persist_all(core).await?;
            Ok(())
        }
    }
}

fn cmd_index(args: IndexArgs) -> Result<(), AstraError> {
    init_logging(&args.log_level);
    let dir = Path::new(&args.dir);
    if !dir.is_dir() {
        return Err(AstraError::DirNotFound(args.dir.clone()));
    }

    runtime().block_on(async {
        let core = CoreServices::new(dir);
        install_ctrlc(&core);

        let enable_summaries = args.summaries || core.config.get_bool(config::keys::ENABLE_AUTO_SUMMARY, true);
        let files = indexer::discover_context_files(dir);
        info!(files = files.len(), dir = %args.dir, "discovered context files");

        let opts = BuildOptions { lightweight: args.lightweight, force_rebuild: true };
        indexer::rebuild(&core, files, opts, enable_summaries).await?;
        persist_all(&core).await?;

        let state = core.indexing_state.read().await;
        let counters = state.counters();
        println!(
            "indexed {} files, {} symbols ({}), {} summaries",
            counters.files_indexed,
            counters.symbols_found,
            if enable_summaries { "summaries enabled" } else { "no summaries" },
            counters.summaries_generated,
        );
        Ok(())
    })
}

fn cmd_ask(args: AskArgs) -> Result<(), AstraError> {
    init_logging(&args.log_level);
    let dir = Path::new(&args.dir);
    if !dir.is_dir() {
        return Err(AstraError::DirNotFound(args.dir.clone()));
    }

    runtime().block_on(async {
        let core = CoreServices::new(dir);
        install_ctrlc(&core);
        let enable_summaries = core.config.get_bool(config::keys::ENABLE_AUTO_SUMMARY, true);
        load_or_rebuild(&core, dir, enable_summaries).await?;

        if core.should_block_queries().await {
            // §4.6/§7 QueryBlocked: never reachable in the one-shot CLI path
            // since `load_or_rebuild` always awaits completion, but the
            // check is kept so embedders copying this flow inherit it.
            println!("{}", core.blocking_message().await.unwrap());
            return Ok(());
        }

        let registry = ToolRegistry;
        let answer = if args.no_plan {
            let mut params = ToolParams::new();
            params.insert("question".to_string(), args.query.clone());
            match registry.execute(&core, "answer_question", &params).await? {
                out if out.success => out.data.and_then(|d| d.get("answer").and_then(|v| v.as_str()).map(str::to_string)).unwrap_or_default(),
                out => format!("answer_question failed: {}", out.error.unwrap_or_default()),
            }
        } else {
            let plan = planner::create_plan(&core, &registry, &args.query, &[]).await?;
            let execution = planner::execute_plan(&core, &registry, &plan).await?;
            execution.final_output
        };
        println!("{answer}");
        Ok(())
    })
}

fn cmd_stats(args: StatsArgs) -> Result<(), AstraError> {
    init_logging("warn");
    let dir = Path::new(&args.dir);
    if !dir.is_dir() {
        return Err(AstraError::DirNotFound(args.dir.clone()));
    }

    runtime().block_on(async {
        let core = CoreServices::new(dir);
        try_restore(&core, dir).await?;

        let state = core.indexing_state.read().await;
        let counters = state.counters();
        let index = core.code_index.read().await;
        let trigram_terms = core.trigram_index.read().await.len();
        let inverted_terms = core.inverted_summary.read().await.term_count();

        println!("phase:            {}", state.phase().label());
        println!("files indexed:    {}", counters.files_indexed);
        println!("symbols found:    {}", counters.symbols_found);
        println!("summaries:        {}", index.summaries().len());
        println!("trigrams indexed: {trigram_terms}");
        println!("inverted terms:   {inverted_terms}");
        if let Some(domain) = index.discovered_domain() {
            println!("domain:           {}", domain.description);
            println!("languages:        {:?}", domain.languages);
            println!("key terms:        {}", domain.key_terms.join(", "));
            println!("modules:          {}", domain.modules.join(", "));
        }
        Ok(())
    })
}
