//! CoreServices — the dependency-injection container holding every
//! process-wide singleton (§3, §5): the indexes, the classifier, the
//! cancellation token, context files, and the external collaborators
//! (`Config`, `PersistenceStore`, `LlmProvider`). Queries and indexing both
//! go through this container rather than module-level statics, so embedders
//! can run multiple independent instances in one process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::code_index::CodeIndex;
use crate::config::{self, Config};
use crate::indexing_state::IndexingState;
use crate::inverted_summary::InvertedSummaryIndex;
use crate::llm::{LlmProvider, UnavailableProvider};
use crate::persistence::{FsPersistenceStore, PersistenceStore};
use crate::query_classifier::QueryClassifier;
use crate::task_controller::TaskController;
use crate::tfidf::TfIdfVocab;
use crate::trigram_index::TrigramIndex;
use crate::vector_index::VectorIndex;

/// Single-writer process-wide indexes (§5 Shared resource policy), each
/// guarded by its own `RwLock` so a query reading `CodeIndex` doesn't block
/// on a concurrent `VectorIndex` rebuild step.
pub struct CoreServices {
    pub code_index: RwLock<CodeIndex>,
    pub trigram_index: RwLock<TrigramIndex>,
    pub vector_index: RwLock<VectorIndex>,
    pub vocab: RwLock<Option<TfIdfVocab>>,
    pub inverted_summary: RwLock<InvertedSummaryIndex>,
    pub classifier: RwLock<QueryClassifier>,
    pub indexing_state: RwLock<IndexingState>,
    pub task_controller: Arc<TaskController>,
    /// Raw content of context files added by the user (§5 `contextFiles`),
    /// keyed by file name/path.
    pub context_files: RwLock<HashMap<String, String>>,
    /// §5/§7: models that recently failed with a quota/filter error,
    /// cleared on explicit user command or when the preferred model changes.
    pub failed_models_cache: RwLock<HashSet<String>>,
    pub config: Box<dyn Config>,
    pub persistence: Box<dyn PersistenceStore>,
    pub llm: Box<dyn LlmProvider>,
}

impl CoreServices {
    /// Build a CoreServices rooted at `workspace_root`, with the filesystem
    /// persistence store, layered config, and no LLM provider configured
    /// (callers that have a real provider should use `with_llm`).
    pub fn new(workspace_root: impl Into<std::path::PathBuf>) -> Self {
        let root = workspace_root.into();
        let cfg = config::LayeredConfig::new(config::defaults()).load_file(&root);
        Self {
            code_index: RwLock::new(CodeIndex::new()),
            trigram_index: RwLock::new(TrigramIndex::new()),
            vector_index: RwLock::new(VectorIndex::default()),
            vocab: RwLock::new(None),
            inverted_summary: RwLock::new(InvertedSummaryIndex::new()),
            classifier: RwLock::new(QueryClassifier::default()),
            indexing_state: RwLock::new(IndexingState::default()),
            task_controller: Arc::new(TaskController::new()),
            context_files: RwLock::new(HashMap::new()),
            failed_models_cache: RwLock::new(HashSet::new()),
            config: Box::new(cfg),
            persistence: Box::new(FsPersistenceStore::new(root)),
            llm: Box::new(UnavailableProvider),
        }
    }

    pub fn with_llm(mut self, llm: Box<dyn LlmProvider>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_config(mut self, config: Box<dyn Config>) -> Self {
        self.config = config;
        self
    }

    pub fn with_persistence(mut self, persistence: Box<dyn PersistenceStore>) -> Self {
        self.persistence = persistence;
        self
    }

    /// §5: while `isIndexing`, every query returns the blocking message and
    /// invokes no tools.
    pub async fn should_block_queries(&self) -> bool {
        self.indexing_state.read().await.should_block_queries()
    }

    pub async fn blocking_message(&self) -> Option<String> {
        let state = self.indexing_state.read().await;
        if state.should_block_queries() {
            Some(state.blocking_message())
        } else {
            None
        }
    }

    /// Record a model as failed (§7 LLMQuotaOrFilter policy). The caller is
    /// responsible for not caching pure rate-limit errors.
    pub async fn mark_model_failed(&self, model_id: &str) {
        self.failed_models_cache.write().await.insert(model_id.to_string());
    }

    pub async fn clear_failed_models_cache(&self) {
        self.failed_models_cache.write().await.clear();
    }

    /// §5: adding/removing/clearing a context file invalidates the index and
    /// should trigger a debounced rebuild; this just mutates the map, the
    /// debounce/rebuild trigger is the caller's (watcher's) responsibility.
    pub async fn set_context_file(&self, name: &str, content: String) {
        self.context_files.write().await.insert(name.to_string(), content);
    }

    pub async fn remove_context_file(&self, name: &str) {
        self.context_files.write().await.remove(name);
    }

    pub async fn clear_context_files(&self) {
        self.context_files.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_services_are_not_blocking_before_indexing_starts() {
        let dir = tempfile::tempdir().unwrap();
        let services = CoreServices::new(dir.path());
        assert!(!services.should_block_queries().await);
    }

    #[tokio::test]
    async fn context_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let services = CoreServices::new(dir.path());
        services.set_context_file("a.rs", "fn main() {}".to_string()).await;
        assert_eq!(services.context_files.read().await.get("a.rs").map(String::as_str), Some("fn main() {}"));
        services.remove_context_file("a.rs").await;
        assert!(services.context_files.read().await.is_empty());
    }

    #[tokio::test]
    async fn failed_models_cache_tracks_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let services = CoreServices::new(dir.path());
        services.mark_model_failed("gpt-x").await;
        assert!(services.failed_models_cache.read().await.contains("gpt-x"));
        services.clear_failed_models_cache().await;
        assert!(services.failed_models_cache.read().await.is_empty());
    }
}
