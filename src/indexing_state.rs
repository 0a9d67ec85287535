//! C8 — IndexingStateMachine: phase/progress state and the query gate
//! (§3, §4.6).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Parsing,
    Symbols,
    Trigrams,
    Search,
    Summaries,
    Inverted,
    Ready,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Symbols => "symbols",
            Self::Trigrams => "trigrams",
            Self::Search => "search",
            Self::Summaries => "summaries",
            Self::Inverted => "inverted",
            Self::Ready => "ready",
        }
    }

    /// The unidirectional transition order (§4.6); `summaries`/`inverted`
    /// are optional and skipped when no summarization run is requested.
    fn next(&self) -> Option<Phase> {
        match self {
            Self::Idle => Some(Self::Parsing),
            Self::Parsing => Some(Self::Symbols),
            Self::Symbols => Some(Self::Trigrams),
            Self::Trigrams => Some(Self::Search),
            Self::Search => Some(Self::Ready),
            Self::Summaries => Some(Self::Inverted),
            Self::Inverted => Some(Self::Ready),
            Self::Ready => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counters {
    pub files_indexed: usize,
    pub symbols_found: usize,
    pub summaries_generated: usize,
    pub inverted_terms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: &'static str,
    pub progress: u8,
    pub counters: Counters,
}

/// §3 IndexingState.
#[derive(Debug, Clone)]
pub struct IndexingState {
    phase: Phase,
    is_indexing: bool,
    is_summarizing: bool,
    is_ready: bool,
    progress: u8,
    counters: Counters,
    completed_at: Option<u64>,
}

impl Default for IndexingState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            is_indexing: false,
            is_summarizing: false,
            is_ready: false,
            progress: 0,
            counters: Counters::default(),
            completed_at: None,
        }
    }
}

impl IndexingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn is_indexing(&self) -> bool {
        self.is_indexing
    }

    pub fn is_summarizing(&self) -> bool {
        self.is_summarizing
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    /// §4.6 `shouldBlockQueries()` — true iff `isIndexing`; summarization
    /// alone never blocks queries.
    pub fn should_block_queries(&self) -> bool {
        self.is_indexing
    }

    /// §4.6 `getBlockingMessage()`.
    pub fn blocking_message(&self) -> String {
        format!(
            "Indexing in progress ({}, {}%) — {} files, {} symbols indexed so far. Please retry shortly.",
            self.phase.label(),
            self.progress,
            self.counters.files_indexed,
            self.counters.symbols_found,
        )
    }

    /// Advance to the next phase per §4.6's unidirectional order, clamping
    /// progress and flipping `is_indexing`/`is_summarizing` as appropriate.
    pub fn advance(&mut self, counters: Counters, progress: u8) -> ProgressEvent {
        if let Some(next) = self.phase.next() {
            self.phase = next;
        }
        self.counters = counters;
        self.progress = progress.min(100);
        self.is_indexing = !matches!(self.phase, Phase::Idle | Phase::Ready);
        self.is_summarizing = matches!(self.phase, Phase::Summaries | Phase::Inverted);
        if self.phase == Phase::Ready {
            self.complete();
        }
        info!(phase = self.phase.label(), progress = self.progress, files = self.counters.files_indexed, symbols = self.counters.symbols_found, "indexing phase transition");
        self.emit_event()
    }

    /// Explicit transition into the optional summarization branch, taken
    /// after `Phase::Search` instead of going straight to `Ready`. Per §4.6,
    /// summarization alone never blocks queries, so `is_indexing` drops here
    /// even though the overall pipeline hasn't reached `Ready` yet.
    pub fn begin_summarizing(&mut self, counters: Counters, progress: u8) -> ProgressEvent {
        self.phase = Phase::Summaries;
        self.counters = counters;
        self.progress = progress.min(100);
        self.is_summarizing = true;
        self.is_indexing = false;
        info!(phase = self.phase.label(), progress = self.progress, "indexing phase transition");
        self.emit_event()
    }

    /// §4.6 `complete()` — sets `isReady=true` and records completion time;
    /// persistence is triggered by the caller, not here.
    pub fn complete(&mut self) {
        self.phase = Phase::Ready;
        self.is_ready = true;
        self.is_indexing = false;
        self.is_summarizing = false;
        self.progress = 100;
        self.completed_at = Some(now());
        info!(files = self.counters.files_indexed, symbols = self.counters.symbols_found, "indexing complete");
    }

    /// Cancellation: immediately exits `isIndexing` regardless of phase
    /// (§8 scenario 6 — cancellation is immediate, not a graceful drain).
    pub fn cancel(&mut self) {
        self.is_indexing = false;
        self.is_summarizing = false;
    }

    /// Explicit reset back to `idle` (full rebuild or user-triggered clear).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn emit_event(&self) -> ProgressEvent {
        ProgressEvent { phase: self.phase.label(), progress: self.progress, counters: self.counters }
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let mut state = IndexingState::new();
        assert_eq!(state.phase(), Phase::Idle);
        state.advance(Counters::default(), 10);
        assert_eq!(state.phase(), Phase::Parsing);
        state.advance(Counters::default(), 20);
        assert_eq!(state.phase(), Phase::Symbols);
    }

    #[test]
    fn should_block_queries_only_during_indexing() {
        let mut state = IndexingState::new();
        state.advance(Counters::default(), 10);
        assert!(state.should_block_queries());
        state.complete();
        assert!(!state.should_block_queries());
    }

    #[test]
    fn summarizing_alone_does_not_block_queries() {
        let mut state = IndexingState::new();
        state.advance(Counters::default(), 10); // parsing
        state.advance(Counters::default(), 30); // symbols
        state.advance(Counters::default(), 50); // trigrams
        state.advance(Counters::default(), 70); // search
        state.begin_summarizing(Counters::default(), 80);
        assert!(state.is_summarizing());
        assert!(!state.should_block_queries());
        state.complete();
        assert!(!state.should_block_queries());
        assert!(!state.is_summarizing());
    }

    #[test]
    fn cancel_immediately_exits_indexing() {
        let mut state = IndexingState::new();
        state.advance(Counters::default(), 10);
        state.cancel();
        assert!(!state.is_indexing());
        assert!(!state.should_block_queries());
    }

    #[test]
    fn blocking_message_includes_phase_and_progress() {
        let mut state = IndexingState::new();
        state.advance(Counters { files_indexed: 42, symbols_found: 7, ..Default::default() }, 33);
        let msg = state.blocking_message();
        assert!(msg.contains("parsing"));
        assert!(msg.contains("33"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut state = IndexingState::new();
        state.advance(Counters::default(), 10);
        state.reset();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.is_ready());
    }
}
