//! # astra — code intelligence core
//!
//! Multi-layer indexing (symbol, trigram, semantic/TF-IDF, summary-inverted),
//! an indexing state machine with a query-blocking contract, per-language
//! regex parsers feeding a uniform symbol/call-graph model, query
//! classification + retrieval + hierarchical synthesis, and a plan/execute
//! tool-registry orchestration loop over structured answers with file/line
//! citations.
//!
//! This crate is a library first — `astra-cli`/MCP server wiring in
//! [`cli`] and [`mcp`] are thin consumers of the same `CoreServices`
//! container an embedder would use directly.

pub mod cli;
pub mod cobol_synonyms;
pub mod cobol_tables;
pub mod code_index;
pub mod config;
pub mod core_services;
pub mod error;
pub mod indexer;
pub mod indexing_state;
pub mod inverted_summary;
pub mod language;
pub mod llm;
pub mod mcp;
pub mod parsers;
pub mod path_utils;
pub mod persistence;
pub mod planner;
pub mod query_classifier;
pub mod retrieval;
pub mod search_pipeline;
pub mod summarizer;
pub mod symbol;
pub mod synthesizer;
pub mod task_controller;
pub mod tfidf;
pub mod tips;
pub mod tools;
pub mod trigram_index;
pub mod vector_index;
