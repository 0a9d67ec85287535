//! Unified error type for the code-intelligence core.

use thiserror::Error;

/// All errors that can occur anywhere in astra: indexing, parsing,
/// search, synthesis, planning, and persistence.
#[derive(Error, Debug)]
pub enum AstraError {
    /// I/O error (file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error (bincode)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Serialization/deserialization error (serde_json, used for the vector index metadata file)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Directory does not exist
    #[error("Directory does not exist: {0}")]
    DirNotFound(String),

    /// No index found for the given directory / index kind
    #[error("No {kind} index found for '{dir}'. Build one first with 'astra index --dir {dir}'")]
    IndexNotFound { kind: String, dir: String },

    /// Lock poisoned (thread panicked while holding a lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Failed to save an index to disk
    #[error("Failed to save {kind} index: {message}")]
    SaveFailed { kind: String, message: String },

    /// Failed to load an index from disk
    #[error("Failed to load {kind} index from {path}: {message}")]
    IndexLoad {
        kind: String,
        path: String,
        message: String,
    },

    /// §7 ParseError — caught per file by the caller, never propagated out of a parser.
    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    /// §7 IndexCorruption — surfaced by persistence restore, never fatal to the caller.
    #[error("Index corrupted while restoring {kind}: {message}")]
    IndexCorruption { kind: String, message: String },

    /// §7 LLMUnavailable
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// §7 LLMRefusal — the entire response was a refusal, not just a trailing line.
    #[error("Model refused to answer: {0}")]
    LlmRefusal(String),

    /// §7 LLMQuotaOrFilter
    #[error("Model '{model}' failed (quota/filter): {message}")]
    LlmQuotaOrFilter { model: String, message: String },

    /// §7 JSONExtractionError — stage-1 synthesis extraction could not find a JSON object.
    #[error("Failed to extract structured facts from model response: {0}")]
    JsonExtraction(String),

    /// §7 TaskCancelled
    #[error("Task cancelled by user")]
    TaskCancelled,

    /// §7 QueryBlocked — indexing is in progress; no tools were invoked.
    #[error("{0}")]
    QueryBlocked(String),

    /// Mutually exclusive flags or other argument validation error
    #[error("{0}")]
    InvalidArgs(String),

    /// A plan step referenced a tool not present in the registry
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// A `$stepN...` reference in a plan could not be resolved
    #[error("Unresolvable step reference '{0}'")]
    UnresolvedReference(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = AstraError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn index_not_found_mentions_dir_and_kind() {
        let err = AstraError::IndexNotFound {
            kind: "trigram".to_string(),
            dir: "/repo".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/repo"));
        assert!(msg.contains("trigram"));
    }

    #[test]
    fn query_blocked_passes_message_through() {
        let err = AstraError::QueryBlocked("indexing: symbols phase, 42%".to_string());
        assert_eq!(err.to_string(), "indexing: symbols phase, 42%");
    }

    #[test]
    fn invalid_regex_display() {
        let source = regex::Regex::new("[invalid").unwrap_err();
        let err = AstraError::InvalidRegex {
            pattern: "[invalid".to_string(),
            source,
        };
        assert!(err.to_string().contains("[invalid"));
    }
}
