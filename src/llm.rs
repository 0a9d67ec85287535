//! The `LlmProvider` collaborator — §1 calls this "invoked via a thin
//! `callModel(prompt, task)` interface"; the underlying providers themselves
//! are out of scope (external collaborators). §6's call shape:
//! `callModel(prompt, {task, maxLen?, timeoutMs?}) -> String`.

use async_trait::async_trait;

use crate::error::AstraError;

/// Which of §6's per-task model overrides a call should resolve against
/// (`llm.codingModel` / `analysisModel` / `summaryModel` /
/// `classificationModel`, falling back to `llm.defaultModel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    Coding,
    Analysis,
    Summary,
    Classification,
}

impl ModelTask {
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Coding => crate::config::keys::CODING_MODEL,
            Self::Analysis => crate::config::keys::ANALYSIS_MODEL,
            Self::Summary => crate::config::keys::SUMMARY_MODEL,
            Self::Classification => crate::config::keys::CLASSIFICATION_MODEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallOptions {
    pub task: ModelTask,
    pub max_len: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl CallOptions {
    pub fn new(task: ModelTask) -> Self {
        Self { task, max_len: None, timeout_ms: None }
    }
}

/// Provider-agnostic model call boundary (§6). Implementations live outside
/// this crate (editor host wiring); `astra` only depends on this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call_model(&self, prompt: &str, opts: &CallOptions) -> Result<String, AstraError>;

    /// The provider/model id currently in use for `task`, used to populate
    /// `failedModelsCache` entries and diagnostic output.
    fn model_id(&self, task: ModelTask) -> String;
}

/// §7 LLMUnavailable: a provider that is never configured. The planner and
/// synthesizer both fall back to a single `answer_question` over raw
/// context when they observe this error, per §7's policy table.
pub struct UnavailableProvider;

#[async_trait]
impl LlmProvider for UnavailableProvider {
    async fn call_model(&self, _prompt: &str, _opts: &CallOptions) -> Result<String, AstraError> {
        Err(AstraError::LlmUnavailable("no LLM provider configured".to_string()))
    }

    fn model_id(&self, _task: ModelTask) -> String {
        "none".to_string()
    }
}

/// §7 response post-processing: strip a trailing refusal line. Only strips
/// when the refusal phrase occurs at the *end* of the response, matching
/// the documented regex intent; if the whole response is a (short) refusal,
/// that's an `LlmRefusal` error instead (caller's job to check via
/// `is_pure_refusal`).
pub fn strip_trailing_refusal(response: &str) -> String {
    let trimmed = response.trim_end();
    let lower = trimmed.to_lowercase();
    for phrase in REFUSAL_PHRASES {
        if lower.ends_with(phrase) {
            let cut = trimmed.len() - phrase.len();
            // Trim back across a preceding "sorry," / "sorry" clause too.
            let mut head = trimmed[..cut].trim_end();
            for lead in ["sorry,", "sorry"] {
                if head.to_lowercase().ends_with(lead) {
                    head = head[..head.len() - lead.len()].trim_end();
                }
            }
            return head.trim_end_matches(['.', ',']).to_string();
        }
    }
    trimmed.to_string()
}

/// §7 LLMRefusal: true when the *entire* response is short and begins with
/// a refusal phrase (as opposed to a refusal trailing otherwise-useful text).
pub fn is_pure_refusal(response: &str) -> bool {
    let trimmed = response.trim();
    if trimmed.len() > 200 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    REFUSAL_PHRASES.iter().any(|p| lower.starts_with("sorry") && lower.contains(p) || lower.starts_with(p))
}

const REFUSAL_PHRASES: &[&str] = &[
    "i can't assist",
    "i can't help",
    "i cannot assist",
    "i cannot help",
    "i am unable to assist",
    "i am unable to help",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_provider_errors() {
        let provider = UnavailableProvider;
        let err = provider.call_model("hi", &CallOptions::new(ModelTask::Summary)).await.unwrap_err();
        assert!(matches!(err, AstraError::LlmUnavailable(_)));
    }

    #[test]
    fn strip_trailing_refusal_removes_only_trailing_phrase() {
        let text = "Here is the answer to your question.\n\nSorry, I can't assist with that.";
        let cleaned = strip_trailing_refusal(text);
        assert!(cleaned.starts_with("Here is the answer"));
        assert!(!cleaned.to_lowercase().contains("can't assist"));
    }

    #[test]
    fn strip_trailing_refusal_leaves_clean_text_untouched() {
        let text = "Function foo() calls bar().";
        assert_eq!(strip_trailing_refusal(text), text);
    }

    #[test]
    fn is_pure_refusal_detects_short_refusal() {
        assert!(is_pure_refusal("Sorry, I can't help with that."));
        assert!(!is_pure_refusal("Here is a long detailed technical explanation that happens to mention sorry I cannot help in the middle of a much longer passage of prose that goes on."));
    }

    #[test]
    fn model_task_maps_to_config_key() {
        assert_eq!(ModelTask::Summary.config_key(), "llm.summaryModel");
        assert_eq!(ModelTask::Classification.config_key(), "llm.classificationModel");
    }
}
