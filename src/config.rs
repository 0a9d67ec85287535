//! §6 Config — the external configuration surface, reached via
//! `Config.get(key)` in the original design. §9.3 of SPEC_FULL.md.
//!
//! The CLI layers a `.astra/config.toml` file under environment variables
//! (`ASTRA_<KEY_UPPER_WITH_UNDERSCORES>`), consistent with `KBLCode-greppy`'s
//! config precedence (env overrides file, file overrides built-in default).
//! Library embedders can instead hand in any `Config` impl, e.g. `MapConfig`.

use std::collections::HashMap;
use std::path::Path;

/// The spec's external `Config.get(key)` collaborator (§6).
pub trait Config: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        }
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// §6 recognized config keys, with documented effects (kept as constants so
/// callers don't typo the string literals).
pub mod keys {
    pub const DEFAULT_MODEL: &str = "llm.defaultModel";
    pub const CODING_MODEL: &str = "llm.codingModel";
    pub const ANALYSIS_MODEL: &str = "llm.analysisModel";
    pub const SUMMARY_MODEL: &str = "llm.summaryModel";
    pub const CLASSIFICATION_MODEL: &str = "llm.classificationModel";
    pub const PROVIDER_PRIORITY: &str = "llm.providerPriority";
    pub const OPENAI_API_KEY: &str = "llm.openaiApiKey";
    pub const ANTHROPIC_API_KEY: &str = "llm.anthropicApiKey";
    pub const MODEL_DISPLAY_NAMES: &str = "llm.modelDisplayNames";
    pub const SEARCH_MODE: &str = "searchMode";
    pub const ENABLE_AUTO_SUMMARY: &str = "indexing.enableAutoSummary";
    pub const DEBUG_MODE: &str = "debugMode";
    pub const SYSTEM_PROMPT: &str = "systemPrompt";
}

/// A plain in-memory `Config`, built from a `HashMap`. Used by library
/// embedders, tests, and as the base layer the CLI's file+env loader
/// populates before wrapping it in `LayeredConfig`.
#[derive(Debug, Clone, Default)]
pub struct MapConfig(HashMap<String, String>);

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl Config for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// §6's documented defaults, used when neither the env nor the config file
/// set a key.
pub fn defaults() -> MapConfig {
    MapConfig::new()
        .with(keys::PROVIDER_PRIORITY, "copilot,openai,anthropic")
        .with(keys::SEARCH_MODE, "detailed")
        .with(keys::ENABLE_AUTO_SUMMARY, "true")
        .with(keys::DEBUG_MODE, "false")
}

/// Env var > `.astra/config.toml` > built-in defaults (§9.3). The file is a
/// flat `[config]` table of the same dotted keys as §6; `llm.defaultModel`
/// becomes the TOML key `"llm.defaultModel"` (quoted dotted key) to avoid
/// inventing a nested-table convention the spec doesn't describe.
pub struct LayeredConfig {
    env_prefix: &'static str,
    file: HashMap<String, String>,
    base: MapConfig,
}

impl LayeredConfig {
    pub fn new(base: MapConfig) -> Self {
        Self { env_prefix: "ASTRA_", file: HashMap::new(), base }
    }

    /// Load a `.astra/config.toml` from `workspace_root` if present. Parse
    /// errors are logged and treated as "no file" (§7 policy: never fatal
    /// for a missing/corrupt ambient file).
    pub fn load_file(mut self, workspace_root: &Path) -> Self {
        let path = workspace_root.join(".astra").join("config.toml");
        if let Ok(text) = std::fs::read_to_string(&path) {
            match toml::from_str::<toml::Value>(&text) {
                Ok(toml::Value::Table(table)) => {
                    let section = table.get("config").and_then(|v| v.as_table()).unwrap_or(&table);
                    for (k, v) in section {
                        if let Some(s) = v.as_str() {
                            self.file.insert(k.clone(), s.to_string());
                        } else {
                            self.file.insert(k.clone(), v.to_string());
                        }
                    }
                }
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "config.toml root is not a table, ignoring");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config.toml, ignoring");
                }
            }
        }
        self
    }

    fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.env_prefix, key.to_uppercase().replace('.', "_"))
    }
}

impl Config for LayeredConfig {
    fn get(&self, key: &str) -> Option<String> {
        if let Ok(v) = std::env::var(self.env_key(key)) {
            return Some(v);
        }
        if let Some(v) = self.file.get(key) {
            return Some(v.clone());
        }
        self.base.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_config_returns_inserted_value() {
        let cfg = MapConfig::new().with("searchMode", "overview");
        assert_eq!(cfg.get("searchMode"), Some("overview".to_string()));
    }

    #[test]
    fn get_bool_parses_true_false() {
        let cfg = MapConfig::new().with("debugMode", "true");
        assert!(cfg.get_bool("debugMode", false));
        let cfg2 = MapConfig::new().with("debugMode", "false");
        assert!(!cfg2.get_bool("debugMode", true));
    }

    #[test]
    fn get_bool_falls_back_to_default_when_absent() {
        let cfg = MapConfig::new();
        assert!(cfg.get_bool("debugMode", true));
        assert!(!cfg.get_bool("debugMode", false));
    }

    #[test]
    fn defaults_include_documented_keys() {
        let cfg = defaults();
        assert_eq!(cfg.get(keys::SEARCH_MODE), Some("detailed".to_string()));
        assert_eq!(cfg.get(keys::ENABLE_AUTO_SUMMARY), Some("true".to_string()));
    }

    #[test]
    fn layered_config_falls_back_to_base_when_file_and_env_absent() {
        let layered = LayeredConfig::new(defaults());
        assert_eq!(layered.get(keys::SEARCH_MODE), Some("detailed".to_string()));
    }

    #[test]
    fn layered_config_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".astra")).unwrap();
        std::fs::write(
            dir.path().join(".astra/config.toml"),
            "[config]\n\"searchMode\" = \"overview\"\n",
        )
        .unwrap();
        let layered = LayeredConfig::new(defaults()).load_file(dir.path());
        assert_eq!(layered.get(keys::SEARCH_MODE), Some("overview".to_string()));
    }

    #[test]
    fn layered_config_missing_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let layered = LayeredConfig::new(defaults()).load_file(dir.path());
        assert_eq!(layered.get(keys::SEARCH_MODE), Some("detailed".to_string()));
    }
}
