//! Configuration for the search evaluator.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use crate::model::{Dimension, ScoringSystem, SearchEngine};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Endpoints, credentials and model used for the two HTTP APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Full URL of the web search endpoint.
    pub search_endpoint: String,

    /// Full URL of the chat-completions endpoint used for grading.
    pub scoring_endpoint: String,

    /// Bearer token sent to both endpoints.
    pub api_key: String,

    /// Grading model identifier.
    pub model: String,

    /// Maximum tokens for the grader's reply.
    pub max_tokens: u32,

    /// Sampling temperature for the grader.
    pub temperature: f32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            search_endpoint: "https://open.bigmodel.cn/api/paas/v4/web_search".to_string(),
            scoring_endpoint: "https://open.bigmodel.cn/api/paas/v4/chat/completions".to_string(),
            api_key: String::new(),
            model: "glm-4-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

/// Extra fields sent with every search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Number of results requested per engine.
    pub count: usize,
    pub search_intent: bool,
    pub content_size: String,
    pub recency_filter: String,
    pub domain_filter: Option<String>,
    pub user_id: Option<String>,
    /// Fixed request id; a fresh UUID is generated per call when absent.
    pub request_id: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            count: 10,
            search_intent: false,
            content_size: "medium".to_string(),
            recency_filter: "noLimit".to_string(),
            domain_filter: None,
            user_id: None,
            request_id: None,
        }
    }
}

/// How a batch evaluation is run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Scoring passes over the same results.
    pub rounds: u32,
    pub scoring_system: ScoringSystem,
    /// Request streamed grader responses.
    pub stream: bool,
    /// Pause between consecutive scoring calls, in milliseconds.
    pub delay_ms: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            rounds: 1,
            scoring_system: ScoringSystem::default(),
            stream: false,
            delay_ms: 1000,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub search: SearchOptions,
    pub evaluation: EvaluationSettings,
    pub engines: Vec<SearchEngine>,
    pub dimensions: Vec<Dimension>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            search: SearchOptions::default(),
            evaluation: EvaluationSettings::default(),
            engines: default_engines(),
            dimensions: default_dimensions(),
        }
    }
}

/// Engines offered out of the box.
pub fn default_engines() -> Vec<SearchEngine> {
    vec![
        SearchEngine::new("std", "search_std", "Standard"),
        SearchEngine::new("pro", "search_pro", "Pro"),
        SearchEngine::new("sogou", "search_pro_sogou", "Sogou"),
        SearchEngine::new("quark", "search_pro_quark", "Quark"),
        SearchEngine::new("bing", "search_pro_bing", "Bing"),
    ]
}

/// Dimensions offered out of the box.
pub fn default_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::new("authority", "authority", 0.3),
        Dimension::new("relevance", "relevance", 0.4),
        Dimension::new("freshness", "freshness", 0.2),
        Dimension::new("diversity", "diversity", 0.1).disabled(),
    ]
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SEARCH_API_URL, SCORING_API_URL, EVAL_API_KEY, ...)
    /// 2. Config file (`path`, or ~/.config/search-evaluator/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SEARCH_API_URL") {
            self.api.search_endpoint = url;
        }

        if let Some(url) = lookup("SCORING_API_URL") {
            self.api.scoring_endpoint = url;
        }

        if let Some(api_key) = lookup("EVAL_API_KEY") {
            self.api.api_key = api_key;
        }

        if let Some(model) = lookup("EVAL_MODEL") {
            self.api.model = model;
        }

        if let Some(rounds) = lookup("EVAL_ROUNDS") {
            match rounds.parse() {
                Ok(rounds) => self.evaluation.rounds = rounds,
                Err(_) => tracing::warn!("Ignoring invalid EVAL_ROUNDS value '{}'", rounds),
            }
        }

        if let Some(system) = lookup("EVAL_SCORING_SYSTEM") {
            match system.parse() {
                Ok(system) => self.evaluation.scoring_system = system,
                Err(e) => tracing::warn!("Ignoring EVAL_SCORING_SYSTEM: {}", e),
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "search-evaluator")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.api.search_endpoint.trim().is_empty() {
            return Err(EvalError::Config(
                "Search endpoint is required. Set SEARCH_API_URL or add api.search_endpoint to the config file.".to_string(),
            ));
        }

        if self.api.scoring_endpoint.trim().is_empty() {
            return Err(EvalError::Config(
                "Scoring endpoint is required. Set SCORING_API_URL or add api.scoring_endpoint to the config file.".to_string(),
            ));
        }

        if self.api.api_key.trim().is_empty() {
            return Err(EvalError::Config(
                "API key is required. Set EVAL_API_KEY environment variable or add to config file."
                    .to_string(),
            ));
        }

        if self.api.model.trim().is_empty() {
            return Err(EvalError::Config(
                "Scoring model is required. Set EVAL_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        if self.evaluation.rounds == 0 {
            return Err(EvalError::Config(
                "evaluation.rounds must be at least 1".to_string(),
            ));
        }

        if self.search.count == 0 {
            return Err(EvalError::Config("search.count must be at least 1".to_string()));
        }

        for dim in &self.dimensions {
            if dim.name.trim().is_empty() {
                return Err(EvalError::Config(format!(
                    "Dimension '{}' has an empty name",
                    dim.id
                )));
            }
            if !(0.0..=1.0).contains(&dim.weight) {
                return Err(EvalError::Config(format!(
                    "Dimension '{}' weight {} is outside 0..=1",
                    dim.name, dim.weight
                )));
            }
        }

        Ok(())
    }

    /// Create a config pointing at explicit endpoints (useful for testing).
    pub fn with_endpoints(
        search_endpoint: impl Into<String>,
        scoring_endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiConfig {
                search_endpoint: search_endpoint.into(),
                scoring_endpoint: scoring_endpoint.into(),
                api_key: api_key.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api.api_key.is_empty());
        assert_eq!(config.api.model, "glm-4-flash");
        assert_eq!(config.evaluation.rounds, 1);
        assert_eq!(config.evaluation.delay_ms, 1000);
        assert_eq!(config.search.count, 10);
        assert_eq!(config.engines.len(), 5);
        assert_eq!(config.dimensions.iter().filter(|d| d.enabled).count(), 3);
    }

    #[test]
    fn test_validate_fails_without_api_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_validate_rejects_zero_rounds_and_bad_weights() {
        let mut config = Config::with_endpoints("http://s", "http://c", "key");
        assert!(config.validate().is_ok());

        config.evaluation.rounds = 0;
        assert!(config.validate().is_err());

        config.evaluation.rounds = 2;
        config.dimensions[0].weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("EVAL_API_KEY", "secret"),
            ("EVAL_MODEL", "glm-4-plus"),
            ("EVAL_ROUNDS", "3"),
            ("EVAL_SCORING_SYSTEM", "binary"),
            ("SCORING_API_URL", "http://localhost:9000/chat"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.api_key, "secret");
        assert_eq!(config.api.model, "glm-4-plus");
        assert_eq!(config.evaluation.rounds, 3);
        assert_eq!(config.evaluation.scoring_system, ScoringSystem::Binary);
        assert_eq!(config.api.scoring_endpoint, "http://localhost:9000/chat");
    }

    #[test]
    fn test_env_override_ignores_unparsable_rounds() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| (key == "EVAL_ROUNDS").then(|| "many".to_string()));
        assert_eq!(config.evaluation.rounds, 1);
    }

    #[test]
    fn test_load_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api:
  api_key: from-file
evaluation:
  rounds: 2
  scoring_system: binary
dimensions:
  - id: rel
    name: relevance
    weight: 1.0
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.api.api_key, "from-file");
        assert_eq!(config.api.model, "glm-4-flash");
        assert_eq!(config.evaluation.rounds, 2);
        assert_eq!(config.evaluation.delay_ms, 1000);
        assert_eq!(config.evaluation.scoring_system, ScoringSystem::Binary);
        assert_eq!(config.dimensions.len(), 1);
        assert_eq!(config.engines.len(), 5);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from_file(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
