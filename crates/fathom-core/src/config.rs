use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FathomError;
use crate::types::ExtractionStrategy;

/// Top-level configuration loaded from `.fathom.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use fathom_core::FathomConfig;
///
/// let config = FathomConfig::default();
/// assert!(config.cache.enabled);
/// assert_eq!(config.llm.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FathomConfig {
    /// Text-generation provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Repository host settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Document cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Structural analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl FathomConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Io`] if the file cannot be read, or
    /// [`FathomError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fathom_core::FathomConfig;
    /// use std::path::Path;
    ///
    /// let config = FathomConfig::from_file(Path::new(".fathom.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, FathomError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use fathom_core::FathomConfig;
    ///
    /// let toml = r#"
    /// [llm]
    /// provider = "gemini"
    /// "#;
    /// let config = FathomConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.llm.provider, "gemini");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, FathomError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Fill unset secrets from the environment.
    ///
    /// `GITHUB_TOKEN` feeds the host token; the LLM key comes from the
    /// provider's conventional variable (see [`LlmConfig::api_key_env_var`]).
    pub fn apply_env(&mut self) {
        if self.github.token.is_none() {
            self.github.token = std::env::var("GITHUB_TOKEN").ok();
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = std::env::var(self.llm.api_key_env_var()).ok();
        }
    }
}

/// Text-generation provider configuration.
///
/// # Examples
///
/// ```
/// use fathom_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.max_source_chars, 6000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"openai"`, `"gemini"`, or any OpenAI-compatible server).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Longest source slice embedded in a single prompt.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_max_source_chars() -> usize {
    6000
}

impl LlmConfig {
    /// Environment variable conventionally holding the provider's key.
    ///
    /// # Examples
    ///
    /// ```
    /// use fathom_core::LlmConfig;
    ///
    /// let config = LlmConfig { provider: "gemini".into(), ..LlmConfig::default() };
    /// assert_eq!(config.api_key_env_var(), "GEMINI_API_KEY");
    /// ```
    pub fn api_key_env_var(&self) -> &'static str {
        match self.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            max_source_chars: default_max_source_chars(),
        }
    }
}

/// Repository host configuration.
///
/// # Examples
///
/// ```
/// use fathom_core::GitHubConfig;
///
/// let config = GitHubConfig::default();
/// assert_eq!(config.api_url, "https://api.github.com");
/// assert!(config.token.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token. Public repositories work without one, at a
    /// much lower rate limit.
    pub token: Option<String>,
    /// REST API root.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

/// Document cache configuration.
///
/// # Examples
///
/// ```
/// use fathom_core::CacheConfig;
///
/// let config = CacheConfig::default();
/// assert!(config.enabled);
/// assert!(config.path.ends_with("cache.db"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When `false`, an in-memory store is used and nothing persists.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// SQLite database holding cached documents.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".fathom").join("cache.db")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
        }
    }
}

/// Structural analysis configuration.
///
/// # Examples
///
/// ```
/// use fathom_core::{AnalysisConfig, ExtractionStrategy};
///
/// let config = AnalysisConfig::default();
/// assert!(config.supports("src/app.tsx"));
/// assert!(!config.supports("README.md"));
/// assert_eq!(config.strategy, ExtractionStrategy::Auto);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// File extensions (without the dot) eligible for analysis.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// How constructs are located.
    #[serde(default)]
    pub strategy: ExtractionStrategy,
}

fn default_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx", "mjs", "cjs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl AnalysisConfig {
    /// Whether `path` has one of the configured extensions.
    pub fn supports(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            strategy: ExtractionStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = FathomConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_source_chars, 6000);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.cache.enabled);
        assert_eq!(config.analysis.extensions.len(), 6);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "gemini"
model = "gemini-1.5-flash"
max_source_chars = 2000

[github]
token = "ghp_test"

[cache]
enabled = false
path = "/tmp/fathom.db"

[analysis]
extensions = ["js"]
strategy = "patterns"
"#;
        let config = FathomConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.max_source_chars, 2000);
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.path, PathBuf::from("/tmp/fathom.db"));
        assert_eq!(config.analysis.strategy, ExtractionStrategy::Patterns);
        assert!(config.analysis.supports("a.js"));
        assert!(!config.analysis.supports("a.ts"));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = FathomConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(config.cache.enabled);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(FathomConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn supports_is_case_insensitive_and_needs_extension() {
        let config = AnalysisConfig::default();
        assert!(config.supports("lib/Component.JSX"));
        assert!(!config.supports("Makefile"));
        assert!(!config.supports("dir.js/README"));
    }

    #[test]
    fn env_var_follows_provider() {
        let mut config = LlmConfig::default();
        assert_eq!(config.api_key_env_var(), "OPENAI_API_KEY");
        config.provider = "anthropic".into();
        assert_eq!(config.api_key_env_var(), "ANTHROPIC_API_KEY");
    }
}
