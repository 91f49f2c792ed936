//! GeoMine Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! defaults that match the reference pipeline. Command-line arguments only
//! carry the five required run inputs; everything tunable lives here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::BoundingBox;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Coordinate resolver tuning
    pub resolver: ResolverConfig,

    /// Sentence embedding backend
    pub embedding: EmbeddingConfig,

    /// Generative-model endpoint
    pub llm: LlmConfig,

    /// Entity tagger settings
    pub tagger: TaggerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: `GEOMINE_CONFIG` file if set, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("GEOMINE_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Resolver
        if let Ok(value) = std::env::var("SIMILARITY_THRESHOLD") {
            self.resolver.similarity_threshold =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "SIMILARITY_THRESHOLD".to_string(),
                    value,
                })?;
        }

        // Embedding
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }
        if let Ok(dir) = std::env::var("ONNX_MODEL_DIR") {
            self.embedding.onnx_model_dir = PathBuf::from(dir);
        }

        // LLM
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.llm.model = model;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            self.logging.json_format = matches!(json.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }

    /// Reject values no pipeline run can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.resolver.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                key: "resolver.similarity_threshold".to_string(),
                value: threshold.to_string(),
            });
        }
        if self.resolver.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "resolver.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        let bbox = &self.resolver.bounding_box;
        if bbox.min_lat > bbox.max_lat || bbox.min_lon > bbox.max_lon {
            return Err(ConfigError::InvalidValue {
                key: "resolver.bounding_box".to_string(),
                value: format!("{bbox:?}"),
            });
        }
        if self.embedding.provider == EmbeddingProvider::Onnx
            && self.embedding.onnx_model_dir.as_os_str().is_empty()
        {
            return Err(ConfigError::MissingRequired("ONNX_MODEL_DIR".to_string()));
        }
        Ok(())
    }
}

/// Coordinate resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum cosine similarity for a semantic match
    pub similarity_threshold: f32,

    /// Neighbours retrieved per semantic query
    pub top_k: usize,

    /// Region that generative-model answers must fall inside
    pub bounding_box: BoundingBox,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.4,
            top_k: 3,
            bounding_box: BoundingBox::AUSTRALIA,
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend to use
    pub provider: EmbeddingProvider,

    /// Directory with the all-MiniLM-L6-v2 `model.onnx` and `tokenizer.json`
    pub onnx_model_dir: PathBuf,

    /// Ollama model name
    pub model: String,

    /// Ollama server URL
    pub ollama_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Onnx,
            onnx_model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            model: "all-minilm".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// In-process ONNX Runtime, one intra-op thread
    Onnx,
    /// Remote Ollama server
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "onnx" => Ok(Self::Onnx),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Generative-model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generative Language API base URL
    pub base_url: String,

    /// Model name used in `models/{model}:generateContent`
    pub model: String,

    /// API key; supplied on the command line, never read from files
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
        }
    }
}

/// Entity tagger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Characters taken either side of a span when no sentence contains it
    pub context_window: usize,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self { context_window: 200 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.resolver.similarity_threshold, 0.4);
        assert_eq!(config.resolver.top_k, 3);
        assert_eq!(config.resolver.bounding_box, BoundingBox::AUSTRALIA);
        assert_eq!(config.tagger.context_window, 200);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.embedding.provider, EmbeddingProvider::Onnx);
        assert_eq!(
            config.embedding.onnx_model_dir,
            PathBuf::from("models/all-MiniLM-L6-v2")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_provider_parse() {
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert_eq!(
            "ONNX".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Onnx
        );
        assert!("faiss".parse::<EmbeddingProvider>().is_err());
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[resolver]\nsimilarity_threshold = 0.5\n\n[embedding]\nprovider = \"ollama\"\nollama_url = \"http://gpu-box:11434\"\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.resolver.similarity_threshold, 0.5);
        assert_eq!(config.resolver.top_k, 3);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
        assert_eq!(config.embedding.ollama_url, "http://gpu-box:11434");
        assert_eq!(
            config.embedding.onnx_model_dir,
            PathBuf::from("models/all-MiniLM-L6-v2")
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.resolver.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.embedding.onnx_model_dir = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
