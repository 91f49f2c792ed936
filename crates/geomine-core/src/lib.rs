//! GeoMine Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout GeoMine:
//! - Coordinates and the region bounding box
//! - The gazetteer reference table
//! - Pipeline records (candidate entities, resolutions, output lines)
//! - Common error types
//! - The generative-model client trait
//! - Configuration management

pub mod config;
pub mod gazetteer;
pub mod record;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig, LoggingConfig,
    ResolverConfig, TaggerConfig,
};
pub use gazetteer::{Gazetteer, GazetteerEntry};
pub use record::{CandidateEntity, OutputRecord, Resolution, Strategy};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for GeoMine operations
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Gazetteer is missing required columns: {}", .missing.join(", "))]
    GazetteerSchema { missing: Vec<String> },

    #[error("Invalid gazetteer row {row}: {message}")]
    GazetteerRow { row: usize, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector index error: {0}")]
    IndexError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tagger error: {0}")]
    TaggerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GeoError>;

// ============================================================================
// Coordinates
// ============================================================================

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the pair lies on the Earth's coordinate grid
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// `[lat, lon]` as written to output records
    pub fn as_pair(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Inclusive latitude/longitude box used to validate model answers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Mainland Australia and near-shore islands
    pub const AUSTRALIA: BoundingBox = BoundingBox {
        min_lat: -45.0,
        max_lat: -10.0,
        min_lon: 110.0,
        max_lon: 155.0,
    };

    pub fn contains(&self, coords: &Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&coords.latitude)
            && (self.min_lon..=self.max_lon).contains(&coords.longitude)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::AUSTRALIA
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for generative-model clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single text prompt and return the model's text answer
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================
