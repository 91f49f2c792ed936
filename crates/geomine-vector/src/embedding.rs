//! Embedding clients for generating vector representations
//!
//! The default backend runs all-MiniLM-L6-v2 in-process through ONNX Runtime
//! on a single intra-op thread (`onnx` feature, on by default). An Ollama
//! server can stand in when the model files are not available locally.

use async_trait::async_trait;
use geomine_core::{EmbeddingConfig, EmbeddingProvider, GeoError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 384,
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                GeoError::EmbeddingError(format!("Ollama embedding request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeoError::EmbeddingError(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            GeoError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// ONNX Embedding (local all-MiniLM-L6-v2)
// ============================================================================

#[cfg(feature = "onnx")]
mod onnx {
    use super::{async_trait, EmbeddingClient, GeoError, Result};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// all-MiniLM-L6-v2 output width
    pub const MINILM_DIM: usize = 384;

    /// Sequence length the model was trained with
    const MAX_TOKENS: usize = 256;

    /// Local sentence embedder running on ONNX Runtime.
    ///
    /// `model_dir` holds `model.onnx` and `tokenizer.json`. The session runs
    /// with a single intra-op thread. `Session::run` needs `&mut self`, hence
    /// the mutex.
    pub struct OnnxEmbedding {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedding {
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(GeoError::EmbeddingError(format!(
                        "model file not found: {}",
                        path.display()
                    )));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| GeoError::EmbeddingError(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e: ort::Error| GeoError::EmbeddingError(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    GeoError::EmbeddingError(format!("ONNX load failed: {e}"))
                })?;

            let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| GeoError::EmbeddingError(format!("Tokenizer load failed: {e}")))?;
            tokenizer
                .with_truncation(Some(tokenizers::TruncationParams {
                    max_length: MAX_TOKENS,
                    ..Default::default()
                }))
                .map_err(|e| GeoError::EmbeddingError(format!("Tokenizer setup failed: {e}")))?;

            tracing::info!("ONNX embedder loaded from {}", model_dir.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Tokenize, run the model and mean-pool over the attention mask
        fn infer(&self, text: &str) -> Result<Vec<f32>> {
            use ort::value::TensorRef;

            let err = |e: String| GeoError::EmbeddingError(e);

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| err(format!("Tokenization failed: {e}")))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| err(e.to_string()))?;
            let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(|e| err(e.to_string()))?;
            let types = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(|e| err(e.to_string()))?;

            let ids = TensorRef::from_array_view(&ids).map_err(|e| err(e.to_string()))?;
            let mask_t = TensorRef::from_array_view(&mask).map_err(|e| err(e.to_string()))?;
            let types = TensorRef::from_array_view(&types).map_err(|e| err(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| err("Session lock poisoned".to_string()))?;
            let outputs = session
                .run(ort::inputs![ids, mask_t, types])
                .map_err(|e| err(format!("ONNX inference failed: {e}")))?;

            // [1, seq_len, 384]
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| err(format!("Output extraction: {e}")))?;
            if shape.len() != 3 || shape[2] as usize != MINILM_DIM {
                return Err(err(format!("Unexpected output shape: {shape:?}")));
            }

            let mut pooled = vec![0.0f32; MINILM_DIM];
            let mut mask_sum = 0.0f32;
            for (token_idx, &m) in attention_mask.iter().enumerate() {
                let m = m as f32;
                mask_sum += m;
                let offset = token_idx * MINILM_DIM;
                for (dim, p) in pooled.iter_mut().enumerate() {
                    *p += data[offset + dim] * m;
                }
            }
            if mask_sum > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= mask_sum);
            }

            crate::index::normalize_l2(&mut pooled);
            Ok(pooled)
        }
    }

    #[async_trait]
    impl EmbeddingClient for OnnxEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.infer(text)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            MINILM_DIM
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedding;

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::Onnx => create_onnx_client(config),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config))),
    }
}

#[cfg(feature = "onnx")]
fn create_onnx_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    Ok(Box::new(OnnxEmbedding::load(&config.onnx_model_dir)?))
}

#[cfg(not(feature = "onnx"))]
fn create_onnx_client(_config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    Err(GeoError::ConfigError(
        "ONNX embeddings require building with the `onnx` feature".to_string(),
    ))
}

// ============================================================================
// Tests
// ============================================================================
