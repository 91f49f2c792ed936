//! GeoMine Vector - Sentence embeddings and exact similarity search
//!
//! Provides the embedding clients used to vectorize gazetteer names and
//! report context, and a flat inner-product index over unit vectors
//! (cosine similarity). Gazetteers hold thousands of rows at most, so
//! brute force is exact and fast enough.

pub mod embedding;
pub mod index;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding};
pub use index::{normalize_l2, FlatIndex, Neighbor};

#[cfg(feature = "onnx")]
pub use embedding::OnnxEmbedding;
