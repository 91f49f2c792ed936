//! GeoMine Resolver - Coordinate resolution cascade
//!
//! Resolves a project mention to coordinates by trying, in order:
//! 1. Direct gazetteer match on the project name
//! 2. Semantic similarity between the context and gazetteer names
//! 3. Place names pulled out of the context by regex, matched directly
//! 4. A generative model, validated against the region box
//!
//! The first strategy that succeeds wins. Failures inside a strategy are
//! logged and fall through; `resolve` itself never errors.

use geomine_core::{Coordinates, Gazetteer, GeoError, Resolution, ResolverConfig, Result, Strategy};
use geomine_vector::{EmbeddingClient, FlatIndex, Neighbor};

pub mod geocoder;
pub mod llm;
pub mod location;

pub use geocoder::{CoordinateAnswer, CoordinateRequest, GenerativeGeocoder};
pub use llm::{create_llm_client, GeminiClient};
pub use location::LocationExtractor;

/// Names embedded per request while indexing the gazetteer
const EMBED_BATCH_SIZE: usize = 256;

/// The resolution cascade over one gazetteer
pub struct GeoResolver {
    gazetteer: Gazetteer,
    embedder: Box<dyn EmbeddingClient>,
    index: FlatIndex,
    locations: LocationExtractor,
    geocoder: GenerativeGeocoder,
    threshold: f32,
    top_k: usize,
}

impl GeoResolver {
    /// Embed every gazetteer name and build the resolver.
    ///
    /// Fails when the names cannot be embedded; the pipeline cannot run
    /// without its index.
    pub async fn build(
        gazetteer: Gazetteer,
        embedder: Box<dyn EmbeddingClient>,
        geocoder: GenerativeGeocoder,
        config: &ResolverConfig,
    ) -> Result<Self> {
        let names = gazetteer.names();
        let mut vectors = Vec::with_capacity(names.len());
        for batch in names.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(embedder.embed_batch(batch).await?);
        }
        if vectors.len() != names.len() {
            return Err(GeoError::EmbeddingError(format!(
                "expected {} gazetteer embeddings, got {}",
                names.len(),
                vectors.len()
            )));
        }

        let dimension = vectors
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| embedder.dimension());
        let index = FlatIndex::from_vectors(dimension, vectors)?;

        tracing::info!(
            "Resolver ready: {} places, dimension {}, threshold {}",
            index.len(),
            dimension,
            config.similarity_threshold
        );

        Ok(Self {
            gazetteer,
            embedder,
            index,
            locations: LocationExtractor::new(),
            geocoder,
            threshold: config.similarity_threshold,
            top_k: config.top_k.max(1),
        })
    }

    /// Run the cascade. `None` means every strategy failed.
    pub async fn resolve(&self, context: &str, candidate_name: Option<&str>) -> Option<Resolution> {
        if let Some(coords) = candidate_name.and_then(|name| self.direct_match(name)) {
            return Some(Resolution::new(coords, Strategy::DirectMatch));
        }

        if let Some(coords) = self.semantic_match(context).await {
            return Some(Resolution::new(coords, Strategy::SemanticSearch));
        }

        if let Some(coords) = self.context_match(context) {
            return Some(Resolution::new(coords, Strategy::ContextExtraction));
        }

        let request = CoordinateRequest::new(context, candidate_name);
        match self.geocoder.locate(&request).await {
            CoordinateAnswer::Located(coords) => {
                tracing::debug!("Generative model located {coords}");
                Some(Resolution::new(coords, Strategy::GenerativeModel))
            }
            CoordinateAnswer::Undetermined => {
                tracing::debug!("No coordinates found");
                None
            }
        }
    }

    /// Strategy 1: exact, then substring, gazetteer lookup
    pub fn direct_match(&self, name: &str) -> Option<Coordinates> {
        let entry = self.gazetteer.find(name)?;
        tracing::debug!("Direct match for '{}': '{}'", name, entry.name);
        Some(entry.coordinates())
    }

    /// Strategy 2: nearest gazetteer name to the context, if close enough
    pub async fn semantic_match(&self, context: &str) -> Option<Coordinates> {
        let hits = match self.semantic_search(context).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Semantic search failed: {e}");
                return None;
            }
        };

        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        tracing::debug!("Top similarity scores: {:?}", scores);

        let best = best_above(&hits, self.threshold)?;
        let entry = self.gazetteer.get(best.index)?;
        tracing::debug!("Semantic match '{}' (score {:.3})", entry.name, best.score);
        Some(entry.coordinates())
    }

    async fn semantic_search(&self, context: &str) -> Result<Vec<Neighbor>> {
        let query = self.embedder.embed(context).await?;
        self.index.search(&query, self.top_k)
    }

    /// Strategy 3: regex place names from the context, matched directly
    pub fn context_match(&self, context: &str) -> Option<Coordinates> {
        self.locations
            .extract(context)
            .iter()
            .find_map(|name| self.direct_match(name))
    }
}

/// The top hit, when its score reaches `threshold`
fn best_above(hits: &[Neighbor], threshold: f32) -> Option<Neighbor> {
    hits.first()
        .copied()
        .filter(|best| best.score >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hit(index: usize, score: f32) -> Neighbor {
        Neighbor { index, score }
    }

    #[test]
    fn test_best_above_threshold() {
        let hits = [hit(2, 0.41), hit(0, 0.2)];
        assert_eq!(best_above(&hits, 0.4), Some(hit(2, 0.41)));
        assert_eq!(best_above(&hits, 0.41), Some(hit(2, 0.41)));
        assert_eq!(best_above(&hits, 0.5), None);
        assert_eq!(best_above(&[hit(0, 0.35)], 0.4), None);
        assert_eq!(best_above(&[], 0.0), None);
    }

    proptest! {
        #[test]
        fn prop_raising_threshold_never_accepts_more(
            scores in prop::collection::vec(-1.0f32..1.0, 0..50),
            low in -1.0f32..1.0,
            delta in 0.0f32..1.0,
        ) {
            let high = low + delta;
            let accepted = |t: f32| {
                scores
                    .iter()
                    .filter(|&&s| best_above(&[hit(0, s)], t).is_some())
                    .count()
            };
            prop_assert!(accepted(high) <= accepted(low));
        }
    }
}
