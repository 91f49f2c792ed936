//! Flat inner-product index
//!
//! Rows are stored L2-normalized, so the inner product with a normalized
//! query is the cosine similarity. Search is exhaustive.

use geomine_core::{GeoError, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// L2-normalize in place. Zero vectors stay zero.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// A search hit: row position and cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub score: f32,
}

/// Exact nearest-neighbour index over unit vectors
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimension` components
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Array2::zeros((0, dimension)),
        }
    }

    /// Build an index from raw vectors; all must share one dimension
    pub fn from_vectors(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let mut index = Self::new(dimension);
        for vector in vectors {
            index.add(vector)?;
        }
        Ok(index)
    }

    /// Normalize and append a vector; its row position is `len() - 1` afterwards
    pub fn add(&mut self, mut vector: Vec<f32>) -> Result<()> {
        self.check_dimension(vector.len())?;
        normalize_l2(&mut vector);
        self.vectors
            .push_row(ArrayView1::from(vector.as_slice()))
            .map_err(|e| GeoError::IndexError(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top `k` rows by cosine similarity, best first; ties keep row order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query.len())?;
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut q = query.to_vec();
        normalize_l2(&mut q);
        let scores = self.vectors.dot(&Array1::from(q));

        let mut hits: Vec<Neighbor> = scores
            .iter()
            .enumerate()
            .map(|(index, &score)| Neighbor { index, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        hits.truncate(k);
        Ok(hits)
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            return Err(GeoError::IndexError(format!(
                "dimension mismatch: expected {}, got {len}",
                self.dimension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_l2() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_l2(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_search_orders_by_cosine() {
        let index = FlatIndex::from_vectors(
            2,
            vec![vec![0.0, 5.0], vec![2.0, 0.0], vec![1.0, 1.0]],
        )
        .unwrap();

        let hits = index.search(&[10.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].index, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].index, 2);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(hits[2].index, 0);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_truncates_and_handles_empty() {
        let index = FlatIndex::from_vectors(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 1).unwrap().len(), 1);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 2);

        let empty = FlatIndex::new(2);
        assert!(empty.search(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_row_order() {
        let index = FlatIndex::from_vectors(2, vec![vec![1.0, 0.0], vec![2.0, 0.0]]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        assert!(index.add(vec![1.0, 2.0]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_scores_are_cosines(
            rows in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 4), 1..20),
            query in prop::collection::vec(-10.0f32..10.0, 4),
        ) {
            let index = FlatIndex::from_vectors(4, rows.clone()).unwrap();
            let hits = index.search(&query, rows.len()).unwrap();
            prop_assert_eq!(hits.len(), rows.len());
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for hit in &hits {
                prop_assert!(hit.score <= 1.0 + 1e-4 && hit.score >= -1.0 - 1e-4);
            }
        }
    }
}
