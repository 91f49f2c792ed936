//! Tagging quality metrics
//!
//! Precision, recall and F1 of predicted spans against annotated spans.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::training::AnnotatedSpan;
use crate::TaggedSpan;

/// Span-level counts for one or more documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetrics {
    /// Predicted spans matching an annotation
    pub true_positives: usize,
    /// Predicted spans matching nothing
    pub false_positives: usize,
    /// Annotations no prediction matched
    pub false_negatives: usize,
    pub gold_total: usize,
    pub predicted_total: usize,
}

impl EntityMetrics {
    /// TP / (TP + FP)
    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// 2PR / (P + R)
    pub fn f1_score(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// TP / (TP + FP + FN)
    pub fn accuracy(&self) -> f32 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives + self.false_negatives,
        )
    }

    /// Accumulate counts from another document
    pub fn add(&mut self, other: &EntityMetrics) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.gold_total += other.gold_total;
        self.predicted_total += other.predicted_total;
    }

    pub fn report(&self) -> String {
        format!(
            "Precision: {:.1}% | Recall: {:.1}% | F1: {:.1}% \
             (gold {}, predicted {}, TP {}, FP {}, FN {})",
            self.precision() * 100.0,
            self.recall() * 100.0,
            self.f1_score() * 100.0,
            self.gold_total,
            self.predicted_total,
            self.true_positives,
            self.false_positives,
            self.false_negatives,
        )
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// Span evaluator
pub struct Evaluator {
    /// Exact offsets required; otherwise case-insensitive text match
    strict: bool,
}

impl Evaluator {
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Match on span text instead of offsets
    pub fn relaxed(mut self) -> Self {
        self.strict = false;
        self
    }

    fn spans_match(&self, predicted: &TaggedSpan, gold: &AnnotatedSpan) -> bool {
        if predicted.label != gold.label {
            return false;
        }
        if self.strict {
            predicted.start == gold.start && predicted.end == gold.end
        } else {
            predicted.text.to_lowercase() == gold.text.to_lowercase()
        }
    }

    /// Greedy one-to-one matching of predictions to annotations
    pub fn evaluate(&self, predicted: &[TaggedSpan], gold: &[AnnotatedSpan]) -> EntityMetrics {
        let mut matched_gold: HashSet<usize> = HashSet::new();
        let mut true_positives = 0;

        for pred in predicted {
            let hit = gold
                .iter()
                .enumerate()
                .find(|(idx, g)| !matched_gold.contains(idx) && self.spans_match(pred, g));
            if let Some((idx, _)) = hit {
                matched_gold.insert(idx);
                true_positives += 1;
            }
        }

        EntityMetrics {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - matched_gold.len(),
            gold_total: gold.len(),
            predicted_total: predicted.len(),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROJECT_LABEL;

    fn predicted(text: &str, start: usize) -> TaggedSpan {
        TaggedSpan {
            text: text.to_string(),
            label: PROJECT_LABEL.to_string(),
            start,
            end: start + text.len(),
            confidence: 0.9,
        }
    }

    fn gold(text: &str, start: usize) -> AnnotatedSpan {
        AnnotatedSpan {
            text: text.to_string(),
            label: PROJECT_LABEL.to_string(),
            start,
            end: start + text.len(),
        }
    }

    #[test]
    fn test_ratios() {
        let metrics = EntityMetrics {
            true_positives: 8,
            false_positives: 2,
            false_negatives: 2,
            gold_total: 10,
            predicted_total: 10,
        };
        assert!((metrics.precision() - 0.8).abs() < 1e-6);
        assert!((metrics.recall() - 0.8).abs() < 1e-6);
        assert!((metrics.f1_score() - 0.8).abs() < 1e-6);
        assert!((metrics.accuracy() - 8.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_is_zero() {
        let metrics = EntityMetrics::default();
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);
        assert_eq!(metrics.f1_score(), 0.0);
    }

    #[test]
    fn test_strict_evaluation() {
        let metrics = Evaluator::new().evaluate(
            &[predicted("Golden Ridge", 4), predicted("Kalgoorlie", 40)],
            &[gold("Golden Ridge", 4), gold("Nova", 60)],
        );
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_positives, 1);
        assert_eq!(metrics.false_negatives, 1);
        assert!((metrics.f1_score() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_relaxed_matches_text() {
        let preds = [predicted("NOVA", 10)];
        let golds = [gold("Nova", 0)];
        assert_eq!(Evaluator::new().evaluate(&preds, &golds).true_positives, 0);
        assert_eq!(
            Evaluator::new().relaxed().evaluate(&preds, &golds).true_positives,
            1
        );
    }

    #[test]
    fn test_each_annotation_matches_once() {
        let metrics = Evaluator::new()
            .relaxed()
            .evaluate(&[predicted("Nova", 0), predicted("Nova", 20)], &[gold("Nova", 0)]);
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_positives, 1);
    }

    #[test]
    fn test_add_and_report() {
        let mut total = EntityMetrics::default();
        let doc = Evaluator::new().evaluate(&[predicted("Nova", 0)], &[gold("Nova", 0)]);
        total.add(&doc);
        total.add(&doc);
        assert_eq!(total.true_positives, 2);
        assert!(total.report().contains("F1: 100.0%"));
    }
}
