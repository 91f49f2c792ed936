//! GeoMine Extractor - Project-name tagging
//!
//! Tags `PROJECT` spans in page text with a trained model and attaches the
//! surrounding sentence as context. Also hosts the offline trainer that
//! turns annotated documents into a model artifact.

use std::path::Path;

use geomine_core::{CandidateEntity, Result};

pub mod lexicon;
pub mod metrics;
pub mod sentence;
pub mod training;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use lexicon::{LexiconModel, LexiconTagger, MODEL_FILE};
pub use metrics::{EntityMetrics, Evaluator};
pub use sentence::{context_for, sentence_bounds};
pub use training::{AnnotatedDocument, AnnotatedSpan, TrainingOptions, TrainingReport};

/// The only label the pipeline consumes
pub const PROJECT_LABEL: &str = "PROJECT";

/// A labelled span of page text, byte offsets into that text
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSpan {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

/// Trait for sequence-labelling models
pub trait EntityTagger: Send + Sync {
    /// Spans found in `text`, ordered by start offset
    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Tag a page and turn every `PROJECT` span into a candidate with context
pub fn project_candidates(
    tagger: &dyn EntityTagger,
    text: &str,
    source_pdf: &str,
    page_number: u32,
    context_window: usize,
) -> Result<Vec<CandidateEntity>> {
    let spans = tagger.tag(text)?;
    Ok(spans
        .into_iter()
        .filter(|s| s.label == PROJECT_LABEL)
        .map(|s| CandidateEntity {
            context: context_for(text, s.start, s.end, context_window),
            name: s.text,
            source_pdf: source_pdf.to_string(),
            page_number,
        })
        .collect())
}

/// Load a tagger artifact by path.
///
/// A directory holding `model.onnx` loads the transformer tagger (needs the
/// `onnx` feature); otherwise the lexicon model is read from the path itself
/// or from `model.json` inside it.
pub fn load_tagger(path: &Path) -> Result<Box<dyn EntityTagger>> {
    if path.is_dir() && path.join("model.onnx").exists() {
        return load_onnx(path);
    }

    let model_path = if path.is_dir() {
        path.join(MODEL_FILE)
    } else {
        path.to_path_buf()
    };
    Ok(Box::new(LexiconTagger::load(&model_path)?))
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Box<dyn EntityTagger>> {
    Ok(Box::new(onnx::OnnxTagger::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path) -> Result<Box<dyn EntityTagger>> {
    Err(geomine_core::GeoError::TaggerError(format!(
        "{} holds an ONNX model; rebuild with the `onnx` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTagger(Vec<TaggedSpan>);

    impl EntityTagger for FixedTagger {
        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn span(text: &str, label: &str, start: usize) -> TaggedSpan {
        TaggedSpan {
            text: text.to_string(),
            label: label.to_string(),
            start,
            end: start + text.len(),
            confidence: 1.0,
        }
    }

    #[test]
    fn test_candidates_keep_only_projects() {
        let text = "Acme Ltd reported results. Golden Ridge Mine is located near Kalgoorlie.";
        let tagger = FixedTagger(vec![span("Acme Ltd", "ORG", 0), span("Golden Ridge", "PROJECT", 27)]);

        let found = project_candidates(&tagger, text, "report.pdf", 3, 200).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Golden Ridge");
        assert_eq!(found[0].context, "Golden Ridge Mine is located near Kalgoorlie.");
        assert_eq!(found[0].source_pdf, "report.pdf");
        assert_eq!(found[0].page_number, 3);
    }

    #[test]
    fn test_load_tagger_missing_path() {
        assert!(load_tagger(Path::new("/definitely/not/a/model")).is_err());
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_onnx_dir_routes_to_transformer_tagger() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), "{}").unwrap();
        match load_tagger(dir.path()) {
            Err(geomine_core::GeoError::TaggerError(msg)) => assert!(msg.contains("tokenizer.json")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(t) => panic!("loaded '{}' from an incomplete model directory", t.name()),
        }
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_dir_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        assert!(matches!(
            load_tagger(dir.path()),
            Err(geomine_core::GeoError::TaggerError(_))
        ));
    }
}
