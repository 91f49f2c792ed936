//! Transformer token-classification tagger on ONNX Runtime
//!
//! The model directory holds `model.onnx` (BERT-style inputs: ids, attention
//! mask, token types), `tokenizer.json` and the `config.json` written by the
//! training framework, whose `id2label` maps class ids to BIO tags.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;

use crate::sentence::sentence_bounds;
use crate::{EntityTagger, TaggedSpan, PROJECT_LABEL};
use geomine_core::{GeoError, Result};

const MAX_TOKENS: usize = 512;

#[derive(Debug, Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
}

pub struct OnnxTagger {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    labels: Vec<String>,
}

fn tagger_err(e: impl std::fmt::Display) -> GeoError {
    GeoError::TaggerError(e.to_string())
}

impl OnnxTagger {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        for path in [&model_path, &tokenizer_path, &config_path] {
            if !path.exists() {
                return Err(GeoError::TaggerError(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let config_json = std::fs::read_to_string(&config_path).map_err(|e| GeoError::Io {
            path: config_path.display().to_string(),
            source: e,
        })?;
        let labels = label_table(&config_json)?;

        let session = Session::builder()
            .map_err(|e: ort::Error| tagger_err(e))?
            .with_intra_threads(1)
            .map_err(|e: ort::Error| tagger_err(e))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| tagger_err(format!("ONNX load failed: {e}")))?;

        let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| tagger_err(format!("Tokenizer load failed: {e}")))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| tagger_err(format!("Tokenizer setup failed: {e}")))?;

        tracing::info!(
            "ONNX tagger loaded from {} ({} labels)",
            model_dir.display(),
            labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
        })
    }

    /// Tag one sentence; offsets are relative to `text`
    fn tag_sentence(&self, text: &str) -> Result<Vec<(usize, usize, f32)>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| tagger_err(format!("Tokenization failed: {e}")))?;

        let seq_len = encoding.get_ids().len();
        let to_i64 = |v: &[u32]| v.iter().map(|&x| x as i64).collect::<Vec<_>>();
        let ids = ndarray::Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_ids()))
            .map_err(tagger_err)?;
        let mask =
            ndarray::Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_attention_mask()))
                .map_err(tagger_err)?;
        let types = ndarray::Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_type_ids()))
            .map_err(tagger_err)?;

        let ids = TensorRef::from_array_view(&ids).map_err(tagger_err)?;
        let mask = TensorRef::from_array_view(&mask).map_err(tagger_err)?;
        let types = TensorRef::from_array_view(&types).map_err(tagger_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| tagger_err("Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![ids, mask, types])
            .map_err(|e| tagger_err(format!("ONNX inference failed: {e}")))?;

        // [1, seq_len, num_labels]
        let (shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| tagger_err(format!("Output extraction: {e}")))?;
        let num_labels = self.labels.len();
        if shape.len() != 3 || shape[1] as usize != seq_len || shape[2] as usize != num_labels {
            return Err(tagger_err(format!("Unexpected output shape: {shape:?}")));
        }

        let tags: Vec<(&str, f32)> = logits
            .chunks(num_labels)
            .map(|row| {
                let (best, prob) = argmax_softmax(row);
                (self.labels[best].as_str(), prob)
            })
            .collect();

        Ok(decode_bio(encoding.get_offsets(), &tags))
    }
}

impl EntityTagger for OnnxTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>> {
        let mut spans = Vec::new();
        for bounds in sentence_bounds(text) {
            let base = bounds.start;
            for (start, end, confidence) in self.tag_sentence(&text[bounds])? {
                let (start, end) = (base + start, base + end);
                spans.push(TaggedSpan {
                    text: text[start..end].to_string(),
                    label: PROJECT_LABEL.to_string(),
                    start,
                    end,
                    confidence,
                });
            }
        }
        Ok(spans)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Class id -> tag, from a `config.json` with `id2label`
fn label_table(config_json: &str) -> Result<Vec<String>> {
    let config: ModelConfig = serde_json::from_str(config_json)
        .map_err(|e| tagger_err(format!("invalid config.json: {e}")))?;

    let mut labels = vec![String::new(); config.id2label.len()];
    for (id, label) in config.id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| tagger_err(format!("invalid label id: {id}")))?;
        let slot = labels
            .get_mut(idx)
            .ok_or_else(|| tagger_err(format!("label id out of range: {idx}")))?;
        *slot = label;
    }
    if !labels.iter().any(|l| l.ends_with(PROJECT_LABEL)) {
        return Err(tagger_err("model has no PROJECT label"));
    }
    Ok(labels)
}

fn argmax_softmax(logits: &[f32]) -> (usize, f32) {
    let (best, max) = logits
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
    let sum: f32 = logits.iter().map(|v| (v - max).exp()).sum();
    (best, 1.0 / sum)
}

/// Merge per-token BIO tags into `PROJECT` byte spans with mean confidence.
/// Special tokens carry an empty `(0, 0)` offset and are skipped.
fn decode_bio(offsets: &[(usize, usize)], tags: &[(&str, f32)]) -> Vec<(usize, usize, f32)> {
    let mut spans = Vec::new();
    // (start, end, confidence sum, token count)
    let mut open: Option<(usize, usize, f32, usize)> = None;

    for (&(start, end), &(tag, prob)) in offsets.iter().zip(tags) {
        if start == end {
            continue;
        }
        let (prefix, label) = tag.split_once('-').unwrap_or(("I", tag));

        if label == PROJECT_LABEL && prefix == "I" {
            if let Some((_, e, total, n)) = open.as_mut() {
                *e = end;
                *total += prob;
                *n += 1;
                continue;
            }
        }

        if let Some(span) = open.take() {
            spans.push(finish(span));
        }
        if label == PROJECT_LABEL {
            open = Some((start, end, prob, 1));
        }
    }
    spans.extend(open.map(finish));
    spans
}

fn finish((start, end, total, n): (usize, usize, f32, usize)) -> (usize, usize, f32) {
    (start, end, total / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_table() {
        let labels =
            label_table(r#"{"id2label": {"0": "O", "2": "I-PROJECT", "1": "B-PROJECT"}}"#).unwrap();
        assert_eq!(labels, vec!["O", "B-PROJECT", "I-PROJECT"]);

        assert!(label_table(r#"{"id2label": {"0": "O"}}"#).is_err());
        assert!(label_table(r#"{"id2label": {"5": "B-PROJECT"}}"#).is_err());
    }

    #[test]
    fn test_decode_bio() {
        // [CLS] Golden Ridge Mine near Nova [SEP]
        let offsets = [(0, 0), (0, 6), (7, 12), (13, 17), (18, 22), (23, 27), (0, 0)];
        let tags = [
            ("B-PROJECT", 0.9),
            ("B-PROJECT", 0.8),
            ("I-PROJECT", 0.6),
            ("O", 0.99),
            ("O", 0.99),
            ("B-PROJECT", 0.7),
            ("I-PROJECT", 0.9),
        ];
        let spans = decode_bio(&offsets, &tags);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].0, spans[0].1), (0, 12));
        assert!((spans[0].2 - 0.7).abs() < 1e-6);
        assert_eq!((spans[1].0, spans[1].1), (23, 27));
    }

    #[test]
    fn test_load_requires_all_model_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        match OnnxTagger::load(dir.path()) {
            Err(GeoError::TaggerError(msg)) => assert!(msg.contains("tokenizer.json"), "{msg}"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("loaded without a tokenizer"),
        }
    }

    #[test]
    #[ignore = "requires a PROJECT token-classification model in GEOMINE_NER_MODEL_DIR"]
    fn test_tag_with_exported_model() {
        let dir = std::env::var("GEOMINE_NER_MODEL_DIR").unwrap();
        let tagger = OnnxTagger::load(Path::new(&dir)).unwrap();

        let text = "Drilling resumed at the Golden Ridge Mine. The Nova project is near Kalgoorlie.";
        let spans = tagger.tag(text).unwrap();
        for span in &spans {
            assert_eq!(span.label, PROJECT_LABEL);
            assert_eq!(&text[span.start..span.end], span.text);
            assert!((0.0..=1.0).contains(&span.confidence));
        }
        assert!(spans.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_argmax_softmax() {
        let (best, prob) = argmax_softmax(&[0.0, 2.0, 0.0]);
        assert_eq!(best, 1);
        let expected = 2f32.exp() / (2.0 + 2f32.exp());
        assert!((prob - expected).abs() < 1e-6);
    }
}
