//! Offline tagger training from Label Studio exports
//!
//! An export is a JSON array of tasks:
//!
//! ```json
//! [{ "data": { "text": "..." },
//!    "annotations": [{ "result": [
//!      { "type": "labels",
//!        "value": { "start": 4, "end": 16, "labels": ["PROJECT"] } }
//!    ]}]
//! }]
//! ```
//!
//! Offsets in the export count characters. They are converted to byte offsets
//! here; spans that fall outside the text or cut through a word are dropped.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::lexicon::{LexiconModel, LexiconTagger, MODEL_FILE};
use crate::metrics::{EntityMetrics, Evaluator};
use crate::{EntityTagger, PROJECT_LABEL};
use geomine_core::{GeoError, Result};

// ============================================================================
// Annotated data
// ============================================================================

/// A gold span, byte offsets into its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSpan {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDocument {
    pub text: String,
    pub spans: Vec<AnnotatedSpan>,
}

/// Parsed export plus the number of spans rejected on the way
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    pub documents: Vec<AnnotatedDocument>,
    pub dropped_spans: usize,
}

#[derive(Debug, Deserialize)]
struct Task {
    data: TaskData,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    text: String,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    result: Vec<AnnotationResult>,
}

#[derive(Debug, Deserialize)]
struct AnnotationResult {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LabelValue {
    start: usize,
    end: usize,
    #[serde(default)]
    labels: Vec<String>,
}

/// Parse a Label Studio export, keeping `PROJECT` label spans
pub fn parse_label_studio(json: &str) -> Result<AnnotationSet> {
    let tasks: Vec<Task> = serde_json::from_str(json)?;
    let mut set = AnnotationSet::default();

    for (task_no, task) in tasks.into_iter().enumerate() {
        let text = task.data.text;
        let mut spans = Vec::new();

        let values = task
            .annotations
            .into_iter()
            .flat_map(|a| a.result)
            .filter(|r| r.kind == "labels")
            .filter_map(|r| serde_json::from_value::<LabelValue>(r.value).ok())
            .filter(|v| v.labels.iter().any(|l| l == PROJECT_LABEL));

        for value in values {
            match char_span(&text, value.start, value.end) {
                Some((start, end)) => spans.push(AnnotatedSpan {
                    text: text[start..end].to_string(),
                    label: PROJECT_LABEL.to_string(),
                    start,
                    end,
                }),
                None => {
                    tracing::warn!(
                        "Task {}: dropping span {}..{} (out of range or not on word boundaries)",
                        task_no,
                        value.start,
                        value.end
                    );
                    set.dropped_spans += 1;
                }
            }
        }

        spans.sort_by_key(|s| (s.start, s.end));
        spans.dedup();
        set.documents.push(AnnotatedDocument { text, spans });
    }

    Ok(set)
}

/// Read and parse an export file
pub fn load_label_studio(path: &Path) -> Result<AnnotationSet> {
    let json = std::fs::read_to_string(path).map_err(|e| GeoError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_label_studio(&json)
}

/// Convert a character span to a byte span aligned on word boundaries
fn char_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let byte_start = *offsets.get(start)?;
    let byte_end = *offsets.get(end)?;

    let inner = &text[byte_start..byte_end];
    if inner.starts_with(char::is_whitespace) || inner.ends_with(char::is_whitespace) {
        return None;
    }
    let before = text[..byte_start].chars().next_back();
    let after = text[byte_end..].chars().next();
    let first = inner.chars().next();
    let last = inner.chars().next_back();
    let cuts_word = |outside: Option<char>, edge: Option<char>| {
        matches!((outside, edge), (Some(o), Some(e)) if o.is_alphanumeric() && e.is_alphanumeric())
    };
    if cuts_word(before, first) || cuts_word(after, last) {
        return None;
    }

    Some((byte_start, byte_end))
}

// ============================================================================
// Training
// ============================================================================

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Occurrences needed before a following word becomes a cue
    pub min_cue_count: usize,
    /// Cue words included regardless of the data
    pub seed_cue_words: Vec<String>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            min_cue_count: 2,
            seed_cue_words: ["mine", "project", "deposit", "prospect", "operation", "operations"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub documents: usize,
    pub spans: usize,
    pub dropped_spans: usize,
    pub phrases: usize,
    pub cue_words: usize,
    /// Exact-offset matching
    pub metrics: EntityMetrics,
    /// Case-insensitive span text matching
    pub text_metrics: EntityMetrics,
    pub model_path: PathBuf,
}

/// Learn phrases and cue words from annotated documents
pub fn train(documents: &[AnnotatedDocument], options: &TrainingOptions) -> LexiconModel {
    let mut seen = HashSet::new();
    let mut phrases = Vec::new();
    let mut cue_counts: BTreeMap<String, usize> = BTreeMap::new();

    for doc in documents {
        for span in &doc.spans {
            let phrase = span.text.split_whitespace().collect::<Vec<_>>().join(" ");
            if seen.insert(phrase.to_lowercase()) {
                phrases.push(phrase);
            }
            if let Some(cue) = following_word(&doc.text, span.end) {
                *cue_counts.entry(cue.to_lowercase()).or_default() += 1;
            }
        }
    }
    phrases.sort_by_key(|p| p.to_lowercase());

    let cue_words: BTreeSet<String> = cue_counts
        .into_iter()
        .filter(|(_, count)| *count >= options.min_cue_count)
        .map(|(word, _)| word)
        .chain(options.seed_cue_words.iter().map(|w| w.to_lowercase()))
        .collect();

    LexiconModel::new(phrases, cue_words.into_iter().collect())
}

/// The capitalized alphabetic word right after `end`, if any
fn following_word(text: &str, end: usize) -> Option<&str> {
    let rest = text.get(end..)?;
    let trimmed = rest.trim_start_matches([' ', '\t']);
    if trimmed.len() == rest.len() {
        return None;
    }
    let len = trimmed
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(trimmed.len());
    let word = &trimmed[..len];
    word.chars()
        .next()
        .filter(|c| c.is_uppercase())
        .map(|_| word)
}

/// Score a tagger against annotated documents
pub fn evaluate(
    tagger: &dyn EntityTagger,
    documents: &[AnnotatedDocument],
    evaluator: &Evaluator,
) -> Result<EntityMetrics> {
    let mut total = EntityMetrics::default();
    for doc in documents {
        let predicted = tagger.tag(&doc.text)?;
        total.add(&evaluator.evaluate(&predicted, &doc.spans));
    }
    Ok(total)
}

/// Train from an export file and write `model.json` into `output_dir`
pub fn train_and_save(
    annotations: &Path,
    output_dir: &Path,
    options: &TrainingOptions,
) -> Result<TrainingReport> {
    let set = load_label_studio(annotations)?;
    let spans: usize = set.documents.iter().map(|d| d.spans.len()).sum();
    tracing::info!(
        "Loaded {} documents with {} PROJECT spans ({} dropped)",
        set.documents.len(),
        spans,
        set.dropped_spans
    );

    let model = train(&set.documents, options);

    std::fs::create_dir_all(output_dir).map_err(|e| GeoError::Io {
        path: output_dir.display().to_string(),
        source: e,
    })?;
    let model_path = output_dir.join(MODEL_FILE);
    model.save(&model_path)?;

    let tagger = LexiconTagger::new(&model)?;
    let metrics = evaluate(&tagger, &set.documents, &Evaluator::new())?;
    let text_metrics = evaluate(&tagger, &set.documents, &Evaluator::new().relaxed())?;
    tracing::info!("Training set: {}", metrics.report());

    Ok(TrainingReport {
        documents: set.documents.len(),
        spans,
        dropped_spans: set.dropped_spans,
        phrases: model.phrases.len(),
        cue_words: model.cue_words.len(),
        metrics,
        text_metrics,
        model_path,
    })
}

// ============================================================================
// Tests
// ============================================================================
