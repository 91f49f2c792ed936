//! Lexicon tagger
//!
//! A trained artifact of known project phrases and cue words (the words that
//! follow project names in annotated text, e.g. "Mine" or "Project").
//! Inference combines:
//! - phrase matching: case-insensitive, on word boundaries
//! - cue matching: a capitalized phrase followed by a cue word
//!
//! Overlapping hits keep the higher confidence, then the longer span.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{EntityTagger, TaggedSpan, PROJECT_LABEL};
use geomine_core::{GeoError, Result};

/// File name of the artifact inside a model directory
pub const MODEL_FILE: &str = "model.json";

const PHRASE_CONFIDENCE: f32 = 0.95;
const CUE_CONFIDENCE: f32 = 0.75;

/// Capitalized words that start a cue match but are not part of a name
const LEADING_STOPWORDS: &[&str] = &[
    "The", "A", "An", "This", "That", "These", "Those", "Our", "Its", "Their", "At", "In", "Near",
    "From", "Of", "And", "For", "To", "On", "With", "By",
];

// ============================================================================
// Model artifact
// ============================================================================

/// Serialized lexicon model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconModel {
    pub label: String,
    pub phrases: Vec<String>,
    pub cue_words: Vec<String>,
}

impl LexiconModel {
    pub fn new(phrases: Vec<String>, cue_words: Vec<String>) -> Self {
        Self {
            label: PROJECT_LABEL.to_string(),
            phrases,
            cue_words,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GeoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| GeoError::TaggerError(format!("invalid model {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| GeoError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}

// ============================================================================
// Tagger
// ============================================================================

/// Rule-based tagger compiled from a `LexiconModel`
pub struct LexiconTagger {
    label: String,
    phrase_pattern: Option<Regex>,
    cue_pattern: Option<Regex>,
    cue_words: HashSet<String>,
}

impl LexiconTagger {
    /// Compile a model into matchers
    pub fn new(model: &LexiconModel) -> Result<Self> {
        let cue_words: HashSet<String> = model
            .cue_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(Self {
            label: model.label.clone(),
            phrase_pattern: build_phrase_pattern(&model.phrases)?,
            cue_pattern: build_cue_pattern(&cue_words)?,
            cue_words,
        })
    }

    /// Load and compile a `model.json` artifact
    pub fn load(path: &Path) -> Result<Self> {
        let model = LexiconModel::load(path)?;
        tracing::info!(
            "Loaded lexicon tagger from {} ({} phrases, {} cue words)",
            path.display(),
            model.phrases.len(),
            model.cue_words.len()
        );
        Self::new(&model)
    }

    fn span(&self, text: &str, start: usize, end: usize, confidence: f32) -> TaggedSpan {
        TaggedSpan {
            text: text[start..end].to_string(),
            label: self.label.clone(),
            start,
            end,
            confidence,
        }
    }

    /// Extract known phrases
    fn extract_by_phrases(&self, text: &str) -> Vec<TaggedSpan> {
        let Some(pattern) = &self.phrase_pattern else {
            return Vec::new();
        };
        pattern
            .find_iter(text)
            .map(|m| self.span(text, m.start(), m.end(), PHRASE_CONFIDENCE))
            .collect()
    }

    /// Extract capitalized phrases followed by a cue word
    fn extract_by_cues(&self, text: &str) -> Vec<TaggedSpan> {
        let Some(pattern) = &self.cue_pattern else {
            return Vec::new();
        };

        let mut entities = Vec::new();
        for caps in pattern.captures_iter(text) {
            let Some(name) = caps.get(1) else { continue };
            if let Some((start, end)) = self.trim_name(text, name.start(), name.end()) {
                entities.push(self.span(text, start, end, CUE_CONFIDENCE));
            }
        }
        entities
    }

    /// Drop leading stopwords and trailing cue words from a cue match
    fn trim_name(&self, text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
        let words: Vec<(usize, &str)> = word_offsets(&text[start..end])
            .into_iter()
            .map(|(offset, word)| (start + offset, word))
            .collect();

        let first = words
            .iter()
            .position(|(_, w)| !LEADING_STOPWORDS.contains(w))?;
        let last = words
            .iter()
            .rposition(|(_, w)| !self.cue_words.contains(&w.to_lowercase()))?;
        if first > last {
            return None;
        }

        let (s, _) = words[first];
        let (e, w) = words[last];
        Some((s, e + w.len()))
    }

    /// Remove duplicate/overlapping entities, keeping highest confidence
    fn deduplicate(&self, mut entities: Vec<TaggedSpan>) -> Vec<TaggedSpan> {
        // Sort by start, then confidence (descending), then length (descending)
        entities.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.confidence.total_cmp(&a.confidence))
                .then((b.end - b.start).cmp(&(a.end - a.start)))
        });

        let mut result: Vec<TaggedSpan> = Vec::new();
        for entity in entities {
            let overlaps = result
                .iter()
                .any(|kept| entity.start < kept.end && kept.start < entity.end);
            if !overlaps {
                result.push(entity);
            } else if let Some(pos) = result.iter().position(|kept| {
                entity.start < kept.end
                    && kept.start < entity.end
                    && entity.confidence > kept.confidence
            }) {
                result[pos] = entity;
            }
        }

        result.sort_by_key(|e| e.start);
        result
    }
}

impl EntityTagger for LexiconTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>> {
        let mut entities = self.extract_by_phrases(text);
        entities.extend(self.extract_by_cues(text));
        Ok(self.deduplicate(entities))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

// ============================================================================
// Pattern construction
// ============================================================================

/// Split on whitespace, keeping byte offsets
fn word_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                words.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push((s, &text[s..]));
    }
    words
}

fn build_phrase_pattern(phrases: &[String]) -> Result<Option<Regex>> {
    let mut alternatives: Vec<(usize, String)> = Vec::new();
    let mut seen = HashSet::new();

    for phrase in phrases {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        let (Some(first), Some(last)) = (words.first(), words.last()) else {
            continue;
        };
        if !seen.insert(words.join(" ").to_lowercase()) {
            continue;
        }

        let starts_word = first.chars().next().is_some_and(char::is_alphanumeric);
        let ends_word = last.chars().last().is_some_and(char::is_alphanumeric);
        let body = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join(r"\s+");

        let alt = format!(
            "{}{}{}",
            if starts_word { r"\b" } else { "" },
            body,
            if ends_word { r"\b" } else { "" }
        );
        alternatives.push((phrase.chars().count(), alt));
    }

    if alternatives.is_empty() {
        return Ok(None);
    }

    // Longest first so alternation prefers the longest phrase at a position
    alternatives.sort_by(|a, b| b.0.cmp(&a.0));
    let pattern = format!(
        "(?:{})",
        alternatives
            .into_iter()
            .map(|(_, alt)| alt)
            .collect::<Vec<_>>()
            .join("|")
    );

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .size_limit(64 * (1 << 20))
        .build()
        .map(Some)
        .map_err(|e| GeoError::TaggerError(format!("phrase pattern: {e}")))
}

fn build_cue_pattern(cue_words: &HashSet<String>) -> Result<Option<Regex>> {
    if cue_words.is_empty() {
        return Ok(None);
    }

    let mut cues: Vec<&String> = cue_words.iter().collect();
    cues.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let cue_alt = cues
        .iter()
        .map(|c| regex::escape(c))
        .collect::<Vec<_>>()
        .join("|");

    let word = r"\p{Lu}[\p{L}\p{N}'’&-]*";
    let pattern = format!(r"\b({word}(?:[ \t]+{word})*)\s+(?i:{cue_alt})\b");

    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| GeoError::TaggerError(format!("cue pattern: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
