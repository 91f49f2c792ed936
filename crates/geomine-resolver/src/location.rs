//! Heuristic place-name extraction from report context

use std::collections::HashSet;

use regex::Regex;

/// Capitalized words that the patterns pick up but never name a place
const STOP_WORDS: [&str; 9] = [
    "Figure",
    "Unit",
    "Court",
    "Park",
    "Ltd",
    "Resources",
    "Mining",
    "Gold",
    "Star",
];

const PATTERNS: [&str; 4] = [
    // "Capitalized Phrase" followed by a feature word
    r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(?:mine|project|deposit|field)\b",
    // Locative preposition followed by "Capitalized Phrase"
    r"\b(?:located|at|in|near)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\b",
    // Capitalized word followed by a state or country
    r"\b([A-Z][a-z]+)\s+(?:WA|Western Australia|Australia)\b",
    // "Capitalized Phrase" followed by a region word
    r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(?:region|area|district)\b",
];

/// Regex-based candidate place-name extractor
pub struct LocationExtractor {
    patterns: Vec<Regex>,
}

impl LocationExtractor {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!("Invalid location pattern {p}: {e}");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Candidate names, pattern by pattern, in first-occurrence order with
    /// duplicates and stop words removed
    pub fn extract(&self, context: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.captures_iter(context) {
                let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if STOP_WORDS.contains(&name) || !seen.insert(name) {
                    continue;
                }
                names.push(name.to_string());
            }
        }

        if !names.is_empty() {
            tracing::debug!("Extracted potential locations: {:?}", names);
        }
        names
    }
}

impl Default for LocationExtractor {
    fn default() -> Self {
        Self::new()
    }
}
