//! Pipeline records
//!
//! `CandidateEntity` is what the tagger hands to the resolver,
//! `Resolution` is what comes back, and `OutputRecord` is one JSONL line.

use serde::{Deserialize, Serialize};

use crate::Coordinates;

/// Which cascade step produced a coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectMatch,
    SemanticSearch,
    ContextExtraction,
    GenerativeModel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectMatch => "direct_match",
            Self::SemanticSearch => "semantic_search",
            Self::ContextExtraction => "context_extraction",
            Self::GenerativeModel => "generative_model",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinates plus the strategy that found them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coordinates: Coordinates,
    pub strategy: Strategy,
}

impl Resolution {
    pub fn new(coordinates: Coordinates, strategy: Strategy) -> Self {
        Self {
            coordinates,
            strategy,
        }
    }
}

/// A tagged project name with the text around it
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntity {
    pub name: String,
    pub context: String,
    pub source_pdf: String,
    pub page_number: u32,
}

/// One line of pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub pdf_file: String,
    pub page_number: u32,
    pub project_name: String,
    pub context_sentence: String,
    pub coordinates: Option<[f64; 2]>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub resolution_strategy: Option<Strategy>,
}

impl OutputRecord {
    pub fn new(entity: &CandidateEntity, resolution: Option<Resolution>) -> Self {
        let coords = resolution.map(|r| r.coordinates);
        Self {
            pdf_file: entity.source_pdf.clone(),
            page_number: entity.page_number,
            project_name: entity.name.clone(),
            context_sentence: entity.context.trim().to_string(),
            coordinates: coords.map(|c| c.as_pair()),
            latitude: coords.map(|c| c.latitude),
            longitude: coords.map(|c| c.longitude),
            resolution_strategy: resolution.map(|r| r.strategy),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> CandidateEntity {
        CandidateEntity {
            name: "Golden Ridge".to_string(),
            context: "  Golden Ridge Mine is located near Kalgoorlie.\n".to_string(),
            source_pdf: "report.pdf".to_string(),
            page_number: 4,
        }
    }

    #[test]
    fn test_resolved_record_roundtrip() {
        let res = Resolution::new(Coordinates::new(-30.5, 121.2), Strategy::DirectMatch);
        let record = OutputRecord::new(&entity(), Some(res));
        assert_eq!(record.context_sentence, "Golden Ridge Mine is located near Kalgoorlie.");

        let line = record.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"coordinates\":[-30.5,121.2]"));
        assert!(line.contains("\"resolution_strategy\":\"direct_match\""));

        let parsed = OutputRecord::from_json_line(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_unresolved_record_keeps_nulls() {
        let record = OutputRecord::new(&entity(), None);
        let line = record.to_json_line().unwrap();

        let raw: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(raw["coordinates"].is_null());
        assert!(raw["latitude"].is_null());
        assert!(raw["longitude"].is_null());

        let parsed = OutputRecord::from_json_line(&line).unwrap();
        assert_eq!(parsed, record);
        assert!(!parsed.is_resolved());
    }

    #[test]
    fn test_parse_line_without_strategy_field() {
        let line = r#"{"pdf_file":"a.pdf","page_number":1,"project_name":"X","context_sentence":"X mine.","coordinates":null,"latitude":null,"longitude":null}"#;
        let parsed = OutputRecord::from_json_line(line).unwrap();
        assert_eq!(parsed.resolution_strategy, None);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(Strategy::ContextExtraction.to_string(), "context_extraction");
        assert_eq!(
            serde_json::to_string(&Strategy::GenerativeModel).unwrap(),
            "\"generative_model\""
        );
    }
}
