//! Generative geocoding boundary
//!
//! Asks a generative model for the coordinates of a project and accepts the
//! answer only when it is strict JSON with two numbers inside the region box.

use geomine_core::{BoundingBox, Coordinates, LlmClient};
use serde_json::Value;

/// What the model is asked about
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRequest {
    pub project_name: Option<String>,
    pub context: String,
}

impl CoordinateRequest {
    /// Blank project names are treated as absent
    pub fn new(context: impl Into<String>, project_name: Option<&str>) -> Self {
        Self {
            project_name: project_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            context: context.into(),
        }
    }

    pub fn prompt(&self) -> String {
        let subject = match &self.project_name {
            Some(name) => format!("Project: {name}\nContext: {}", self.context),
            None => self.context.clone(),
        };

        format!(
            "Extract the most specific latitude and longitude coordinates from this \
             Australian mining context:\n\n\
             {subject}\n\n\
             Focus on:\n\
             - Mining project locations in Western Australia\n\
             - Specific place names, towns, or geographic features\n\
             - Consider that many mines are in remote areas of WA\n\n\
             Respond ONLY in valid JSON format:\n\
             {{\"latitude\": <decimal_degrees>, \"longitude\": <decimal_degrees>}}\n\n\
             If you cannot determine coordinates, respond with:\n\
             {{\"latitude\": null, \"longitude\": null}}"
        )
    }
}

/// Outcome of a generative lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateAnswer {
    Located(Coordinates),
    Undetermined,
}

/// Generative-model geocoder with region validation
pub struct GenerativeGeocoder {
    client: Box<dyn LlmClient>,
    bounds: BoundingBox,
}

impl GenerativeGeocoder {
    pub fn new(client: Box<dyn LlmClient>, bounds: BoundingBox) -> Self {
        Self { client, bounds }
    }

    /// One model call. Transport, parse and region failures are all
    /// `Undetermined`.
    pub async fn locate(&self, request: &CoordinateRequest) -> CoordinateAnswer {
        let raw = match self.client.generate(&request.prompt()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Generative model call failed: {e}");
                return CoordinateAnswer::Undetermined;
            }
        };
        tracing::debug!("Generative model answered: {}", raw.trim());

        parse_answer(&raw, &self.bounds)
    }
}

/// Drop a Markdown code fence: when the answer opens with ```, its first and
/// last lines are removed.
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= 2 {
        return String::new();
    }
    lines[1..lines.len() - 1].join("\n")
}

/// Validate a raw model answer against `bounds`
pub fn parse_answer(raw: &str, bounds: &BoundingBox) -> CoordinateAnswer {
    let body = strip_code_fences(raw);
    let value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Generative answer is not JSON ({e}): {body}");
            return CoordinateAnswer::Undetermined;
        }
    };

    let (Some(lat), Some(lon)) = (
        value.get("latitude").and_then(Value::as_f64),
        value.get("longitude").and_then(Value::as_f64),
    ) else {
        tracing::debug!("Generative answer has no numeric coordinates");
        return CoordinateAnswer::Undetermined;
    };

    let coords = Coordinates::new(lat, lon);
    if !bounds.contains(&coords) {
        tracing::warn!("Generative answer {coords} lies outside the region box");
        return CoordinateAnswer::Undetermined;
    }
    CoordinateAnswer::Located(coords)
}
