//! Gazetteer reference table
//!
//! Loads `(place_name, latitude, longitude)` rows from CSV. The schema is
//! checked once at load time; a missing column or a bad row is fatal.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::{Coordinates, GeoError, Result};

/// Columns every gazetteer file must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["place_name", "latitude", "longitude"];

/// A single named place with known coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GazetteerEntry {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct GazetteerRow {
    place_name: String,
    latitude: f64,
    longitude: f64,
}

/// In-memory gazetteer, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    /// Lowercased names, parallel to `entries`
    lowered: Vec<String>,
}

impl Gazetteer {
    /// Build from already validated entries
    pub fn from_entries(entries: Vec<GazetteerEntry>) -> Self {
        let lowered = entries.iter().map(|e| e.name.to_lowercase()).collect();
        Self { entries, lowered }
    }

    /// Load a gazetteer CSV file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| GeoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    /// Load gazetteer CSV from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| GeoError::GazetteerRow {
                row: 0,
                message: e.to_string(),
            })?
            .clone();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == **col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(GeoError::GazetteerSchema { missing });
        }

        let mut entries = Vec::new();
        for (idx, result) in reader.deserialize::<GazetteerRow>().enumerate() {
            // Header is line 1
            let row = idx + 2;
            let record = result.map_err(|e| GeoError::GazetteerRow {
                row,
                message: e.to_string(),
            })?;

            let entry = GazetteerEntry::new(record.place_name, record.latitude, record.longitude);
            if !entry.coordinates().is_valid() {
                return Err(GeoError::GazetteerRow {
                    row,
                    message: format!(
                        "coordinates out of range: {}, {}",
                        entry.latitude, entry.longitude
                    ),
                });
            }
            entries.push(entry);
        }

        Ok(Self::from_entries(entries))
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&GazetteerEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Place names in table order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Case-insensitive exact match, then case-insensitive substring match.
    ///
    /// Ties go to the first row in table order. Substring matching is
    /// permissive: a short name can hit an unrelated longer place name.
    pub fn find(&self, name: &str) -> Option<&GazetteerEntry> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.lowered
            .iter()
            .position(|n| *n == needle)
            .or_else(|| self.lowered.iter().position(|n| n.contains(&needle)))
            .map(|idx| &self.entries[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Gazetteer {
        Gazetteer::from_entries(vec![
            GazetteerEntry::new("Kalgoorlie", -30.75, 121.47),
            GazetteerEntry::new("Golden Ridge", -30.5, 121.2),
            GazetteerEntry::new("Ridgeway", -33.4, 148.9),
            GazetteerEntry::new("Mount Magnet", -28.06, 117.84),
        ])
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let gaz = sample();
        let hit = gaz.find("golden RIDGE").unwrap();
        assert_eq!(hit.coordinates(), Coordinates::new(-30.5, 121.2));
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        let gaz = Gazetteer::from_entries(vec![
            GazetteerEntry::new("Magnet Hill", -1.0, 1.0),
            GazetteerEntry::new("Magnet", -2.0, 2.0),
        ]);
        assert_eq!(gaz.find("magnet").unwrap().name, "Magnet");
    }

    #[test]
    fn test_partial_match_takes_first_row() {
        let gaz = sample();
        // "ridge" is inside both "Golden Ridge" and "Ridgeway"
        assert_eq!(gaz.find("ridge").unwrap().name, "Golden Ridge");
        assert_eq!(gaz.find("Magnet").unwrap().name, "Mount Magnet");
    }

    #[test]
    fn test_blank_name_never_matches() {
        let gaz = sample();
        assert!(gaz.find("").is_none());
        assert!(gaz.find("   ").is_none());
        assert!(gaz.find("Leinster").is_none());
    }

    #[test]
    fn test_load_csv_with_extra_columns() {
        let csv = "id,place_name,state,latitude,longitude\n\
                   1,Golden Ridge,WA,-30.5,121.2\n\
                   2, Leonora ,WA,-28.88,121.33\n";
        let gaz = Gazetteer::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(gaz.len(), 2);
        assert_eq!(gaz.get(1).unwrap().name, "Leonora");
        assert_eq!(gaz.names(), vec!["Golden Ridge", "Leonora"]);
    }

    #[test]
    fn test_missing_columns_are_fatal() {
        let csv = "name,lat,longitude\nGolden Ridge,-30.5,121.2\n";
        match Gazetteer::from_reader(csv.as_bytes()) {
            Err(GeoError::GazetteerSchema { missing }) => {
                assert_eq!(missing, vec!["place_name", "latitude"]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_row_reports_line() {
        let csv = "place_name,latitude,longitude\nA,-30.5,121.2\nB,north,121.0\n";
        match Gazetteer::from_reader(csv.as_bytes()) {
            Err(GeoError::GazetteerRow { row, .. }) => assert_eq!(row, 3),
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_row_rejected() {
        let csv = "place_name,latitude,longitude\nNowhere,-130.5,121.2\n";
        assert!(Gazetteer::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "place_name,latitude,longitude").unwrap();
        writeln!(file, "Golden Ridge,-30.5,121.2").unwrap();
        let gaz = Gazetteer::from_path(file.path()).unwrap();
        assert_eq!(gaz.len(), 1);

        let missing = Gazetteer::from_path("/definitely/not/here.csv");
        assert!(matches!(missing, Err(GeoError::Io { .. })));
    }
}
