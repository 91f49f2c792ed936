//! GeoMine CLI - pipeline wiring shared by the `geomine` binary and its tests

pub mod logging;
pub mod pipeline;

pub use logging::init_logging;
pub use pipeline::{Pipeline, PipelineSummary};
