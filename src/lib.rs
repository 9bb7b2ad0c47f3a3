//! Passport OCR field extraction: preprocess a passport photo, run it
//! through one or more recognition engines, and pull structured fields
//! out of whichever transcript scored best. Manual entry covers the
//! cases recognition cannot.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod utils;

pub use config::{load_config, PipelineConfig};
pub use models::{ExtractedPassportData, ExtractionReport, OcrAttempt};
pub use pipeline::{ExtractionPipeline, PipelinePhase};
pub use processing::{extract_passport_data, LocalCapability, ManualEntryForm};
pub use utils::error::PipelineError;
