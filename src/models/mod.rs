pub mod data;

pub use data::{ExtractedPassportData, ExtractionReport, OcrAttempt};
