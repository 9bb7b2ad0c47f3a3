pub mod engines;
pub mod extract;
pub mod image;
pub mod manual;
pub mod patterns;

pub use engines::{estimate_confidence, LocalCapability, RecognitionEngine, RemoteOcrEngine};
pub use extract::extract_passport_data;
pub use image::ImagePreprocessor;
pub use manual::ManualEntryForm;

#[cfg(feature = "engine-tesseract")]
pub use engines::TesseractEngine;
