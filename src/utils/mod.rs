pub mod error;

pub use error::{ConfigError, EngineError, ManualEntryError, PipelineError, PreprocessingError};
