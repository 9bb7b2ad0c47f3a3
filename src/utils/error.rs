use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single recognition engine. Never fatal on its own: the
/// pipeline logs it and moves on to the next configured engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("service reported an error: {0}")]
    Service(String),
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
    #[error("recognition failed: {0}")]
    Recognition(String),
}

#[derive(Debug, Error)]
pub enum PreprocessingError {
    #[error("image decoding failed: {0}")]
    Decode(String),
    #[error("image encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("preprocessing failed: {0}")]
    Preprocessing(#[from] PreprocessingError),
    #[error("all recognition engines failed ({attempted} attempted)")]
    AllEnginesFailed { attempted: usize },
    #[error("another extraction run is already in progress")]
    Busy,
    #[error("run superseded by a pipeline reset")]
    Superseded,
    #[error("engine initialization failed: {0}")]
    EngineInit(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {}", path.display(), source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {}", path.display(), source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum ManualEntryError {
    #[error("manual entry form has no filled fields")]
    EmptySubmission,
}
