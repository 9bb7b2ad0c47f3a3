use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::ConfigError;

/// Runtime configuration, loaded from a TOML file. Every field has a
/// default so a missing file or a partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub local: LocalEngineConfig,
    pub remote: RemoteEngineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            local: LocalEngineConfig::default(),
            remote: RemoteEngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Uploads larger than this are rejected before any processing.
    pub max_image_bytes: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    pub enabled: bool,
    /// Tesseract language code, e.g. "eng".
    pub language: String,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEngineConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    pub language: String,
    /// Which server-side recognition engine to request (1 or 2).
    pub engine: u8,
    pub detect_orientation: bool,
    pub timeout_secs: u64,
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.ocr.space/parse/image".to_string(),
            api_key: "helloworld".to_string(),
            language: "eng".to_string(),
            engine: 2,
            detect_orientation: true,
            timeout_secs: 30,
        }
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = PipelineConfig::default();
        assert_eq!(config.input.max_image_bytes, 10 * 1024 * 1024);
        assert!(config.local.enabled);
        assert_eq!(config.local.language, "eng");
        assert!(config.remote.enabled);
        assert_eq!(config.remote.endpoint, "https://api.ocr.space/parse/image");
        assert_eq!(config.remote.api_key, "helloworld");
        assert_eq!(config.remote.engine, 2);
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn test_load_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[input]
max_image_bytes = 2097152

[local]
enabled = false
language = "deu"

[remote]
enabled = true
endpoint = "https://ocr.example.com/parse"
api_key = "k-123"
language = "deu"
engine = 1
detect_orientation = false
timeout_secs = 10
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.input.max_image_bytes, 2 * 1024 * 1024);
        assert!(!config.local.enabled);
        assert_eq!(config.local.language, "deu");
        assert_eq!(config.remote.endpoint, "https://ocr.example.com/parse");
        assert_eq!(config.remote.api_key, "k-123");
        assert_eq!(config.remote.engine, 1);
        assert!(!config.remote.detect_orientation);
        assert_eq!(config.remote.timeout_secs, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[remote]
api_key = "k-456"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.remote.api_key, "k-456");
        assert_eq!(config.remote.endpoint, "https://api.ocr.space/parse/image");
        assert!(config.local.enabled);
        assert_eq!(config.input.max_image_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[remote\napi_key = ").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_read_error() {
        let path = Path::new("/nonexistent/passcan.toml");
        assert!(matches!(load_config(path), Err(ConfigError::Read { .. })));
    }
}
