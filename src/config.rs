use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application configuration, loaded from `config.json` in the working
/// directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory containing the staged chapter folders
    pub chapter_root: PathBuf,
    /// Base URL of the upload API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    "https://api.mangadex.org".to_string()
}

impl Config {
    /// Load configuration from `config.json` in the current working directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chapter_root": "/tmp/chapters" }}"#).unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.chapter_root, PathBuf::from("/tmp/chapters"));
        assert_eq!(config.api_base_url, "https://api.mangadex.org");
    }

    #[test]
    fn test_load_with_base_url_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "chapter_root": "/tmp/chapters", "api_base_url": "http://localhost:4444" }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:4444");
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = Config::load_from(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
