//! Loading configuration files
//!
//! Schema and option files may be written as JSON or TOML; the format is
//! chosen from the file extension.

use normdb_core::{NdbError, NdbResult};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Parse configuration text in the given format
pub fn parse_config<T: DeserializeOwned>(text: &str, format: ConfigFormat) -> NdbResult<T> {
    match format {
        ConfigFormat::Json => serde_json::from_str(text).map_err(Into::into),
        ConfigFormat::Toml => toml::from_str(text).map_err(Into::into),
    }
}

/// Load a configuration file
///
/// # Example
///
/// ```rust,ignore
/// use normdb_schema::{SchemaConfig, serialization::load_config};
///
/// let config: SchemaConfig = load_config("schema.toml".as_ref()).unwrap();
/// ```
pub fn load_config<T: DeserializeOwned>(path: &Path) -> NdbResult<T> {
    let text = std::fs::read_to_string(path).map_err(|e| NdbError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::debug!("Loading configuration from {}", path.display());
    parse_config(&text, ConfigFormat::from_path(path))
}

// ============================================================================
// Tests
// ============================================================================
