//! Mapper configuration (colormap.yaml).
//!
//! ```yaml
//! enable_cache: true
//! strict_lexing: false
//! alpha: require
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::parser::AlphaPolicy;

/// Options for compiling and running scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Keep every colorspace representation for the whole run.
    pub enable_cache: bool,

    /// Fail on the first lexical error instead of skipping it.
    pub strict_lexing: bool,

    /// Overrides the script's `alpha` directive.
    pub alpha: Option<AlphaPolicy>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            strict_lexing: false,
            alpha: None,
        }
    }
}

impl MapperConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MapError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read config: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| MapError::Config {
            message: format!("Invalid config: {}", e),
            help: Some("Known keys: enable_cache, strict_lexing, alpha".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();

        assert!(config.enable_cache);
        assert!(!config.strict_lexing);
        assert!(config.alpha.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
enable_cache: false
strict_lexing: true
alpha: forbid
"#;
        let config = MapperConfig::parse(yaml).unwrap();

        assert!(!config.enable_cache);
        assert!(config.strict_lexing);
        assert_eq!(config.alpha, Some(AlphaPolicy::Forbid));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = MapperConfig::parse("alpha: require").unwrap();

        assert!(config.enable_cache);
        assert_eq!(config.alpha, Some(AlphaPolicy::Require));
    }

    #[test]
    fn test_parse_empty_config() {
        assert_eq!(MapperConfig::parse("").unwrap(), MapperConfig::default());
    }

    #[test]
    fn test_invalid_policy() {
        let err = MapperConfig::parse("alpha: sometimes").unwrap_err();
        assert!(matches!(err, MapError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enable_cache: false").unwrap();

        let config = MapperConfig::load(file.path()).unwrap();
        assert!(!config.enable_cache);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MapperConfig::load(&dir.path().join("colormap.yaml")).unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
    }
}
