//! Engine settings.
//!
//! Settings can be built in code or loaded from YAML:
//!
//! | Key | Default | Effect |
//! |-----|---------|--------|
//! | `max_depth` | 64 | nested function-call / sub-template limit |
//! | `strip_text` | `false` | trim whitespace from `text` results |
//! | `clean` | see [`CleanOptions`] | defaults for the `clean` command |
//!
//! Unknown keys are rejected so that typos surface at load time.

use std::path::Path;

use serde::Deserialize;

use crate::dom::CleanOptions;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_depth: usize,
    pub strip_text: bool,
    pub clean: CleanOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 64,
            strip_text: false,
            clean: CleanOptions::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        if config.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_yields_defaults() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_override() {
        let c = Config::from_yaml_str("max_depth: 8\nclean:\n  style: true\n").unwrap();
        assert_eq!(c.max_depth, 8);
        assert!(!c.strip_text);
        assert!(c.clean.style);
        assert!(c.clean.scripts);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = Config::from_yaml_str("max_dept: 8").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn zero_depth_rejected() {
        assert!(Config::from_yaml_str("max_depth: 0").is_err());
    }

    #[test]
    fn missing_file() {
        let err = Config::load_file(Path::new("/nonexistent/jsonify.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
