//! Backend configuration.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigurationError;

/// Settings for [`crate::LocalFileSystem`].
///
/// ```toml
/// root = "/var/spool/inbound"
/// createRoot = true
/// readOnly = false
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LocalFileSystemConfig {
    /// Host directory all names resolve against.
    pub root: PathBuf,
    /// Create `root` on open when it does not exist.
    pub create_root: bool,
    pub read_only: bool,
}

impl LocalFileSystemConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = LocalFileSystemConfig::from_toml(
            r#"
            root = "/srv/in"
            createRoot = true
            "#,
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/in"));
        assert!(config.create_root);
        assert!(!config.read_only);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = LocalFileSystemConfig::from_toml("rooot = \"/x\"").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }
}
