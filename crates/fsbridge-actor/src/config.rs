//! Actor configuration.

use serde::Deserialize;

use fsbridge_vfs::{Charset, ConfigurationError, TypeFilter};

use crate::action::Action;

/// What a missing source file or folder means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingFilePolicy {
    /// Absence is an error.
    #[default]
    Fail,
    /// Absence yields an empty or not-found result.
    Tolerate,
}

/// Static settings of one [`crate::FileSystemActor`].
///
/// Loaded from TOML with camelCase keys:
///
/// ```toml
/// action = "WRITE"
/// filename = "out/result.xml"
/// createFolder = true
/// numberOfBackups = 3
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ActorConfig {
    /// Overridden per call by an `action` parameter.
    pub action: Option<Action>,
    /// Filename to operate on; wins over parameter and input.
    pub filename: Option<String>,
    /// Destination for MOVE, COPY and RENAME.
    pub destination: Option<String>,
    /// Folder for LIST, batch actions, MKDIR and RMDIR.
    pub input_folder: Option<String>,
    /// Create missing folders for the target or destination.
    pub create_folder: bool,
    /// Replace an existing destination instead of failing.
    pub overwrite: bool,
    /// Keep this many rolled-over copies of a replaced destination.
    pub number_of_backups: usize,
    /// APPEND: start a new file each day, keep this many days.
    pub rotate_days: u32,
    /// APPEND: roll over once the file exceeds this many bytes.
    pub rotate_size: u64,
    pub wildcard: Option<String>,
    pub exclude_wildcard: Option<String>,
    pub remove_non_empty_folder: bool,
    /// WRITE/APPEND: end the written content with a line separator.
    pub write_line_separator: bool,
    pub charset: Option<Charset>,
    /// Remove the source folder once it is empty after DELETE, MOVE or READDELETE.
    pub delete_empty_folder: bool,
    pub type_filter: TypeFilter,
    pub missing_file: MissingFilePolicy,
}

impl ActorConfig {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action),
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
        let config = ActorConfig::from_toml(
            r#"
            action = "write"
            filename = "out/result.xml"
            createFolder = true
            numberOfBackups = 3
            charset = "ISO-8859-1"
            typeFilter = "FILES_AND_FOLDERS"
            missingFile = "tolerate"
            "#,
        )
        .unwrap();
        assert_eq!(config.action, Some(Action::Write));
        assert_eq!(config.filename.as_deref(), Some("out/result.xml"));
        assert!(config.create_folder);
        assert_eq!(config.number_of_backups, 3);
        assert_eq!(config.charset, Some(Charset::Iso8859_1));
        assert_eq!(config.type_filter, TypeFilter::FilesAndFolders);
        assert_eq!(config.missing_file, MissingFilePolicy::Tolerate);
        assert!(!config.overwrite);
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(ActorConfig::from_toml(r#"action = "forward""#).is_err());
    }
}
