//! Small shared types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Open, backend-populated metadata map.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Which kinds of entry a listing yields.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeFilter {
    #[default]
    FilesOnly,
    FoldersOnly,
    FilesAndFolders,
}

impl TypeFilter {
    pub fn includes_files(self) -> bool {
        matches!(self, TypeFilter::FilesOnly | TypeFilter::FilesAndFolders)
    }

    pub fn includes_folders(self) -> bool {
        matches!(self, TypeFilter::FoldersOnly | TypeFilter::FilesAndFolders)
    }
}

/// Static capability set declared by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// create, rename, move, copy, delete and folder mutation
    pub write: bool,
    /// append to existing files
    pub append: bool,
    /// exposes [`crate::AttachmentsCapability`]
    pub attachments: bool,
}

impl Capabilities {
    /// Everything except attachments.
    pub const fn writable() -> Self {
        Self {
            write: true,
            append: true,
            attachments: false,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            write: false,
            append: false,
            attachments: false,
        }
    }

    pub const fn with_attachments(mut self) -> Self {
        self.attachments = true;
        self
    }

    pub const fn without_append(mut self) -> Self {
        self.append = false;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::writable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_type_filter_parse() {
        assert_eq!(TypeFilter::from_str("FILES_ONLY").unwrap(), TypeFilter::FilesOnly);
        assert_eq!(
            TypeFilter::from_str("folders_only").unwrap(),
            TypeFilter::FoldersOnly
        );
        assert_eq!(TypeFilter::FilesAndFolders.to_string(), "FILES_AND_FOLDERS");
        assert!(TypeFilter::from_str("everything").is_err());
    }

    #[test]
    fn test_type_filter_includes() {
        assert!(TypeFilter::FilesOnly.includes_files());
        assert!(!TypeFilter::FilesOnly.includes_folders());
        assert!(TypeFilter::FilesAndFolders.includes_folders());
    }
}
