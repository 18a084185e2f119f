//! What a `do_action` call hands back.

use std::time::SystemTime;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use fsbridge_vfs::{AttachmentRef, AttachmentsCapability, FileRef, FileStream, FileSystem, FsResult, Properties};

use crate::sanitize::sanitize_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Folder,
}

/// Metadata record of one listed or touched entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub canonical_name: String,
    /// `None` for folders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub modification_date: String,
    pub modification_time: String,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(skip)]
    pub modified: SystemTime,
}

impl FileInfo {
    /// Collect metadata of `file`. Names are sanitized.
    pub fn collect<F: FileSystem + ?Sized>(fs: &F, file: &FileRef) -> FsResult<Self> {
        let is_folder = fs.is_folder(file)?;
        let modified = fs.get_modification_time(file)?;
        let local: DateTime<Local> = modified.into();
        let (size, properties) = if is_folder {
            (None, Properties::new())
        } else {
            (
                Some(fs.get_file_size(file)?),
                fs.get_additional_file_properties(file)?,
            )
        };
        Ok(Self {
            name: sanitize_name(fs.get_name(file)).into_owned(),
            canonical_name: sanitize_name(&fs.get_canonical_name(file)?).into_owned(),
            size,
            entry_type: if is_folder {
                EntryType::Folder
            } else {
                EntryType::File
            },
            modification_date: local.format("%Y-%m-%d").to_string(),
            modification_time: local.format("%H:%M:%S%.3f").to_string(),
            properties,
            modified,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.entry_type == EntryType::Folder
    }
}

/// Ordered set of [`FileInfo`] records keyed by canonical name.
#[derive(Debug, Clone, Default)]
pub struct FileListing {
    entries: IndexMap<String, FileInfo>,
}

impl FileListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `info`; a second record with the same canonical name replaces
    /// the first in place.
    pub fn insert(&mut self, info: FileInfo) {
        self.entries.insert(info.canonical_name.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, canonical_name: &str) -> Option<&FileInfo> {
        self.entries.get(canonical_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileInfo> {
        self.entries.values()
    }

    /// Sanitized names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|info| info.name.as_str()).collect()
    }
}

impl Serialize for FileListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

/// Metadata record of one attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    /// Name of the stored item the attachment embeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
}

impl AttachmentInfo {
    pub fn collect(attachments: &dyn AttachmentsCapability, attachment: &AttachmentRef) -> FsResult<Self> {
        Ok(Self {
            name: sanitize_name(&attachments.get_attachment_name(attachment)?).into_owned(),
            file_name: attachments
                .get_attachment_file_name(attachment)?
                .map(|name| sanitize_name(&name).into_owned()),
            content_type: attachments.get_attachment_content_type(attachment)?,
            size: attachments.get_attachment_size(attachment)?,
            properties: attachments.get_additional_attachment_properties(attachment)?,
            embedded: attachments
                .get_file_from_attachment(attachment)?
                .map(|file| sanitize_name(file.name()).into_owned()),
        })
    }
}

/// Outcome of a successful `do_action` call.
#[derive(Debug)]
pub enum ActionResult {
    /// LIST, and DELETE/MOVE/COPY in wildcard batch mode.
    Listing(FileListing),
    /// INFO, WRITE, CREATE, APPEND.
    Info(FileInfo),
    /// READ and READDELETE.
    Content(FileStream),
    /// RENAME, single MOVE/COPY/DELETE, MKDIR, RMDIR.
    Name(String),
    Exists(bool),
    Attachments(Vec<AttachmentInfo>),
    /// The source was missing and the actor tolerates that.
    NotFound,
}

impl ActionResult {
    pub fn as_listing(&self) -> Option<&FileListing> {
        match self {
            ActionResult::Listing(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn as_info(&self) -> Option<&FileInfo> {
        match self {
            ActionResult::Info(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            ActionResult::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_exists(&self) -> Option<bool> {
        match self {
            ActionResult::Exists(exists) => Some(*exists),
            _ => None,
        }
    }

    pub fn as_attachments(&self) -> Option<&[AttachmentInfo]> {
        match self {
            ActionResult::Attachments(attachments) => Some(attachments),
            _ => None,
        }
    }

    pub fn into_content(self) -> Option<FileStream> {
        match self {
            ActionResult::Content(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ActionResult::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsbridge_vfs::MemoryFileSystem;

    fn open_fs() -> MemoryFileSystem {
        let mut fs = MemoryFileSystem::new();
        fs.configure().unwrap();
        fs.open().unwrap();
        fs
    }

    #[test]
    fn test_file_info_serializes_camel_case() {
        let fs = open_fs();
        let file = fs.to_file("docs/a.txt").unwrap();
        fs.create_folder(&fs.to_folder("docs").unwrap()).unwrap();
        fs.write_all(&file, b"hello").unwrap();

        let info = FileInfo::collect(&fs, &file).unwrap();
        assert_eq!(info.size, Some(5));
        assert!(!info.is_folder());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["canonicalName"], "docs/a.txt");
        assert_eq!(json["type"], "file");
        assert!(json.get("modificationDate").is_some());
        assert!(json.get("modified").is_none());
    }

    #[test]
    fn test_folder_info_has_no_size() {
        let fs = open_fs();
        fs.create_folder(&fs.to_folder("docs").unwrap()).unwrap();
        let info = FileInfo::collect(&fs, &fs.to_file("docs").unwrap()).unwrap();
        assert!(info.is_folder());
        assert_eq!(info.size, None);
        assert!(serde_json::to_value(&info).unwrap().get("size").is_none());
    }

    #[test]
    fn test_listing_keeps_insertion_order() {
        let fs = open_fs();
        let mut listing = FileListing::new();
        for name in ["b", "a", "c"] {
            let file = fs.to_file(name).unwrap();
            fs.write_all(&file, b"").unwrap();
            listing.insert(FileInfo::collect(&fs, &file).unwrap());
        }
        listing.insert(FileInfo::collect(&fs, &fs.to_file("a").unwrap()).unwrap());
        assert_eq!(listing.names(), vec!["b", "a", "c"]);

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
    }
}
