//! Backend-neutral file, folder and attachment references.
//!
//! References are cheap, offline values. Building one never touches a
//! backend and never implies that the named entry exists.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{FileSystemError, FsResult};

/// Characters accepted as path separators when parsing names.
const SEPARATORS: [char; 2] = ['/', '\\'];

/// Split a user-supplied name into normalized path segments.
///
/// Empty and `.` segments are dropped; `..` is rejected.
fn split_segments(name: &str) -> FsResult<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in name.split(SEPARATORS) {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(FileSystemError::invalid_name(format!(
                    "[{name}] may not refer to a parent folder"
                )));
            }
            s if s.contains('\0') => {
                return Err(FileSystemError::invalid_name(format!(
                    "[{}] contains a NUL character",
                    name.escape_debug()
                )));
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

fn check_segment(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FileSystemError::invalid_name(format!("[{name}] is not a valid name")));
    }
    if name.contains(SEPARATORS) || name.contains('\0') {
        return Err(FileSystemError::invalid_name(format!(
            "[{}] must be a single path segment",
            name.escape_debug()
        )));
    }
    Ok(())
}

// ============================================================================
// FolderRef
// ============================================================================

/// A folder, identified by its normalized path from the backend root.
///
/// The root is the empty path. Segments are joined with `/` whatever the
/// backend's native separator is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderRef {
    path: String,
}

impl FolderRef {
    /// The backend root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a folder name; both `/` and `\` separate segments.
    pub fn parse(name: &str) -> FsResult<Self> {
        Ok(Self {
            path: split_segments(name)?.join("/"),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// The enclosing folder, `None` for the root.
    pub fn parent(&self) -> Option<FolderRef> {
        if self.is_root() {
            return None;
        }
        let parent = match self.path.rfind('/') {
            Some(idx) => self.path[..idx].to_string(),
            None => String::new(),
        };
        Some(Self { path: parent })
    }

    /// A direct subfolder.
    pub fn child(&self, name: &str) -> FsResult<FolderRef> {
        check_segment(name)?;
        Ok(Self {
            path: self.join(name),
        })
    }

    /// Resolve a possibly nested relative name below this folder.
    pub fn resolve(&self, name: &str) -> FsResult<FolderRef> {
        let mut path = self.path.clone();
        for segment in split_segments(name)? {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
        }
        Ok(Self { path })
    }

    /// `path/name`, or just `name` at the root.
    pub fn join(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        }
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

// ============================================================================
// NativeHandle
// ============================================================================

/// Opaque backend detail attached to a [`FileRef`], e.g. a node id or a
/// listing entry. Only the backend that created it knows its type.
#[derive(Clone)]
pub struct NativeHandle(Arc<dyn Any + Send + Sync>);

impl NativeHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeHandle(..)")
    }
}

// ============================================================================
// FileRef
// ============================================================================

/// A file (or a listed folder entry), identified by `(owner, name)`.
///
/// Rename and move hand out a new reference; the old one is stale
/// afterwards. The native handle never takes part in equality.
#[derive(Clone)]
pub struct FileRef {
    owner: FolderRef,
    name: String,
    native: Option<NativeHandle>,
}

impl FileRef {
    /// Build a reference from a validated single-segment name.
    pub fn new(owner: FolderRef, name: &str) -> FsResult<Self> {
        check_segment(name)?;
        Ok(Self::from_backend(owner, name, None))
    }

    /// Parse `folder/sub/name` (either separator) into owner and name.
    pub fn parse(name: &str) -> FsResult<Self> {
        Self::parse_in(&FolderRef::root(), name)
    }

    /// Parse a possibly nested name relative to `folder`.
    pub fn parse_in(folder: &FolderRef, name: &str) -> FsResult<Self> {
        let mut segments = split_segments(name)?;
        let Some(last) = segments.pop() else {
            return Err(FileSystemError::invalid_name(format!(
                "[{name}] does not name a file"
            )));
        };
        let owner = folder.resolve(&segments.join("/"))?;
        Ok(Self::from_backend(owner, last, None))
    }

    /// Build a reference for a name reported by a backend.
    ///
    /// Backend names are taken as-is: they may contain characters that
    /// user input may not (control characters, foreign separators).
    pub fn from_backend(owner: FolderRef, name: impl Into<String>, native: Option<NativeHandle>) -> Self {
        Self {
            owner,
            name: name.into(),
            native,
        }
    }

    pub fn with_native(mut self, native: NativeHandle) -> Self {
        self.native = Some(native);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &FolderRef {
        &self.owner
    }

    pub fn native(&self) -> Option<&NativeHandle> {
        self.native.as_ref()
    }

    /// Owner path joined with the name.
    pub fn path(&self) -> String {
        self.owner.join(&self.name)
    }

    /// Sibling in the same folder.
    pub fn sibling(&self, name: &str) -> FsResult<FileRef> {
        FileRef::new(self.owner.clone(), name)
    }

    /// Treat this entry as a folder (for listings that include folders).
    pub fn as_folder(&self) -> FolderRef {
        FolderRef {
            path: self.path(),
        }
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for FileRef {}

impl Hash for FileRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRef")
            .field("owner", &self.owner.path())
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// ============================================================================
// AttachmentRef
// ============================================================================

/// A nested sub-object of a file, addressable only through that file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    owner: FileRef,
    index: usize,
    name: String,
}

impl AttachmentRef {
    pub fn new(owner: FileRef, index: usize, name: impl Into<String>) -> Self {
        Self {
            owner,
            index,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &FileRef {
        &self.owner
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_folder_parse_normalizes() {
        let folder = FolderRef::parse("/a//b/./c/").unwrap();
        assert_eq!(folder.path(), "a/b/c");
        assert_eq!(folder.name(), "c");
        assert_eq!(folder.parent().unwrap().path(), "a/b");
        assert_eq!(FolderRef::parse("a\\b").unwrap().path(), "a/b");
    }

    #[test]
    fn test_folder_root() {
        let root = FolderRef::parse("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root, FolderRef::root());
        assert!(root.parent().is_none());
        assert_eq!(root.segments().count(), 0);
        assert_eq!(FolderRef::parse("a").unwrap().parent(), Some(FolderRef::root()));
    }

    #[test]
    fn test_parent_segment_rejected() {
        assert!(FolderRef::parse("a/../b").is_err());
        assert!(FileRef::parse("../etc/passwd").is_err());
    }

    #[test]
    fn test_file_parse_either_separator() {
        let slash = FileRef::parse("folder/name.txt").unwrap();
        let backslash = FileRef::parse("folder\\name.txt").unwrap();
        assert_eq!(slash, backslash);
        assert_eq!(slash.owner().path(), "folder");
        assert_eq!(slash.name(), "name.txt");
        assert_eq!(slash.path(), "folder/name.txt");
    }

    #[test]
    fn test_file_parse_in_folder() {
        let folder = FolderRef::parse("in").unwrap();
        let file = FileRef::parse_in(&folder, "sub/x.txt").unwrap();
        assert_eq!(file.owner().path(), "in/sub");
        assert_eq!(file.to_string(), "in/sub/x.txt");
    }

    #[test]
    fn test_file_parse_empty() {
        assert!(FileRef::parse("").is_err());
        assert!(FileRef::parse("/").is_err());
        assert_eq!(FileRef::parse("folder/").unwrap().name(), "folder");
    }

    #[test]
    fn test_identity_ignores_native() {
        let a = FileRef::parse("x/y").unwrap().with_native(NativeHandle::new(42u32));
        let b = FileRef::parse("x/y").unwrap();
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_native_downcast() {
        let handle = NativeHandle::new(7u64);
        assert_eq!(handle.downcast_ref::<u64>(), Some(&7));
        assert!(handle.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_backend_names_taken_verbatim() {
        let file = FileRef::from_backend(FolderRef::root(), "file1\tX\r\nY", None);
        assert_eq!(file.name(), "file1\tX\r\nY");
        assert!(FileRef::new(FolderRef::root(), "a/b").is_err());
    }
}
