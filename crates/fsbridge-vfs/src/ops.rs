//! The backend-neutral filesystem contract.
//!
//! Every backend (local disk, FTP, SFTP, SMB, object stores, mailboxes)
//! implements [`FileSystem`]. Operations are name-based and whole-stream:
//! there is no random byte-range access.

use std::io::Write;
use std::time::SystemTime;

use crate::attachments::AttachmentsCapability;
use crate::error::{ConfigurationError, FileSystemError, FsResult};
use crate::lifecycle::LifecycleState;
use crate::reference::{FileRef, FolderRef};
use crate::stream::{Charset, FileStream, WriteStream};
use crate::types::{Capabilities, Properties, TypeFilter};

/// A finite, lazy sequence produced by a listing call.
///
/// Every listing call starts a fresh sequence; consuming it may perform
/// backend I/O per item or per page.
pub type Listing<T> = Box<dyn Iterator<Item = FsResult<T>> + Send>;

/// Core filesystem contract.
///
/// Lifecycle transitions take `&mut self`; everything else takes `&self`
/// so one open instance can serve several worker threads. All I/O fails
/// with [`FileSystemError::IllegalState`] unless the filesystem is open.
pub trait FileSystem: Send + Sync {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Validate settings. Never touches the backend.
    fn configure(&mut self) -> Result<(), ConfigurationError>;

    /// Acquire backend resources.
    fn open(&mut self) -> FsResult<()>;

    /// Release backend resources. Safe to call when never opened.
    fn close(&mut self) -> FsResult<()>;

    fn state(&self) -> LifecycleState;

    fn is_open(&self) -> bool {
        self.state() == LifecycleState::Open
    }

    // ========================================================================
    // References (pure, no backend access)
    // ========================================================================

    /// Reference to `name`, which may contain folder segments separated by
    /// `/` or `\`.
    fn to_file(&self, name: &str) -> FsResult<FileRef> {
        FileRef::parse(name)
    }

    fn to_file_in(&self, folder: &FolderRef, name: &str) -> FsResult<FileRef> {
        FileRef::parse_in(folder, name)
    }

    fn to_folder(&self, name: &str) -> FsResult<FolderRef> {
        FolderRef::parse(name)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Whether the entry exists. Absence is `Ok(false)`, never an error.
    fn exists(&self, file: &FileRef) -> FsResult<bool>;

    /// List entries of `folder` (root when `None`).
    fn list(&self, folder: Option<&FolderRef>, filter: TypeFilter) -> FsResult<Listing<FileRef>>;

    /// Whether a listed entry denotes a folder.
    fn is_folder(&self, file: &FileRef) -> FsResult<bool>;

    fn read_file(&self, file: &FileRef, charset: Option<Charset>) -> FsResult<FileStream>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Stream that replaces the file's content when closed.
    fn create_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>>;

    /// Stream that appends to the file, creating it when absent.
    fn append_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>>;

    fn delete_file(&self, file: &FileRef) -> FsResult<()>;

    /// Rename within the backend. Never overwrites: fails with
    /// `AlreadyExists` when `destination` exists, leaving `source` intact.
    fn rename_file(&self, source: &FileRef, destination: &FileRef) -> FsResult<FileRef>;

    /// Move into `destination`, keeping the name.
    ///
    /// Returns the moved file's reference; a backend may answer `None`
    /// only when `must_return` is false and producing it costs a round trip.
    fn move_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        must_return: bool,
    ) -> FsResult<Option<FileRef>>;

    /// Copy into `destination`, keeping the name. Same contract as
    /// [`FileSystem::move_file`].
    fn copy_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        must_return: bool,
    ) -> FsResult<Option<FileRef>>;

    // ========================================================================
    // Folders
    // ========================================================================

    fn folder_exists(&self, folder: &FolderRef) -> FsResult<bool>;

    /// Create `folder` and any missing ancestors. Fails when it exists.
    fn create_folder(&self, folder: &FolderRef) -> FsResult<()>;

    fn remove_folder(&self, folder: &FolderRef, remove_non_empty: bool) -> FsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn get_file_size(&self, file: &FileRef) -> FsResult<u64>;

    fn get_name<'a>(&self, file: &'a FileRef) -> &'a str {
        file.name()
    }

    fn get_parent_folder(&self, file: &FileRef) -> FolderRef {
        file.owner().clone()
    }

    /// Owner path plus name, as the backend displays it.
    fn get_canonical_name(&self, file: &FileRef) -> FsResult<String>;

    fn get_modification_time(&self, file: &FileRef) -> FsResult<SystemTime>;

    fn get_additional_file_properties(&self, _file: &FileRef) -> FsResult<Properties> {
        Ok(Properties::new())
    }

    /// Where this filesystem points, for logs and diagnostics.
    fn physical_destination_name(&self) -> String;

    // ========================================================================
    // Capabilities
    // ========================================================================

    fn capabilities(&self) -> Capabilities;

    fn attachments(&self) -> Option<&dyn AttachmentsCapability> {
        None
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// List files only.
    fn list_files(&self, folder: Option<&FolderRef>) -> FsResult<Listing<FileRef>> {
        self.list(folder, TypeFilter::FilesOnly)
    }

    /// Replace the file's content.
    fn write_all(&self, file: &FileRef, data: &[u8]) -> FsResult<()> {
        let mut stream = self.create_file(file)?;
        stream
            .write_all(data)
            .map_err(|e| FileSystemError::io(format!("cannot write [{file}]"), e))?;
        stream.close()
    }

    /// Append to the file, creating it when absent.
    fn append_all(&self, file: &FileRef, data: &[u8]) -> FsResult<()> {
        let mut stream = self.append_file(file)?;
        stream
            .write_all(data)
            .map_err(|e| FileSystemError::io(format!("cannot append to [{file}]"), e))?;
        stream.close()
    }

    /// Read the whole file.
    fn read_all(&self, file: &FileRef) -> FsResult<Vec<u8>> {
        self.read_file(file, None)?.into_bytes()
    }
}
