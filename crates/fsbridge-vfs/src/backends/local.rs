//! Local filesystem backend.
//!
//! The reference implementation of the contract on a host directory, with
//! path confinement so no name can escape the configured root.
//!
//! Write streams go to a hidden staging file next to the target, renamed
//! over it on close. Readers never see a half-written file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LocalFileSystemConfig;
use crate::error::{ConfigurationError, FileSystemError, FsResult};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::ops::{FileSystem, Listing};
use crate::reference::{FileRef, FolderRef};
use crate::stream::{Charset, FileStream, WriteStream};
use crate::types::{Capabilities, Properties, TypeFilter};

/// Local filesystem backend.
///
/// All names are relative to `root`. For example, if `root` is
/// `/srv/inbound`, then `to_file("in/a.xml")` denotes
/// `/srv/inbound/in/a.xml`.
#[derive(Debug)]
pub struct LocalFileSystem {
    config: LocalFileSystemConfig,
    /// Canonical root, resolved on open.
    root: PathBuf,
    lifecycle: Lifecycle,
}

impl LocalFileSystem {
    /// Create a local filesystem rooted at the given path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(LocalFileSystemConfig::new(root))
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self::with_config(LocalFileSystemConfig {
            read_only: true,
            ..LocalFileSystemConfig::new(root)
        })
    }

    pub fn with_config(config: LocalFileSystemConfig) -> Self {
        let root = config.root.clone();
        Self {
            config,
            root,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &FolderRef) -> PathBuf {
        folder
            .segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn file_path(&self, file: &FileRef) -> FsResult<PathBuf> {
        let name = file.name();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(FileSystemError::invalid_name(format!(
                "[{}] is not a valid file name",
                name.escape_debug()
            )));
        }
        let path = self.folder_path(file.owner()).join(name);
        self.confine(&path)?;
        Ok(path)
    }

    /// Reject paths that leave the root through a symlink.
    fn confine(&self, path: &Path) -> FsResult<()> {
        let existing = path.ancestors().find(|p| p.exists());
        let Some(existing) = existing else {
            return Ok(());
        };
        let canonical = dunce::canonicalize(existing)
            .map_err(|e| FileSystemError::io(format!("cannot resolve [{}]", path.display()), e))?;
        if !canonical.starts_with(&self.root) {
            return Err(FileSystemError::invalid_name(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> FsResult<()> {
        if self.config.read_only {
            Err(FileSystemError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn check_owner_exists(&self, file: &FileRef) -> FsResult<()> {
        if self.folder_path(file.owner()).is_dir() {
            Ok(())
        } else {
            Err(FileSystemError::not_found(format!(
                "folder [{}] does not exist",
                file.owner()
            )))
        }
    }

    fn existing_file(&self, file: &FileRef) -> FsResult<PathBuf> {
        let path = self.file_path(file)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => Err(FileSystemError::is_a_folder(format!(
                "[{}] is a folder",
                path.display()
            ))),
            Ok(_) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FileSystemError::not_found(
                format!("file [{}] does not exist", path.display()),
            )),
            Err(e) => Err(FileSystemError::io(format!("cannot stat [{}]", path.display()), e)),
        }
    }

    fn open_stream(&self, file: &FileRef, append: bool) -> FsResult<Box<dyn WriteStream>> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        self.check_owner_exists(file)?;
        let path = self.file_path(file)?;
        if path.is_dir() {
            return Err(FileSystemError::is_a_folder(format!("[{}] is a folder", path.display())));
        }
        let staging = staging_path(&path);
        if append && path.is_file() {
            fs::copy(&path, &staging).map_err(|e| {
                FileSystemError::io(format!("cannot stage [{}] for appending", path.display()), e)
            })?;
        }
        let handle = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(&staging)
            .map_err(|e| FileSystemError::io(format!("cannot open [{}] for writing", path.display()), e))?;
        debug!(path = %path.display(), append, "opened write stream");
        Ok(Box::new(LocalWriteStream {
            writer: Some(BufWriter::new(handle)),
            staging,
            path,
        }))
    }

    fn transfer(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        copy: bool,
    ) -> FsResult<Option<FileRef>> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        let source = self.existing_file(file)?;
        let folder = self.folder_path(destination);
        if !folder.is_dir() {
            if create_folder {
                self.create_folder(destination)?;
            } else {
                return Err(FileSystemError::not_found(format!(
                    "destination folder [{destination}] does not exist"
                )));
            }
        }
        let target_ref = FileRef::from_backend(destination.clone(), file.name(), None);
        let target = self.file_path(&target_ref)?;
        if target.exists() {
            return Err(FileSystemError::already_exists(format!(
                "file [{}] does already exist in folder [{destination}]",
                file.name()
            )));
        }
        if copy {
            fs::copy(&source, &target).map_err(|e| {
                FileSystemError::io(format!("cannot copy [{file}] to [{destination}]"), e)
            })?;
        } else {
            fs::rename(&source, &target).map_err(|e| {
                FileSystemError::io(format!("cannot move [{file}] to [{destination}]"), e)
            })?;
        }
        debug!(from = %source.display(), to = %target.display(), copy, "transferred file");
        Ok(Some(target_ref))
    }
}

impl FileSystem for LocalFileSystem {
    fn configure(&mut self) -> Result<(), ConfigurationError> {
        if self.config.root.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid("root folder must be set"));
        }
        self.lifecycle.configured()
    }

    fn open(&mut self) -> FsResult<()> {
        self.lifecycle.check_can_open()?;
        let root = &self.config.root;
        if !root.is_dir() {
            if self.config.create_root {
                debug!(root = %root.display(), "creating root folder");
                fs::create_dir_all(root).map_err(|e| {
                    FileSystemError::io(format!("cannot create root folder [{}]", root.display()), e)
                })?;
            } else {
                return Err(FileSystemError::not_found(format!(
                    "root folder [{}] does not exist",
                    root.display()
                )));
            }
        }
        // Canonicalized so symlinked roots (macOS /tmp) still confine correctly
        self.root = dunce::canonicalize(root)
            .map_err(|e| FileSystemError::io(format!("cannot resolve [{}]", root.display()), e))?;
        self.lifecycle.opened()
    }

    fn close(&mut self) -> FsResult<()> {
        let owner = self.physical_destination_name();
        self.lifecycle.closed(&owner);
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    fn exists(&self, file: &FileRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        Ok(fs::symlink_metadata(self.file_path(file)?).is_ok())
    }

    fn list(&self, folder: Option<&FolderRef>, filter: TypeFilter) -> FsResult<Listing<FileRef>> {
        self.lifecycle.check_open()?;
        let folder = folder.cloned().unwrap_or_default();
        let path = self.folder_path(&folder);
        self.confine(&path)?;
        if !path.is_dir() {
            return Err(FileSystemError::not_found(format!("folder [{folder}] does not exist")));
        }
        let entries = fs::read_dir(&path)
            .map_err(|e| FileSystemError::io(format!("cannot list [{}]", path.display()), e))?;

        Ok(Box::new(entries.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(FileSystemError::io("cannot read folder entry", e))),
            };
            // Follows symlinks, so a link to a folder lists as a folder
            let is_dir = entry.path().is_dir();
            let wanted = if is_dir {
                filter.includes_folders()
            } else {
                filter.includes_files()
            };
            wanted.then(|| {
                let name = entry.file_name().to_string_lossy().into_owned();
                Ok(FileRef::from_backend(folder.clone(), name, None))
            })
        })))
    }

    fn is_folder(&self, file: &FileRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        Ok(self.file_path(file)?.is_dir())
    }

    fn read_file(&self, file: &FileRef, charset: Option<Charset>) -> FsResult<FileStream> {
        self.lifecycle.check_open()?;
        let path = self.existing_file(file)?;
        let handle = File::open(&path)
            .map_err(|e| FileSystemError::io(format!("cannot open [{}]", path.display()), e))?;
        Ok(FileStream::new(BufReader::new(handle)).with_charset(charset))
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    fn create_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>> {
        self.open_stream(file, false)
    }

    fn append_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>> {
        self.open_stream(file, true)
    }

    fn delete_file(&self, file: &FileRef) -> FsResult<()> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        let path = self.existing_file(file)?;
        fs::remove_file(&path)
            .map_err(|e| FileSystemError::io(format!("cannot delete [{}]", path.display()), e))?;
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }

    fn rename_file(&self, source: &FileRef, destination: &FileRef) -> FsResult<FileRef> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        let from = self.file_path(source)?;
        let to = self.file_path(destination)?;
        if fs::symlink_metadata(&from).is_err() {
            return Err(FileSystemError::not_found(format!(
                "Cannot rename file. Source file [{}] does not exist.",
                from.display()
            )));
        }
        if fs::symlink_metadata(&to).is_ok() {
            return Err(FileSystemError::already_exists(
                "Cannot rename file. Destination file already exists.",
            ));
        }
        if !self.folder_path(destination.owner()).is_dir() {
            return Err(FileSystemError::not_found(format!(
                "Cannot rename file. Destination folder [{}] does not exist.",
                destination.owner()
            )));
        }
        fs::rename(&from, &to).map_err(|e| {
            FileSystemError::io(format!("cannot rename [{source}] to [{destination}]"), e)
        })?;
        debug!(from = %from.display(), to = %to.display(), "renamed file");
        Ok(FileRef::from_backend(
            destination.owner().clone(),
            destination.name(),
            None,
        ))
    }

    fn move_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        _must_return: bool,
    ) -> FsResult<Option<FileRef>> {
        self.transfer(file, destination, create_folder, false)
    }

    fn copy_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        _must_return: bool,
    ) -> FsResult<Option<FileRef>> {
        self.transfer(file, destination, create_folder, true)
    }

    // ------------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------------

    fn folder_exists(&self, folder: &FolderRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        let path = self.folder_path(folder);
        self.confine(&path)?;
        Ok(path.is_dir())
    }

    fn create_folder(&self, folder: &FolderRef) -> FsResult<()> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        let path = self.folder_path(folder);
        self.confine(&path)?;
        if path.exists() {
            return Err(FileSystemError::already_exists(format!(
                "Create directory for [{folder}] has failed. Directory already exists."
            )));
        }
        fs::create_dir_all(&path)
            .map_err(|e| FileSystemError::io(format!("cannot create folder [{folder}]"), e))?;
        debug!(path = %path.display(), "created folder");
        Ok(())
    }

    fn remove_folder(&self, folder: &FolderRef, remove_non_empty: bool) -> FsResult<()> {
        self.lifecycle.check_open()?;
        self.check_writable()?;
        if folder.is_root() {
            return Err(FileSystemError::invalid_name("the root folder cannot be removed"));
        }
        let path = self.folder_path(folder);
        self.confine(&path)?;
        if !path.is_dir() {
            return Err(FileSystemError::not_found(format!(
                "Remove directory for [{folder}] has failed. Directory does not exist."
            )));
        }
        let result = if remove_non_empty {
            fs::remove_dir_all(&path)
        } else {
            let mut entries = fs::read_dir(&path)
                .map_err(|e| FileSystemError::io(format!("cannot list [{folder}]"), e))?;
            if entries.next().is_some() {
                return Err(FileSystemError::not_empty(format!(
                    "Cannot remove folder [{folder}]. Directory not empty."
                )));
            }
            fs::remove_dir(&path)
        };
        result.map_err(|e| FileSystemError::io(format!("cannot remove folder [{folder}]"), e))?;
        debug!(path = %path.display(), remove_non_empty, "removed folder");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    fn get_file_size(&self, file: &FileRef) -> FsResult<u64> {
        self.lifecycle.check_open()?;
        let path = self.existing_file(file)?;
        let meta = fs::metadata(&path)
            .map_err(|e| FileSystemError::io(format!("cannot stat [{}]", path.display()), e))?;
        Ok(meta.len())
    }

    fn get_canonical_name(&self, file: &FileRef) -> FsResult<String> {
        self.lifecycle.check_open()?;
        let path = self.file_path(file)?;
        let path = dunce::canonicalize(&path).unwrap_or(path);
        Ok(path.display().to_string())
    }

    fn get_modification_time(&self, file: &FileRef) -> FsResult<SystemTime> {
        self.lifecycle.check_open()?;
        let path = self.file_path(file)?;
        let meta = fs::metadata(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileSystemError::not_found(format!("file [{}] does not exist", path.display()))
            } else {
                FileSystemError::io(format!("cannot stat [{}]", path.display()), e)
            }
        })?;
        meta.modified()
            .map_err(|e| FileSystemError::io(format!("no modification time for [{}]", path.display()), e))
    }

    fn get_additional_file_properties(&self, file: &FileRef) -> FsResult<Properties> {
        self.lifecycle.check_open()?;
        let path = self.existing_file(file)?;
        let meta = fs::metadata(&path)
            .map_err(|e| FileSystemError::io(format!("cannot stat [{}]", path.display()), e))?;
        let mut properties = Properties::new();
        properties.insert("readOnly".into(), meta.permissions().readonly().into());
        Ok(properties)
    }

    fn physical_destination_name(&self) -> String {
        format!("root folder [{}]", self.root.display())
    }

    fn capabilities(&self) -> Capabilities {
        if self.config.read_only {
            Capabilities::read_only()
        } else {
            Capabilities::writable()
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.part", Uuid::new_v4().simple()))
}

/// Buffered writer over a staging file; `close` flushes, syncs and renames
/// it over the target.
struct LocalWriteStream {
    writer: Option<BufWriter<File>>,
    staging: PathBuf,
    path: PathBuf,
}

impl LocalWriteStream {
    fn finish(&mut self) -> FsResult<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let result = self.commit(writer);
        if result.is_err() {
            let _ = fs::remove_file(&self.staging);
        }
        result
    }

    fn commit(&self, writer: BufWriter<File>) -> FsResult<()> {
        let handle = writer.into_inner().map_err(|e| {
            FileSystemError::io(format!("cannot flush [{}]", self.path.display()), e.into_error())
        })?;
        handle
            .sync_all()
            .map_err(|e| FileSystemError::io(format!("cannot sync [{}]", self.path.display()), e))?;
        drop(handle);
        fs::rename(&self.staging, &self.path)
            .map_err(|e| FileSystemError::io(format!("cannot commit [{}]", self.path.display()), e))
    }
}

impl Write for LocalWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("stream already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl WriteStream for LocalWriteStream {
    fn close(mut self: Box<Self>) -> FsResult<()> {
        self.finish()
    }
}

impl Drop for LocalWriteStream {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(path = %self.path.display(), error = %e, "write stream dropped without close, commit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalFileSystem, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut fs = LocalFileSystem::new(dir.path());
        fs.configure().unwrap();
        fs.open().unwrap();
        (fs, dir)
    }

    #[test]
    fn test_write_and_read() {
        let (fs, dir) = setup();
        let file = fs.to_file("test.txt").unwrap();
        fs.write_all(&file, b"hello world").unwrap();

        assert_eq!(fs.read_all(&file).unwrap(), b"hello world");
        assert_eq!(std::fs::read(dir.path().join("test.txt")).unwrap(), b"hello world");
    }

    #[test]
    fn test_stream_commits_on_drop() {
        let (fs, _dir) = setup();
        let file = fs.to_file("dropped.txt").unwrap();
        {
            let mut stream = fs.create_file(&file).unwrap();
            stream.write_all(b"buffered").unwrap();
        }
        assert_eq!(fs.read_all(&file).unwrap(), b"buffered");
    }

    #[test]
    fn test_write_visible_only_after_close() {
        let (fs, dir) = setup();
        let file = fs.to_file("staged.txt").unwrap();
        fs.write_all(&file, b"old").unwrap();

        let mut stream = fs.create_file(&file).unwrap();
        stream.write_all(b"new").unwrap();
        stream.flush().unwrap();
        assert_eq!(fs.read_all(&file).unwrap(), b"old");
        stream.close().unwrap();
        assert_eq!(fs.read_all(&file).unwrap(), b"new");

        let mut stream = fs.append_file(&fs.to_file("fresh.txt").unwrap()).unwrap();
        stream.write_all(b"tail").unwrap();
        assert!(!fs.exists(&fs.to_file("fresh.txt").unwrap()).unwrap());
        stream.close().unwrap();

        fs.append_all(&file, b"er").unwrap();
        assert_eq!(fs.read_all(&file).unwrap(), b"newer");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_create_in_missing_folder() {
        let (fs, _dir) = setup();
        let file = fs.to_file("nope/test.txt").unwrap();
        assert!(fs.create_file(&file).err().unwrap().is_not_found());
    }

    #[test]
    fn test_read_only() {
        let dir = TempDir::new().unwrap();
        let mut fs = LocalFileSystem::read_only(dir.path());
        fs.configure().unwrap();
        fs.open().unwrap();

        let file = fs.to_file("test.txt").unwrap();
        assert!(matches!(fs.create_file(&file), Err(FileSystemError::ReadOnly)));
        assert!(!fs.capabilities().write);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_escape_blocked() {
        let (fs, dir) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let file = fs.to_file("link/secret").unwrap();
        assert!(matches!(fs.read_file(&file, None), Err(FileSystemError::InvalidName(_))));
    }

    #[test]
    fn test_canonical_name_is_absolute() {
        let (fs, _dir) = setup();
        let file = fs.to_file("test.txt").unwrap();
        fs.write_all(&file, b"x").unwrap();

        let canonical = fs.get_canonical_name(&file).unwrap();
        assert!(Path::new(&canonical).is_absolute());
        assert!(canonical.ends_with("test.txt"));
    }

    #[test]
    fn test_configure_requires_root() {
        let mut fs = LocalFileSystem::new("");
        assert!(fs.configure().is_err());
    }

    #[test]
    fn test_open_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-there");

        let mut fs = LocalFileSystem::new(&root);
        fs.configure().unwrap();
        assert!(fs.open().unwrap_err().is_not_found());

        let mut fs = LocalFileSystem::with_config(LocalFileSystemConfig {
            create_root: true,
            ..LocalFileSystemConfig::new(&root)
        });
        fs.configure().unwrap();
        fs.open().unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_listing_skips_folders_by_default() {
        let (fs, _dir) = setup();
        fs.create_folder(&fs.to_folder("sub").unwrap()).unwrap();
        fs.write_all(&fs.to_file("a.txt").unwrap(), b"").unwrap();

        let files: Vec<_> = fs.list_files(None).unwrap().map(|f| f.unwrap()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "a.txt");

        let folders: Vec<_> = fs
            .list(None, TypeFilter::FoldersOnly)
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(folders.len(), 1);
        assert!(fs.is_folder(&folders[0]).unwrap());
    }

    #[test]
    fn test_additional_properties() {
        let (fs, _dir) = setup();
        let file = fs.to_file("p.txt").unwrap();
        fs.write_all(&file, b"x").unwrap();
        let properties = fs.get_additional_file_properties(&file).unwrap();
        assert_eq!(properties.get("readOnly"), Some(&serde_json::Value::Bool(false)));
    }
}
