//! The scenarios. Each takes an opened, empty filesystem.

use std::collections::BTreeSet;
use std::io::Write;
use std::time::{Duration, SystemTime};

use fsbridge_vfs::{FileRef, FileSystem, FileSystemError, FolderRef, FsResult, LifecycleState, TypeFilter};

use crate::ScenarioResult;

// ============================================================================
// Helpers
// ============================================================================

fn write<F: FileSystem + ?Sized>(fs: &F, name: &str, content: &str) -> FsResult<FileRef> {
    let file = fs.to_file(name)?;
    fs.write_all(&file, content.as_bytes())?;
    Ok(file)
}

fn read<F: FileSystem + ?Sized>(fs: &F, file: &FileRef) -> FsResult<String> {
    fs.read_file(file, None)?.into_string()
}

fn folder<F: FileSystem + ?Sized>(fs: &F, name: &str) -> FsResult<FolderRef> {
    let folder = fs.to_folder(name)?;
    fs.create_folder(&folder)?;
    Ok(folder)
}

fn names<F: FileSystem + ?Sized>(
    fs: &F,
    folder: Option<&FolderRef>,
    filter: TypeFilter,
) -> FsResult<BTreeSet<String>> {
    fs.list(folder, filter)?
        .map(|file| file.map(|f| f.name().to_string()))
        .collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ============================================================================
// Files
// ============================================================================

pub fn exists_reports_absence<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = fs.to_file("missing.txt")?;
    assert!(!fs.exists(&file)?);
    let nested = fs.to_file("no/such/folder/missing.txt")?;
    assert!(!fs.exists(&nested)?);
    Ok(())
}

pub fn create_then_read<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = fs.to_file("file.txt")?;
    assert!(!fs.exists(&file)?);
    let mut stream = fs.create_file(&file)?;
    stream
        .write_all(b"some content")
        .map_err(|e| FileSystemError::io("cannot write", e))?;
    stream.close()?;
    assert!(fs.exists(&file)?);
    assert_eq!(fs.read_all(&file)?, b"some content");
    Ok(())
}

pub fn overwrite_truncates<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = write(fs, "file.txt", "a rather long first version")?;
    fs.write_all(&file, b"short")?;
    assert_eq!(read(fs, &file)?, "short");
    Ok(())
}

pub fn append_to_existing<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    if !fs.capabilities().append {
        return Ok(());
    }
    let file = write(fs, "file.txt", "A")?;
    fs.append_all(&file, b"B")?;
    assert_eq!(read(fs, &file)?, "AB");
    Ok(())
}

pub fn append_creates<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    if !fs.capabilities().append {
        return Ok(());
    }
    let file = fs.to_file("fresh.txt")?;
    fs.append_all(&file, b"first")?;
    assert!(fs.exists(&file)?);
    assert_eq!(read(fs, &file)?, "first");
    Ok(())
}

pub fn delete_removes<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = write(fs, "file.txt", "x")?;
    fs.delete_file(&file)?;
    assert!(!fs.exists(&file)?);
    Ok(())
}

pub fn delete_missing_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = fs.to_file("missing.txt")?;
    let err = fs.delete_file(&file).expect_err("deleting a missing file");
    assert!(err.is_not_found(), "unexpected error: {err}");
    Ok(())
}

pub fn read_missing_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = fs.to_file("missing.txt")?;
    let err = fs.read_file(&file, None).expect_err("reading a missing file");
    assert!(err.is_not_found(), "unexpected error: {err}");
    Ok(())
}

// ============================================================================
// Rename
// ============================================================================

pub fn rename_to_new<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let source = write(fs, "old.txt", "content")?;
    let target = fs.to_file("new.txt")?;
    let renamed = fs.rename_file(&source, &target)?;
    assert_eq!(renamed.name(), "new.txt");
    assert!(!fs.exists(&source)?);
    assert_eq!(read(fs, &target)?, "content");
    Ok(())
}

pub fn rename_onto_existing_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let source = write(fs, "source.txt", "source")?;
    let target = write(fs, "target.txt", "target")?;
    let err = fs.rename_file(&source, &target).expect_err("renaming onto an existing file");
    assert!(err.is_already_exists(), "unexpected error: {err}");
    assert_eq!(err.to_string(), "Cannot rename file. Destination file already exists.");
    assert_eq!(read(fs, &source)?, "source");
    assert_eq!(read(fs, &target)?, "target");
    Ok(())
}

pub fn rename_into_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    folder(fs, "archive")?;
    let source = write(fs, "file.txt", "content")?;
    let target = fs.to_file("archive/renamed.txt")?;
    fs.rename_file(&source, &target)?;
    assert!(!fs.exists(&source)?);
    assert_eq!(read(fs, &target)?, "content");
    Ok(())
}

// ============================================================================
// Listing
// ============================================================================

pub fn list_after_delete<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let f1 = write(fs, "f1.txt", "1")?;
    write(fs, "f2.txt", "2")?;
    fs.delete_file(&f1)?;

    let first = fs.list_files(None)?;
    let second = fs.list_files(None)?;
    let first: BTreeSet<String> = first.map(|f| f.map(|f| f.name().to_string())).collect::<FsResult<_>>()?;
    let second: BTreeSet<String> = second.map(|f| f.map(|f| f.name().to_string())).collect::<FsResult<_>>()?;
    assert_eq!(first, set(&["f2.txt"]));
    assert_eq!(second, first);
    Ok(())
}

pub fn list_does_not_descend<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let sub = folder(fs, "sub")?;
    write(fs, "top.txt", "")?;
    write(fs, "sub/inner.txt", "")?;
    assert_eq!(names(fs, None, TypeFilter::FilesOnly)?, set(&["top.txt"]));
    assert_eq!(names(fs, Some(&sub), TypeFilter::FilesOnly)?, set(&["inner.txt"]));
    assert_eq!(
        names(fs, None, TypeFilter::FilesAndFolders)?,
        set(&["sub", "top.txt"])
    );
    Ok(())
}

pub fn list_folders_only<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    folder(fs, "a")?;
    folder(fs, "b")?;
    write(fs, "c.txt", "")?;
    assert_eq!(names(fs, None, TypeFilter::FoldersOnly)?, set(&["a", "b"]));
    Ok(())
}

// ============================================================================
// Folders
// ============================================================================

pub fn folder_create_exists_remove<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let nested = fs.to_folder("x/y/z")?;
    assert!(!fs.folder_exists(&nested)?);
    fs.create_folder(&nested)?;
    assert!(fs.folder_exists(&nested)?);
    assert!(fs.folder_exists(&fs.to_folder("x/y")?)?);
    fs.remove_folder(&nested, false)?;
    assert!(!fs.folder_exists(&nested)?);
    assert!(fs.folder_exists(&fs.to_folder("x/y")?)?);
    Ok(())
}

pub fn create_existing_folder_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let d = folder(fs, "d")?;
    let err = fs.create_folder(&d).expect_err("creating an existing folder");
    assert!(err.is_already_exists(), "unexpected error: {err}");
    assert!(err.to_string().ends_with("Directory already exists."), "{err}");
    Ok(())
}

pub fn remove_missing_folder_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let missing = fs.to_folder("missing")?;
    let err = fs.remove_folder(&missing, false).expect_err("removing a missing folder");
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(err.to_string().ends_with("Directory does not exist."), "{err}");
    let err = fs.remove_folder(&missing, true).expect_err("removing a missing folder");
    assert!(err.is_not_found(), "unexpected error: {err}");
    Ok(())
}

pub fn remove_non_empty_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let d = folder(fs, "d")?;
    folder(fs, "d/sub")?;
    let inner = write(fs, "d/file.txt", "x")?;
    let deep = write(fs, "d/sub/deep.txt", "y")?;

    let err = fs.remove_folder(&d, false).expect_err("removing a non-empty folder");
    assert!(err.is_not_empty(), "unexpected error: {err}");
    assert!(fs.exists(&inner)?);

    fs.remove_folder(&d, true)?;
    assert!(!fs.folder_exists(&d)?);
    assert!(!fs.exists(&inner)?);
    assert!(!fs.exists(&deep)?);
    Ok(())
}

pub fn file_is_not_a_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = write(fs, "plain", "")?;
    folder(fs, "dir")?;
    assert!(!fs.is_folder(&file)?);
    assert!(fs.is_folder(&fs.to_file("dir")?)?);
    assert!(!fs.folder_exists(&file.as_folder())?);
    Ok(())
}

// ============================================================================
// Move and copy
// ============================================================================

pub fn move_into_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let target = folder(fs, "target")?;
    let file = write(fs, "file.txt", "moved")?;
    let moved = fs.move_file(&file, &target, false, true)?.expect("moved reference");
    assert_eq!(moved.name(), "file.txt");
    assert_eq!(moved.owner(), &target);
    assert!(!fs.exists(&file)?);
    assert_eq!(read(fs, &moved)?, "moved");
    Ok(())
}

pub fn move_onto_existing_fails<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let target = folder(fs, "target")?;
    let file = write(fs, "file.txt", "new")?;
    let existing = write(fs, "target/file.txt", "old")?;
    let err = fs.move_file(&file, &target, false, true).expect_err("moving onto an existing file");
    assert!(err.is_already_exists(), "unexpected error: {err}");
    assert_eq!(read(fs, &file)?, "new");
    assert_eq!(read(fs, &existing)?, "old");
    Ok(())
}

pub fn copy_into_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let target = folder(fs, "target")?;
    let file = write(fs, "file.txt", "copied")?;
    let copy = fs.copy_file(&file, &target, false, true)?.expect("copied reference");
    assert_eq!(read(fs, &file)?, "copied");
    assert_eq!(read(fs, &copy)?, "copied");
    Ok(())
}

pub fn copy_into_missing_folder<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file = write(fs, "file.txt", "copied")?;
    let missing = fs.to_folder("new/folder")?;
    let err = fs.copy_file(&file, &missing, false, true).expect_err("copying into a missing folder");
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!fs.folder_exists(&missing)?);

    fs.copy_file(&file, &missing, true, true)?;
    assert!(fs.folder_exists(&missing)?);
    assert_eq!(read(fs, &fs.to_file("new/folder/file.txt")?)?, "copied");
    Ok(())
}

// ============================================================================
// Metadata
// ============================================================================

pub fn metadata_accessors<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let before = SystemTime::now() - Duration::from_secs(60);
    folder(fs, "docs")?;
    let file = write(fs, "docs/hello.txt", "hello")?;

    assert_eq!(fs.get_name(&file), "hello.txt");
    assert_eq!(fs.get_parent_folder(&file), fs.to_folder("docs")?);
    assert_eq!(fs.get_file_size(&file)?, 5);

    let canonical = fs.get_canonical_name(&file)?;
    assert!(canonical.ends_with("hello.txt"), "canonical name [{canonical}]");
    assert!(canonical.contains("docs"), "canonical name [{canonical}]");

    let modified = fs.get_modification_time(&file)?;
    assert!(modified >= before, "modification time is too old");
    assert!(modified <= SystemTime::now() + Duration::from_secs(60));
    Ok(())
}

pub fn nested_file_by_path<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let docs = folder(fs, "docs")?;
    write(fs, "docs/a.txt", "by path")?;
    let in_folder = fs.to_file_in(&docs, "a.txt")?;
    assert_eq!(in_folder, fs.to_file("docs/a.txt")?);
    assert_eq!(in_folder, fs.to_file("docs\\a.txt")?);
    assert_eq!(read(fs, &in_folder)?, "by path");
    Ok(())
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

/// Create, read back, rename, read under the new name.
pub fn scenario_a<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let file1 = write(fs, "file1.txt", "hello")?;
    assert!(fs.exists(&file1)?);
    assert_eq!(read(fs, &file1)?, "hello");

    let file2 = fs.to_file("file2.txt")?;
    fs.rename_file(&file1, &file2)?;
    assert!(!fs.exists(&file1)?);
    assert!(fs.exists(&file2)?);
    assert_eq!(read(fs, &file2)?, "hello");
    Ok(())
}

/// Create a folder, fail to create it twice, remove it.
pub fn scenario_b<F: FileSystem + ?Sized>(fs: &F) -> ScenarioResult {
    let d1 = fs.to_folder("d1")?;
    fs.create_folder(&d1)?;
    assert!(fs.folder_exists(&d1)?);
    let err = fs.create_folder(&d1).expect_err("second create_folder");
    assert!(err.is_already_exists(), "unexpected error: {err}");
    fs.remove_folder(&d1, false)?;
    assert!(!fs.folder_exists(&d1)?);
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

fn assert_illegal_state<T>(result: FsResult<T>) {
    match result {
        Err(FileSystemError::IllegalState(_)) => {}
        Err(other) => panic!("expected an illegal state error, got: {other}"),
        Ok(_) => panic!("expected an illegal state error, got success"),
    }
}

/// Takes an unconfigured filesystem and walks it through its states.
pub fn lifecycle<F: FileSystem>(fs: &mut F) -> ScenarioResult {
    let file = fs.to_file("lifecycle-probe.txt")?;
    assert_eq!(fs.state(), LifecycleState::Unconfigured);
    assert_illegal_state(fs.exists(&file));

    // Closing a filesystem that never opened is harmless.
    fs.close()?;

    if let Err(e) = fs.configure() {
        panic!("configure failed: {e}");
    }
    assert_eq!(fs.state(), LifecycleState::Configured);
    assert_illegal_state(fs.exists(&file));
    assert_illegal_state(fs.list_files(None));

    fs.open()?;
    assert!(fs.is_open());
    assert!(!fs.exists(&file)?);
    assert_illegal_state(fs.open());

    fs.close()?;
    assert_eq!(fs.state(), LifecycleState::Closed);
    assert_illegal_state(fs.exists(&file));
    Ok(())
}
