//! Backend-independent helpers built on top of [`FileSystem`]: source
//! checks, destination preparation, transfers with overwrite/backup
//! handling, and file rollover.

use chrono::{DateTime, Days, Local, NaiveDate};
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FileSystemError, FsResult};
use crate::ops::FileSystem;
use crate::reference::{FileRef, FolderRef};

/// How an existing destination and a missing destination folder are
/// handled by [`move_file`], [`copy_file`] and [`rename_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferOptions {
    pub create_folder: bool,
    pub overwrite: bool,
    pub number_of_backups: usize,
    pub must_return: bool,
}

fn canonical_or_path<F: FileSystem + ?Sized>(fs: &F, file: &FileRef) -> String {
    fs.get_canonical_name(file).unwrap_or_else(|_| file.path())
}

/// Fail with `NotFound` unless `file` exists.
pub fn check_source<F: FileSystem + ?Sized>(fs: &F, file: &FileRef, action: &str) -> FsResult<()> {
    if fs.exists(file)? {
        return Ok(());
    }
    Err(FileSystemError::not_found(format!(
        "file to {action} [{}], canonical name [{}], does not exist",
        file.name(),
        canonical_or_path(fs, file)
    )))
}

/// Make room for `destination`: delete it when `overwrite`, roll it over
/// when backups are kept, otherwise refuse.
pub fn prepare_destination<F: FileSystem + ?Sized>(
    fs: &F,
    destination: &FileRef,
    overwrite: bool,
    number_of_backups: usize,
    action: &str,
) -> FsResult<()> {
    if !fs.exists(destination)? {
        return Ok(());
    }
    if overwrite {
        debug!(file = %destination, "removing existing destination");
        fs.delete_file(destination)
    } else if number_of_backups > 0 {
        rollover_by_number(fs, destination, number_of_backups)
    } else {
        Err(FileSystemError::already_exists(format!(
            "Cannot {action} file to [{}]. Destination file [{}] already exists.",
            destination.name(),
            canonical_or_path(fs, destination)
        )))
    }
}

/// Ensure `folder` exists, creating it only when asked.
pub fn prepare_folder<F: FileSystem + ?Sized>(
    fs: &F,
    folder: &FolderRef,
    create_folder: bool,
) -> FsResult<()> {
    if fs.folder_exists(folder)? {
        return Ok(());
    }
    if !folder.is_root() {
        let as_file = FileRef::parse(folder.path())?;
        if fs.exists(&as_file)? {
            return Err(FileSystemError::not_a_folder(format!(
                "destination [{folder}] exists but is not a folder"
            )));
        }
    }
    if create_folder {
        debug!(%folder, "creating destination folder");
        fs.create_folder(folder)
    } else {
        Err(FileSystemError::not_found(format!(
            "destination folder [{folder}] does not exist"
        )))
    }
}

fn require_result(result: Option<FileRef>, must_return: bool, action: &str, file: &FileRef) -> FsResult<Option<FileRef>> {
    if must_return && result.is_none() {
        return Err(FileSystemError::other(format!(
            "cannot {action} [{file}]: backend did not return the resulting file"
        )));
    }
    Ok(result)
}

fn prepare_transfer<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    destination: &FolderRef,
    options: &TransferOptions,
    action: &str,
) -> FsResult<()> {
    check_source(fs, file, action)?;
    // The target would be the source itself; leave the clash to the backend.
    if destination == file.owner() {
        return Ok(());
    }
    if options.overwrite || options.number_of_backups > 0 {
        let target = FileRef::from_backend(destination.clone(), file.name(), None);
        prepare_destination(fs, &target, options.overwrite, options.number_of_backups, action)?;
    }
    Ok(())
}

/// Move with overwrite/backup handling. Without either, a clash surfaces
/// the backend's own error.
pub fn move_file<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    destination: &FolderRef,
    options: &TransferOptions,
) -> FsResult<Option<FileRef>> {
    prepare_transfer(fs, file, destination, options, "move")?;
    let moved = fs.move_file(file, destination, options.create_folder, options.must_return)?;
    require_result(moved, options.must_return, "move", file)
}

/// Copy with overwrite/backup handling.
pub fn copy_file<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    destination: &FolderRef,
    options: &TransferOptions,
) -> FsResult<Option<FileRef>> {
    prepare_transfer(fs, file, destination, options, "copy")?;
    let copied = fs.copy_file(file, destination, options.create_folder, options.must_return)?;
    require_result(copied, options.must_return, "copy", file)
}

/// Rename with overwrite/backup handling. `create_folder` applies to the
/// destination's folder.
pub fn rename_file<F: FileSystem + ?Sized>(
    fs: &F,
    source: &FileRef,
    destination: &FileRef,
    options: &TransferOptions,
) -> FsResult<FileRef> {
    check_source(fs, source, "rename")?;
    if source == destination {
        debug!(file = %source, "rename onto itself, nothing to do");
        return Ok(source.clone());
    }
    if options.create_folder {
        prepare_folder(fs, destination.owner(), true)?;
    }
    if options.overwrite || options.number_of_backups > 0 {
        prepare_destination(fs, destination, options.overwrite, options.number_of_backups, "rename")?;
    }
    fs.rename_file(source, destination)
}

// ============================================================================
// Rollover
// ============================================================================

fn numbered(file: &FileRef, index: usize) -> FileRef {
    FileRef::from_backend(file.owner().clone(), format!("{}.{index}", file.name()), None)
}

/// Shift `name.1 .. name.N-1` up by one and move `file` to `name.1`.
/// The oldest backup falls off the end.
pub fn rollover_by_number<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    number_of_backups: usize,
) -> FsResult<()> {
    let number_of_backups = number_of_backups.max(1);
    debug!(%file, number_of_backups, "rolling over by number");

    let parked = FileRef::from_backend(
        file.owner().clone(),
        format!("{}.tmp-{}", file.name(), Uuid::new_v4()),
        None,
    );
    fs.rename_file(file, &parked)?;

    let oldest = numbered(file, number_of_backups);
    if fs.exists(&oldest)? {
        fs.delete_file(&oldest)?;
    }
    for index in (1..number_of_backups).rev() {
        let backup = numbered(file, index);
        if fs.exists(&backup)? {
            fs.rename_file(&backup, &numbered(file, index + 1))?;
        }
    }
    fs.rename_file(&parked, &numbered(file, 1))?;
    Ok(())
}

/// Roll over when the file has grown beyond `rotate_size` bytes.
pub fn rollover_by_size<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    rotate_size: u64,
    number_of_backups: usize,
) -> FsResult<()> {
    if fs.exists(file)? && fs.get_file_size(file)? > rotate_size {
        rollover_by_number(fs, file, number_of_backups)?;
    }
    Ok(())
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

fn dated(file: &FileRef, date: NaiveDate) -> FileRef {
    let (stem, ext) = split_extension(file.name());
    FileRef::from_backend(
        file.owner().clone(),
        format!("{stem}_{}{ext}", date.format("%Y-%m-%d")),
        None,
    )
}

/// Move a file last written before today to `stem_YYYY-MM-DD.ext`, then
/// drop dated copies older than `rotate_days`.
pub fn rollover_by_day<F: FileSystem + ?Sized>(
    fs: &F,
    file: &FileRef,
    rotate_days: u32,
) -> FsResult<()> {
    let today = Local::now().date_naive();
    if fs.exists(file)? {
        let modified: DateTime<Local> = fs.get_modification_time(file)?.into();
        let day = modified.date_naive();
        if day < today {
            let target = dated(file, day);
            debug!(%file, %target, "rolling over by day");
            if fs.exists(&target)? {
                fs.delete_file(&target)?;
            }
            fs.rename_file(file, &target)?;
        }
    }

    let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(rotate_days))) else {
        return Ok(());
    };
    let (stem, ext) = split_extension(file.name());
    let pattern = Regex::new(&format!(
        r"^{}_(\d{{4}}-\d{{2}}-\d{{2}}){}$",
        regex::escape(stem),
        regex::escape(ext)
    ))
    .map_err(|e| FileSystemError::other(format!("cannot build rollover pattern: {e}")))?;

    let expired: Vec<FileRef> = fs
        .list_files(Some(file.owner()))?
        .collect::<FsResult<Vec<_>>>()?
        .into_iter()
        .filter(|candidate| {
            pattern
                .captures(candidate.name())
                .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok())
                .is_some_and(|date| date < cutoff)
        })
        .collect();
    for old in expired {
        debug!(file = %old, "removing expired rollover file");
        fs.delete_file(&old)?;
    }
    Ok(())
}

/// Remove `folder` when it is empty; the root is never removed.
pub fn delete_empty_folder<F: FileSystem + ?Sized>(fs: &F, folder: &FolderRef) -> FsResult<bool> {
    if folder.is_root() || !fs.folder_exists(folder)? {
        return Ok(false);
    }
    let mut entries = fs.list(Some(folder), crate::types::TypeFilter::FilesAndFolders)?;
    if entries.next().transpose()?.is_some() {
        return Ok(false);
    }
    debug!(%folder, "removing empty folder");
    fs.remove_folder(folder, false)?;
    Ok(true)
}
