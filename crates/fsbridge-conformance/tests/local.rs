//! Conformance battery against the host-directory backend, rooted in a
//! fresh temporary directory per test.

use fsbridge_conformance::Fixture;
use fsbridge_vfs::{FileSystem, LocalFileSystem};
use tempfile::TempDir;

fn open_local() -> Fixture<LocalFileSystem> {
    let dir = TempDir::new().unwrap();
    let mut fs = LocalFileSystem::new(dir.path());
    fs.configure().unwrap();
    fs.open().unwrap();
    Fixture::with_guard(fs, dir)
}

fn unopened_local() -> Fixture<LocalFileSystem> {
    let dir = TempDir::new().unwrap();
    Fixture::with_guard(LocalFileSystem::new(dir.path()), dir)
}

fsbridge_conformance::conformance_suite! {
    fixture: open_local(),
    unopened: unopened_local(),
}
