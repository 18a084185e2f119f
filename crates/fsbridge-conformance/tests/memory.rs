//! Conformance battery against the in-memory backend.

use fsbridge_conformance::Fixture;
use fsbridge_vfs::{FileSystem, MemoryFileSystem};

fn open_memory() -> Fixture<MemoryFileSystem> {
    let mut fs = MemoryFileSystem::new();
    fs.configure().unwrap();
    fs.open().unwrap();
    Fixture::new(fs)
}

fsbridge_conformance::conformance_suite! {
    fixture: open_memory(),
    unopened: Fixture::new(MemoryFileSystem::new()),
}
