//! Filesystem backends.
//!
//! Backends implement [`FileSystem`](crate::FileSystem) for different
//! storage types. Remote protocols (FTP, SFTP, SMB, object stores,
//! mailboxes) live outside this crate and implement the same trait.

mod local;
mod memory;

pub use local::LocalFileSystem;
pub use memory::{MemoryAttachment, MemoryFileSystem, NodeId};
