//! # fsbridge-vfs
//!
//! Backend-neutral virtual filesystem.
//!
//! Key components:
//!
//! - [`FileSystem`] - Core contract: lifecycle, CRUD, listing, metadata
//! - [`FileRef`] / [`FolderRef`] - Offline handles, identity is `(owner, name)`
//! - [`AttachmentsCapability`] - Optional nested sub-objects, discovered at run time
//! - [`LocalFileSystem`] - Host directory backend (with path confinement)
//! - [`MemoryFileSystem`] - In-memory arena backend (for tests, attachments)
//! - [`utils`] - Overwrite/backup handling, rollover, empty-folder cleanup
//!
//! ## Design Decisions
//!
//! - **Whole streams only**: no byte-range access; files are read,
//!   created or appended as a whole.
//! - **Fail fast**: every data operation checks the lifecycle first and
//!   returns `IllegalState` without touching the backend.
//! - **No implicit overwrite**: rename, move and copy refuse an existing
//!   destination; overwriting is a caller decision made in [`utils`].

mod attachments;
pub mod backends;
mod config;
mod error;
mod lifecycle;
mod ops;
mod reference;
mod stream;
mod types;
pub mod utils;
mod wildcard;

pub use attachments::AttachmentsCapability;
pub use backends::{LocalFileSystem, MemoryAttachment, MemoryFileSystem};
pub use config::LocalFileSystemConfig;
pub use error::{ConfigurationError, FileSystemError, FsResult};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use ops::{FileSystem, Listing};
pub use reference::{AttachmentRef, FileRef, FolderRef, NativeHandle};
pub use stream::{Charset, FileStream, WriteStream};
pub use types::{Capabilities, Properties, TypeFilter};
pub use wildcard::WildcardFilter;
