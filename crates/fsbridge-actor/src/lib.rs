//! # fsbridge-actor
//!
//! Generic action dispatcher over any [`fsbridge_vfs::FileSystem`].
//!
//! Key components:
//!
//! - [`FileSystemActor`] - Configure once, then `do_action` per message
//! - [`Action`] - Closed action set, parsed case-insensitively
//! - [`ActorConfig`] - Static settings, loadable from TOML
//! - [`ActionResult`] - Listings, file info, content, names
//!
//! ## Resolution order
//!
//! - filename: attribute, then `filename` parameter, then message
//! - destination: attribute, then `destination` parameter
//! - input folder: attribute, then `inputFolder` parameter, then message
//!
//! An `action` parameter overrides the configured action and is validated
//! against the backend's capabilities on every call.

mod action;
mod actor;
mod config;
mod error;
mod params;
mod result;
mod sanitize;

pub use action::Action;
pub use actor::FileSystemActor;
pub use config::{ActorConfig, MissingFilePolicy};
pub use error::{ActorError, ActorResult};
pub use params::{Message, ParameterList, ParameterValue, ParameterValues, Session};
pub use result::{ActionResult, AttachmentInfo, EntryType, FileInfo, FileListing};
pub use sanitize::sanitize_name;
