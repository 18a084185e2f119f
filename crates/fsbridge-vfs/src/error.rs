//! Filesystem error types.

use std::io;
use thiserror::Error;

/// Bad settings, detected before a filesystem or actor is opened.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A setting is missing, contradictory or unsupported.
    #[error("{0}")]
    Invalid(String),

    /// A TOML configuration document could not be parsed.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigurationError {
    /// Create an Invalid error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Filesystem error type.
///
/// Messages are carried verbatim: operators and downstream tests match on
/// wording such as "Cannot rename file. Destination file already exists.".
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// File or folder not found.
    #[error("{0}")]
    NotFound(String),

    /// Destination already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// Folder not empty.
    #[error("{0}")]
    NotEmpty(String),

    /// Expected a file, found a folder.
    #[error("{0}")]
    IsAFolder(String),

    /// Expected a folder, found a file.
    #[error("{0}")]
    NotAFolder(String),

    /// Malformed file or folder name.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Operation called in the wrong lifecycle state.
    #[error("{0}")]
    IllegalState(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Unknown charset, or content that cannot be represented in it.
    #[error("charset error: {0}")]
    Charset(String),

    /// Operation not offered by this backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Transient I/O failure, wrapping the backend's native error.
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl FileSystemError {
    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(msg: impl Into<String>) -> Self {
        Self::NotEmpty(msg.into())
    }

    /// Create an IsAFolder error.
    pub fn is_a_folder(msg: impl Into<String>) -> Self {
        Self::IsAFolder(msg.into())
    }

    /// Create a NotAFolder error.
    pub fn not_a_folder(msg: impl Into<String>) -> Self {
        Self::NotAFolder(msg.into())
    }

    /// Create an InvalidName error.
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Create an IllegalState error.
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Create a Charset error.
    pub fn charset(msg: impl Into<String>) -> Self {
        Self::Charset(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Wrap a native I/O error with context.
    pub fn io(msg: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: msg.into(),
            source,
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_empty(&self) -> bool {
        matches!(self, Self::NotEmpty(_))
    }
}

impl From<io::Error> for FileSystemError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::not_found(e.to_string()),
            io::ErrorKind::AlreadyExists => Self::already_exists(e.to_string()),
            io::ErrorKind::DirectoryNotEmpty => Self::not_empty(e.to_string()),
            io::ErrorKind::PermissionDenied => Self::io("permission denied", e),
            _ => Self::io("I/O error", e),
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FileSystemError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_messages_are_verbatim() {
        let e = FileSystemError::already_exists("Cannot rename file. Destination file already exists.");
        assert_eq!(e.to_string(), "Cannot rename file. Destination file already exists.");
        assert!(e.is_already_exists());
    }

    #[test]
    fn test_io_keeps_cause() {
        let native = io::Error::new(io::ErrorKind::ConnectionReset, "peer went away");
        let e = FileSystemError::io("cannot read [a.txt]", native);
        assert_eq!(e.to_string(), "cannot read [a.txt]: peer went away");
        assert_eq!(e.source().map(|s| s.to_string()).as_deref(), Some("peer went away"));
    }

    #[test]
    fn test_io_kinds_map_to_variants() {
        let gone = FileSystemError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(gone.is_not_found());
        assert_eq!(gone.to_string(), "gone");

        let taken = FileSystemError::from(io::Error::new(io::ErrorKind::AlreadyExists, "taken"));
        assert!(taken.is_already_exists());

        let full = FileSystemError::from(io::Error::new(io::ErrorKind::DirectoryNotEmpty, "full"));
        assert!(full.is_not_empty());

        let reset = FileSystemError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(reset, FileSystemError::Io { .. }));
        assert_eq!(reset.to_string(), "I/O error: reset");
    }

    #[test]
    fn test_configuration_from_toml() {
        let parse = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let e = ConfigurationError::from(parse);
        assert!(e.to_string().starts_with("cannot parse configuration"));
    }
}
