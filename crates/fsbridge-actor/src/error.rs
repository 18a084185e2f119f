//! Actor error types.

use fsbridge_vfs::{ConfigurationError, FileSystemError};
use thiserror::Error;

use crate::action::Action;

/// Failure of a configure or `do_action` call.
#[derive(Debug, Error)]
pub enum ActorError {
    /// Bad settings, or an `action` parameter naming an unsupported action.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The filesystem refused the action. The backend error stays in the
    /// `source()` chain.
    #[error("unable to process [{action}] action for File [{filename}]: {source}")]
    Action {
        action: Action,
        filename: String,
        destination: Option<String>,
        #[source]
        source: FileSystemError,
    },
}

impl ActorError {
    /// The backend error behind an action failure.
    pub fn filesystem_error(&self) -> Option<&FileSystemError> {
        match self {
            ActorError::Action { source, .. } => Some(source),
            ActorError::Configuration(_) => None,
        }
    }
}

pub type ActorResult<T> = Result<T, ActorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_action_error_message() {
        let err = ActorError::Action {
            action: Action::Rename,
            filename: "file1.txt".into(),
            destination: Some("file2.txt".into()),
            source: FileSystemError::already_exists(
                "Cannot rename file. Destination file already exists.",
            ),
        };
        assert_eq!(
            err.to_string(),
            "unable to process [RENAME] action for File [file1.txt]: \
             Cannot rename file. Destination file already exists."
        );
        assert!(err.filesystem_error().unwrap().is_already_exists());
        assert!(err.source().is_some());
    }
}
