//! The closed set of actions the dispatcher understands.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use fsbridge_vfs::Capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Action {
    /// List a folder.
    List,
    /// Metadata of one file.
    Info,
    Read,
    /// Read, then delete.
    ReadDelete,
    /// Create or replace a file with the input or `contents` parameter.
    Write,
    /// Create an empty file.
    Create,
    Append,
    Delete,
    Rename,
    Move,
    Copy,
    Mkdir,
    Rmdir,
    Exists,
    ListAttachments,
}

impl Action {
    /// Whether the action changes the backend.
    pub fn mutates(self) -> bool {
        !matches!(
            self,
            Action::List | Action::Info | Action::Read | Action::Exists | Action::ListAttachments
        )
    }

    /// Whether the action needs a destination attribute or parameter.
    pub fn needs_destination(self) -> bool {
        matches!(self, Action::Move | Action::Copy | Action::Rename)
    }

    /// Whether the wildcard settings turn this action into a batch.
    pub fn supports_batch(self) -> bool {
        matches!(self, Action::Delete | Action::Move | Action::Copy)
    }

    /// Whether a backend with `capabilities` can perform this action.
    pub fn is_supported_by(self, capabilities: Capabilities) -> bool {
        match self {
            Action::Append => capabilities.write && capabilities.append,
            Action::ListAttachments => capabilities.attachments,
            action if action.mutates() => capabilities.write,
            _ => true,
        }
    }

    pub fn supported_by(capabilities: Capabilities) -> Vec<Action> {
        Action::iter()
            .filter(|action| action.is_supported_by(capabilities))
            .collect()
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown action [{text}]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("write".parse::<Action>().unwrap(), Action::Write);
        assert_eq!("ReadDelete".parse::<Action>().unwrap(), Action::ReadDelete);
        assert_eq!("LISTATTACHMENTS".parse::<Action>().unwrap(), Action::ListAttachments);
        assert!("forward".parse::<Action>().is_err());
        assert_eq!(Action::ReadDelete.to_string(), "READDELETE");
    }

    #[test]
    fn test_read_only_backend() {
        let supported = Action::supported_by(Capabilities::read_only());
        assert_eq!(
            supported,
            vec![Action::List, Action::Info, Action::Read, Action::Exists]
        );
    }

    #[test]
    fn test_append_needs_append_capability() {
        let caps = Capabilities::writable().without_append();
        assert!(!Action::Append.is_supported_by(caps));
        assert!(Action::Write.is_supported_by(caps));
        assert!(!Action::ListAttachments.is_supported_by(caps));
        assert!(Action::ListAttachments.is_supported_by(caps.with_attachments()));
    }
}
