//! Optional second addressable level: sub-objects nested inside a file,
//! such as the MIME parts of a mailbox message.
//!
//! Discovered at run time through [`crate::FileSystem::attachments`].

use crate::error::FsResult;
use crate::ops::Listing;
use crate::reference::{AttachmentRef, FileRef};
use crate::stream::FileStream;
use crate::types::Properties;

pub trait AttachmentsCapability: Send + Sync {
    /// Lazy sequence of the file's attachments, possibly empty.
    fn list_attachments(&self, file: &FileRef) -> FsResult<Listing<AttachmentRef>>;

    fn get_attachment_name(&self, attachment: &AttachmentRef) -> FsResult<String>;

    fn get_attachment_size(&self, attachment: &AttachmentRef) -> FsResult<u64>;

    fn get_attachment_content_type(&self, attachment: &AttachmentRef) -> FsResult<Option<String>>;

    fn get_attachment_file_name(&self, attachment: &AttachmentRef) -> FsResult<Option<String>>;

    fn get_additional_attachment_properties(
        &self,
        attachment: &AttachmentRef,
    ) -> FsResult<Properties>;

    fn read_attachment(&self, attachment: &AttachmentRef) -> FsResult<FileStream>;

    /// The stored item an attachment embeds, when it is one.
    fn get_file_from_attachment(&self, attachment: &AttachmentRef) -> FsResult<Option<FileRef>>;
}
