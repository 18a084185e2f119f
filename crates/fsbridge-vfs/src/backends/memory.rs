//! In-memory filesystem backend.
//!
//! Used for pinning exact semantics in tests and as the reference for the
//! attachments capability. All data is ephemeral.
//!
//! Nodes live in a generational arena: a folder owns the ids of its
//! children, a child points back at its parent by id. References handed
//! out by listings carry the node id as a native handle, which is only
//! trusted while the node still has the same name and owner.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::ops::Bound;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, warn};

use crate::attachments::AttachmentsCapability;
use crate::error::{ConfigurationError, FileSystemError, FsResult};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::ops::{FileSystem, Listing};
use crate::reference::{AttachmentRef, FileRef, FolderRef, NativeHandle};
use crate::stream::{Charset, FileStream, WriteStream};
use crate::types::{Capabilities, Properties, TypeFilter};

new_key_type! {
    /// Stable id of a node in the memory arena.
    pub struct NodeId;
}

/// A nested sub-object stored with a memory file.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttachment {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub properties: Properties,
    /// Stored item this attachment embeds, if any.
    pub embedded: Option<FileRef>,
}

impl MemoryAttachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn embedding(mut self, file: FileRef) -> Self {
        self.embedded = Some(file);
        self
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Folder {
        children: BTreeMap<String, NodeId>,
    },
    File {
        data: Vec<u8>,
        properties: Properties,
        attachments: Vec<MemoryAttachment>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    modified: SystemTime,
    kind: NodeKind,
}

impl Node {
    fn folder(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            modified: SystemTime::now(),
            kind: NodeKind::Folder {
                children: BTreeMap::new(),
            },
        }
    }

    fn file(name: &str, parent: NodeId, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            parent: Some(parent),
            modified: SystemTime::now(),
            kind: NodeKind::File {
                data,
                properties: Properties::new(),
                attachments: Vec::new(),
            },
        }
    }

    fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }
}

#[derive(Debug)]
struct Arena {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl Arena {
    fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::folder("", None));
        Self { nodes, root }
    }

    fn children(&self, id: NodeId) -> Option<&BTreeMap<String, NodeId>> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Folder { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut BTreeMap<String, NodeId>> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Folder { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)?.get(name).copied()
    }

    /// Walk from the root; `None` if any segment is missing or not a folder.
    fn folder_id(&self, folder: &FolderRef) -> Option<NodeId> {
        let mut current = self.root;
        for segment in folder.segments() {
            current = self.child(current, segment)?;
        }
        self.nodes.get(current)?.is_folder().then_some(current)
    }

    /// Whether `id` sits directly in `folder`.
    fn is_in(&self, id: NodeId, folder: &FolderRef) -> bool {
        let mut segments: Vec<&str> = folder.segments().collect();
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            let Some(node) = self.nodes.get(parent) else {
                return false;
            };
            if parent == self.root {
                return segments.is_empty();
            }
            if segments.pop() != Some(node.name.as_str()) {
                return false;
            }
            current = node.parent;
        }
        false
    }

    /// Resolve an entry, trusting the native handle only while it still
    /// names the same node.
    fn node_id(&self, file: &FileRef) -> Option<NodeId> {
        if let Some(id) = file.native().and_then(|h| h.downcast_ref::<NodeId>()) {
            if let Some(node) = self.nodes.get(*id) {
                if node.name == file.name() && self.is_in(*id, file.owner()) {
                    return Some(*id);
                }
            }
        }
        let parent = self.folder_id(file.owner())?;
        self.child(parent, file.name())
    }

    fn file_id(&self, file: &FileRef) -> FsResult<NodeId> {
        let id = self
            .node_id(file)
            .ok_or_else(|| FileSystemError::not_found(format!("file [{file}] does not exist")))?;
        if self.nodes[id].is_folder() {
            return Err(FileSystemError::is_a_folder(format!("[{file}] is a folder")));
        }
        Ok(id)
    }

    fn insert_child(&mut self, parent: NodeId, node: Node) -> FsResult<NodeId> {
        let name = node.name.clone();
        let Some(siblings) = self.children(parent) else {
            return Err(FileSystemError::not_a_folder(format!(
                "parent of [{name}] is not a folder"
            )));
        };
        if siblings.contains_key(&name) {
            return Err(FileSystemError::already_exists(format!("[{name}] already exists")));
        }
        let id = self.nodes.insert(node);
        if let Some(children) = self.children_mut(parent) {
            children.insert(name, id);
        }
        Ok(id)
    }

    /// Unlink a node from its parent and free it with all descendants.
    fn remove(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let (name, parent) = (node.name.clone(), node.parent);
        if let Some(children) = parent.and_then(|p| self.children_mut(p)) {
            children.remove(&name);
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                if let NodeKind::Folder { children } = node.kind {
                    pending.extend(children.into_values());
                }
            }
        }
    }

    /// Move a node under `new_parent` with `new_name`.
    fn relink(&mut self, id: NodeId, new_parent: NodeId, new_name: &str) -> FsResult<()> {
        if self.child(new_parent, new_name).is_some() {
            return Err(FileSystemError::already_exists(format!("[{new_name}] already exists")));
        }
        let node = &self.nodes[id];
        let (old_name, old_parent) = (node.name.clone(), node.parent);
        if let Some(children) = old_parent.and_then(|p| self.children_mut(p)) {
            children.remove(&old_name);
        }
        if let Some(children) = self.children_mut(new_parent) {
            children.insert(new_name.to_string(), id);
        }
        let node = &mut self.nodes[id];
        node.name = new_name.to_string();
        node.parent = Some(new_parent);
        Ok(())
    }

    /// Create every missing folder along `folder`.
    fn ensure_folder(&mut self, folder: &FolderRef) -> FsResult<NodeId> {
        let mut current = self.root;
        for segment in folder.segments() {
            current = match self.child(current, segment) {
                Some(id) if self.nodes[id].is_folder() => id,
                Some(_) => {
                    return Err(FileSystemError::not_a_folder(format!(
                        "[{segment}] in [{folder}] is a file"
                    )));
                }
                None => self.insert_child(current, Node::folder(segment, Some(current)))?,
            };
        }
        Ok(current)
    }

    fn attachment(&self, attachment: &AttachmentRef) -> FsResult<&MemoryAttachment> {
        let id = self.file_id(attachment.owner())?;
        let found = match &self.nodes[id].kind {
            NodeKind::File { attachments, .. } => attachments.get(attachment.index()),
            NodeKind::Folder { .. } => None,
        };
        found.ok_or_else(|| {
            FileSystemError::not_found(format!(
                "attachment [{}] of [{}] does not exist",
                attachment.name(),
                attachment.owner()
            ))
        })
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via an internal `RwLock`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryFileSystem {
    arena: Arc<RwLock<Arena>>,
    capabilities: Capabilities,
    lifecycle: Lifecycle,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    /// Create an empty filesystem offering every capability.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::writable().with_attachments())
    }

    /// Create an empty filesystem declaring a restricted capability set.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            arena: Arc::new(RwLock::new(Arena::new())),
            capabilities,
            lifecycle: Lifecycle::new(),
        }
    }

    fn check_write(&self) -> FsResult<()> {
        self.lifecycle.check_open()?;
        if self.capabilities.write {
            Ok(())
        } else {
            Err(FileSystemError::ReadOnly)
        }
    }

    /// Set a backend property reported by `get_additional_file_properties`.
    pub fn set_property(
        &self,
        file: &FileRef,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> FsResult<()> {
        let mut arena = self.arena.write();
        let id = arena.file_id(file)?;
        if let NodeKind::File { properties, .. } = &mut arena.nodes[id].kind {
            properties.insert(key.into(), value.into());
        }
        Ok(())
    }

    pub fn set_modification_time(&self, file: &FileRef, modified: SystemTime) -> FsResult<()> {
        let mut arena = self.arena.write();
        let id = arena
            .node_id(file)
            .ok_or_else(|| FileSystemError::not_found(format!("file [{file}] does not exist")))?;
        arena.nodes[id].modified = modified;
        Ok(())
    }

    /// Attach a sub-object to an existing file.
    pub fn add_attachment(
        &self,
        file: &FileRef,
        attachment: MemoryAttachment,
    ) -> FsResult<AttachmentRef> {
        let mut arena = self.arena.write();
        let id = arena.file_id(file)?;
        let NodeKind::File { attachments, .. } = &mut arena.nodes[id].kind else {
            return Err(FileSystemError::is_a_folder(format!("[{file}] is a folder")));
        };
        let name = attachment.name.clone();
        attachments.push(attachment);
        Ok(AttachmentRef::new(file.clone(), attachments.len() - 1, name))
    }

    fn stream(&self, file: &FileRef, append: bool) -> FsResult<Box<dyn WriteStream>> {
        self.check_write()?;
        if append && !self.capabilities.append {
            return Err(FileSystemError::unsupported("append"));
        }
        let arena = self.arena.read();
        if arena.folder_id(file.owner()).is_none() {
            return Err(FileSystemError::not_found(format!(
                "folder [{}] does not exist",
                file.owner()
            )));
        }
        if let Some(id) = arena.node_id(file) {
            if arena.nodes[id].is_folder() {
                return Err(FileSystemError::is_a_folder(format!("[{file}] is a folder")));
            }
        }
        Ok(Box::new(MemoryWriteStream {
            arena: Arc::clone(&self.arena),
            target: FileRef::from_backend(file.owner().clone(), file.name(), None),
            buffer: Vec::new(),
            append,
            closed: false,
        }))
    }

    fn transfer(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        copy: bool,
    ) -> FsResult<Option<FileRef>> {
        self.check_write()?;
        let mut arena = self.arena.write();
        let id = arena.file_id(file)?;
        let folder = match arena.folder_id(destination) {
            Some(folder) => folder,
            None if create_folder => arena.ensure_folder(destination)?,
            None => {
                return Err(FileSystemError::not_found(format!(
                    "destination folder [{destination}] does not exist"
                )));
            }
        };
        if arena.child(folder, file.name()).is_some() {
            return Err(FileSystemError::already_exists(format!(
                "file [{}] does already exist in folder [{destination}]",
                file.name()
            )));
        }
        let target = if copy {
            let mut node = arena.nodes[id].clone();
            node.parent = Some(folder);
            node.modified = SystemTime::now();
            arena.insert_child(folder, node)?
        } else {
            arena.relink(id, folder, file.name())?;
            id
        };
        debug!(%file, %destination, copy, "transferred file");
        Ok(Some(FileRef::from_backend(
            destination.clone(),
            file.name(),
            Some(NativeHandle::new(target)),
        )))
    }
}

impl FileSystem for MemoryFileSystem {
    fn configure(&mut self) -> Result<(), ConfigurationError> {
        if self.capabilities.append && !self.capabilities.write {
            return Err(ConfigurationError::invalid("append requires write"));
        }
        self.lifecycle.configured()
    }

    fn open(&mut self) -> FsResult<()> {
        self.lifecycle.opened()
    }

    fn close(&mut self) -> FsResult<()> {
        self.lifecycle.closed("memory");
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    fn exists(&self, file: &FileRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().node_id(file).is_some())
    }

    fn list(&self, folder: Option<&FolderRef>, filter: TypeFilter) -> FsResult<Listing<FileRef>> {
        self.lifecycle.check_open()?;
        let folder = folder.cloned().unwrap_or_default();
        let folder_id = self
            .arena
            .read()
            .folder_id(&folder)
            .ok_or_else(|| FileSystemError::not_found(format!("folder [{folder}] does not exist")))?;
        Ok(Box::new(MemoryListing {
            arena: Arc::clone(&self.arena),
            folder,
            folder_id,
            after: None,
            filter,
        }))
    }

    fn is_folder(&self, file: &FileRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        Ok(arena.node_id(file).is_some_and(|id| arena.nodes[id].is_folder()))
    }

    fn read_file(&self, file: &FileRef, charset: Option<Charset>) -> FsResult<FileStream> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        let id = arena.file_id(file)?;
        let NodeKind::File { data, .. } = &arena.nodes[id].kind else {
            return Err(FileSystemError::is_a_folder(format!("[{file}] is a folder")));
        };
        Ok(FileStream::from_bytes(data.clone()).with_charset(charset))
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    fn create_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>> {
        self.stream(file, false)
    }

    fn append_file(&self, file: &FileRef) -> FsResult<Box<dyn WriteStream>> {
        self.stream(file, true)
    }

    fn delete_file(&self, file: &FileRef) -> FsResult<()> {
        self.check_write()?;
        let mut arena = self.arena.write();
        let id = arena.file_id(file)?;
        arena.remove(id);
        debug!(%file, "deleted file");
        Ok(())
    }

    fn rename_file(&self, source: &FileRef, destination: &FileRef) -> FsResult<FileRef> {
        self.check_write()?;
        let mut arena = self.arena.write();
        let id = arena.node_id(source).ok_or_else(|| {
            FileSystemError::not_found(format!(
                "Cannot rename file. Source file [{source}] does not exist."
            ))
        })?;
        if arena.node_id(destination).is_some() {
            return Err(FileSystemError::already_exists(
                "Cannot rename file. Destination file already exists.",
            ));
        }
        let folder = arena.folder_id(destination.owner()).ok_or_else(|| {
            FileSystemError::not_found(format!(
                "Cannot rename file. Destination folder [{}] does not exist.",
                destination.owner()
            ))
        })?;
        arena.relink(id, folder, destination.name())?;
        debug!(%source, %destination, "renamed file");
        Ok(FileRef::from_backend(
            destination.owner().clone(),
            destination.name(),
            Some(NativeHandle::new(id)),
        ))
    }

    fn move_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        _must_return: bool,
    ) -> FsResult<Option<FileRef>> {
        self.transfer(file, destination, create_folder, false)
    }

    fn copy_file(
        &self,
        file: &FileRef,
        destination: &FolderRef,
        create_folder: bool,
        _must_return: bool,
    ) -> FsResult<Option<FileRef>> {
        self.transfer(file, destination, create_folder, true)
    }

    // ------------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------------

    fn folder_exists(&self, folder: &FolderRef) -> FsResult<bool> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().folder_id(folder).is_some())
    }

    fn create_folder(&self, folder: &FolderRef) -> FsResult<()> {
        self.check_write()?;
        let mut arena = self.arena.write();
        if arena.folder_id(folder).is_some() {
            return Err(FileSystemError::already_exists(format!(
                "Create directory for [{folder}] has failed. Directory already exists."
            )));
        }
        arena.ensure_folder(folder)?;
        debug!(%folder, "created folder");
        Ok(())
    }

    fn remove_folder(&self, folder: &FolderRef, remove_non_empty: bool) -> FsResult<()> {
        self.check_write()?;
        if folder.is_root() {
            return Err(FileSystemError::invalid_name("the root folder cannot be removed"));
        }
        let mut arena = self.arena.write();
        let id = arena.folder_id(folder).ok_or_else(|| {
            FileSystemError::not_found(format!(
                "Remove directory for [{folder}] has failed. Directory does not exist."
            ))
        })?;
        let is_empty = arena.children(id).is_none_or(BTreeMap::is_empty);
        if !is_empty && !remove_non_empty {
            return Err(FileSystemError::not_empty(format!(
                "Cannot remove folder [{folder}]. Directory not empty."
            )));
        }
        arena.remove(id);
        debug!(%folder, remove_non_empty, "removed folder");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    fn get_file_size(&self, file: &FileRef) -> FsResult<u64> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        let id = arena.file_id(file)?;
        match &arena.nodes[id].kind {
            NodeKind::File { data, .. } => Ok(data.len() as u64),
            NodeKind::Folder { .. } => Ok(0),
        }
    }

    fn get_canonical_name(&self, file: &FileRef) -> FsResult<String> {
        self.lifecycle.check_open()?;
        Ok(file.path())
    }

    fn get_modification_time(&self, file: &FileRef) -> FsResult<SystemTime> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        let id = arena
            .node_id(file)
            .ok_or_else(|| FileSystemError::not_found(format!("file [{file}] does not exist")))?;
        Ok(arena.nodes[id].modified)
    }

    fn get_additional_file_properties(&self, file: &FileRef) -> FsResult<Properties> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        let id = arena.file_id(file)?;
        match &arena.nodes[id].kind {
            NodeKind::File { properties, .. } => Ok(properties.clone()),
            NodeKind::Folder { .. } => Ok(Properties::new()),
        }
    }

    fn physical_destination_name(&self) -> String {
        "in-memory filesystem".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn attachments(&self) -> Option<&dyn AttachmentsCapability> {
        if self.capabilities.attachments {
            Some(self)
        } else {
            None
        }
    }
}

impl AttachmentsCapability for MemoryFileSystem {
    fn list_attachments(&self, file: &FileRef) -> FsResult<Listing<AttachmentRef>> {
        self.lifecycle.check_open()?;
        let arena = self.arena.read();
        let id = arena.file_id(file)?;
        let names: Vec<String> = match &arena.nodes[id].kind {
            NodeKind::File { attachments, .. } => {
                attachments.iter().map(|a| a.name.clone()).collect()
            }
            NodeKind::Folder { .. } => Vec::new(),
        };
        let owner = file.clone();
        Ok(Box::new(
            names
                .into_iter()
                .enumerate()
                .map(move |(index, name)| Ok(AttachmentRef::new(owner.clone(), index, name))),
        ))
    }

    fn get_attachment_name(&self, attachment: &AttachmentRef) -> FsResult<String> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.name.clone())
    }

    fn get_attachment_size(&self, attachment: &AttachmentRef) -> FsResult<u64> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.data.len() as u64)
    }

    fn get_attachment_content_type(&self, attachment: &AttachmentRef) -> FsResult<Option<String>> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.content_type.clone())
    }

    fn get_attachment_file_name(&self, attachment: &AttachmentRef) -> FsResult<Option<String>> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.file_name.clone())
    }

    fn get_additional_attachment_properties(
        &self,
        attachment: &AttachmentRef,
    ) -> FsResult<Properties> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.properties.clone())
    }

    fn read_attachment(&self, attachment: &AttachmentRef) -> FsResult<FileStream> {
        self.lifecycle.check_open()?;
        let data = self.arena.read().attachment(attachment)?.data.clone();
        Ok(FileStream::from_bytes(data))
    }

    fn get_file_from_attachment(&self, attachment: &AttachmentRef) -> FsResult<Option<FileRef>> {
        self.lifecycle.check_open()?;
        Ok(self.arena.read().attachment(attachment)?.embedded.clone())
    }
}

/// Lazy cursor over a folder's children. Takes the read lock per item and
/// resumes after the last name it returned, so concurrent changes are
/// seen but never corrupt the walk.
struct MemoryListing {
    arena: Arc<RwLock<Arena>>,
    folder: FolderRef,
    folder_id: NodeId,
    after: Option<String>,
    filter: TypeFilter,
}

impl Iterator for MemoryListing {
    type Item = FsResult<FileRef>;

    fn next(&mut self) -> Option<Self::Item> {
        let arena = self.arena.read();
        let children = arena.children(self.folder_id)?;
        let lower = match &self.after {
            Some(name) => Bound::Excluded(name.as_str()),
            None => Bound::Unbounded,
        };
        let (name, id) = children
            .range::<str, _>((lower, Bound::Unbounded))
            .find(|(_, id)| {
                let is_folder = arena.nodes.get(**id).is_some_and(Node::is_folder);
                if is_folder {
                    self.filter.includes_folders()
                } else {
                    self.filter.includes_files()
                }
            })?;
        self.after = Some(name.clone());
        Some(Ok(FileRef::from_backend(
            self.folder.clone(),
            name.as_str(),
            Some(NativeHandle::new(*id)),
        )))
    }
}

/// Buffers writes and commits them to the arena on close.
struct MemoryWriteStream {
    arena: Arc<RwLock<Arena>>,
    target: FileRef,
    buffer: Vec<u8>,
    append: bool,
    closed: bool,
}

impl MemoryWriteStream {
    fn commit(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let data = std::mem::take(&mut self.buffer);
        let mut arena = self.arena.write();
        let parent = arena.folder_id(self.target.owner()).ok_or_else(|| {
            FileSystemError::not_found(format!("folder [{}] does not exist", self.target.owner()))
        })?;
        match arena.child(parent, self.target.name()) {
            Some(id) => {
                let node = &mut arena.nodes[id];
                let NodeKind::File { data: existing, .. } = &mut node.kind else {
                    return Err(FileSystemError::is_a_folder(format!(
                        "[{}] is a folder",
                        self.target
                    )));
                };
                if self.append {
                    existing.extend_from_slice(&data);
                } else {
                    *existing = data;
                }
                node.modified = SystemTime::now();
            }
            None => {
                arena.insert_child(parent, Node::file(self.target.name(), parent, data))?;
            }
        }
        debug!(file = %self.target, append = self.append, "committed write stream");
        Ok(())
    }
}

impl Write for MemoryWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("stream already closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteStream for MemoryWriteStream {
    fn close(mut self: Box<Self>) -> FsResult<()> {
        self.commit()
    }
}

impl Drop for MemoryWriteStream {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(file = %self.target, error = %e, "write stream dropped without close, commit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> MemoryFileSystem {
        let mut fs = MemoryFileSystem::new();
        fs.configure().unwrap();
        fs.open().unwrap();
        fs
    }

    #[test]
    fn test_create_and_read() {
        let fs = setup();
        let file = fs.to_file("test.txt").unwrap();
        fs.write_all(&file, b"hello world").unwrap();
        assert_eq!(fs.read_all(&file).unwrap(), b"hello world");
    }

    #[test]
    fn test_content_visible_only_after_close() {
        let fs = setup();
        let file = fs.to_file("test.txt").unwrap();
        let mut stream = fs.create_file(&file).unwrap();
        stream.write_all(b"pending").unwrap();
        assert!(!fs.exists(&file).unwrap());
        stream.close().unwrap();
        assert!(fs.exists(&file).unwrap());
    }

    #[test]
    fn test_dropped_stream_commits() {
        let fs = setup();
        let file = fs.to_file("test.txt").unwrap();
        {
            let mut stream = fs.append_file(&file).unwrap();
            stream.write_all(b"abc").unwrap();
        }
        assert_eq!(fs.read_all(&file).unwrap(), b"abc");
    }

    #[test]
    fn test_listing_is_sorted_and_lazy() {
        let fs = setup();
        for name in ["c", "a", "b"] {
            fs.write_all(&fs.to_file(name).unwrap(), b"").unwrap();
        }
        let mut listing = fs.list_files(None).unwrap();
        assert_eq!(listing.next().unwrap().unwrap().name(), "a");

        // Entries added behind the cursor are not revisited.
        fs.write_all(&fs.to_file("0").unwrap(), b"").unwrap();
        let rest: Vec<_> = listing.map(|f| f.unwrap().name().to_string()).collect();
        assert_eq!(rest, vec!["b", "c"]);
    }

    #[test]
    fn test_stale_native_handle_falls_back() {
        let fs = setup();
        fs.write_all(&fs.to_file("a").unwrap(), b"1").unwrap();
        let listed = fs.list_files(None).unwrap().next().unwrap().unwrap();
        assert!(listed.native().is_some());

        let renamed = fs.rename_file(&listed, &fs.to_file("b").unwrap()).unwrap();
        assert!(!fs.exists(&listed).unwrap());
        assert_eq!(fs.read_all(&renamed).unwrap(), b"1");

        fs.write_all(&fs.to_file("a").unwrap(), b"2").unwrap();
        assert_eq!(fs.read_all(&listed).unwrap(), b"2");
    }

    #[test]
    fn test_file_and_folder_share_namespace() {
        let fs = setup();
        fs.create_folder(&fs.to_folder("x").unwrap()).unwrap();
        let as_file = fs.to_file("x").unwrap();
        assert!(matches!(fs.create_file(&as_file), Err(FileSystemError::IsAFolder(_))));
        assert!(matches!(fs.delete_file(&as_file), Err(FileSystemError::IsAFolder(_))));
    }

    #[test]
    fn test_create_folder_makes_parents() {
        let fs = setup();
        fs.create_folder(&fs.to_folder("a/b/c").unwrap()).unwrap();
        assert!(fs.folder_exists(&fs.to_folder("a").unwrap()).unwrap());
        assert!(fs.folder_exists(&fs.to_folder("a/b").unwrap()).unwrap());
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let fs = setup();
        assert!(matches!(
            fs.remove_folder(&FolderRef::root(), true),
            Err(FileSystemError::InvalidName(_))
        ));
    }

    #[test]
    fn test_copy_keeps_source() {
        let fs = setup();
        let src = fs.to_file("a.txt").unwrap();
        fs.write_all(&src, b"data").unwrap();
        fs.set_property(&src, "flag", true).unwrap();

        let dest = fs.to_folder("copies").unwrap();
        let copy = fs.copy_file(&src, &dest, true, true).unwrap().unwrap();
        assert_eq!(fs.read_all(&src).unwrap(), b"data");
        assert_eq!(fs.read_all(&copy).unwrap(), b"data");
        assert_eq!(
            fs.get_additional_file_properties(&copy).unwrap().get("flag"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn test_attachments() {
        let fs = setup();
        let mail = fs.to_file("inbox/msg-1").unwrap();
        fs.create_folder(mail.owner()).unwrap();
        fs.write_all(&mail, b"body").unwrap();
        let embedded = fs.to_file("inbox/msg-0").unwrap();
        fs.write_all(&embedded, b"forwarded").unwrap();

        fs.add_attachment(
            &mail,
            MemoryAttachment::new("part1", "hello")
                .with_file_name("hello.txt")
                .with_content_type("text/plain")
                .with_property("disposition", "attachment"),
        )
        .unwrap();
        fs.add_attachment(&mail, MemoryAttachment::new("part2", "").embedding(embedded.clone()))
            .unwrap();

        let capability = fs.attachments().unwrap();
        let parts: Vec<_> = capability
            .list_attachments(&mail)
            .unwrap()
            .map(|a| a.unwrap())
            .collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(capability.get_attachment_name(&parts[0]).unwrap(), "part1");
        assert_eq!(capability.get_attachment_size(&parts[0]).unwrap(), 5);
        assert_eq!(
            capability.get_attachment_content_type(&parts[0]).unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(
            capability.get_attachment_file_name(&parts[0]).unwrap().as_deref(),
            Some("hello.txt")
        );
        assert_eq!(
            capability.read_attachment(&parts[0]).unwrap().into_string().unwrap(),
            "hello"
        );
        assert!(capability.get_file_from_attachment(&parts[0]).unwrap().is_none());
        assert_eq!(capability.get_file_from_attachment(&parts[1]).unwrap(), Some(embedded));
    }

    #[test]
    fn test_no_attachments_without_capability() {
        let mut fs = MemoryFileSystem::with_capabilities(Capabilities::writable());
        fs.configure().unwrap();
        fs.open().unwrap();
        assert!(fs.attachments().is_none());
    }

    #[test]
    fn test_append_unsupported() {
        let mut fs = MemoryFileSystem::with_capabilities(Capabilities::writable().without_append());
        fs.configure().unwrap();
        fs.open().unwrap();
        let file = fs.to_file("a").unwrap();
        assert!(matches!(fs.append_file(&file), Err(FileSystemError::Unsupported(_))));
    }
}
