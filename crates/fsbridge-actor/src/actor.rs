//! Action dispatcher over an open [`FileSystem`].

use std::sync::Arc;

use tracing::{debug, warn};

use fsbridge_vfs::utils::{self, TransferOptions};
use fsbridge_vfs::{
    Capabilities, Charset, ConfigurationError, FileRef, FileStream, FileSystem, FileSystemError,
    FolderRef, FsResult, TypeFilter, WildcardFilter,
};

use crate::action::Action;
use crate::config::{ActorConfig, MissingFilePolicy};
use crate::error::{ActorError, ActorResult};
use crate::params::{Message, ParameterList, ParameterValues, Session};
use crate::result::{ActionResult, AttachmentInfo, FileInfo, FileListing};
use crate::sanitize::sanitize_name;

const LINE_SEPARATOR: &str = "\n";

/// Runs one configured action per call against a shared filesystem.
///
/// Holds no per-call state: after [`FileSystemActor::configure`] every
/// method takes `&self`.
pub struct FileSystemActor<F: FileSystem + ?Sized> {
    fs: Arc<F>,
    owner: String,
    config: ActorConfig,
    parameters: ParameterList,
    filter: WildcardFilter,
}

fn unsupported_action(owner: &str, action: &str, capabilities: Capabilities) -> ConfigurationError {
    let supported: Vec<String> = Action::supported_by(capabilities)
        .iter()
        .map(Action::to_string)
        .collect();
    ConfigurationError::invalid(format!(
        "{owner}: unknown or invalid action [{action}] supported actions are [{}]",
        supported.join(", ")
    ))
}

fn check_supported(owner: &str, action: Action, capabilities: Capabilities) -> Result<(), ConfigurationError> {
    if action.is_supported_by(capabilities) {
        Ok(())
    } else {
        Err(unsupported_action(owner, &action.to_string(), capabilities))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl<F: FileSystem + ?Sized> FileSystemActor<F> {
    /// Validate `config` against the backend's capabilities and the
    /// declared parameters.
    pub fn configure(
        fs: Arc<F>,
        parameters: ParameterList,
        owner: impl Into<String>,
        config: ActorConfig,
    ) -> Result<Self, ConfigurationError> {
        let owner = owner.into();
        let capabilities = fs.capabilities();

        match config.action {
            None if !parameters.contains("action") => {
                return Err(ConfigurationError::invalid(format!(
                    "{owner}: either attribute [action] or parameter [action] must be specified"
                )));
            }
            None => {}
            Some(action) => {
                check_supported(&owner, action, capabilities)?;
                if action == Action::Write
                    && !parameters.contains("contents")
                    && !parameters.contains("file")
                    && !parameters.contains("filename")
                    && non_empty(config.filename.as_deref()).is_none()
                {
                    return Err(ConfigurationError::invalid(format!(
                        "{owner}: the [WRITE] action requires parameter [contents] or parameter [filename] or attribute [filename]"
                    )));
                }
                if action.needs_destination()
                    && !parameters.contains("destination")
                    && non_empty(config.destination.as_deref()).is_none()
                {
                    return Err(ConfigurationError::invalid(format!(
                        "{owner}: the [{action}] action requires parameter [destination] or attribute [destination]"
                    )));
                }
            }
        }

        if parameters.contains("file") {
            warn!(%owner, "parameter [file] is deprecated, use parameter [contents] instead");
        }
        if (config.number_of_backups > 0 || config.rotate_days > 0) && !capabilities.write {
            return Err(ConfigurationError::invalid(format!(
                "{owner}: [numberOfBackups] and [rotateDays] need a writable filesystem, {} is read-only",
                fs.physical_destination_name()
            )));
        }

        let filter = WildcardFilter::new(config.wildcard.as_deref(), config.exclude_wildcard.as_deref())?;
        debug!(%owner, action = ?config.action, "configured file system actor");
        Ok(Self {
            fs,
            owner,
            config,
            parameters,
            filter,
        })
    }

    /// Make sure the configured input folder exists.
    pub fn open(&self) -> FsResult<()> {
        let Some(name) = non_empty(self.config.input_folder.as_deref()) else {
            return Ok(());
        };
        if matches!(self.config.action, Some(Action::Mkdir | Action::Rmdir)) {
            return Ok(());
        }
        let folder = self.fs.to_folder(name)?;
        if self.fs.folder_exists(&folder)? {
            return Ok(());
        }
        if self.config.create_folder {
            debug!(owner = %self.owner, %folder, "creating input folder");
            return self.fs.create_folder(&folder);
        }
        if !folder.is_root() && self.fs.exists(&FileRef::parse(folder.path())?)? {
            return Err(FileSystemError::already_exists(format!(
                "inputFolder [{name}] does not exist as a folder, but is a file"
            )));
        }
        Err(FileSystemError::not_found(format!("inputFolder [{name}] does not exist")))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    pub fn file_system(&self) -> &Arc<F> {
        &self.fs
    }

    /// Parameters declared at configure time.
    pub fn parameters(&self) -> &ParameterList {
        &self.parameters
    }

    /// Perform the configured (or parameter-selected) action.
    #[tracing::instrument(
        skip_all,
        name = "actor.do_action",
        fields(owner = %self.owner, session = session.id(), action = tracing::field::Empty)
    )]
    pub fn do_action(
        &self,
        input: &Message,
        parameters: &ParameterValues,
        session: &Session,
    ) -> ActorResult<ActionResult> {
        let action = self.resolve_action(parameters)?;
        tracing::Span::current().record("action", tracing::field::display(action));

        let batch = action.supports_batch() && self.filter.is_active();
        let filename = match action {
            Action::List | Action::Mkdir | Action::Rmdir => self.input_folder(input, parameters),
            _ if batch => self.input_folder(input, parameters),
            _ => self.filename(input, parameters),
        };
        let type_filter = if action == Action::List {
            self.type_filter(parameters)?
        } else {
            self.config.type_filter
        };

        let outcome = match action {
            Action::List => self.list(&filename, type_filter),
            Action::Move | Action::Copy | Action::Delete if batch => {
                self.batch(action, &filename, parameters)
            }
            _ => self.perform(action, &filename, input, parameters),
        };
        outcome.map_err(|source| {
            debug!(%action, %filename, error = %source, "action failed");
            ActorError::Action {
                action,
                destination: action
                    .needs_destination()
                    .then(|| self.destination(parameters).ok())
                    .flatten(),
                filename,
                source,
            }
        })
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    fn resolve_action(&self, parameters: &ParameterValues) -> Result<Action, ConfigurationError> {
        if let Some(text) = parameters.text("action").filter(|t| !t.is_empty()) {
            let capabilities = self.fs.capabilities();
            let action = text
                .trim()
                .parse::<Action>()
                .map_err(|_| unsupported_action(&self.owner, &text, capabilities))?;
            check_supported(&self.owner, action, capabilities)?;
            return Ok(action);
        }
        self.config.action.ok_or_else(|| {
            ConfigurationError::invalid(format!("{}: no action specified", self.owner))
        })
    }

    /// Attribute, then parameter, then message.
    fn filename(&self, input: &Message, parameters: &ParameterValues) -> String {
        if let Some(name) = non_empty(self.config.filename.as_deref()) {
            return name.to_string();
        }
        if let Some(name) = parameters.text("filename") {
            return name.into_owned();
        }
        input.as_text().map(|text| text.into_owned()).unwrap_or_default()
    }

    /// Attribute, then parameter, then message. Empty means the root.
    fn input_folder(&self, input: &Message, parameters: &ParameterValues) -> String {
        if let Some(name) = non_empty(self.config.input_folder.as_deref()) {
            return name.to_string();
        }
        if let Some(name) = parameters.text("inputFolder") {
            return name.into_owned();
        }
        input.as_text().map(|text| text.into_owned()).unwrap_or_default()
    }

    fn destination(&self, parameters: &ParameterValues) -> FsResult<String> {
        if let Some(destination) = non_empty(self.config.destination.as_deref()) {
            return Ok(destination.to_string());
        }
        match parameters.text("destination") {
            Some(destination) if destination.is_empty() => Err(FileSystemError::other(
                "parameter [destination] does not specify destination",
            )),
            Some(destination) => Ok(destination.into_owned()),
            None => Err(FileSystemError::other("no destination specified")),
        }
    }

    fn type_filter(&self, parameters: &ParameterValues) -> Result<TypeFilter, ConfigurationError> {
        match parameters.text("typeFilter").filter(|t| !t.is_empty()) {
            Some(text) => text.trim().parse().map_err(|_| {
                ConfigurationError::invalid(format!(
                    "{}: invalid value [{text}] for parameter [typeFilter]",
                    self.owner
                ))
            }),
            None => Ok(self.config.type_filter),
        }
    }

    fn charset(&self) -> Charset {
        self.config.charset.unwrap_or_default()
    }

    fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            create_folder: self.config.create_folder,
            overwrite: self.config.overwrite,
            number_of_backups: self.config.number_of_backups,
            must_return: false,
        }
    }

    fn contents(&self, input: &Message, parameters: &ParameterValues) -> FsResult<Vec<u8>> {
        let charset = self.charset();
        let mut data = match (parameters.get("contents"), parameters.get("file")) {
            (Some(contents), _) => contents.to_bytes(charset)?,
            (None, Some(legacy)) => {
                warn!(owner = %self.owner, "using deprecated parameter [file] as contents");
                legacy.to_bytes(charset)?
            }
            (None, None) => input.to_bytes(charset)?,
        };
        if self.config.write_line_separator {
            data.extend(charset.encode(LINE_SEPARATOR)?);
        }
        Ok(data)
    }

    /// Whether the source is present. A missing source is an error unless
    /// the actor tolerates it.
    fn check_source(&self, file: &FileRef, verb: &str) -> FsResult<bool> {
        match self.config.missing_file {
            MissingFilePolicy::Tolerate => {
                let exists = self.fs.exists(file)?;
                if !exists {
                    debug!(%file, "source does not exist, tolerated");
                }
                Ok(exists)
            }
            MissingFilePolicy::Fail => utils::check_source(&*self.fs, file, verb).map(|()| true),
        }
    }

    fn cleanup(&self, folder: &FolderRef) -> FsResult<()> {
        if self.config.delete_empty_folder {
            utils::delete_empty_folder(&*self.fs, folder)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    fn list(&self, folder_name: &str, type_filter: TypeFilter) -> FsResult<ActionResult> {
        let folder = self.fs.to_folder(folder_name)?;
        if !self.fs.folder_exists(&folder)? {
            if self.config.create_folder {
                self.fs.create_folder(&folder)?;
            } else if self.config.missing_file == MissingFilePolicy::Tolerate {
                debug!(%folder, "folder does not exist, returning empty listing");
                return Ok(ActionResult::Listing(FileListing::new()));
            } else {
                return Err(FileSystemError::not_found(format!("folder [{folder}] does not exist")));
            }
        }

        let mut listing = FileListing::new();
        for file in self.fs.list(Some(&folder), type_filter)? {
            let file = file?;
            if self.filter.matches(file.name()) {
                listing.insert(FileInfo::collect(&*self.fs, &file)?);
            }
        }
        debug!(%folder, count = listing.len(), "listed folder");
        Ok(ActionResult::Listing(listing))
    }

    /// DELETE, MOVE or COPY on every matching file of a folder.
    fn batch(&self, action: Action, folder_name: &str, parameters: &ParameterValues) -> FsResult<ActionResult> {
        let folder = self.fs.to_folder(folder_name)?;
        if !self.fs.folder_exists(&folder)? {
            if self.config.missing_file == MissingFilePolicy::Tolerate {
                return Ok(ActionResult::Listing(FileListing::new()));
            }
            return Err(FileSystemError::not_found(format!("folder [{folder}] does not exist")));
        }
        let destination = match action {
            Action::Move | Action::Copy => Some(self.fs.to_folder(&self.destination(parameters)?)?),
            _ => None,
        };

        let files: Vec<FileRef> = self
            .fs
            .list_files(Some(&folder))?
            .filter(|file| file.as_ref().map_or(true, |f| self.filter.matches(f.name())))
            .collect::<FsResult<_>>()?;

        let mut listing = FileListing::new();
        for file in files {
            let info = FileInfo::collect(&*self.fs, &file)?;
            match (action, &destination) {
                (Action::Move, Some(destination)) => {
                    utils::move_file(&*self.fs, &file, destination, &self.transfer_options())?;
                }
                (Action::Copy, Some(destination)) => {
                    utils::copy_file(&*self.fs, &file, destination, &self.transfer_options())?;
                }
                _ => self.fs.delete_file(&file)?,
            }
            listing.insert(info);
        }
        debug!(%action, %folder, count = listing.len(), "processed batch");
        if matches!(action, Action::Delete | Action::Move) {
            self.cleanup(&folder)?;
        }
        Ok(ActionResult::Listing(listing))
    }

    fn perform(
        &self,
        action: Action,
        name: &str,
        input: &Message,
        parameters: &ParameterValues,
    ) -> FsResult<ActionResult> {
        match action {
            Action::Mkdir => {
                let folder = self.fs.to_folder(name)?;
                self.fs.create_folder(&folder)?;
                return Ok(ActionResult::Name(folder.path().to_string()));
            }
            Action::Rmdir => {
                let folder = self.fs.to_folder(name)?;
                self.fs.remove_folder(&folder, self.config.remove_non_empty_folder)?;
                return Ok(ActionResult::Name(folder.path().to_string()));
            }
            _ => {}
        }

        let file = self.fs.to_file(name)?;
        match action {
            Action::Exists => Ok(ActionResult::Exists(self.fs.exists(&file)?)),
            Action::Info => {
                if !self.check_source(&file, "get info of")? {
                    return Ok(ActionResult::NotFound);
                }
                Ok(ActionResult::Info(FileInfo::collect(&*self.fs, &file)?))
            }
            Action::Read => {
                if !self.check_source(&file, "read")? {
                    return Ok(ActionResult::NotFound);
                }
                Ok(ActionResult::Content(self.fs.read_file(&file, self.config.charset)?))
            }
            Action::ReadDelete => {
                if !self.check_source(&file, "read")? {
                    return Ok(ActionResult::NotFound);
                }
                let data = self.fs.read_file(&file, self.config.charset)?.into_bytes()?;
                self.fs.delete_file(&file)?;
                self.cleanup(file.owner())?;
                Ok(ActionResult::Content(
                    FileStream::from_bytes(data).with_charset(self.config.charset),
                ))
            }
            Action::Write | Action::Create => {
                // Encode before the destination is touched so a bad payload
                // leaves the existing file alone.
                let data = if action == Action::Write {
                    self.contents(input, parameters)?
                } else {
                    Vec::new()
                };
                utils::prepare_folder(&*self.fs, file.owner(), self.config.create_folder)?;
                utils::prepare_destination(
                    &*self.fs,
                    &file,
                    self.config.overwrite,
                    self.config.number_of_backups,
                    "write",
                )?;
                self.fs.write_all(&file, &data)?;
                debug!(%file, bytes = data.len(), "wrote file");
                Ok(ActionResult::Info(FileInfo::collect(&*self.fs, &file)?))
            }
            Action::Append => {
                let data = self.contents(input, parameters)?;
                utils::prepare_folder(&*self.fs, file.owner(), self.config.create_folder)?;
                if self.config.rotate_days > 0 {
                    utils::rollover_by_day(&*self.fs, &file, self.config.rotate_days)?;
                }
                if self.config.rotate_size > 0 {
                    utils::rollover_by_size(
                        &*self.fs,
                        &file,
                        self.config.rotate_size,
                        self.config.number_of_backups,
                    )?;
                }
                self.fs.append_all(&file, &data)?;
                debug!(%file, bytes = data.len(), "appended to file");
                Ok(ActionResult::Info(FileInfo::collect(&*self.fs, &file)?))
            }
            Action::Delete => {
                if !self.check_source(&file, "delete")? {
                    return Ok(ActionResult::NotFound);
                }
                self.fs.delete_file(&file)?;
                self.cleanup(file.owner())?;
                Ok(ActionResult::Name(sanitize_name(file.name()).into_owned()))
            }
            Action::Move | Action::Copy => {
                let destination = self.fs.to_folder(&self.destination(parameters)?)?;
                let verb = if action == Action::Move { "move" } else { "copy" };
                if !self.check_source(&file, verb)? {
                    return Ok(ActionResult::NotFound);
                }
                let options = self.transfer_options();
                let result = if action == Action::Move {
                    utils::move_file(&*self.fs, &file, &destination, &options)?
                } else {
                    utils::copy_file(&*self.fs, &file, &destination, &options)?
                };
                if action == Action::Move {
                    self.cleanup(file.owner())?;
                }
                let name = result.as_ref().map_or(file.name(), FileRef::name);
                Ok(ActionResult::Name(sanitize_name(name).into_owned()))
            }
            Action::Rename => {
                let destination = self.destination(parameters)?;
                let target = if destination.contains(['/', '\\']) {
                    self.fs.to_file(&destination)?
                } else {
                    self.fs.to_file_in(file.owner(), &destination)?
                };
                let renamed = utils::rename_file(&*self.fs, &file, &target, &self.transfer_options())?;
                debug!(from = %file, to = %renamed, "renamed file");
                Ok(ActionResult::Name(sanitize_name(renamed.name()).into_owned()))
            }
            Action::ListAttachments => {
                let attachments = self
                    .fs
                    .attachments()
                    .ok_or_else(|| FileSystemError::unsupported("attachments"))?;
                if !self.check_source(&file, "list attachments of")? {
                    return Ok(ActionResult::NotFound);
                }
                let infos = attachments
                    .list_attachments(&file)?
                    .map(|attachment| AttachmentInfo::collect(attachments, &attachment?))
                    .collect::<FsResult<Vec<_>>>()?;
                Ok(ActionResult::Attachments(infos))
            }
            Action::List | Action::Mkdir | Action::Rmdir => Err(FileSystemError::illegal_state(
                format!("action [{action}] is not a file action"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsbridge_vfs::MemoryFileSystem;

    fn actor(config: ActorConfig, parameters: ParameterList) -> FileSystemActor<MemoryFileSystem> {
        let mut fs = MemoryFileSystem::new();
        fs.configure().unwrap();
        fs.open().unwrap();
        FileSystemActor::configure(Arc::new(fs), parameters, "test", config).unwrap()
    }

    #[test]
    fn test_filename_precedence() {
        let mut config = ActorConfig::new(Action::Exists);
        let actor_without = actor(config.clone(), ParameterList::new().with("filename"));
        let params = ParameterValues::new().with("filename", "param.txt");
        let input = Message::from("input.txt");
        assert_eq!(actor_without.filename(&input, &params), "param.txt");
        assert_eq!(actor_without.filename(&input, &ParameterValues::new()), "input.txt");

        config.filename = Some("attr.txt".into());
        let actor_with = actor(config, ParameterList::new());
        assert_eq!(actor_with.filename(&input, &params), "attr.txt");
    }

    #[test]
    fn test_destination_resolution() {
        let actor = actor(ActorConfig::new(Action::Exists), ParameterList::new());
        let err = actor
            .destination(&ParameterValues::new().with("destination", ""))
            .unwrap_err();
        assert_eq!(err.to_string(), "parameter [destination] does not specify destination");
        let err = actor.destination(&ParameterValues::new()).unwrap_err();
        assert_eq!(err.to_string(), "no destination specified");
        assert_eq!(
            actor
                .destination(&ParameterValues::new().with("destination", "out"))
                .unwrap(),
            "out"
        );
    }

    #[test]
    fn test_input_folder_defaults_to_root() {
        let actor = actor(ActorConfig::new(Action::List), ParameterList::new());
        assert_eq!(actor.input_folder(&Message::Empty, &ParameterValues::new()), "");
        let params = ParameterValues::new().with("inputFolder", "in");
        assert_eq!(actor.input_folder(&Message::from("x"), &params), "in");
    }

    #[test]
    fn test_type_filter_parameter() {
        let actor = actor(ActorConfig::new(Action::List), ParameterList::new());
        let params = ParameterValues::new().with("typeFilter", "folders_only");
        assert_eq!(actor.type_filter(&params).unwrap(), TypeFilter::FoldersOnly);
        let bad = ParameterValues::new().with("typeFilter", "links");
        assert!(actor.type_filter(&bad).is_err());
    }
}
