//! Filesystem lifecycle: `UNCONFIGURED -> CONFIGURED -> OPEN -> CLOSED`.

use serde::Serialize;
use strum::Display;
use tracing::warn;

use crate::error::{ConfigurationError, FileSystemError, FsResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleState {
    #[default]
    Unconfigured,
    Configured,
    Open,
    Closed,
}

/// Lifecycle tracker embedded in every backend.
///
/// Transitions take `&mut self`, so a shared (`&self`) filesystem can only
/// observe its state, never change it mid-operation.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Record a successful `configure()`. An open filesystem must be closed
    /// before it can be reconfigured.
    pub fn configured(&mut self) -> Result<(), ConfigurationError> {
        if self.state == LifecycleState::Open {
            return Err(ConfigurationError::invalid(
                "cannot configure a filesystem that is open",
            ));
        }
        self.state = LifecycleState::Configured;
        Ok(())
    }

    /// Check that `open()` may proceed.
    pub fn check_can_open(&self) -> FsResult<()> {
        match self.state {
            LifecycleState::Unconfigured => {
                Err(FileSystemError::illegal_state("Not yet configured"))
            }
            LifecycleState::Open => Err(FileSystemError::illegal_state("Already open")),
            LifecycleState::Configured | LifecycleState::Closed => Ok(()),
        }
    }

    /// Record a successful `open()`.
    pub fn opened(&mut self) -> FsResult<()> {
        self.check_can_open()?;
        self.state = LifecycleState::Open;
        Ok(())
    }

    /// Record `close()`. Returns whether the filesystem was open; closing
    /// one that never opened only logs.
    pub fn closed(&mut self, owner: &str) -> bool {
        if self.state != LifecycleState::Open {
            warn!(owner, state = %self.state, "close() called on a filesystem that is not open");
            return false;
        }
        self.state = LifecycleState::Closed;
        true
    }

    /// Fail fast unless open.
    pub fn check_open(&self) -> FsResult<()> {
        match self.state {
            LifecycleState::Open => Ok(()),
            LifecycleState::Unconfigured => {
                Err(FileSystemError::illegal_state("Not yet configured"))
            }
            LifecycleState::Configured => Err(FileSystemError::illegal_state("Not yet open")),
            LifecycleState::Closed => Err(FileSystemError::illegal_state("Already closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Unconfigured);
        lc.configured().unwrap();
        lc.opened().unwrap();
        assert!(lc.check_open().is_ok());
        assert!(lc.closed("test"));
        assert_eq!(lc.state(), LifecycleState::Closed);
        assert_eq!(lc.state().to_string(), "CLOSED");
    }

    #[test]
    fn test_io_before_open_fails_fast() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.check_open().unwrap_err().to_string(), "Not yet configured");
        lc.configured().unwrap();
        assert_eq!(lc.check_open().unwrap_err().to_string(), "Not yet open");
    }

    #[test]
    fn test_open_requires_configure() {
        let mut lc = Lifecycle::new();
        assert!(lc.opened().is_err());
    }

    #[test]
    fn test_double_open_rejected() {
        let mut lc = Lifecycle::new();
        lc.configured().unwrap();
        lc.opened().unwrap();
        assert!(lc.opened().is_err());
        assert!(lc.configured().is_err());
    }

    #[test]
    fn test_close_without_open_is_harmless() {
        let mut lc = Lifecycle::new();
        assert!(!lc.closed("test"));
        assert_eq!(lc.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn test_reopen_after_close() {
        let mut lc = Lifecycle::new();
        lc.configured().unwrap();
        lc.opened().unwrap();
        lc.closed("test");
        assert!(lc.check_open().is_err());
        lc.opened().unwrap();
        assert!(lc.check_open().is_ok());
    }
}
