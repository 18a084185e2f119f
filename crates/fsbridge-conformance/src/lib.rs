//! # fsbridge-conformance
//!
//! One fixed battery of behavioral scenarios run identically against every
//! [`FileSystem`] backend. A backend is acceptable when the whole battery
//! passes.
//!
//! ```ignore
//! fsbridge_conformance::conformance_suite! {
//!     fixture: open_memory(),
//!     unopened: Fixture::new(MemoryFileSystem::new()),
//! }
//! ```
//!
//! Every scenario receives an opened, empty filesystem and returns
//! `FsResult<()>`: backend errors propagate with `?`, broken laws panic.

use std::any::Any;

use fsbridge_vfs::{FileSystem, FsResult};
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod scenarios;

pub type ScenarioResult = FsResult<()>;

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An opened filesystem plus whatever must outlive it, such as the
/// temporary directory a local backend is rooted in. Closes on drop.
pub struct Fixture<F: FileSystem> {
    fs: F,
    _guard: Box<dyn Any>,
}

impl<F: FileSystem> Fixture<F> {
    pub fn new(fs: F) -> Self {
        Self::with_guard(fs, ())
    }

    pub fn with_guard(fs: F, guard: impl Any) -> Self {
        Self {
            fs,
            _guard: Box::new(guard),
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }
}

impl<F: FileSystem> Drop for Fixture<F> {
    fn drop(&mut self) {
        if let Err(e) = self.fs.close() {
            warn!(error = %e, "closing fixture filesystem failed");
        }
    }
}

/// Expand the battery into one `#[test]` per scenario.
///
/// `fixture` is evaluated once per test and must yield a [`Fixture`] over
/// an opened, empty filesystem. `unopened` must yield a [`Fixture`] over a
/// filesystem that has not been configured yet; the lifecycle scenario
/// drives it through every state.
#[macro_export]
macro_rules! conformance_suite {
    (fixture: $fixture:expr, unopened: $unopened:expr $(,)?) => {
        $crate::conformance_suite!(@scenarios $fixture;
            exists_reports_absence,
            create_then_read,
            overwrite_truncates,
            append_to_existing,
            append_creates,
            delete_removes,
            delete_missing_fails,
            read_missing_fails,
            rename_to_new,
            rename_onto_existing_fails,
            rename_into_folder,
            list_after_delete,
            list_does_not_descend,
            list_folders_only,
            folder_create_exists_remove,
            create_existing_folder_fails,
            remove_missing_folder_fails,
            remove_non_empty_folder,
            file_is_not_a_folder,
            move_into_folder,
            move_onto_existing_fails,
            copy_into_folder,
            copy_into_missing_folder,
            metadata_accessors,
            nested_file_by_path,
            scenario_a,
            scenario_b,
        );

        #[test]
        fn lifecycle() -> $crate::ScenarioResult {
            $crate::init_tracing();
            let mut fixture = $unopened;
            $crate::scenarios::lifecycle(fixture.fs_mut())
        }
    };
    (@scenarios $fixture:expr; $($scenario:ident),* $(,)?) => {
        $(
            #[test]
            fn $scenario() -> $crate::ScenarioResult {
                $crate::init_tracing();
                let fixture = $fixture;
                $crate::scenarios::$scenario(fixture.fs())
            }
        )*
    };
}
