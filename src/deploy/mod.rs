// ABOUTME: Release lifecycle orchestration.
// ABOUTME: Deploy, symlink cutover, rollback, cleanup and the operations on the live release.

mod content;
mod error;
mod orchestrator;
mod rollback;

pub use content::{
    ReleaseListing, SYSTEM_DIR, WebDisabled, expand_files, parse_file_list,
};
pub use error::{DeployError, DeployErrorKind};
pub use orchestrator::{DeployOptions, Orchestrator};
pub use rollback::{Cleanup, RolledBack};
