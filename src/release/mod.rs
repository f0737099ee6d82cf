// ABOUTME: Release directory model.
// ABOUTME: Names, paths, ordered release sets, and queries against the hosts.

mod name;
mod paths;
mod query;
mod set;

pub use name::{RELEASE_NAME_FORMAT, ReleaseName, ReleaseNameError};
pub use paths::{CURRENT_DIR, RELEASES_DIR, REVISION_FILE, ReleasePaths, SHARED_DIR};
pub(crate) use paths::join;
pub use query::{Invocation, Releases};
pub use set::ReleaseSet;
