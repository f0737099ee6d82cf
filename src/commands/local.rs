// ABOUTME: Commands that never contact a host: init and wp-config.
// ABOUTME: Both operate on files in the working directory.

use cutover::config::{self, CONFIG_FILENAME, php};
use cutover::error::Result;
use cutover::output::Output;
use std::path::PathBuf;

use super::Context;

pub fn init(
    ctx: &Context,
    application: Option<&str>,
    repository: Option<&str>,
    force: bool,
    output: &Output,
) -> Result<()> {
    config::init_config(&ctx.cwd, application, repository, force)?;
    output.success(&format!("Created {CONFIG_FILENAME}"));
    Ok(())
}

pub fn wp_config(files: &[PathBuf], output: &Output) -> Result<()> {
    let settings = php::parse_files(files)?;
    let json = serde_json::to_string_pretty(&settings)?;
    output.data(&settings, move || json);
    Ok(())
}
