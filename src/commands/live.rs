// ABOUTME: Commands that act on the live release: pending, upload, web, links, releases.
// ABOUTME: Environment variables FILES, REASON and UNTIL arrive through clap.

use cutover::deploy::parse_file_list;
use cutover::error::Result;
use cutover::maintenance::Notice;
use cutover::output::Output;

use super::{Context, finish};

pub async fn pending(ctx: &Context, diff: bool, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.pending(diff).await;
    finish(&orchestrator, output).await;

    output.text(&result?);
    Ok(())
}

pub async fn upload(ctx: &Context, files: Option<&str>, output: &Output) -> Result<()> {
    let patterns = parse_file_list(files.unwrap_or_default());
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.upload(&patterns, &ctx.cwd).await;
    finish(&orchestrator, output).await;
    let uploaded = result?;

    for file in &uploaded {
        output.progress(&format!("  → {file}"));
    }
    output.success(&format!("Uploaded {} file(s)", uploaded.len()));
    Ok(())
}

pub async fn web_disable(
    ctx: &Context,
    reason: Option<String>,
    deadline: Option<String>,
    output: &Output,
) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let notice = Notice { reason, deadline };

    let result = orchestrator.web_disable(&notice).await;
    finish(&orchestrator, output).await;
    let disabled = result?;

    output.progress(
        "Add something like this to your web server configuration to serve the maintenance page:",
    );
    output.progress(&disabled.rules);
    output.success(&format!("Maintenance page written to {}", disabled.path));
    Ok(())
}

pub async fn web_enable(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.web_enable().await;
    finish(&orchestrator, output).await;
    result?;

    output.success("Maintenance page removed");
    Ok(())
}

pub async fn links(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.links().await;
    finish(&orchestrator, output).await;
    result?;

    output.success("Content directories linked");
    Ok(())
}

pub async fn releases(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.release_listing().await;
    finish(&orchestrator, output).await;
    let listing = result?;

    output.data(&listing, || listing.render());
    Ok(())
}
