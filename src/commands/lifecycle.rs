// ABOUTME: Release lifecycle commands: deploy, setup, update, symlink, rollback, cleanup, check.
// ABOUTME: Each builds an orchestrator, runs one operation, and reports through Output.

use cutover::deploy::DeployOptions;
use cutover::error::Result;
use cutover::output::Output;

use super::{Context, finish};

pub async fn deploy(ctx: &Context, options: DeployOptions, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let config = orchestrator.config();
    output.progress(&format!(
        "Deploying {} ({}) to {} server(s)",
        config.application,
        config.branch,
        config.servers.len()
    ));

    let result = orchestrator.deploy(options).await;
    finish(&orchestrator, output).await;
    let release = result?;

    output.success(&format!("Deployed release {release}"));
    Ok(())
}

pub async fn setup(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    output.progress(&format!(
        "  → Setting up {}...",
        orchestrator.paths().deploy_to()
    ));

    let result = orchestrator.setup().await;
    finish(&orchestrator, output).await;
    result?;

    output.success("Setup complete!");
    Ok(())
}

pub async fn update(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    output.progress("  → Updating code and switching current...");

    let result = orchestrator.update().await;
    finish(&orchestrator, output).await;
    let release = result?;

    output.success(&format!("current -> {release}"));
    Ok(())
}

pub async fn update_code(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    output.progress("  → Updating code...");

    let result = orchestrator.update_code().await;
    finish(&orchestrator, output).await;
    let release = result?;

    output.success(&format!("Created release {release}"));
    Ok(())
}

pub async fn symlink(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.symlink().await;
    finish(&orchestrator, output).await;
    let release = result?;

    output.success(&format!("current -> {release}"));
    Ok(())
}

pub async fn rollback(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    output.progress(&format!(
        "Rolling back {} on {} server(s)",
        orchestrator.config().application,
        orchestrator.config().servers.len()
    ));

    let result = orchestrator.rollback().await;
    finish(&orchestrator, output).await;
    let rolled_back = result?;

    match &rolled_back.removed {
        Some(removed) => output.success(&format!(
            "Rolled back to {} (removed {})",
            rolled_back.restored, removed
        )),
        None => output.success(&format!("Rolled back to {}", rolled_back.restored)),
    }
    Ok(())
}

pub async fn cleanup(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.cleanup().await;
    finish(&orchestrator, output).await;
    let cleanup = result?;

    output.success(&format!(
        "Kept {} release(s), removed {}",
        cleanup.kept,
        cleanup.removed.len()
    ));
    Ok(())
}

pub async fn check(ctx: &Context, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let result = orchestrator.check().await;
    finish(&orchestrator, output).await;
    let suite = result?;

    output.success(&format!(
        "You appear to have all necessary dependencies installed ({} checks)",
        suite.len()
    ));
    Ok(())
}
