//! Context inspection and per-host context management

use std::path::Path;

use crate::context::{DeploymentContext, REMOTE_CONTEXT};
use crate::editor;
use crate::executor::{shell_quote, Executor};

use super::TaskResult;

/// Dump the effective context, its contributing layers, and when it was
/// computed. With `json` the tree alone is printed for scripting.
pub fn print_context(ctx: &DeploymentContext, json: bool) -> TaskResult {
    if json {
        println!("{}", serde_json::to_string_pretty(ctx.effective())?);
        return Ok(());
    }

    println!("{}", "-".repeat(80));
    println!(
        "Effective context for {}:{} (computed {})",
        ctx.project_name(),
        ctx.stage(),
        ctx.computed_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}", "-".repeat(80));
    for source in ctx.sources() {
        match (&source.path, &source.digest) {
            (Some(path), Some(digest)) => {
                println!("  {:<14} {} ({})", source.origin, path, &digest[..12])
            }
            (Some(path), None) => println!("  {:<14} {} (absent)", source.origin, path),
            _ => println!("  {:<14} <bundled>", source.origin),
        }
    }
    println!("{}", "-".repeat(80));
    print!("{}", serde_yaml_ng::to_string(ctx.effective())?);
    println!("{}", "-".repeat(80));
    Ok(())
}

/// Edit and upload the per-host context for the selected stage.
///
/// Seeds `$EDITOR` with the bundled remote-context template, validates the
/// result, and writes it to the control path on the bound host.
pub fn create_context(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let content = editor::edit_yaml(REMOTE_CONTEXT)?;
    let path = ctx.remote_context_path();

    if let Some(parent) = Path::new(&path).parent() {
        exec.sudo(&format!(
            "mkdir -p {}",
            shell_quote(&parent.to_string_lossy())
        ))?;
    }
    exec.upload(&path, &content)?;

    ctx.reporter()
        .info(&format!("uploaded context to {}", path));
    Ok(())
}
