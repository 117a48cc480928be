//! Code checkout

use crate::context::DeploymentContext;
use crate::executor::{shell_quote, Executor};

use super::TaskResult;

/// Update the working copy in place when one exists, otherwise clone the
/// configured branch into the document root. Safe to repeat.
pub fn checkout(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let reporter = ctx.reporter();
    let project_dir = ctx.project_dir()?;
    let branch = ctx.resolve_str("git.branch")?;

    if exec.exists(&format!("{}/.git", project_dir))? {
        reporter.info("updating code");
        let cd = shell_quote(&project_dir);
        exec.sudo(&format!("cd {} && git reset --hard", cd))?;
        exec.sudo(&format!("cd {} && git pull", cd))?;
        exec.sudo(&format!("cd {} && git checkout {}", cd, shell_quote(&branch)))?;
        exec.sudo(&format!("cd {} && find . -name '*.pyc' -delete", cd))?;
    } else {
        reporter.info("cloning code");
        let repository = ctx.resolve_str("git.repository")?;
        exec.sudo(&format!(
            "cd {} && git clone -b {} {}",
            shell_quote(&ctx.resolve_str("nginx.document_root")?),
            shell_quote(&branch),
            shell_quote(&repository)
        ))?;
    }
    Ok(())
}
