//! Virtualenv and pip tasks

use std::path::PathBuf;

use crate::context::DeploymentContext;
use crate::executor::{shell_quote, CommandOutput, Executor};

use super::{TaskError, TaskResult};

/// Run a binary from the project's virtualenv, from the project directory
pub fn venv(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    cmd: &str,
) -> Result<CommandOutput, TaskError> {
    let project_dir = ctx.project_dir()?;
    let venv_name = ctx.resolve_str("virtualenv.name")?;
    Ok(exec.sudo(&format!(
        "cd {} && ../{}/bin/{}",
        shell_quote(&project_dir),
        venv_name,
        cmd
    ))?)
}

/// Run pip from the virtualenv
pub fn pip(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    args: &str,
) -> Result<CommandOutput, TaskError> {
    venv(ctx, exec, &format!("pip {}", args))
}

/// Run python from the virtualenv
pub fn python(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    args: &str,
) -> Result<CommandOutput, TaskError> {
    venv(ctx, exec, &format!("python {}", args))
}

/// Install pinned requirements into the virtualenv
pub fn install_requirements(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    ctx.reporter().info("installing requirements");
    pip(ctx, exec, "install -qr requirements.pip")?;
    Ok(())
}

/// Install or upgrade pinned requirements
pub fn update_requirements(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    ctx.reporter().info("installing/updating requirements");
    pip(ctx, exec, "install -qUr requirements.pip")?;
    Ok(())
}

/// Create the virtualenv if it does not exist yet, then install
/// requirements into it. A present virtualenv is left untouched.
pub fn setup_virtualenv(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let venv_root = ctx.resolve_str("virtualenv.root")?;
    let venv_name = ctx.resolve_str("virtualenv.name")?;
    let venv_path = PathBuf::from(&venv_root)
        .join(&venv_name)
        .to_string_lossy()
        .into_owned();

    if exec.exists(&venv_path)? {
        return Ok(());
    }

    let py_version = ctx.resolve_str("python.version")?;
    exec.sudo(&format!(
        "cd {} && virtualenv --python=python{} {}",
        shell_quote(&venv_root),
        py_version,
        venv_name
    ))?;
    ctx.reporter()
        .info(&format!("created virtualenv: {}", venv_path));
    install_requirements(ctx, exec)
}
