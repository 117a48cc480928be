//! Host filesystem and package tasks

use crate::context::DeploymentContext;
use crate::executor::{shell_quote, Executor};

use super::TaskResult;

/// Create the directory skeleton the application expects and hand ownership
/// to the configured system user.
pub fn create_dirs(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let reporter = ctx.reporter();
    reporter.info("creating directories");

    let document_root = ctx.resolve_str("nginx.document_root")?;
    let static_root = ctx.resolve_str("django.static_root")?;
    let media_root = ctx.resolve_str("django.media_root")?;
    let logs_path = ctx.resolve_str("logs.path")?;
    let socket_dir = format!("/dev/shm/{}-run/", ctx.project_name());

    for dir in [&document_root, &static_root, &media_root, &logs_path, &socket_dir] {
        exec.sudo(&format!("mkdir -p {}", shell_quote(dir)))?;
    }

    let owner = format!(
        "{}:{}",
        ctx.resolve_str("system.user")?,
        ctx.resolve_str("system.group")?
    );
    for dir in [&logs_path, &document_root, &socket_dir] {
        exec.sudo(&format!("chown -R {} {}", owner, shell_quote(dir)))?;
    }
    Ok(())
}

/// Install the packages listed under `system.packages`, if any
pub fn install_packages(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let packages = ctx.resolve_str_seq("system.packages")?;
    if packages.is_empty() {
        return Ok(());
    }

    ctx.reporter().info("installing system packages");
    exec.sudo("apt-get update -q")?;
    exec.sudo(&format!("apt-get install -qy {}", packages.join(" ")))?;
    Ok(())
}
