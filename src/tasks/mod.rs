//! Deployment tasks
//!
//! Each task takes the resolved deployment context and an executor bound to
//! one host, issues its remote commands, and logs a status line. `deploy`
//! composes the full sequence and aborts on the first unrecovered failure;
//! the only in-task recovery is the fake-migration fallback in
//! [`django::migrate`].

pub mod django;
pub mod git;
pub mod python;
pub mod remote_context;
pub mod services;
pub mod system;

pub use django::{collectstatic, migrate, run_manage, setup_settings};
pub use git::checkout;
pub use python::{install_requirements, setup_virtualenv, update_requirements};
pub use remote_context::{create_context, print_context};
pub use services::{check_services, setup_cron, setup_nginx, setup_supervisor, setup_uwsgi};
pub use system::{create_dirs, install_packages};

use crate::context::{ContextError, DeploymentContext, TemplateError, TemplateStore};
use crate::editor::EditorError;
use crate::executor::{ExecError, Executor, SshTarget};

/// Task errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("no settings template for stage '{stage}': expected {path}")]
    MissingSettings { stage: String, path: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl TaskError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Context(_) => 1,
            TaskError::Template(_) => 1,
            TaskError::MissingSettings { .. } => 1,
            TaskError::Editor(_) => 1,
            TaskError::Json(_) => 1,
            TaskError::Yaml(_) => 1,
            TaskError::Exec(_) => 30,
        }
    }
}

/// Result type for task operations
pub type TaskResult = Result<(), TaskError>;

/// Run the full deployment sequence against one host
pub fn deploy(ctx: &DeploymentContext, exec: &dyn Executor, store: &TemplateStore) -> TaskResult {
    ctx.reporter().info("deploying");
    system::create_dirs(ctx, exec)?;
    git::checkout(ctx, exec)?;
    python::setup_virtualenv(ctx, exec)?;
    django::setup_settings(ctx, exec, store)?;
    django::migrate(ctx, exec)?;
    django::collectstatic(ctx, exec)?;
    services::setup_cron(ctx, exec, store)?;
    services::setup_uwsgi(ctx, exec, store)?;
    services::setup_supervisor(ctx, exec, store)?;
    if nginx_enabled_on(ctx, exec.host())? {
        services::setup_nginx(ctx, exec, store)?;
    }
    services::check_services(ctx, exec)?;
    Ok(())
}

/// Whether `setup_nginx` should run on `host`. An empty `nginx.hosts`
/// sequence means every host serves nginx.
fn nginx_enabled_on(ctx: &DeploymentContext, host: &str) -> Result<bool, TaskError> {
    let nginx_hosts = ctx.resolve_str_seq("nginx.hosts")?;
    Ok(nginx_hosts.is_empty()
        || nginx_hosts
            .iter()
            .any(|entry| SshTarget::parse(entry).host == host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectConfig;

    fn ctx_with(stages: &str) -> DeploymentContext {
        let config = ProjectConfig::parse(stages).unwrap();
        DeploymentContext::select_stage(&config, "prod").unwrap()
    }

    #[test]
    fn test_nginx_enabled_everywhere_by_default() {
        let ctx = ctx_with("global:\nstages:\n  prod: {}\n");
        assert!(nginx_enabled_on(&ctx, "web1").unwrap());
    }

    #[test]
    fn test_nginx_restricted_to_listed_hosts() {
        let ctx = ctx_with(
            r#"
            global:
              nginx:
                hosts: [deploy@lb1.example.com]
            stages:
              prod: {}
            "#,
        );
        assert!(nginx_enabled_on(&ctx, "lb1.example.com").unwrap());
        assert!(!nginx_enabled_on(&ctx, "web1.example.com").unwrap());
    }
}
