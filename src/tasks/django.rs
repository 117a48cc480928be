//! Django management tasks

use std::collections::HashMap;
use std::path::PathBuf;

use crate::context::{DeploymentContext, TemplateStore};
use crate::executor::{CommandOutput, Executor};

use super::{python, TaskError, TaskResult};

/// Run a manage.py subcommand from the virtualenv
pub fn manage(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    cmd: &str,
) -> Result<CommandOutput, TaskError> {
    python::python(ctx, exec, &format!("manage.py {}", cmd))
}

/// The `django <cmd>` CLI task: log and run an arbitrary subcommand
pub fn run_manage(ctx: &DeploymentContext, exec: &dyn Executor, cmd: &str) -> TaskResult {
    ctx.reporter().info(&format!("django manage {}", cmd));
    manage(ctx, exec, cmd)?;
    Ok(())
}

/// Render the stage's settings template and upload it as
/// `<project_dir>/<project_name>/local_settings.py`.
///
/// Deploying a stage without a settings template is a configuration error.
pub fn setup_settings(
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    let name = format!("{}_settings.py", ctx.stage());
    if !store.exists(&name) {
        return Err(TaskError::MissingSettings {
            stage: ctx.stage().to_string(),
            path: store.dir().join(&name).to_string_lossy().into_owned(),
        });
    }

    let project_dir = ctx.project_dir()?;
    let mut vars = HashMap::new();
    vars.insert("project_dir".to_string(), project_dir.clone());

    let rendered = ctx.render_template(&store.read_raw(&name)?, &vars)?;
    let dest = PathBuf::from(&project_dir)
        .join(ctx.project_name())
        .join("local_settings.py");
    exec.upload(&dest.to_string_lossy(), &rendered)?;

    ctx.reporter().info("configured django settings");
    Ok(())
}

/// Apply database migrations. When the normal migration command fails the
/// task falls back to `--fake` with a warning instead of aborting the run.
pub fn migrate(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    let reporter = ctx.reporter();
    match manage(ctx, exec, "migrate --noinput") {
        Ok(_) => {
            reporter.info("django migrated");
            Ok(())
        }
        Err(TaskError::Exec(e)) => {
            reporter.warn(&format!("had to fake migrations: {}", e));
            manage(ctx, exec, "migrate --noinput --fake")?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Link static assets into the static root
pub fn collectstatic(ctx: &DeploymentContext, exec: &dyn Executor) -> TaskResult {
    ctx.reporter().info("django collect static");
    manage(ctx, exec, "collectstatic --noinput --link -v 0")?;
    Ok(())
}
