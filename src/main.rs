//! dploy CLI
//!
//! Entry point for the `dploy` command-line tool.

use clap::{Parser, Subcommand};
use dploy::context::{DeploymentContext, TemplateStore};
use dploy::executor::{Executor, SshExecutor, SshOptions};
use dploy::project::ProjectConfig;
use dploy::tasks::{self, TaskError, TaskResult};
use dploy::ui;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "dploy")]
#[command(about = "Stage-driven remote deployment automation", version)]
struct Cli {
    /// Stage to deploy (must be declared in the project file)
    stage: String,

    /// Path to the project configuration file
    #[arg(long, short = 'c', default_value = "dploy.yml")]
    config: PathBuf,

    /// Directory holding project templates (cron, uwsgi, nginx, settings)
    #[arg(long, short = 't', default_value = "dploy")]
    templates: PathBuf,

    /// Run against a single host instead of every host in the stage
    #[arg(long)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full deployment sequence on every host
    Deploy,

    /// Create application, static, media, log and socket directories
    CreateDirs,

    /// Clone or update the project checkout
    Checkout,

    /// Create the virtualenv and install requirements
    SetupVirtualenv,

    /// Install pinned requirements into the virtualenv
    InstallRequirements,

    /// Upgrade requirements to their latest allowed versions
    UpdateRequirements,

    /// Render and upload the stage settings file
    SetupSettings,

    /// Apply database migrations, faking them if the real run fails
    Migrate,

    /// Collect static assets
    Collectstatic,

    /// Run an arbitrary manage.py command
    Django {
        /// Arguments passed through to manage.py
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },

    /// Install the project cron file
    SetupCron,

    /// Render and upload the uwsgi configuration
    SetupUwsgi,

    /// Render and upload the nginx site configuration
    SetupNginx,

    /// Render and upload the supervisor program configuration
    SetupSupervisor,

    /// Report whether nginx, uwsgi and supervisor are running
    CheckServices,

    /// Install system packages listed in the context
    InstallPackages,

    /// Print the resolved context for this stage
    PrintContext {
        /// Output as JSON instead of annotated YAML
        #[arg(long)]
        json: bool,
    },

    /// Author and upload a remote context file for each host
    CreateContext,
}

fn main() {
    let cli = Cli::parse();

    let project = match ProjectConfig::load(&cli.config) {
        Ok(project) => project,
        Err(err) => {
            ui::fatal(&err.to_string());
            process::exit(1);
        }
    };

    let store = TemplateStore::new(&cli.templates);

    if let Commands::PrintContext { json } = &cli.command {
        let json = *json;
        run_local(&project, &cli.stage, |ctx| tasks::print_context(ctx, json));
        return;
    }

    run_on_hosts(&project, &cli.stage, cli.host.as_deref(), |ctx, exec| {
        dispatch(&cli.command, ctx, exec, &store)
    });
}

fn dispatch(
    command: &Commands,
    ctx: &DeploymentContext,
    exec: &dyn Executor,
    store: &TemplateStore,
) -> TaskResult {
    match command {
        Commands::Deploy => tasks::deploy(ctx, exec, store),
        Commands::CreateDirs => tasks::create_dirs(ctx, exec),
        Commands::Checkout => tasks::checkout(ctx, exec),
        Commands::SetupVirtualenv => tasks::setup_virtualenv(ctx, exec),
        Commands::InstallRequirements => tasks::install_requirements(ctx, exec),
        Commands::UpdateRequirements => tasks::update_requirements(ctx, exec),
        Commands::SetupSettings => tasks::setup_settings(ctx, exec, store),
        Commands::Migrate => tasks::migrate(ctx, exec),
        Commands::Collectstatic => tasks::collectstatic(ctx, exec),
        Commands::Django { args } => tasks::run_manage(ctx, exec, &args.join(" ")),
        Commands::SetupCron => tasks::setup_cron(ctx, exec, store),
        Commands::SetupUwsgi => tasks::setup_uwsgi(ctx, exec, store),
        Commands::SetupNginx => tasks::setup_nginx(ctx, exec, store),
        Commands::SetupSupervisor => tasks::setup_supervisor(ctx, exec, store),
        Commands::CheckServices => tasks::check_services(ctx, exec),
        Commands::InstallPackages => tasks::install_packages(ctx, exec),
        Commands::CreateContext => tasks::create_context(ctx, exec),
        Commands::PrintContext { .. } => unreachable!("handled before host dispatch"),
    }
}

/// Run a task that needs the merged stage context but no remote connection.
fn run_local<F>(project: &ProjectConfig, stage: &str, task: F)
where
    F: FnOnce(&DeploymentContext) -> TaskResult,
{
    let ctx = match DeploymentContext::select_stage(project, stage) {
        Ok(ctx) => ctx,
        Err(err) => {
            ui::fatal(&err.to_string());
            process::exit(1);
        }
    };
    if let Err(err) = task(&ctx) {
        fail(err);
    }
}

/// Run a task once per target host, stopping at the first failure.
///
/// Each host gets a freshly merged context so one host's remote layer never
/// leaks into another's.
fn run_on_hosts<F>(project: &ProjectConfig, stage: &str, only_host: Option<&str>, task: F)
where
    F: Fn(&DeploymentContext, &dyn Executor) -> TaskResult,
{
    let hosts = match DeploymentContext::select_stage(project, stage)
        .and_then(|ctx| ctx.hosts())
    {
        Ok(hosts) => hosts,
        Err(err) => {
            ui::fatal(&err.to_string());
            process::exit(1);
        }
    };

    if hosts.is_empty() {
        ui::fatal(&format!("stage '{stage}' has no hosts configured"));
        process::exit(1);
    }

    let selected: Vec<String> = match only_host {
        Some(wanted) => {
            let found = hosts
                .iter()
                .find(|entry| {
                    *entry == wanted || SshExecutor::from_entry(entry, SshOptions::default()).host() == wanted
                })
                .cloned();
            match found {
                Some(entry) => vec![entry],
                None => {
                    ui::fatal(&format!("host '{wanted}' is not part of stage '{stage}'"));
                    process::exit(1);
                }
            }
        }
        None => hosts,
    };

    for entry in &selected {
        let mut ctx = match DeploymentContext::select_stage(project, stage) {
            Ok(ctx) => ctx,
            Err(err) => {
                ui::fatal(&err.to_string());
                process::exit(1);
            }
        };
        let exec = SshExecutor::from_entry(entry, SshOptions::default());
        if let Err(err) = ctx
            .bind_host(exec.host(), &exec)
            .map_err(TaskError::from)
            .and_then(|()| task(&ctx, &exec))
        {
            fail(err);
        }
    }
}

fn fail(err: TaskError) -> ! {
    ui::fatal(&err.to_string());
    process::exit(err.exit_code());
}
