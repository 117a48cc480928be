//! dploy - stage-driven remote deployment automation
//!
//! Deploys Django-style web applications to one or more hosts over SSH:
//! checks out code, prepares the virtualenv, renders and uploads config
//! templates, and restarts managed services. All values come from a layered
//! context merge (built-in defaults, project file, per-stage overrides, and
//! a per-host remote context) resolved by dotted path.

pub mod context;
pub mod editor;
pub mod executor;
pub mod project;
pub mod tasks;
pub mod ui;

pub use context::{ContextError, DeploymentContext, TemplateError, TemplateStore};
pub use executor::{ExecError, Executor, MockExecutor, SshExecutor};
pub use project::{ProjectConfig, ProjectError};
pub use tasks::TaskError;
