//! Deployment context resolution
//!
//! The `DeploymentContext` owns the effective configuration for a run. It is
//! built once when a stage is selected (built-in defaults + project `global`
//! + `stages.<stage>`), augmented exactly once with the per-host remote
//! layer when a live host is bound, and answers all dotted-path lookups for
//! the remainder of the run.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_yaml_ng::Value;

use crate::executor::{ExecError, Executor};
use crate::project::{ProjectConfig, ProjectError};
use crate::ui::Reporter;

use super::cache::ContextCache;
use super::layer::{LayerOrigin, LayerSource};
use super::merge::{deep_merge, merge_layers};
use super::render;
use super::template::{TemplateError, TemplateStore};

/// Remote directory holding per-host context files
pub const REMOTE_CONTEXT_ROOT: &str = "/root/.context";

/// Chained value references deeper than this are treated as a cycle
const MAX_REFERENCE_DEPTH: usize = 16;

/// Context resolution errors. Path errors are fatal by design: a missing or
/// untraversable path names a broken deployment configuration and is never
/// silently defaulted.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("stage '{0}' is not defined in the project file")]
    UndefinedStage(String),

    #[error("configuration error: {0}")]
    BadPath(String),

    #[error("configuration value at '{path}' is not a {expected}")]
    WrongType { path: String, expected: &'static str },

    #[error("reference cycle while rendering '{0}'")]
    ReferenceCycle(String),

    #[error("invalid reference in '{text}': {reason}")]
    BadReference { text: String, reason: String },

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("invalid YAML in remote context {path}: {source}")]
    RemoteParse {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to fetch remote context: {0}")]
    Remote(#[from] ExecError),
}

/// Effective configuration for one run of one stage.
///
/// State machine: `StageSelected` on construction, `HostContextMerged` after
/// the first `bind_host`. There is no transition back; a run selects exactly
/// one stage.
pub struct DeploymentContext {
    project: String,
    stage: String,
    host: Option<String>,
    effective: Value,
    host_layer_merged: bool,
    cache: ContextCache,
    sources: Vec<LayerSource>,
    computed_at: DateTime<Utc>,
}

impl DeploymentContext {
    /// Build the effective context for `stage`.
    ///
    /// Merges, in order: the built-in default template, the project `global`
    /// section, and the project's `stages.<stage>` section. A stage name
    /// absent from the project file is a hard error.
    pub fn select_stage(project: &ProjectConfig, stage: &str) -> Result<Self, ContextError> {
        let stage_layer = project
            .stage(stage)
            .ok_or_else(|| ContextError::UndefinedStage(stage.to_string()))?
            .clone();

        let builtin = TemplateStore::builtin_default()?;
        let effective = merge_layers(vec![builtin, project.global().clone(), stage_layer]);

        let sources = vec![
            LayerSource::builtin(),
            project.layer_source(LayerOrigin::ProjectGlobal),
            project.layer_source(LayerOrigin::Stage),
        ];

        let mut ctx = Self {
            project: String::new(),
            stage: stage.to_string(),
            host: None,
            effective,
            host_layer_merged: false,
            cache: ContextCache::new(),
            sources,
            computed_at: Utc::now(),
        };
        ctx.project = ctx.resolve_str("django.project_name")?;
        Ok(ctx)
    }

    pub fn project_name(&self) -> &str {
        &self.project
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The fully merged configuration tree
    pub fn effective(&self) -> &Value {
        &self.effective
    }

    /// Contributing layers in precedence order
    pub fn sources(&self) -> &[LayerSource] {
        &self.sources
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    /// Status-line reporter prefixed with this run's project and stage
    pub fn reporter(&self) -> Reporter {
        Reporter::new(&self.project, &self.stage)
    }

    /// Control path of the per-host context file for this run
    pub fn remote_context_path(&self) -> String {
        format!("{}/{}/{}.yml", REMOTE_CONTEXT_ROOT, self.project, self.stage)
    }

    /// Bind a live host and merge its remote context layer.
    ///
    /// The remote file is fetched through the per-run cache, so repeated
    /// binds (multi-host stages) fetch at most once; an absent file merges
    /// as an empty mapping with a warning.
    pub fn bind_host(&mut self, host: &str, executor: &dyn Executor) -> Result<(), ContextError> {
        self.host = Some(host.to_string());
        if self.host_layer_merged {
            return Ok(());
        }

        let path = self.remote_context_path();
        let reporter = Reporter::new(&self.project, &self.stage);
        let mut fetched = None;

        let layer = self
            .cache
            .get_or_fetch(&path, || {
                if executor.exists(&path)? {
                    let text = executor.read_file(&path)?;
                    let value: Value = serde_yaml_ng::from_str(&text).map_err(|source| {
                        ContextError::RemoteParse {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    fetched =
                        Some(LayerSource::from_bytes(LayerOrigin::RemoteHost, &path, text.as_bytes()));
                    reporter.info("fetched host context");
                    Ok(value)
                } else {
                    fetched = Some(LayerSource::absent(LayerOrigin::RemoteHost, &path));
                    reporter.warn(&format!("context file not found: {}", path));
                    Ok(Value::Mapping(Default::default()))
                }
            })?
            .clone();

        if let Some(source) = fetched {
            self.sources.push(source);
        }
        self.effective = deep_merge(std::mem::take(&mut self.effective), layer);
        self.host_layer_merged = true;
        Ok(())
    }

    /// Resolve a dotted path to its value.
    ///
    /// String leaves are rendered through the deferred-reference renderer;
    /// structured values are returned as-is. The reserved paths `stage` and
    /// `project_dir` short-circuit the tree walk.
    pub fn resolve(&self, path: &str) -> Result<Value, ContextError> {
        self.resolve_depth(path, 0)
    }

    /// Resolve a path expecting a scalar, stringified
    pub fn resolve_str(&self, path: &str) -> Result<String, ContextError> {
        let value = self.resolve(path)?;
        scalar_to_string(path, &value)
    }

    /// Like `resolve_str`, but a null value maps to `None`
    pub fn resolve_opt_str(&self, path: &str) -> Result<Option<String>, ContextError> {
        match self.resolve(path)? {
            Value::Null => Ok(None),
            value => Ok(Some(scalar_to_string(path, &value)?)),
        }
    }

    /// Resolve a path expecting a sequence of scalars
    pub fn resolve_str_seq(&self, path: &str) -> Result<Vec<String>, ContextError> {
        match self.resolve(path)? {
            Value::Sequence(items) => items
                .iter()
                .map(|item| scalar_to_string(path, item))
                .collect(),
            _ => Err(ContextError::WrongType {
                path: path.to_string(),
                expected: "sequence",
            }),
        }
    }

    /// Hosts targeted by the selected stage
    pub fn hosts(&self) -> Result<Vec<String>, ContextError> {
        self.resolve_str_seq("hosts")
    }

    /// `nginx.document_root` joined with `git.dir`
    pub fn project_dir(&self) -> Result<String, ContextError> {
        self.project_dir_depth(0)
    }

    /// Render uploadable template text against the context. `vars` supplies
    /// extra bare-name variables that take precedence over context lookups.
    pub fn render_template(
        &self,
        text: &str,
        vars: &HashMap<String, String>,
    ) -> Result<String, ContextError> {
        self.render_depth(text, vars, 0)
    }

    fn resolve_depth(&self, path: &str, depth: usize) -> Result<Value, ContextError> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(ContextError::ReferenceCycle(path.to_string()));
        }
        match path {
            "stage" => Ok(Value::String(self.stage.clone())),
            "project_dir" => Ok(Value::String(self.project_dir_depth(depth)?)),
            _ => match self.walk(path)? {
                Value::String(raw) => Ok(Value::String(self.render_depth(
                    raw,
                    &HashMap::new(),
                    depth,
                )?)),
                other => Ok(other.clone()),
            },
        }
    }

    fn project_dir_depth(&self, depth: usize) -> Result<String, ContextError> {
        let root = self.resolve_str_depth("nginx.document_root", depth + 1)?;
        let dir = self.resolve_str_depth("git.dir", depth + 1)?;
        Ok(PathBuf::from(root).join(dir).to_string_lossy().into_owned())
    }

    fn resolve_str_depth(&self, path: &str, depth: usize) -> Result<String, ContextError> {
        let value = self.resolve_depth(path, depth)?;
        scalar_to_string(path, &value)
    }

    fn render_depth(
        &self,
        raw: &str,
        vars: &HashMap<String, String>,
        depth: usize,
    ) -> Result<String, ContextError> {
        render::render(raw, vars, &mut |reference| {
            self.resolve_str_depth(reference, depth + 1)
        })
    }

    /// Walk the effective tree mapping-by-mapping, front token first
    fn walk(&self, path: &str) -> Result<&Value, ContextError> {
        let mut current = &self.effective;
        for token in path.split('.') {
            let mapping = current
                .as_mapping()
                .ok_or_else(|| ContextError::BadPath(path.to_string()))?;
            current = mapping
                .iter()
                .find(|(key, _)| key.as_str() == Some(token))
                .map(|(_, value)| value)
                .ok_or_else(|| ContextError::BadPath(path.to_string()))?;
        }
        Ok(current)
    }
}

fn scalar_to_string(path: &str, value: &Value) -> Result<String, ContextError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ContextError::WrongType {
            path: path.to_string(),
            expected: "scalar",
        }),
    }
}
