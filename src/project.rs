//! Project configuration file
//!
//! Parses `dploy.yml`: a `global` section merged for all stages and a
//! `stages` mapping of per-stage overrides. Both sections are free-form
//! context trees; validation of individual values happens at resolve time.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml_ng::Value;

use crate::context::{LayerOrigin, LayerSource};

/// Default project file name, looked up in the working directory
pub const PROJECT_FILE: &str = "dploy.yml";

/// Errors loading the project file
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    global: Value,
    #[serde(default)]
    stages: BTreeMap<String, Value>,
}

/// Parsed project configuration
#[derive(Debug)]
pub struct ProjectConfig {
    path: PathBuf,
    digest: String,
    global: Value,
    stages: BTreeMap<String, Value>,
}

impl ProjectConfig {
    /// Load and parse the project file at `path`
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        if !path.is_file() {
            return Err(ProjectError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_with_path(&content, path)
    }

    /// Parse project file content (used by tests and `load`)
    pub fn parse(content: &str) -> Result<Self, ProjectError> {
        Self::parse_with_path(content, Path::new(PROJECT_FILE))
    }

    fn parse_with_path(content: &str, path: &Path) -> Result<Self, ProjectError> {
        let file: ProjectFile =
            serde_yaml_ng::from_str(content).map_err(|source| ProjectError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let source = LayerSource::from_bytes(
            LayerOrigin::ProjectGlobal,
            path.to_string_lossy(),
            content.as_bytes(),
        );
        Ok(Self {
            path: path.to_path_buf(),
            digest: source.digest.unwrap_or_default(),
            global: file.global,
            stages: file.stages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `global` section (null when the section is absent or empty)
    pub fn global(&self) -> &Value {
        &self.global
    }

    /// The override tree for a stage, if the stage is defined
    pub fn stage(&self, name: &str) -> Option<&Value> {
        self.stages.get(name)
    }

    /// Defined stage names, sorted
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Provenance record for this file contributing as `origin`
    pub fn layer_source(&self, origin: LayerOrigin) -> LayerSource {
        LayerSource {
            origin,
            path: Some(self.path.to_string_lossy().to_string()),
            digest: Some(self.digest.clone()),
        }
    }
}
