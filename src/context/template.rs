//! Template store
//!
//! Loads named YAML documents and raw uploadable templates from the project
//! template directory (`dploy/` by convention). The two context templates
//! bundled with the tool are embedded at compile time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml_ng::Value;

/// Built-in default context: layer 1 of every merge.
pub const DEFAULT_CONTEXT: &str = include_str!("../../templates/context_default.yml");

/// Seed document for `create-context`, edited and uploaded per host.
pub const REMOTE_CONTEXT: &str = include_str!("../../templates/context_remote.yml");

/// Template loading errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("invalid YAML in template {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to read template {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Loads templates from a fixed directory. Pure reads; callers that need
/// caching wrap it.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The template directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a named template exists
    pub fn exists(&self, name: &str) -> bool {
        self.dir.join(name).is_file()
    }

    /// Read a template's raw text without parsing
    pub fn read_raw(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            name: name.to_string(),
            source,
        })
    }

    /// Load a named YAML template into a structured value
    pub fn load(&self, name: &str) -> Result<Value, TemplateError> {
        let text = self.read_raw(name)?;
        parse_named(name, &text)
    }

    /// Parse the built-in default context template
    pub fn builtin_default() -> Result<Value, TemplateError> {
        parse_named("context_default.yml", DEFAULT_CONTEXT)
    }

    /// Parse the built-in remote context template
    pub fn builtin_remote() -> Result<Value, TemplateError> {
        parse_named("context_remote.yml", REMOTE_CONTEXT)
    }
}

fn parse_named(name: &str, text: &str) -> Result<Value, TemplateError> {
    serde_yaml_ng::from_str(text).map_err(|source| TemplateError::Parse {
        name: name.to_string(),
        source,
    })
}
