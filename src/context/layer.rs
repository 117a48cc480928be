//! Layer provenance
//!
//! Records where each contributing context layer came from, including a
//! digest of the raw file bytes for file-backed layers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Origin of a context layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrigin {
    /// Built-in default template bundled with the tool
    Builtin,
    /// `global` section of dploy.yml
    ProjectGlobal,
    /// `stages.<stage>` section of dploy.yml
    Stage,
    /// Per-host override fetched from the control path
    RemoteHost,
}

impl LayerOrigin {
    /// Returns the string representation of the origin
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerOrigin::Builtin => "builtin",
            LayerOrigin::ProjectGlobal => "project_global",
            LayerOrigin::Stage => "stage",
            LayerOrigin::RemoteHost => "remote_host",
        }
    }
}

impl std::fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A contributing context layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSource {
    /// Origin of this layer
    pub origin: LayerOrigin,

    /// File or remote path (None for builtin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw bytes (None for builtin or absent remote files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl LayerSource {
    /// Provenance record for the built-in default template
    pub fn builtin() -> Self {
        Self {
            origin: LayerOrigin::Builtin,
            path: None,
            digest: None,
        }
    }

    /// Provenance record for a file-backed layer
    pub fn from_bytes(origin: LayerOrigin, path: impl Into<String>, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            origin,
            path: Some(path.into()),
            digest: Some(hex::encode(hasher.finalize())),
        }
    }

    /// Provenance record for a remote path that did not exist
    pub fn absent(origin: LayerOrigin, path: impl Into<String>) -> Self {
        Self {
            origin,
            path: Some(path.into()),
            digest: None,
        }
    }
}
