//! Layered configuration resolution
//!
//! Implements the four-layer context merge:
//! 1. Built-in default template (bundled)
//! 2. Project `global` section (dploy.yml)
//! 3. Project `stages.<stage>` section (dploy.yml)
//! 4. Per-host remote context (fetched from the control path)

mod cache;
mod layer;
mod merge;
mod render;
mod resolver;
mod template;

pub use cache::ContextCache;
pub use layer::{LayerOrigin, LayerSource};
pub use merge::{deep_merge, merge_layers};
pub use render::render;
pub use resolver::{ContextError, DeploymentContext, REMOTE_CONTEXT_ROOT};
pub use template::{TemplateError, TemplateStore, DEFAULT_CONTEXT, REMOTE_CONTEXT};
