//! Editor round-trip
//!
//! `create-context` opens `$EDITOR` on a temp file seeded with the remote
//! context template, validates the YAML, and asks for confirmation before
//! upload. Parse errors reopen the editor with the broken content preserved.

use std::env;
use std::fs;
use std::io::Write;
use std::process::Command;

use dialoguer::Confirm;

/// Fallback when `$EDITOR` is unset
const DEFAULT_EDITOR: &str = "vim";

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("failed to launch editor '{editor}': {source}")]
    Launch {
        editor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("editor '{editor}' exited with status {status}")]
    Exited { editor: String, status: i32 },

    #[error("I/O error during edit: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Open the editor on `initial`, looping until the result is valid YAML and
/// the user confirms the upload. Returns the final document text.
pub fn edit_yaml(initial: &str) -> Result<String, EditorError> {
    let editor = env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string());
    let mut content = initial.to_string();

    loop {
        content = open_editor(&editor, &content)?;

        println!("{}", "-".repeat(80));
        println!("\n{}\n", content);
        println!("{}", "-".repeat(80));

        if let Err(e) = serde_yaml_ng::from_str::<serde_yaml_ng::Value>(&content) {
            match e.location() {
                Some(loc) => println!(
                    "YAML error at line {} column {}: {}",
                    loc.line(),
                    loc.column(),
                    e
                ),
                None => println!("YAML error: {}", e),
            }
            continue;
        }

        if Confirm::new()
            .with_prompt("Upload this context?")
            .default(true)
            .interact()?
        {
            return Ok(content);
        }
    }
}

fn open_editor(editor: &str, content: &str) -> Result<String, EditorError> {
    let mut file = tempfile::Builder::new()
        .prefix("dploy-context-")
        .suffix(".yml")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;

    let status = Command::new(editor)
        .arg(file.path())
        .status()
        .map_err(|source| EditorError::Launch {
            editor: editor.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(EditorError::Exited {
            editor: editor.to_string(),
            status: status.code().unwrap_or(-1),
        });
    }

    Ok(fs::read_to_string(file.path())?)
}
