//! Status output
//!
//! Every task emits a prefixed status line `<project>:<stage>> <message>`.
//! Colors are applied only when stdout is a terminal.

use crossterm::style::Stylize;
use is_terminal::IsTerminal;

/// Prefixed status-line writer for one (project, stage) pair
#[derive(Debug, Clone)]
pub struct Reporter {
    project: String,
    stage: String,
    color: bool,
}

impl Reporter {
    pub fn new(project: &str, stage: &str) -> Self {
        Self {
            project: project.to_string(),
            stage: stage.to_string(),
            color: std::io::stdout().is_terminal(),
        }
    }

    /// Force colors on or off (tests, --no-color)
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn prefix(&self) -> String {
        if self.color {
            format!("{}:{}>", self.project.as_str().blue(), self.stage.as_str().cyan())
        } else {
            format!("{}:{}>", self.project, self.stage)
        }
    }

    /// Normal progress line (green)
    pub fn info(&self, message: &str) {
        if self.color {
            println!("{} {}", self.prefix(), message.green());
        } else {
            println!("{} {}", self.prefix(), message);
        }
    }

    /// Recoverable problem (yellow)
    pub fn warn(&self, message: &str) {
        if self.color {
            println!("{} {}", self.prefix(), message.yellow());
        } else {
            println!("{} WARNING: {}", self.prefix(), message);
        }
    }

    /// Failure line (red, stderr)
    pub fn error(&self, message: &str) {
        if self.color {
            eprintln!("{} {}", self.prefix(), message.red());
        } else {
            eprintln!("{} ERROR: {}", self.prefix(), message);
        }
    }
}

/// Print a fatal diagnostic in red to stderr
pub fn fatal(message: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("{}", message.red());
    } else {
        eprintln!("{}", message);
    }
}
