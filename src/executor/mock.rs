//! Mock executor
//!
//! Scriptable in-process executor for tests: records every command, serves
//! file contents from an in-memory filesystem, and injects failures by
//! command substring.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{shell_quote, CommandOutput, ExecError, Executor};

/// A command issued against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Whether the command ran as root
    pub sudo: bool,
    pub cmd: String,
}

#[derive(Debug)]
struct FailureRule {
    substring: String,
    status: i32,
    /// None = fail every match; Some(n) = fail the next n matches
    remaining: Option<u32>,
}

/// Scriptable executor for tests
pub struct MockExecutor {
    host: String,
    commands: Arc<Mutex<Vec<RecordedCommand>>>,
    files: Arc<Mutex<HashMap<String, String>>>,
    failures: Arc<Mutex<Vec<FailureRule>>>,
}

impl MockExecutor {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            commands: Arc::new(Mutex::new(Vec::new())),
            files: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Place a file on the mock host
    pub fn put_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files
            .lock()
            .expect("mock files lock")
            .insert(path.into(), content.into());
    }

    /// File content previously uploaded or placed, if any
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().expect("mock files lock").get(path).cloned()
    }

    /// Fail every command containing `substring` with `status`
    pub fn fail_on(&self, substring: impl Into<String>, status: i32) {
        self.failures.lock().expect("mock failures lock").push(FailureRule {
            substring: substring.into(),
            status,
            remaining: None,
        });
    }

    /// Fail only the next command containing `substring`
    pub fn fail_once(&self, substring: impl Into<String>, status: i32) {
        self.failures.lock().expect("mock failures lock").push(FailureRule {
            substring: substring.into(),
            status,
            remaining: Some(1),
        });
    }

    /// All commands issued so far
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().expect("mock commands lock").clone()
    }

    /// Number of issued commands containing `substring`
    pub fn count_matching(&self, substring: &str) -> usize {
        self.commands
            .lock()
            .expect("mock commands lock")
            .iter()
            .filter(|c| c.cmd.contains(substring))
            .count()
    }

    fn record(&self, sudo: bool, cmd: &str) {
        self.commands.lock().expect("mock commands lock").push(RecordedCommand {
            sudo,
            cmd: cmd.to_string(),
        });
    }

    fn injected_failure(&self, cmd: &str) -> Option<i32> {
        let mut failures = self.failures.lock().expect("mock failures lock");
        for rule in failures.iter_mut() {
            if !cmd.contains(&rule.substring) {
                continue;
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut n) => {
                    *n -= 1;
                    return Some(rule.status);
                }
                None => return Some(rule.status),
            }
        }
        None
    }

    fn dispatch(&self, sudo: bool, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.record(sudo, cmd);

        if let Some(status) = self.injected_failure(cmd) {
            return Ok(CommandOutput {
                status,
                stdout: String::new(),
                stderr: format!("mock failure for: {}", cmd),
            });
        }

        // `test -e` and `cat` consult the in-memory filesystem so the
        // Executor-provided exists()/read_file() work unscripted.
        if let Some(path) = strip_quoted_arg(cmd, "test -e ") {
            let found = self.files.lock().expect("mock files lock").contains_key(&path);
            return Ok(CommandOutput {
                status: if found { 0 } else { 1 },
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        if let Some(path) = strip_quoted_arg(cmd, "cat ") {
            let files = self.files.lock().expect("mock files lock");
            return match files.get(&path) {
                Some(content) => Ok(CommandOutput {
                    status: 0,
                    stdout: content.clone(),
                    stderr: String::new(),
                }),
                None => Ok(CommandOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: format!("cat: {}: No such file or directory", path),
                }),
            };
        }

        Ok(CommandOutput {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

impl Executor for MockExecutor {
    fn host(&self) -> &str {
        &self.host
    }

    fn try_run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.dispatch(false, cmd)
    }

    fn try_sudo(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.dispatch(true, cmd)
    }

    fn upload(&self, dest: &str, content: &str) -> Result<(), ExecError> {
        self.record(true, &format!("upload {}", shell_quote(dest)));
        if let Some(status) = self.injected_failure(&format!("upload {}", dest)) {
            return Err(ExecError::CommandFailed {
                host: self.host.clone(),
                cmd: format!("upload {}", dest),
                status,
                stderr: "mock upload failure".to_string(),
            });
        }
        self.put_file(dest, content);
        Ok(())
    }
}

/// Extract the single-quoted argument after `prefix`, if the command matches
fn strip_quoted_arg(cmd: &str, prefix: &str) -> Option<String> {
    let rest = cmd.strip_prefix(prefix)?;
    let rest = rest.strip_prefix('\'')?;
    let end = rest.rfind('\'')?;
    Some(rest[..end].replace(r"'\''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_commands_in_order() {
        let exec = MockExecutor::new("web1");
        exec.run("echo one").unwrap();
        exec.sudo("mkdir -p /var/www").unwrap();

        let commands = exec.commands();
        assert_eq!(commands.len(), 2);
        assert!(!commands[0].sudo);
        assert!(commands[1].sudo);
        assert_eq!(commands[1].cmd, "mkdir -p /var/www");
    }

    #[test]
    fn test_fail_once_only_fails_first_match() {
        let exec = MockExecutor::new("web1");
        exec.fail_once("migrate", 1);

        assert!(exec.run("manage.py migrate").is_err());
        assert!(exec.run("manage.py migrate --fake").is_ok());
    }

    #[test]
    fn test_upload_lands_in_files() {
        let exec = MockExecutor::new("web1");
        exec.upload("/etc/nginx/sites-enabled/app", "server {}").unwrap();
        assert_eq!(exec.file("/etc/nginx/sites-enabled/app").unwrap(), "server {}");
    }

    #[test]
    fn test_strip_quoted_arg() {
        assert_eq!(
            strip_quoted_arg("test -e '/var/www/.git'", "test -e "),
            Some("/var/www/.git".to_string())
        );
        assert_eq!(strip_quoted_arg("ls", "test -e "), None);
    }
}
