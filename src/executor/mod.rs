//! Remote execution seam
//!
//! Abstracts the remote shell channel for testability. Provides:
//! - Executor trait: the command surface tasks run against
//! - SshExecutor: real SSH connection for production
//! - MockExecutor: scriptable in-process executor for unit tests

mod mock;
mod ssh;

pub use mock::{MockExecutor, RecordedCommand};
pub use ssh::{SshExecutor, SshOptions, SshTarget};

/// Output of a completed remote command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit status
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Remote execution errors
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn ssh: {0}")]
    Spawn(String),

    #[error("command failed on {host} (exit {status}): {cmd}")]
    CommandFailed {
        host: String,
        cmd: String,
        status: i32,
        stderr: String,
    },

    #[error("I/O error talking to {host}: {source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("non-UTF-8 output from remote command on {0}")]
    Utf8(String),
}

/// Command surface for a single remote host.
///
/// `try_run`/`try_sudo` report the raw exit status; the provided `run`/`sudo`
/// wrappers turn a non-zero status into `ExecError::CommandFailed`, which is
/// what tasks want almost everywhere.
pub trait Executor: Send + Sync {
    /// The host this executor is bound to
    fn host(&self) -> &str;

    /// Execute a command, returning output regardless of exit status
    fn try_run(&self, cmd: &str) -> Result<CommandOutput, ExecError>;

    /// Execute a command as root, returning output regardless of exit status
    fn try_sudo(&self, cmd: &str) -> Result<CommandOutput, ExecError>;

    /// Write `content` to `dest` on the host (as root)
    fn upload(&self, dest: &str, content: &str) -> Result<(), ExecError>;

    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        expect_success(self.host(), cmd, self.try_run(cmd)?)
    }

    fn sudo(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        expect_success(self.host(), cmd, self.try_sudo(cmd)?)
    }

    /// Whether a path exists on the host
    fn exists(&self, path: &str) -> Result<bool, ExecError> {
        let output = self.try_sudo(&format!("test -e {}", shell_quote(path)))?;
        Ok(output.success())
    }

    /// Read a file's contents from the host
    fn read_file(&self, path: &str) -> Result<String, ExecError> {
        Ok(self.sudo(&format!("cat {}", shell_quote(path)))?.stdout)
    }
}

fn expect_success(
    host: &str,
    cmd: &str,
    output: CommandOutput,
) -> Result<CommandOutput, ExecError> {
    if output.success() {
        Ok(output)
    } else {
        Err(ExecError::CommandFailed {
            host: host.to_string(),
            cmd: cmd.to_string(),
            status: output.status,
            stderr: output.stderr,
        })
    }
}

/// Single-quote a string for the remote shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
