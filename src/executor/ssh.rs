//! SSH executor
//!
//! Executes remote commands by shelling out to the system `ssh` binary with
//! BatchMode and keepalive options. Uploads stream file content over stdin
//! into a remote temp file which is then moved into place as root.

use std::io::Write;
use std::process::{Command, Stdio};

use super::{shell_quote, CommandOutput, ExecError, Executor};

/// SSH connection options
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u32,
    /// Server alive interval for detecting dead connections
    pub server_alive_interval: u32,
    /// Server alive count max
    pub server_alive_count_max: u32,
    /// Path to SSH private key
    pub key_path: Option<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            server_alive_interval: 15,
            server_alive_count_max: 2,
            key_path: None,
        }
    }
}

/// A parsed `[user@]host[:port]` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    /// Parse a host entry from the context's `hosts` sequence.
    ///
    /// Defaults: user `root`, port 22.
    pub fn parse(entry: &str) -> Self {
        let (user, rest) = match entry.split_once('@') {
            Some((user, rest)) => (user.to_string(), rest),
            None => ("root".to_string(), entry),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (rest.to_string(), 22),
            },
            None => (rest.to_string(), 22),
        };
        Self { user, host, port }
    }
}

impl std::fmt::Display for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// SSH executor for production use
pub struct SshExecutor {
    target: SshTarget,
    options: SshOptions,
}

impl SshExecutor {
    /// Create an executor for a parsed target
    pub fn new(target: SshTarget, options: SshOptions) -> Self {
        Self { target, options }
    }

    /// Create an executor from a `[user@]host[:port]` entry
    pub fn from_entry(entry: &str, options: SshOptions) -> Self {
        Self::new(SshTarget::parse(entry), options)
    }

    /// Build SSH command arguments up to and including the destination
    fn build_ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout_seconds),
            "-o".to_string(),
            format!("ServerAliveInterval={}", self.options.server_alive_interval),
            "-o".to_string(),
            format!("ServerAliveCountMax={}", self.options.server_alive_count_max),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.target.port.to_string(),
        ];

        if let Some(ref key_path) = self.options.key_path {
            args.push("-i".to_string());
            args.push(key_path.clone());
        }

        args.push(format!("{}@{}", self.target.user, self.target.host));
        args
    }

    fn execute(&self, remote_cmd: &str, stdin_content: Option<&str>) -> Result<CommandOutput, ExecError> {
        let mut args = self.build_ssh_args();
        args.push(remote_cmd.to_string());

        let mut child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {}", self.target.host, e)))?;

        if let Some(content) = stdin_content {
            if let Some(ref mut stdin) = child.stdin {
                stdin
                    .write_all(content.as_bytes())
                    .map_err(|source| ExecError::Io {
                        host: self.target.host.clone(),
                        source,
                    })?;
            }
        }
        drop(child.stdin.take());

        let output = child.wait_with_output().map_err(|source| ExecError::Io {
            host: self.target.host.clone(),
            source,
        })?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| ExecError::Utf8(self.target.host.clone()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

impl Executor for SshExecutor {
    fn host(&self) -> &str {
        &self.target.host
    }

    fn try_run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.execute(cmd, None)
    }

    fn try_sudo(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.execute(&format!("sudo -n -- sh -c {}", shell_quote(cmd)), None)
    }

    fn upload(&self, dest: &str, content: &str) -> Result<(), ExecError> {
        let cmd = format!(
            r#"t=$(mktemp) && cat > "$t" && sudo -n mv "$t" {}"#,
            shell_quote(dest)
        );
        let output = self.execute(&cmd, Some(content))?;
        if output.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                host: self.target.host.clone(),
                cmd: format!("upload {}", dest),
                status: output.status,
                stderr: output.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse_full() {
        let target = SshTarget::parse("deploy@web1.example.com:2222");
        assert_eq!(target.user, "deploy");
        assert_eq!(target.host, "web1.example.com");
        assert_eq!(target.port, 2222);
    }

    #[test]
    fn test_target_parse_defaults() {
        let target = SshTarget::parse("web1.example.com");
        assert_eq!(target.user, "root");
        assert_eq!(target.host, "web1.example.com");
        assert_eq!(target.port, 22);
    }

    #[test]
    fn test_target_parse_bad_port_kept_as_host() {
        // IPv6-ish or odd entries fall back to the whole string as host
        let target = SshTarget::parse("web1:abc");
        assert_eq!(target.host, "web1:abc");
        assert_eq!(target.port, 22);
    }

    #[test]
    fn test_ssh_args_include_batch_mode() {
        let exec = SshExecutor::from_entry("deploy@web1:2222", SshOptions::default());
        let args = exec.build_ssh_args();
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"2222".to_string()));
        assert_eq!(args.last().unwrap(), "deploy@web1");
    }

    #[test]
    fn test_ssh_args_include_identity_file() {
        let options = SshOptions {
            key_path: Some("~/.ssh/deploy".to_string()),
            ..Default::default()
        };
        let exec = SshExecutor::from_entry("web1", options);
        let args = exec.build_ssh_args();
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"~/.ssh/deploy".to_string()));
    }
}
