use crate::config;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, instrument};

/// Environment variable that hands a run directory to a reattaching worker.
pub const RUN_DIR_ENV: &str = "LONGRUN_RUN_DIR";

/// Exit code recorded when a step could not be launched at all.
pub const LAUNCH_FAILURE_CODE: i32 = 127;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("no interpreter configured")]
    NoShell,
    #[error("open log {}: {source}", path.display())]
    OpenLog { path: PathBuf, source: io::Error },
    #[error("run command: {0}")]
    Spawn(io::Error),
    #[error("wait command: {0}")]
    Wait(io::Error),
}

pub trait CommandRunner {
    fn run(&self, command: &str, log_path: &Path) -> Result<i32, RunnerError>;
}

#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: Vec<String>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(config::default_shell())
    }
}

impl ShellRunner {
    pub fn new(shell: Vec<String>) -> Self {
        Self { shell }
    }

    fn build_command(&self, text: &str) -> Result<Command, RunnerError> {
        let Some(program) = self.shell.first() else {
            return Err(RunnerError::NoShell);
        };

        let mut cmd = Command::new(program);
        cmd.args(&self.shell[1..]).arg(text);
        cmd.env_remove(RUN_DIR_ENV);
        Ok(cmd)
    }
}

impl CommandRunner for ShellRunner {
    #[instrument(skip_all, fields(log = %log_path.display()))]
    fn run(&self, command: &str, log_path: &Path) -> Result<i32, RunnerError> {
        let log = open_log(log_path)?;
        let err_log = log.try_clone().map_err(|source| RunnerError::OpenLog {
            path: log_path.to_path_buf(),
            source,
        })?;

        let mut cmd = self.build_command(command)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log));

        debug!("spawning command");
        let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;
        let status = child.wait().map_err(RunnerError::Wait)?;

        let code = exit_code(status);
        debug!(exit_code = code, "command finished");
        Ok(code)
    }
}

pub fn open_log(path: &Path) -> Result<File, RunnerError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RunnerError::OpenLog {
            path: path.to_path_buf(),
            source,
        })
}

/// The process exit code, or `128 + signal` for a child killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
