use crate::model::Run;
use crate::rundir::RunDir;
use crate::runner::{self, RUN_DIR_ENV, RunnerError};
use crate::store::{self, DetachedInfo, StoreError};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum DetachError {
    #[error("locate current executable: {0}")]
    CurrentExe(io::Error),
    #[error(transparent)]
    Log(#[from] RunnerError),
    #[error("start background orchestrator: {0}")]
    Spawn(io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub program: PathBuf,
    pub workspace: PathBuf,
    pub config: Option<PathBuf>,
}

impl Worker {
    pub fn current(workspace: PathBuf, config: Option<PathBuf>) -> Result<Self, DetachError> {
        let program = std::env::current_exe().map_err(DetachError::CurrentExe)?;
        Ok(Self {
            program,
            workspace,
            config,
        })
    }

    pub fn args(&self, run: &Run) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "run".into(),
            "--label".into(),
            run.label.clone().into(),
            "--workspace".into(),
            self.workspace.clone().into(),
        ];
        if let Some(config) = &self.config {
            args.push("--config".into());
            args.push(config.clone().into());
        }
        args.push("--cmd".into());
        args.push(run.main_command.clone().into());
        for followup in &run.followup_commands {
            args.push("--then".into());
            args.push(followup.clone().into());
        }
        args
    }
}

/// Starts the worker for a created run and returns without waiting on it.
pub fn spawn(worker: &Worker, dir: &RunDir, run: &Run) -> Result<u32, DetachError> {
    let log = runner::open_log(&dir.orchestrator_log())?;
    let err_log = log.try_clone().map_err(|source| RunnerError::OpenLog {
        path: dir.orchestrator_log(),
        source,
    })?;

    let mut cmd = Command::new(&worker.program);
    cmd.args(worker.args(run))
        .env(RUN_DIR_ENV, dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(err_log));
    detach_from_session(&mut cmd);

    let child = cmd.spawn().map_err(DetachError::Spawn)?;
    let pid = child.id();

    store::write_detached(
        &dir.detached_path(),
        &DetachedInfo {
            orchestrator_pid: pid,
        },
    )?;

    info!(run_id = %run.run_id, pid, "background orchestrator started");
    Ok(pid)
}

pub fn recorded_pid(dir: &Path) -> Option<u32> {
    store::read_detached(&RunDir::new(dir).detached_path()).map(|info| info.orchestrator_pid)
}

#[cfg(unix)]
fn detach_from_session(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_from_session(_cmd: &mut Command) {}
