use crate::detach;
use crate::model::Run;
use crate::rundir::{self, RunDir};
use crate::store::{self, StoreError};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum Selector {
    RunId(String),
    Latest,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("(no runs found)")]
    NoRuns,
    #[error("(run {0} not found)")]
    UnknownRun(String),
    #[error("(missing state.json in {})", .0.display())]
    MissingState(PathBuf),
    #[error("(unreadable state in {}: {reason})", path.display())]
    CorruptState { path: PathBuf, reason: String },
    #[error("list runs in {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl StatusError {
    pub fn is_not_found(&self) -> bool {
        !matches!(self, StatusError::Io { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub dir: RunDir,
    pub run: Run,
    pub orchestrator_pid: Option<u32>,
    pub logs: Vec<PathBuf>,
}

pub fn locate(runs_root: &Path, selector: &Selector) -> Result<RunDir, StatusError> {
    match selector {
        Selector::Latest => rundir::latest(runs_root)
            .map_err(|source| StatusError::Io {
                path: runs_root.to_path_buf(),
                source,
            })?
            .ok_or(StatusError::NoRuns),
        Selector::RunId(run_id) => {
            if !is_plain_name(run_id) {
                return Err(StatusError::UnknownRun(run_id.clone()));
            }
            let dir = RunDir::new(runs_root.join(run_id));
            if !dir.path().is_dir() {
                return Err(StatusError::UnknownRun(run_id.clone()));
            }
            Ok(dir)
        }
    }
}

pub fn load(dir: RunDir) -> Result<Report, StatusError> {
    let run = store::read(&dir.state_path()).map_err(|err| match err {
        StoreError::Missing(_) => StatusError::MissingState(dir.path().to_path_buf()),
        other => StatusError::CorruptState {
            path: dir.path().to_path_buf(),
            reason: other.to_string(),
        },
    })?;

    let logs = [dir.main_log(), dir.then_log(), dir.orchestrator_log()]
        .into_iter()
        .filter(|path| path.is_file())
        .collect();

    Ok(Report {
        orchestrator_pid: detach::recorded_pid(dir.path()),
        logs,
        run,
        dir,
    })
}

pub fn report(runs_root: &Path, selector: &Selector) -> Result<Report, StatusError> {
    let dir = locate(runs_root, selector)?;
    load(dir)
}

/// Every run under the root, newest first. Runs whose state cannot be read keep their error.
pub fn list(runs_root: &Path) -> Result<Vec<(RunDir, Result<Run, StoreError>)>, StatusError> {
    let dirs = rundir::list(runs_root).map_err(|source| StatusError::Io {
        path: runs_root.to_path_buf(),
        source,
    })?;

    Ok(dirs
        .into_iter()
        .map(|dir| {
            let state = store::read(&dir.state_path());
            (dir, state)
        })
        .collect())
}

fn is_plain_name(run_id: &str) -> bool {
    !run_id.is_empty()
        && run_id != "."
        && run_id != ".."
        && !run_id.contains(['/', '\\'])
}
