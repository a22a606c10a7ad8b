use crate::model::{Run, RunStatus, TransitionError};
use crate::rundir::{self, AllocError, RunDir};
use crate::runner::{CommandRunner, LAUNCH_FAILURE_CODE, RunnerError};
use crate::store::{self, StoreError};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct Request {
    pub label: String,
    pub workspace: PathBuf,
    pub runs_root: PathBuf,
    pub main_command: String,
    pub followup_commands: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("run {run_id}: {source}")]
    Transition {
        run_id: String,
        source: TransitionError,
    },
    #[error("run {run_id} is already {status}; only a created run can be reattached")]
    NotReattachable { run_id: String, status: RunStatus },
    #[error("run directory {} does not match state run_id {run_id}", path.display())]
    Mismatch { path: PathBuf, run_id: String },
    #[error("run {0} is already owned by another orchestrator")]
    Claimed(String),
    #[error("claim run directory {}: {source}", path.display())]
    Claim { path: PathBuf, source: std::io::Error },
}

impl Request {
    pub fn validate(&self) -> Result<(), OrchestrateError> {
        if !rundir::is_valid_label(&self.label) {
            return Err(OrchestrateError::InvalidRequest(format!(
                "--label {:?} must start with a letter or digit and use only letters, digits, '.', '_' or '-' (max 63)",
                self.label
            )));
        }
        if self.main_command.trim().is_empty() {
            return Err(OrchestrateError::InvalidRequest(
                "--cmd must not be empty".to_string(),
            ));
        }
        if let Some(idx) = self
            .followup_commands
            .iter()
            .position(|cmd| cmd.trim().is_empty())
        {
            return Err(OrchestrateError::InvalidRequest(format!(
                "--then #{} must not be empty",
                idx + 1
            )));
        }
        Ok(())
    }
}

pub fn create(req: &Request, now: OffsetDateTime) -> Result<(RunDir, Run), OrchestrateError> {
    req.validate()?;

    let dir = rundir::allocate(&req.runs_root, &req.label, now)?;
    let run = Run::new(
        dir.run_id(),
        req.label.clone(),
        req.workspace.clone(),
        now,
        req.main_command.clone(),
        req.followup_commands.clone(),
    );
    store::write(&dir.state_path(), &run)?;

    info!(run_id = %run.run_id, dir = %dir.path().display(), "run created");
    Ok((dir, run))
}

/// Loads a run some other process created and claims it. Only an unclaimed `created` run can
/// be taken over.
pub fn reattach(path: &Path) -> Result<(RunDir, Run), OrchestrateError> {
    let dir = RunDir::new(path);
    let run = store::read(&dir.state_path())?;

    if run.run_id != dir.run_id() {
        return Err(OrchestrateError::Mismatch {
            path: path.to_path_buf(),
            run_id: run.run_id,
        });
    }
    if run.status != RunStatus::Created {
        return Err(OrchestrateError::NotReattachable {
            run_id: run.run_id,
            status: run.status,
        });
    }
    claim(&dir, &run)?;

    info!(run_id = %run.run_id, "reattached to run");
    Ok((dir, run))
}

pub fn prepare(
    req: &Request,
    existing: Option<&Path>,
    now: OffsetDateTime,
) -> Result<(RunDir, Run), OrchestrateError> {
    match existing {
        Some(path) => reattach(path),
        None => {
            let (dir, run) = create(req, now)?;
            claim(&dir, &run)?;
            Ok((dir, run))
        }
    }
}

fn claim(dir: &RunDir, run: &Run) -> Result<(), OrchestrateError> {
    match dir.claim() {
        Ok(true) => Ok(()),
        Ok(false) => Err(OrchestrateError::Claimed(run.run_id.clone())),
        Err(source) => Err(OrchestrateError::Claim {
            path: dir.owner_path(),
            source,
        }),
    }
}

/// Drives a `created` run to a terminal status and returns the final record.
pub fn drive(
    dir: &RunDir,
    mut run: Run,
    runner: &dyn CommandRunner,
) -> Result<Run, OrchestrateError> {
    let state_path = dir.state_path();

    transition(&mut run, |r| r.start(OffsetDateTime::now_utc()))?;
    store::write(&state_path, &run)?;
    info!(run_id = %run.run_id, "run started");

    let main_code = run_step(runner, &run.main_command, &dir.main_log());
    transition(&mut run, |r| {
        r.record_main(main_code, OffsetDateTime::now_utc())
    })?;
    store::write(&state_path, &run)?;
    info!(run_id = %run.run_id, exit_code = main_code, "main command finished");

    while let Some(idx) = run.next_followup() {
        let code = run_step(runner, &run.followup_commands[idx], &dir.then_log());
        transition(&mut run, |r| {
            r.record_followup(code, OffsetDateTime::now_utc())
        })?;
        store::write(&state_path, &run)?;
        info!(run_id = %run.run_id, step = idx + 1, exit_code = code, "follow-up finished");
    }

    if run.status == RunStatus::Running {
        transition(&mut run, |r| r.complete(OffsetDateTime::now_utc()))?;
        store::write(&state_path, &run)?;
    }

    match &run.error_message {
        Some(message) => warn!(run_id = %run.run_id, error = %message, "run failed"),
        None => info!(run_id = %run.run_id, "run completed"),
    }
    Ok(run)
}

pub fn execute(
    req: &Request,
    existing: Option<&Path>,
    runner: &dyn CommandRunner,
) -> Result<(RunDir, Run), OrchestrateError> {
    let (dir, run) = prepare(req, existing, OffsetDateTime::now_utc())?;
    let run = drive(&dir, run, runner)?;
    Ok((dir, run))
}

fn transition(
    run: &mut Run,
    apply: impl FnOnce(&mut Run) -> Result<(), TransitionError>,
) -> Result<(), OrchestrateError> {
    apply(run).map_err(|source| OrchestrateError::Transition {
        run_id: run.run_id.clone(),
        source,
    })
}

fn run_step(runner: &dyn CommandRunner, command: &str, log_path: &Path) -> i32 {
    match runner.run(command, log_path) {
        Ok(code) => code,
        Err(err) => {
            error!(err = %err, log = %log_path.display(), "command could not be run");
            note_launch_failure(log_path, &err);
            LAUNCH_FAILURE_CODE
        }
    }
}

fn note_launch_failure(log_path: &Path, err: &RunnerError) {
    if matches!(err, RunnerError::OpenLog { .. }) {
        return;
    }
    if let Ok(mut log) = crate::runner::open_log(log_path) {
        let _ = writeln!(log, "longrun: {err}");
    }
}
