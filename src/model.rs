use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Run {
    pub run_id: String,
    pub label: String,
    pub workspace_root: PathBuf,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: RunStatus,
    pub main_command: String,
    pub followup_commands: Vec<String>,
    pub main_exit_code: Option<i32>,
    pub followup_exit_codes: Vec<i32>,
    pub error_message: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move run from {from} to {to}")]
    Status { from: RunStatus, to: RunStatus },
    #[error("run is {0}, not running")]
    NotRunning(RunStatus),
    #[error("main exit code already recorded")]
    MainRecorded,
    #[error("main command has not succeeded")]
    MainNotSucceeded,
    #[error("all {0} follow-up commands already recorded")]
    FollowupsExhausted(usize),
    #[error("{0} follow-up commands have not run yet")]
    FollowupsPending(usize),
}

impl Run {
    pub fn new(
        run_id: String,
        label: String,
        workspace_root: PathBuf,
        created_at: OffsetDateTime,
        main_command: String,
        followup_commands: Vec<String>,
    ) -> Self {
        Self {
            run_id,
            label,
            workspace_root,
            created_at,
            status: RunStatus::Created,
            main_command,
            followup_commands,
            main_exit_code: None,
            followup_exit_codes: Vec::new(),
            error_message: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self, now: OffsetDateTime) -> Result<(), TransitionError> {
        self.advance(RunStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn record_main(&mut self, code: i32, now: OffsetDateTime) -> Result<(), TransitionError> {
        if self.status != RunStatus::Running {
            return Err(TransitionError::NotRunning(self.status));
        }
        if self.main_exit_code.is_some() {
            return Err(TransitionError::MainRecorded);
        }

        self.main_exit_code = Some(code);
        if code != 0 {
            self.fail(format!("main command failed with rc={code}"), now)?;
        }
        Ok(())
    }

    pub fn record_followup(&mut self, code: i32, now: OffsetDateTime) -> Result<(), TransitionError> {
        if self.status != RunStatus::Running {
            return Err(TransitionError::NotRunning(self.status));
        }
        if self.main_exit_code != Some(0) {
            return Err(TransitionError::MainNotSucceeded);
        }
        if self.followup_exit_codes.len() >= self.followup_commands.len() {
            return Err(TransitionError::FollowupsExhausted(
                self.followup_commands.len(),
            ));
        }

        self.followup_exit_codes.push(code);
        if code != 0 {
            let step = self.followup_exit_codes.len();
            self.fail(format!("follow-up failed at step {step} rc={code}"), now)?;
        }
        Ok(())
    }

    pub fn complete(&mut self, now: OffsetDateTime) -> Result<(), TransitionError> {
        if self.status != RunStatus::Running {
            return Err(TransitionError::Status {
                from: self.status,
                to: RunStatus::Completed,
            });
        }
        if self.main_exit_code != Some(0) {
            return Err(TransitionError::MainNotSucceeded);
        }
        let pending = self
            .followup_commands
            .len()
            .saturating_sub(self.followup_exit_codes.len());
        if pending != 0 {
            return Err(TransitionError::FollowupsPending(pending));
        }
        self.advance(RunStatus::Completed)?;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn next_followup(&self) -> Option<usize> {
        if self.status != RunStatus::Running || self.main_exit_code != Some(0) {
            return None;
        }
        let next = self.followup_exit_codes.len();
        (next < self.followup_commands.len()).then_some(next)
    }

    pub fn check_consistency(&self) -> Result<(), String> {
        if self.run_id.trim().is_empty() {
            return Err("run_id must not be empty".to_string());
        }
        if self.followup_exit_codes.len() > self.followup_commands.len() {
            return Err("more follow-up exit codes than follow-up commands".to_string());
        }
        if !self.followup_exit_codes.is_empty() && self.main_exit_code != Some(0) {
            return Err("follow-up exit codes recorded without a successful main command".to_string());
        }
        if let Some(pos) = self.followup_exit_codes.iter().position(|code| *code != 0)
            && pos + 1 != self.followup_exit_codes.len()
        {
            return Err("follow-up exit codes recorded after a failed step".to_string());
        }

        let failed_steps = usize::from(self.main_exit_code.is_some_and(|code| code != 0))
            + self.followup_exit_codes.iter().filter(|code| **code != 0).count();

        match self.status {
            RunStatus::Created => {
                if self.main_exit_code.is_some() || self.error_message.is_some() {
                    return Err("created run already carries results".to_string());
                }
            }
            RunStatus::Running => {
                if failed_steps != 0 || self.error_message.is_some() {
                    return Err("running run carries a failure".to_string());
                }
            }
            RunStatus::Completed => {
                if self.main_exit_code != Some(0)
                    || self.followup_exit_codes.len() != self.followup_commands.len()
                    || failed_steps != 0
                    || self.error_message.is_some()
                {
                    return Err("completed run is missing successful results".to_string());
                }
            }
            RunStatus::Failed => {
                if self.error_message.is_none() || failed_steps != 1 {
                    return Err("failed run must carry one failed step and an error".to_string());
                }
            }
        }

        Ok(())
    }

    fn fail(&mut self, message: String, now: OffsetDateTime) -> Result<(), TransitionError> {
        self.advance(RunStatus::Failed)?;
        self.error_message = Some(message);
        self.finished_at = Some(now);
        Ok(())
    }

    fn advance(&mut self, to: RunStatus) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.status, to),
            (RunStatus::Created, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        );
        if !allowed {
            return Err(TransitionError::Status {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
