use longrun::model::{Run, RunStatus, TransitionError};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::datetime;

const NOW: OffsetDateTime = datetime!(2024-03-04 05:06:07 UTC);

fn run_with(followups: &[&str]) -> Run {
    Run::new(
        "job_20240304_050607".to_string(),
        "job".to_string(),
        PathBuf::from("/work"),
        NOW,
        "make".to_string(),
        followups.iter().map(|cmd| cmd.to_string()).collect(),
    )
}

fn started(followups: &[&str]) -> Run {
    let mut run = run_with(followups);
    run.start(NOW).expect("start");
    run
}

#[test]
fn successful_chain_stays_consistent_at_every_step() {
    let mut run = run_with(&["a", "b"]);
    run.check_consistency().expect("created");

    run.start(NOW).expect("start");
    run.check_consistency().expect("running");
    assert_eq!(run.next_followup(), None);

    run.record_main(0, NOW).expect("main");
    assert_eq!(run.next_followup(), Some(0));
    run.record_followup(0, NOW).expect("first");
    run.record_followup(0, NOW).expect("second");
    assert_eq!(run.next_followup(), None);
    run.check_consistency().expect("all steps recorded");

    run.complete(NOW).expect("complete");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.finished_at, Some(NOW));
    run.check_consistency().expect("completed");
}

#[test]
fn start_only_moves_forward_from_created() {
    let mut run = started(&[]);
    assert_eq!(
        run.start(NOW),
        Err(TransitionError::Status {
            from: RunStatus::Running,
            to: RunStatus::Running,
        })
    );
}

#[test]
fn main_code_needs_a_running_run_and_is_recorded_once() {
    let mut run = run_with(&[]);
    assert_eq!(
        run.record_main(0, NOW),
        Err(TransitionError::NotRunning(RunStatus::Created))
    );

    run.start(NOW).expect("start");
    run.record_main(0, NOW).expect("main");
    assert_eq!(run.record_main(1, NOW), Err(TransitionError::MainRecorded));
    assert_eq!(run.main_exit_code, Some(0));
}

#[test]
fn failed_main_ends_the_run() {
    let mut run = started(&["a"]);
    run.record_main(2, NOW).expect("main");

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("main command failed with rc=2"));
    assert_eq!(run.next_followup(), None);
    assert_eq!(
        run.record_followup(0, NOW),
        Err(TransitionError::NotRunning(RunStatus::Failed))
    );
    assert!(run.followup_exit_codes.is_empty());
    run.check_consistency().expect("failed run is consistent");
}

#[test]
fn followup_needs_a_successful_main_command() {
    let mut run = started(&["a"]);
    assert_eq!(
        run.record_followup(0, NOW),
        Err(TransitionError::MainNotSucceeded)
    );
}

#[test]
fn followup_codes_cannot_outnumber_commands() {
    let mut run = started(&[]);
    run.record_main(0, NOW).expect("main");
    assert_eq!(
        run.record_followup(0, NOW),
        Err(TransitionError::FollowupsExhausted(0))
    );
}

#[test]
fn failed_followup_keeps_first_error() {
    let mut run = started(&["a", "b", "c"]);
    run.record_main(0, NOW).expect("main");
    run.record_followup(0, NOW).expect("first");
    run.record_followup(4, NOW).expect("second");

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.record_followup(0, NOW),
        Err(TransitionError::NotRunning(RunStatus::Failed))
    );
    assert_eq!(run.followup_exit_codes, vec![0, 4]);
    assert_eq!(
        run.error_message.as_deref(),
        Some("follow-up failed at step 2 rc=4")
    );
}

#[test]
fn complete_requires_every_step() {
    let mut run = started(&["a", "b"]);
    assert_eq!(run.complete(NOW), Err(TransitionError::MainNotSucceeded));

    run.record_main(0, NOW).expect("main");
    assert_eq!(run.complete(NOW), Err(TransitionError::FollowupsPending(2)));

    run.record_followup(0, NOW).expect("first");
    let err = run.complete(NOW).expect_err("one pending");
    assert_eq!(err, TransitionError::FollowupsPending(1));
    assert_eq!(err.to_string(), "1 follow-up commands have not run yet");
    assert_eq!(run.status, RunStatus::Running);
}

#[test]
fn complete_is_refused_outside_running() {
    let mut created = run_with(&[]);
    assert_eq!(
        created.complete(NOW),
        Err(TransitionError::Status {
            from: RunStatus::Created,
            to: RunStatus::Completed,
        })
    );

    let mut failed = started(&[]);
    failed.record_main(1, NOW).expect("main");
    assert_eq!(
        failed.complete(NOW),
        Err(TransitionError::Status {
            from: RunStatus::Failed,
            to: RunStatus::Completed,
        })
    );
    assert_eq!(failed.status, RunStatus::Failed);
}

fn inconsistency(run: &Run) -> String {
    run.check_consistency().expect_err("inconsistent record")
}

#[test]
fn consistency_rejects_empty_run_id() {
    let mut run = run_with(&[]);
    run.run_id = "  ".to_string();
    assert_eq!(inconsistency(&run), "run_id must not be empty");
}

#[test]
fn consistency_rejects_extra_followup_codes() {
    let mut run = started(&["a"]);
    run.main_exit_code = Some(0);
    run.followup_exit_codes = vec![0, 0];
    assert_eq!(
        inconsistency(&run),
        "more follow-up exit codes than follow-up commands"
    );
}

#[test]
fn consistency_rejects_followups_without_successful_main() {
    let mut run = started(&["a"]);
    run.followup_exit_codes = vec![0];
    assert_eq!(
        inconsistency(&run),
        "follow-up exit codes recorded without a successful main command"
    );
}

#[test]
fn consistency_rejects_codes_after_failed_step() {
    let mut run = started(&["a", "b"]);
    run.main_exit_code = Some(0);
    run.followup_exit_codes = vec![3, 0];
    run.status = RunStatus::Failed;
    run.error_message = Some("follow-up failed at step 1 rc=3".to_string());
    assert_eq!(
        inconsistency(&run),
        "follow-up exit codes recorded after a failed step"
    );
}

#[test]
fn consistency_rejects_created_run_with_results() {
    let mut run = run_with(&[]);
    run.main_exit_code = Some(0);
    assert_eq!(inconsistency(&run), "created run already carries results");
}

#[test]
fn consistency_rejects_running_run_with_failure() {
    let mut run = started(&["a"]);
    run.main_exit_code = Some(0);
    run.followup_exit_codes = vec![0];
    run.error_message = Some("boom".to_string());
    assert_eq!(inconsistency(&run), "running run carries a failure");

    run.error_message = None;
    run.followup_exit_codes = vec![7];
    assert_eq!(inconsistency(&run), "running run carries a failure");
}

#[test]
fn consistency_rejects_completed_run_with_failure() {
    let mut run = started(&["a", "b"]);
    run.main_exit_code = Some(0);
    run.followup_exit_codes = vec![0, 4];
    run.status = RunStatus::Completed;
    assert_eq!(
        inconsistency(&run),
        "completed run is missing successful results"
    );

    run.followup_exit_codes = vec![0];
    assert_eq!(
        inconsistency(&run),
        "completed run is missing successful results"
    );
}

#[test]
fn consistency_rejects_failed_run_without_error() {
    let mut run = started(&[]);
    run.main_exit_code = Some(2);
    run.status = RunStatus::Failed;
    assert_eq!(
        inconsistency(&run),
        "failed run must carry one failed step and an error"
    );

    run.main_exit_code = Some(0);
    run.error_message = Some("nothing failed".to_string());
    assert_eq!(
        inconsistency(&run),
        "failed run must carry one failed step and an error"
    );
}
