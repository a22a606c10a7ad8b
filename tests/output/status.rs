use longrun::model::Run;
use longrun::output::{configure, print_status};
use longrun::rundir::RunDir;
use longrun::status::Report;
use std::path::PathBuf;
use time::macros::datetime;

fn report(run: Run, logs: Vec<PathBuf>) -> Report {
    Report {
        dir: RunDir::new(PathBuf::from("/work/.longrun").join(&run.run_id)),
        run,
        orchestrator_pid: None,
        logs,
    }
}

fn base() -> Run {
    Run::new(
        "eval_20240101_000000".to_string(),
        "eval".to_string(),
        PathBuf::from("/work"),
        datetime!(2024-01-01 00:00:00 UTC),
        "make eval".to_string(),
        vec!["make report".to_string()],
    )
}

#[test]
fn print_status_failed_run() {
    let mut run = base();
    run.start(datetime!(2024-01-01 00:00:01 UTC)).expect("start");
    run.record_main(2, datetime!(2024-01-01 00:01:31 UTC))
        .expect("main");

    let logs = vec![PathBuf::from("/work/.longrun/eval_20240101_000000/main.log")];
    configure(true);
    let mut out = Vec::new();
    print_status(&mut out, &report(run, logs), datetime!(2024-01-01 01:00:00 UTC))
        .expect("print status");
    let text = String::from_utf8(out).expect("utf8");

    assert!(text.contains("run_id: eval_20240101_000000"));
    assert!(text.contains("label: eval"));
    assert!(text.contains("failed"));
    assert!(text.contains("main_exit_code: 2"));
    assert!(text.contains("error: main command failed with rc=2"));
    assert!(text.contains("elapsed: 1m 30s"));
    assert!(text.contains("main.log"));
}

#[test]
fn print_status_created_run_omits_results() {
    configure(true);
    let mut out = Vec::new();
    print_status(&mut out, &report(base(), Vec::new()), datetime!(2024-01-01 00:00:05 UTC))
        .expect("print status");
    let text = String::from_utf8(out).expect("utf8");

    assert!(text.contains("status: created"));
    assert!(!text.contains("main_exit_code"));
    assert!(!text.contains("error:"));
    assert!(!text.contains("elapsed"));
    assert!(text.contains("logs: (none yet)"));
}
