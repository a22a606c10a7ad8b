use crate::output::{accent, command, format_elapsed, format_timestamp, number, status_label};
use crate::status::Report;
use std::io::Write;
use time::OffsetDateTime;

pub fn print_status(mut w: impl Write, report: &Report, now: OffsetDateTime) -> std::io::Result<()> {
    let run = &report.run;

    writeln!(w, "run_id: {}", accent(&run.run_id))?;
    writeln!(w, "label: {}", run.label)?;
    writeln!(w, "status: {}", status_label(run.status))?;

    if let Some(code) = run.main_exit_code {
        writeln!(w, "main_exit_code: {}", number(&code.to_string()))?;
    }

    if !run.followup_commands.is_empty() {
        let codes: Vec<String> = run
            .followup_exit_codes
            .iter()
            .map(|code| code.to_string())
            .collect();
        writeln!(
            w,
            "follow-ups: {}/{} run{}",
            number(&run.followup_exit_codes.len().to_string()),
            run.followup_commands.len(),
            if codes.is_empty() {
                String::new()
            } else {
                format!(" (exit codes: {})", codes.join(", "))
            }
        )?;
    }

    if let Some(error) = &run.error_message {
        writeln!(w, "error: {error}")?;
    }

    writeln!(w, "created (UTC): {}", format_timestamp(run.created_at))?;
    if let Some(started) = run.started_at {
        let end = run.finished_at.unwrap_or(now);
        writeln!(w, "elapsed: {}", number(&format_elapsed(started, end)))?;
    }

    if let Some(pid) = report.orchestrator_pid {
        writeln!(w, "orchestrator_pid: {}", number(&pid.to_string()))?;
    }

    if report.logs.is_empty() {
        writeln!(w, "logs: (none yet) in {}", command(&report.dir.path().display().to_string()))?;
    } else {
        writeln!(w, "logs:")?;
        for log in &report.logs {
            writeln!(w, "  {}", command(&log.display().to_string()))?;
        }
    }

    Ok(())
}
