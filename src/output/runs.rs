use crate::model::RunStatus;
use crate::output::{accent, failure, format_timestamp, info, muted, status_label};
use std::io::Write;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct RunRow {
    pub run_id: String,
    pub state: Option<RunSummary>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub label: String,
    pub status: RunStatus,
    pub created_at: OffsetDateTime,
    pub error_message: Option<String>,
}

pub fn print_runs(mut w: impl Write, rows: &[RunRow]) -> std::io::Result<()> {
    if rows.is_empty() {
        writeln!(w, "{} {}", info("i"), muted("No runs yet."))?;
        return Ok(());
    }

    for (idx, row) in rows.iter().enumerate() {
        match &row.state {
            Some(state) => {
                writeln!(w, "{} {}", accent(&row.run_id), status_label(state.status))?;
                writeln!(w, "  label: {}", state.label)?;
                writeln!(w, "  created (UTC): {}", format_timestamp(state.created_at))?;
                if let Some(error) = &state.error_message {
                    writeln!(w, "  error: {error}")?;
                }
            }
            None => {
                writeln!(w, "{} {}", accent(&row.run_id), failure("? unreadable state"))?;
            }
        }

        if idx + 1 < rows.len() {
            writeln!(w)?;
        }
    }

    Ok(())
}
