mod runs;
mod status;
mod style;

pub use runs::{RunRow, RunSummary, print_runs};
pub use status::print_status;
pub use style::{accent, command, configure, failure, info, muted, number, success, warning};

use crate::model::RunStatus;
use std::time::Duration;
use time::OffsetDateTime;

pub fn format_elapsed(from: OffsetDateTime, to: OffsetDateTime) -> String {
    let secs = (to - from).whole_seconds().max(0) as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| "-".to_string())
}

pub fn status_label(status: RunStatus) -> String {
    match status {
        RunStatus::Created => muted("created"),
        RunStatus::Running => warning("running"),
        RunStatus::Completed => success("ok completed"),
        RunStatus::Failed => failure("x failed"),
    }
}
