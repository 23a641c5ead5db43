use crate::parser::model::{EventStatus, ValidationEvent};

pub const BADGE_OK: &str = "[ OK ]";
pub const BADGE_FAIL: &str = "[FAIL]";
pub const BADGE_WARN: &str = "[WARN]";
pub const BADGE_RUNNING: &str = "[ .. ]";
pub const BADGE_UNKNOWN: &str = "[ ?? ]";

/// Badge for a free-text status (case-insensitive).
pub fn badge_for_status(status: &str) -> &'static str {
    match status.trim().to_ascii_lowercase().as_str() {
        "ok" | "pass" | "passed" | "success" => BADGE_OK,
        "fail" | "failed" | "error" => BADGE_FAIL,
        "warn" | "warning" => BADGE_WARN,
        "running" | "pending" | "in_progress" => BADGE_RUNNING,
        _ => BADGE_UNKNOWN,
    }
}

/// Running wins over errors, errors over warnings.
pub fn badge_for_counts(errors: i64, warnings: i64, running: bool) -> &'static str {
    if running {
        BADGE_RUNNING
    } else if errors > 0 {
        BADGE_FAIL
    } else if warnings > 0 {
        BADGE_WARN
    } else {
        BADGE_OK
    }
}

/// Summarize a finished parse: FAIL/ERROR events count as errors.
pub fn badge_for_events(events: &[ValidationEvent]) -> &'static str {
    let (errors, warnings) = events.iter().fold((0, 0), |(errors, warnings), event| match event.status {
        Some(EventStatus::Error | EventStatus::Fail) => (errors + 1, warnings),
        Some(EventStatus::Warning) => (errors, warnings + 1),
        _ => (errors, warnings),
    });
    badge_for_counts(errors, warnings, false)
}
