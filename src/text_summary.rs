//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for text mode once the poller stops.

use crate::model::PollStats;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from the poller's counters.
pub(crate) fn build_text_summary(status_url: Option<&str>, stats: &PollStats) -> TextSummary {
    let mut lines = Vec::new();

    let Some(url) = status_url else {
        lines.push("Status URL: - (disabled)".to_string());
        return TextSummary { lines };
    };
    lines.push(format!("Status URL: {url}"));

    let ok = stats.fetches.saturating_sub(stats.fetch_failures);
    lines.push(format!(
        "Checks:     {} ({} ok, {} failed)",
        stats.fetches, ok, stats.fetch_failures
    ));
    lines.push(format!(
        "Sessions:   {} started, {} finished",
        stats.sessions_started, stats.sessions_completed
    ));
    if stats.sessions_started > stats.sessions_completed {
        lines.push("Task:       still running when polling stopped".to_string());
    }
    if let Some(msg) = stats.last_message.as_deref() {
        lines.push(format!("Last:       {msg}"));
    }

    TextSummary { lines }
}
