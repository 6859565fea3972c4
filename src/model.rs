use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix prepended to every server message before it reaches the view.
pub const MESSAGE_PREFIX: &str = "Background Task: ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// `None` puts the poller in disabled mode.
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub hide_delay: Duration,
    #[serde(default, with = "humantime_serde")]
    pub idle_recheck: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_url: None,
            poll_interval: Duration::from_millis(2000),
            hide_delay: Duration::from_millis(5000),
            idle_recheck: None,
            request_timeout: None,
            user_agent: format!("task-status-poller/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Server-reported task state, superseded on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub message: String,
}

impl StatusSnapshot {
    pub fn running(message: impl Into<String>) -> Self {
        Self {
            is_running: true,
            message: message.into(),
        }
    }

    pub fn stopped(message: impl Into<String>) -> Self {
        Self {
            is_running: false,
            message: message.into(),
        }
    }

    /// Build a snapshot from an arbitrary JSON body.
    ///
    /// Missing or wrongly typed fields never fail: `is_running` falls back to
    /// `false` so a broken payload cannot leave the display stuck active.
    pub fn from_value(v: &serde_json::Value) -> Self {
        let is_running = v
            .get("is_running")
            .and_then(|r| r.as_bool())
            .unwrap_or(false);
        let message = v
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            is_running,
            message,
        }
    }

    /// Text shown in the status container for this snapshot.
    pub fn display_text(&self) -> String {
        format!("{MESSAGE_PREFIX}{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// No session; container hidden or still showing a stale final message.
    Idle,
    /// Session running, container visible, stop control emphasized.
    Active,
    /// Session just ended, final message visible, hide timer pending.
    FinishingDisplay,
}

impl PollState {
    pub fn label(self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Active => "active",
            PollState::FinishingDisplay => "finishing",
        }
    }
}

/// Emphasis of the start/stop controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affordance {
    /// Start emphasized, stop de-emphasized.
    Idle,
    /// Start de-emphasized, stop emphasized.
    Active,
}

impl From<bool> for Affordance {
    fn from(active: bool) -> Self {
        if active {
            Affordance::Active
        } else {
            Affordance::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PollEvent {
    Message(String),
    Visibility(bool),
    Affordance(Affordance),
    State(PollState),
    Info(InfoEvent),
}

/// Structured info events emitted by the poller and consumed by UI/CLI layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InfoEvent {
    Disabled,
    FetchFailed(String),
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Disabled => "No status URL configured; poller disabled".to_string(),
            InfoEvent::FetchFailed(e) => format!("Status check failed: {e}"),
        }
    }
}

/// Counters accumulated over the lifetime of one poller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    pub fetches: u64,
    pub fetch_failures: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    #[serde(default)]
    pub last_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn snapshot_reads_well_formed_body() {
        let s = StatusSnapshot::from_value(&json!({"is_running": true, "message": "working"}));
        assert_eq!(s, StatusSnapshot::running("working"));
        assert_eq!(s.display_text(), "Background Task: working");
    }

    #[test]
    fn missing_fields_mean_not_running() {
        assert_eq!(
            StatusSnapshot::from_value(&json!({"message": "half"})),
            StatusSnapshot::stopped("half")
        );
        assert_eq!(
            StatusSnapshot::from_value(&json!({})),
            StatusSnapshot::default()
        );
    }

    #[test]
    fn wrongly_typed_fields_mean_not_running() {
        let s = StatusSnapshot::from_value(&json!({"is_running": "yes", "message": 7}));
        assert!(!s.is_running);
        assert_eq!(s.message, "");

        let s = StatusSnapshot::from_value(&json!([1, 2, 3]));
        assert!(!s.is_running);
    }

    #[test]
    fn config_defaults_match_widget_timing() {
        let cfg = PollConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_millis(2000));
        assert_eq!(cfg.hide_delay, Duration::from_millis(5000));
        assert!(cfg.status_url.is_none());
        assert!(cfg.idle_recheck.is_none());
    }

    #[test]
    fn config_reads_humantime_durations() {
        let cfg: PollConfig = serde_json::from_value(json!({
            "status_url": "http://localhost/status",
            "poll_interval": "500ms",
            "hide_delay": "3s",
            "user_agent": "test"
        }))
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.hide_delay, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, None);
    }
}
