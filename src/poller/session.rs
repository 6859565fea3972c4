use super::timer::ScheduledTask;
use tokio::time::{Duration, Instant};

/// An active polling loop. Exists only while the task is observed running;
/// dropping it cancels the repeating timer.
#[derive(Debug)]
pub(crate) struct PollSession {
    ticker: ScheduledTask,
    started_at: Instant,
}

impl PollSession {
    pub fn start(interval: Duration) -> Self {
        Self {
            ticker: ScheduledTask::every(interval),
            started_at: Instant::now(),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticker.fired()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Await the session's next tick, or pend forever when no session exists.
pub(crate) async fn next_tick(session: &mut Option<PollSession>) {
    match session {
        Some(s) => s.ticker.wait().await,
        None => futures::future::pending().await,
    }
}
