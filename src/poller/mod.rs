//! Background-task status poller.
//!
//! [`StatusPoller`] owns the whole polling state machine: the optional
//! [`PollSession`] (present iff a polling loop is live), the hide timer of the
//! final message, and the view it drives. Everything runs on one task; timers
//! are plain deadlines awaited from [`StatusPoller::run`], so there is nothing
//! to lock and at most one status request is ever in flight.

mod client;
mod session;
mod timer;

pub use client::{FetchError, StatusClient};

use crate::model::{InfoEvent, PollConfig, PollState, PollStats, StatusSnapshot};
use crate::view::ViewBinding;
use session::{next_tick, PollSession};
use std::future::Future;
use timer::{wait_opt, ScheduledTask};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Duration;

/// Where snapshots come from. The HTTP implementation is [`StatusClient`].
pub(crate) trait StatusSource {
    fn fetch(&self) -> impl Future<Output = Result<StatusSnapshot, FetchError>>;
}

/// Commands accepted by a running poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollerCommand {
    /// Re-run the bootstrap check, as a page reload would.
    Recheck,
    Shutdown,
}

pub(crate) struct StatusPoller<S, V> {
    source: Option<S>,
    view: V,
    poll_interval: Duration,
    hide_delay: Duration,
    session: Option<PollSession>,
    hide: Option<ScheduledTask>,
    recheck: Option<ScheduledTask>,
    exit_when_idle: bool,
    state: PollState,
    stats: PollStats,
}

impl<S: StatusSource, V: ViewBinding> StatusPoller<S, V> {
    /// `source == None` means no status URL is configured: the poller is inert.
    pub fn new(source: Option<S>, view: V, cfg: &PollConfig) -> Self {
        Self {
            source,
            view,
            poll_interval: cfg.poll_interval,
            hide_delay: cfg.hide_delay,
            session: None,
            hide: None,
            recheck: cfg.idle_recheck.map(ScheduledTask::every),
            exit_when_idle: false,
            state: PollState::Idle,
            stats: PollStats::default(),
        }
    }

    /// Return from [`run`](Self::run) as soon as nothing is left to wait for.
    pub fn exit_when_idle(mut self, exit: bool) -> Self {
        self.exit_when_idle = exit;
        self
    }

    /// Bootstrap check: start a session if the task is running and none exists.
    pub async fn initialize(&mut self) {
        let Some(snapshot) = self.fetch().await else {
            return;
        };
        if snapshot.is_running && self.session.is_none() {
            self.start_session(&snapshot);
        }
    }

    /// One scheduled status check.
    pub async fn poll(&mut self) {
        let Some(snapshot) = self.fetch().await else {
            return;
        };
        match (snapshot.is_running, self.session.is_some()) {
            (true, true) => {
                tracing::debug!(message = %snapshot.message, "task still running");
                self.show_running(&snapshot);
            }
            (true, false) => self.start_session(&snapshot),
            (false, true) => self.end_session(&snapshot),
            // Duplicate idle signal; nothing to tear down.
            (false, false) => {}
        }
    }

    /// Drive the poller until shut down.
    ///
    /// Runs the bootstrap check, then services session ticks, the hide timer,
    /// the optional idle recheck and incoming commands. A closed command channel
    /// is treated as `Shutdown`.
    pub async fn run(mut self, mut commands: UnboundedReceiver<PollerCommand>) -> PollStats {
        if self.source.is_none() {
            tracing::info!("no status URL configured; poller disabled");
            self.view.notify(InfoEvent::Disabled);
            return self.stats;
        }

        self.initialize().await;

        loop {
            if self.exit_when_idle && self.is_quiescent() {
                tracing::debug!("nothing left to watch");
                break;
            }
            tokio::select! {
                _ = next_tick(&mut self.session) => self.poll().await,
                _ = wait_opt(&mut self.hide) => self.hide_status(),
                _ = wait_opt(&mut self.recheck), if self.session.is_none() && self.hide.is_none() => {
                    self.initialize().await;
                }
                cmd = commands.recv() => match cmd {
                    Some(PollerCommand::Recheck) => self.initialize().await,
                    Some(PollerCommand::Shutdown) | None => break,
                },
            }
        }

        // Dropping the session and timers here is the implicit cancellation.
        self.session = None;
        self.hide = None;
        self.stats
    }

    fn is_quiescent(&self) -> bool {
        self.session.is_none() && self.hide.is_none() && self.recheck.is_none()
    }

    /// `None` when disabled or when the check failed; either way the cycle is skipped.
    async fn fetch(&mut self) -> Option<StatusSnapshot> {
        let source = self.source.as_ref()?;
        self.stats.fetches += 1;
        match source.fetch().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                self.stats.fetch_failures += 1;
                tracing::warn!(kind = e.kind(), error = %e, "status check failed; retrying next tick");
                self.view.notify(InfoEvent::FetchFailed(e.to_string()));
                None
            }
        }
    }

    fn start_session(&mut self, snapshot: &StatusSnapshot) {
        // A new session supersedes a final message still waiting to be hidden.
        if let Some(mut hide) = self.hide.take() {
            hide.cancel();
        }
        self.session = Some(PollSession::start(self.poll_interval));
        self.stats.sessions_started += 1;
        tracing::info!(
            message = %snapshot.message,
            interval_ms = self.poll_interval.as_millis() as u64,
            "background task running; polling started"
        );
        self.show_running(snapshot);
        self.sync_state();
    }

    fn show_running(&mut self, snapshot: &StatusSnapshot) {
        let text = snapshot.display_text();
        self.view.set_message(&text);
        self.view.set_visible(true);
        self.view.set_active_affordance(true);
        self.stats.last_message = Some(text);
    }

    fn end_session(&mut self, snapshot: &StatusSnapshot) {
        let text = snapshot.display_text();
        self.view.set_message(&text);
        self.view.set_visible(true);
        self.hide = Some(ScheduledTask::once(self.hide_delay));
        if let Some(session) = self.session.take() {
            tracing::info!(
                message = %snapshot.message,
                ticks = session.ticks(),
                elapsed_ms = session.elapsed().as_millis() as u64,
                "background task finished; polling stopped"
            );
        }
        self.view.set_active_affordance(false);
        self.stats.sessions_completed += 1;
        self.stats.last_message = Some(text);
        self.sync_state();
    }

    fn hide_status(&mut self) {
        self.hide = None;
        self.view.set_visible(false);
        self.sync_state();
    }

    fn sync_state(&mut self) {
        let next = if self.session.is_some() {
            PollState::Active
        } else if self.hide.as_ref().is_some_and(|h| h.is_pending()) {
            PollState::FinishingDisplay
        } else {
            PollState::Idle
        };
        if next != self.state {
            tracing::debug!(from = self.state.label(), to = next.label(), "poll state changed");
            self.state = next;
            self.view.set_state(next);
        }
    }
}

#[cfg(test)]
impl<S, V> StatusPoller<S, V> {
    pub(crate) fn state(&self) -> PollState {
        self.state
    }

    pub(crate) fn stats(&self) -> &PollStats {
        &self.stats
    }
}
