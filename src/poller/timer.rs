use tokio::time::{Duration, Instant};

/// Shortest period a repeating task accepts; zero would never advance.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Stand-in for "never" when a deadline does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

/// A cancellable one-shot or repeating deadline.
///
/// The task does not run anything itself; the owner awaits [`ScheduledTask::wait`]
/// inside its event loop and performs the callback when it resolves. This keeps
/// every mutation on the owner's task, so no locking is needed.
#[derive(Debug)]
pub(crate) struct ScheduledTask {
    next: Option<Instant>,
    period: Option<Duration>,
    fired: u64,
}

impl ScheduledTask {
    /// Fire once, `after` from now.
    pub fn once(after: Duration) -> Self {
        Self {
            next: Some(deadline_after(Instant::now(), after)),
            period: None,
            fired: 0,
        }
    }

    /// Fire every `period`, first tick one period from now.
    pub fn every(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        Self {
            next: Some(deadline_after(Instant::now(), period)),
            period: Some(period),
            fired: 0,
        }
    }

    /// Stop the task. Calling this on an already cancelled or spent task is a no-op.
    pub fn cancel(&mut self) {
        self.next = None;
    }

    pub fn is_pending(&self) -> bool {
        self.next.is_some()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Resolve at the next deadline. Never resolves once cancelled or spent.
    ///
    /// Cancel-safe: state only changes after the deadline has been reached, so a
    /// `select!` that drops this future loses nothing.
    pub async fn wait(&mut self) {
        let Some(deadline) = self.next else {
            return futures::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        self.fired += 1;
        self.next = self.period.map(|p| {
            // Skip ticks missed while the owner was busy rather than bursting.
            let now = Instant::now();
            let mut next = deadline_after(deadline, p);
            while next <= now {
                next = deadline_after(next, p);
            }
            next
        });
    }
}

/// Await the task if there is one, otherwise pend forever.
pub(crate) async fn wait_opt(task: &mut Option<ScheduledTask>) {
    match task {
        Some(t) => t.wait().await,
        None => futures::future::pending().await,
    }
}
