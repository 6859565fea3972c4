use crate::model::{PollConfig, PollEvent};
use crate::view::{ChannelView, ContainerState};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Upper bound for every duration flag; anything longer is a typo.
const MAX_DURATION: Duration = Duration::from_secs(86400 * 365);

fn parse_duration(s: &str) -> Result<humantime::Duration, String> {
    let d: humantime::Duration = s.parse().map_err(|e| format!("{e}"))?;
    if Duration::from(d) > MAX_DURATION {
        return Err(format!(
            "must be at most {}",
            humantime::format_duration(MAX_DURATION)
        ));
    }
    Ok(d)
}

fn parse_nonzero_duration(s: &str) -> Result<humantime::Duration, String> {
    let d = parse_duration(s)?;
    if Duration::from(d).is_zero() {
        return Err("must be greater than zero".to_string());
    }
    Ok(d)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "task-status-poller",
    version,
    about = "Watch a background task's status endpoint until the task finishes"
)]
pub struct Cli {
    /// Status endpoint returning {"is_running": bool, "message": string}.
    /// Without it the poller is disabled and exits immediately.
    #[arg(long)]
    pub status_url: Option<String>,

    /// Interval between status checks while the task runs
    #[arg(long, default_value = "2s", value_parser = parse_nonzero_duration)]
    pub poll_interval: humantime::Duration,

    /// How long the final message stays visible after the task stops
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub hide_delay: humantime::Duration,

    /// Re-run the bootstrap check at this interval while idle
    #[arg(long, value_parser = parse_nonzero_duration)]
    pub idle_recheck: Option<humantime::Duration>,

    /// Per-request timeout (no timeout by default)
    #[arg(long, value_parser = parse_nonzero_duration)]
    pub request_timeout: Option<humantime::Duration>,

    /// Print one JSON event per line (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print status changes as text (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Only log errors
    #[arg(long)]
    pub quiet: bool,
}

impl Cli {
    #[cfg_attr(not(feature = "tui"), allow(dead_code))]
    fn wants_tui(&self) -> bool {
        !self.json && !self.text
    }
}

/// Log filter for the given mode.
///
/// Streaming modes let `RUST_LOG` extend the default level. The TUI ignores it:
/// anything above error level would scribble over the alternate screen.
fn log_filter(quiet: bool, tui: bool) -> EnvFilter {
    if tui {
        return EnvFilter::new("task_status_poller=error");
    }
    let directive = if quiet {
        "task_status_poller=error"
    } else {
        "task_status_poller=info"
    };
    let filter = EnvFilter::from_default_env();
    match directive.parse() {
        Ok(d) => filter.add_directive(d),
        Err(_) => filter,
    }
}

/// Initialize logging to stderr.
fn init_logging(quiet: bool, tui: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(log_filter(quiet, tui))
        .try_init();
}

pub async fn run(args: Cli) -> Result<()> {
    #[cfg(feature = "tui")]
    {
        if args.wants_tui() {
            init_logging(true, true);
            return crate::tui::run(args).await;
        }
    }

    init_logging(args.quiet, false);
    run_stream(args).await
}

/// Build a `PollConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> PollConfig {
    PollConfig {
        status_url: args
            .status_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        poll_interval: Duration::from(args.poll_interval),
        hide_delay: Duration::from(args.hide_delay),
        idle_recheck: args.idle_recheck.map(Duration::from),
        request_timeout: args.request_timeout.map(Duration::from),
        user_agent: format!("task-status-poller/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// JSON line wrapper carrying the wall-clock time of the event.
#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp_utc: String,
    event: &'a PollEvent,
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Render one event as a text line, if it changed anything worth printing.
fn render_text(container: &mut ContainerState, ev: &PollEvent) -> Option<String> {
    if let PollEvent::Info(info) = ev {
        return Some(info.to_message());
    }
    if !container.apply(ev) {
        return None;
    }
    match ev {
        PollEvent::Message(m) => Some(m.clone()),
        PollEvent::Visibility(false) => Some("[status hidden]".to_string()),
        PollEvent::Visibility(true) => None,
        PollEvent::Affordance(a) => Some(match a {
            crate::model::Affordance::Active => "[controls: stop]".to_string(),
            crate::model::Affordance::Idle => "[controls: start]".to_string(),
        }),
        PollEvent::State(s) => Some(format!("== {} ==", s.label())),
        PollEvent::Info(_) => None,
    }
}

/// Text and JSON modes: stream events while the poller runs, then summarize.
async fn run_stream(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PollEvent>();

    let json = args.json;
    let render_tx = out_tx.clone();
    let render = tokio::spawn(async move {
        let mut container = ContainerState::default();
        while let Some(ev) = evt_rx.recv().await {
            if json {
                let line = JsonLine {
                    timestamp_utc: now_rfc3339(),
                    event: &ev,
                };
                match serde_json::to_string(&line) {
                    Ok(s) => {
                        let _ = render_tx.send(OutputLine::Stdout(s));
                    }
                    Err(e) => tracing::error!(error = %e, "failed to encode event"),
                }
            } else if let Some(line) = render_text(&mut container, &ev) {
                let _ = render_tx.send(OutputLine::Stderr(line));
            }
        }
    });

    let stats =
        crate::orchestrator::run_controller(&cfg, ChannelView::new(evt_tx), None).await?;
    render.await.context("event renderer task failed")?;

    if json {
        let out = serde_json::to_string(&serde_json::json!({ "summary": stats }))?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(cfg.status_url.as_deref(), &stats);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
