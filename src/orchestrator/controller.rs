//! Poller lifecycle controller.
//!
//! Owns the status poller and relays UI commands to it.

use crate::model::{PollConfig, PollStats};
use crate::poller::{PollerCommand, StatusClient, StatusPoller};
use crate::view::ChannelView;
use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control the poller.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Check the endpoint again; starts polling if the task has been started meanwhile.
    Recheck,
    Quit,
}

/// Await the next UI command, or pend forever once there is no UI.
async fn recv_ui(rx: &mut Option<UnboundedReceiver<UiCommand>>) -> Option<UiCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}

fn send(poll_tx: &UnboundedSender<PollerCommand>, cmd: PollerCommand) {
    // The poller only drops its receiver when it has already stopped.
    let _ = poll_tx.send(cmd);
}

/// Run the poller to completion and return its counters.
///
/// With `cmd_rx == None` (text/JSON output) the poller exits by itself once it is
/// idle with nothing left to wait for. With a UI attached it keeps running
/// until the UI quits or goes away.
pub(crate) async fn run_controller(
    cfg: &PollConfig,
    view: ChannelView,
    cmd_rx: Option<UnboundedReceiver<UiCommand>>,
) -> Result<PollStats> {
    let source = cfg
        .status_url
        .as_deref()
        .map(|url| StatusClient::new(url, cfg))
        .transpose()?;
    if let Some(client) = &source {
        tracing::info!(url = %client.status_url(), "watching status endpoint");
    }

    let mut ui_rx = cmd_rx;
    let poller = StatusPoller::new(source, view, cfg).exit_when_idle(ui_rx.is_none());
    let (poll_tx, poll_rx) = mpsc::unbounded_channel::<PollerCommand>();
    let run = poller.run(poll_rx);
    tokio::pin!(run);
    let mut interrupted = false;

    let stats = loop {
        tokio::select! {
            stats = &mut run => break stats,
            cmd = recv_ui(&mut ui_rx) => match cmd {
                Some(UiCommand::Recheck) => send(&poll_tx, PollerCommand::Recheck),
                Some(UiCommand::Quit) | None => {
                    ui_rx = None;
                    send(&poll_tx, PollerCommand::Shutdown);
                }
            },
            res = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Err(e) = res {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                } else {
                    tracing::info!("interrupted; stopping poller");
                    send(&poll_tx, PollerCommand::Shutdown);
                }
            }
        }
    };

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InfoEvent, PollEvent, PollState};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(url: Option<String>) -> PollConfig {
        PollConfig {
            status_url: url,
            poll_interval: Duration::from_millis(20),
            hide_delay: Duration::from_millis(40),
            ..Default::default()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> Vec<PollEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn follows_task_to_completion_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"is_running": true, "message": "importing"})),
            )
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"is_running": false, "message": "imported 3 files"})),
            )
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cfg = fast_config(Some(format!("{}/status", server.uri())));
        let stats = tokio::time::timeout(
            Duration::from_secs(10),
            run_controller(&cfg, ChannelView::new(tx), None),
        )
        .await
        .expect("controller finished")
        .expect("controller ok");

        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.sessions_completed, 1);
        assert_eq!(stats.fetches, 4);
        assert_eq!(
            stats.last_message.as_deref(),
            Some("Background Task: imported 3 files")
        );
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&PollEvent::State(PollState::Idle)));
    }

    #[tokio::test]
    async fn missing_url_is_disabled_not_an_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stats = run_controller(&fast_config(None), ChannelView::new(tx), None)
            .await
            .expect("disabled mode is not an error");
        assert_eq!(stats, PollStats::default());
        assert_eq!(drain(&mut rx), vec![PollEvent::Info(InfoEvent::Disabled)]);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cfg = fast_config(Some("::not-a-url".into()));
        let err = run_controller(&cfg, ChannelView::new(tx), None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid status URL"));
    }

    #[tokio::test]
    async fn ui_quit_stops_an_active_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"is_running": true, "message": "x"})),
            )
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cfg = fast_config(Some(format!("{}/status", server.uri())));
        let quit = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cmd_tx.send(UiCommand::Quit).unwrap();
        };

        let (res, ()) = tokio::join!(
            run_controller(&cfg, ChannelView::new(tx), Some(cmd_rx)),
            quit
        );
        let stats = res.expect("controller ok");
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.sessions_completed, 0);
        assert!(stats.fetches >= 2);
    }
}
