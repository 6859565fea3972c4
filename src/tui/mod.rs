mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::model::PollEvent;
use crate::orchestrator::{self, UiCommand};
use crate::view::ChannelView;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    // Reject a bad URL before the alternate screen hides the error.
    if let Some(url) = cfg.status_url.as_deref() {
        reqwest::Url::parse(url).with_context(|| format!("invalid status URL: {url}"))?;
    }

    // Unbounded channels avoid backpressure between the poller and the render loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PollEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let status_url = cfg.status_url.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(status_url, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, ChannelView::new(event_tx), Some(cmd_rx)).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    ui_thread_result(join_res)?;

    res.map(|stats| {
        tracing::info!(
            fetches = stats.fetches,
            sessions = stats.sessions_started,
            "poller stopped"
        );
    })
}

fn ui_thread_result(
    join_res: Result<std::thread::Result<Result<()>>, tokio::task::JoinError>,
) -> Result<()> {
    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("failed to join TUI thread: {e}")),
    }
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    status_url: Option<String>,
    mut event_rx: UnboundedReceiver<PollEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        status_url,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        loop {
            match event_rx.try_recv() {
                Ok(ev) => state.apply_event(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !state.poller_done {
                        state.poller_done = true;
                        state.info = if state.info.is_empty() {
                            "Poller stopped; press q to quit".into()
                        } else {
                            format!("{} (poller stopped; press q to quit)", state.info)
                        };
                    }
                    break;
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('r')) => {
                        if state.poller_done {
                            state.info = "Poller stopped; restart the program to recheck".into();
                        } else {
                            state.info = "Recheck requested…".into();
                            let _ = cmd_tx.send(UiCommand::Recheck);
                        }
                    }
                    (_, KeyCode::Char('?')) => {
                        state.show_help = !state.show_help;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let url = state.status_url.as_deref().unwrap_or("(no status URL: disabled)");
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            state.container.state.label(),
            Style::default()
                .fg(state.state_color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(url, Style::default().fg(Color::Cyan)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("task-status-poller"),
    );
    f.render_widget(header, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        draw_dashboard(chunks[1], f, state);
    }
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(5), // Status container
                Constraint::Length(3), // Start / Stop controls
                Constraint::Min(0),    // Spacer
                Constraint::Length(3), // Info row
            ]
            .as_ref(),
        )
        .split(area);

    // Hidden container renders as an empty frame so the layout doesn't jump.
    let status_block = Block::default().borders(Borders::ALL).title("Status");
    if state.container.visible {
        let p = Paragraph::new(state.container.message.as_str())
            .wrap(Wrap { trim: true })
            .block(status_block);
        f.render_widget(p, main[0]);
    } else {
        f.render_widget(status_block, main[0]);
    }

    let buttons = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(14), Constraint::Length(14), Constraint::Min(0)].as_ref())
        .split(main[1]);
    let (start_on, stop_on) = state.button_emphasis();
    for (label, emphasized, slot) in [("Start", start_on, buttons[0]), ("Stop", stop_on, buttons[1])]
    {
        let b = Paragraph::new(label)
            .alignment(Alignment::Center)
            .style(UiState::button_style(emphasized))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(b, slot);
    }

    let mut info = vec![Span::raw(state.info.as_str())];
    if state.fetch_failures > 0 {
        info.push(Span::raw("  "));
        info.push(Span::styled(
            format!("{} failed check(s)", state.fetch_failures),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(t) = state.last_change {
        info.push(Span::raw(format!("  updated {}s ago", t.elapsed().as_secs())));
    }
    info.push(Span::styled("  r recheck · ? help · q quit", Style::default().fg(Color::DarkGray)));
    let p = Paragraph::new(Line::from(info)).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, main[3]);
}
