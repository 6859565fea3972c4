use crate::model::{Affordance, PollEvent, PollState};
use crate::view::ContainerState;
use ratatui::{style::Color, style::Style};
use std::time::Instant;

pub struct UiState {
    pub status_url: Option<String>,
    pub container: ContainerState,
    pub info: String,
    pub show_help: bool,
    pub fetch_failures: u64,
    pub last_change: Option<Instant>,
    // Set once the poller stops sending; the UI stays up until the user quits.
    pub poller_done: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status_url: None,
            container: ContainerState::default(),
            info: String::new(),
            show_help: false,
            fetch_failures: 0,
            last_change: None,
            poller_done: false,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: PollEvent) {
        if let PollEvent::Info(info) = &ev {
            if matches!(info, crate::model::InfoEvent::FetchFailed(_)) {
                self.fetch_failures += 1;
            }
            self.info = info.to_message();
            return;
        }
        if self.container.apply(&ev) {
            self.last_change = Some(Instant::now());
        }
        if let PollEvent::State(s) = ev {
            self.info = match s {
                PollState::Active => "Task running; polling".into(),
                PollState::FinishingDisplay => "Task finished".into(),
                PollState::Idle => "Idle".into(),
            };
        }
    }

    /// Style for a control button: emphasized when `emphasized`, muted otherwise.
    pub fn button_style(emphasized: bool) -> Style {
        if emphasized {
            Style::default().fg(Color::Black).bg(Color::Blue)
        } else {
            Style::default().fg(Color::Gray).bg(Color::DarkGray)
        }
    }

    /// (start emphasized, stop emphasized)
    pub fn button_emphasis(&self) -> (bool, bool) {
        match self.container.affordance {
            Affordance::Idle => (true, false),
            Affordance::Active => (false, true),
        }
    }

    pub fn state_color(&self) -> Color {
        match self.container.state {
            PollState::Idle => Color::Gray,
            PollState::Active => Color::Green,
            PollState::FinishingDisplay => Color::Yellow,
        }
    }
}
