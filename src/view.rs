//! The display surface the poller drives.
//!
//! The poller never talks to a terminal directly; it only calls [`ViewBinding`].
//! Presentation layers (text, JSON, TUI) sit behind [`ChannelView`], which turns
//! each call into a [`PollEvent`].

use crate::model::{Affordance, InfoEvent, PollEvent, PollState};
use tokio::sync::mpsc::UnboundedSender;

pub trait ViewBinding {
    /// Replace the status text.
    fn set_message(&mut self, text: &str);

    /// Show or hide the status container.
    fn set_visible(&mut self, visible: bool);

    /// `true` emphasizes the stop control, `false` the start control.
    fn set_active_affordance(&mut self, active: bool);

    fn set_state(&mut self, _state: PollState) {}

    fn notify(&mut self, _info: InfoEvent) {}
}

/// Forwards view mutations to a presentation layer over a channel.
///
/// Send errors are ignored: a closed receiver means the UI went away, and the
/// poller keeps its own state regardless.
#[derive(Debug, Clone)]
pub struct ChannelView {
    tx: UnboundedSender<PollEvent>,
}

impl ChannelView {
    pub fn new(tx: UnboundedSender<PollEvent>) -> Self {
        Self { tx }
    }
}

impl ViewBinding for ChannelView {
    fn set_message(&mut self, text: &str) {
        let _ = self.tx.send(PollEvent::Message(text.to_string()));
    }

    fn set_visible(&mut self, visible: bool) {
        let _ = self.tx.send(PollEvent::Visibility(visible));
    }

    fn set_active_affordance(&mut self, active: bool) {
        let _ = self
            .tx
            .send(PollEvent::Affordance(Affordance::from(active)));
    }

    fn set_state(&mut self, state: PollState) {
        let _ = self.tx.send(PollEvent::State(state));
    }

    fn notify(&mut self, info: InfoEvent) {
        let _ = self.tx.send(PollEvent::Info(info));
    }
}

/// Latest rendered container state, folded from [`PollEvent`]s.
///
/// Presentation layers keep one of these so they render the container the same
/// way regardless of how they print it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub message: String,
    pub visible: bool,
    pub affordance: Affordance,
    pub state: PollState,
}

impl Default for ContainerState {
    fn default() -> Self {
        Self {
            message: String::new(),
            visible: false,
            affordance: Affordance::Idle,
            state: PollState::Idle,
        }
    }
}

impl ContainerState {
    /// Apply one event; returns `true` if anything visible changed.
    pub fn apply(&mut self, ev: &PollEvent) -> bool {
        match ev {
            PollEvent::Message(m) => replace(&mut self.message, m.clone()),
            PollEvent::Visibility(v) => replace(&mut self.visible, *v),
            PollEvent::Affordance(a) => replace(&mut self.affordance, *a),
            PollEvent::State(s) => replace(&mut self.state, *s),
            PollEvent::Info(_) => false,
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
