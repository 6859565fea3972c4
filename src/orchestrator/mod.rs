//! Application-level orchestration.
//!
//! This module owns the poller lifecycle: it builds the status client, runs the
//! poller loop, and translates UI commands and Ctrl-C into poller commands.
//! UI/CLI layers call into this module to keep responsibilities separated.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
