//! Channels between the front-end and the process controller.
//!
//! The front-end never calls into the controller directly. It sends
//! [`ControlRequest`]s over one channel and receives [`ProcessEvent`]s on
//! another, so the controller never depends on any UI framework.
//!
//! # Architecture
//!
//! - **Control requests**: Start/Stop/SendInput issued by the single
//!   controlling caller, served one at a time by
//!   [`ProcessController::serve`](crate::process::ProcessController::serve)
//! - **Process events**: output chunks, state changes and notices published by
//!   the controller and its workers
//! - **User input**: lines typed on the terminal, read on a dedicated thread so
//!   a blocking read never stalls the event loop

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender};

use crate::process::{CommandSpec, ProcessEvent};

/// Requests accepted by the process controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ControlRequest {
    Start(CommandSpec),
    Stop,
    SendInput(String),
    /// Stop any live process and stop serving requests.
    Shutdown,
}

/// Creates the request channel. Requests are rare and tiny, so it is unbounded.
pub fn init_control_channel() -> (UnboundedSender<ControlRequest>, UnboundedReceiver<ControlRequest>) {
    mpsc::unbounded_channel()
}

/// Creates the process event channel.
///
/// Unbounded because producers include the pump-facing dispatch task, which
/// must never block on a slow front-end.
pub fn init_process_eventsource() -> (UnboundedSender<ProcessEvent>, UnboundedReceiver<ProcessEvent>) {
    mpsc::unbounded_channel()
}

/// Reads lines from stdin on a dedicated thread.
///
/// The thread exits at end of input or once the receiver is dropped.
pub fn init_user_input() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
