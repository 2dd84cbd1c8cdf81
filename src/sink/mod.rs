//! Presentation side of the process core.
//!
//! The controller publishes [`ProcessEvent`]s; an [`OutputSink`] turns them into
//! a transcript. Text is classified by keyword so a front-end can colour
//! errors, warnings, downloads and progress lines differently.

mod ansi;
mod console;

pub use ansi::{strip_escapes, AnsiStripper};
pub use console::ConsoleSink;

use serde::{Deserialize, Serialize};

use crate::process::{Notice, ProcessEvent, ProcessState};

/// Presentation category of a piece of transcript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Error,
    Warning,
    Download,
    Progress,
    /// Text the user typed, echoed back into the transcript.
    UserInput,
    /// Lifecycle markers produced by the core itself.
    Marker,
}

/// Receives transcript text. Text handed to a sink never contains terminal
/// escape sequences.
pub trait OutputSink {
    fn append(&mut self, text: &str, classification: Option<Classification>);
}

/// Keyword-based classification, first match wins.
pub fn classify(text: &str) -> Option<Classification> {
    let lower = text.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if any(&["error", "failed", "exception"]) {
        Some(Classification::Error)
    } else if any(&["warning", "warn"]) {
        Some(Classification::Warning)
    } else if any(&["download"]) {
        Some(Classification::Download)
    } else if text.contains('[') && text.contains(']') {
        Some(Classification::Progress)
    } else {
        None
    }
}

/// Renders an event as transcript text. Events with no visible form yield `None`.
pub fn render(event: &ProcessEvent) -> Option<(String, Option<Classification>)> {
    use Classification::{Error, Marker, UserInput};

    let rendered = match event {
        ProcessEvent::Output(chunk) => (chunk.text.clone(), chunk.classification),
        ProcessEvent::State(state) => match state {
            ProcessState::Idle | ProcessState::Starting | ProcessState::Stopping => return None,
            ProcessState::Running(pid) => (format!("[Process started. PID: {pid}]\n"), Some(Marker)),
            ProcessState::Exited(code) => (format!("[Process exited with code: {code}]\n"), Some(Marker)),
            ProcessState::Failed(reason) => (format!("[ERROR] {reason}\n"), Some(Error)),
        },
        ProcessEvent::Notice(notice) => match notice {
            Notice::Launching { command_line } => (format!("[Running command: {command_line}]\n"), Some(Marker)),
            Notice::StopRequested => ("[Attempting to stop the process...]\n".to_string(), Some(Marker)),
            Notice::InterruptSent => ("[Interruption signal sent (Ctrl+C)]\n".to_string(), Some(Marker)),
            Notice::TerminatedGracefully => ("[Process terminated gracefully]\n".to_string(), Some(Marker)),
            Notice::Escalating => (
                "[Process did not respond. Forcing termination...]\n".to_string(),
                Some(Marker),
            ),
            Notice::ForceKilled => ("[Process forcefully terminated]\n".to_string(), Some(Marker)),
            Notice::TreeKilled => ("[Process terminated by user]\n".to_string(), Some(Marker)),
            Notice::StopCompleted => ("[Stop completed]\n".to_string(), Some(Marker)),
            Notice::NoActiveProcess => ("[No active process to stop]\n".to_string(), Some(Marker)),
            Notice::SignalFailed { reason } => (format!("[ERROR] Failed to stop process: {reason}\n"), Some(Error)),
            Notice::InputEcho { line } => (format!("{line}\n"), Some(UserInput)),
            Notice::InputSent => ("[Input sent to process]\n".to_string(), Some(Marker)),
            Notice::InputNotDelivered { reason } => (
                format!("[ERROR] Failed to send input to process: {reason}\n"),
                Some(Error),
            ),
        },
    };
    Some(rendered)
}

/// Hands an event to `sink`, classifying unclassified text on the way.
pub fn deliver<S: OutputSink + ?Sized>(sink: &mut S, event: &ProcessEvent) {
    if let Some((text, classification)) = render(event) {
        let classification = classification.or_else(|| classify(&text));
        sink.append(&text, classification);
    }
}
