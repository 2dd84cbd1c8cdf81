//! Value types shared between the controller, the pumps and the sink.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sink::Classification;

/// A fully resolved command: program path plus discrete argument tokens.
///
/// Arguments are handed to the OS as-is, never re-split or shell-interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Renders the command as a single shell-quoted line, for display only.
    pub fn display_line(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// The state of the single process slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Idle,
    Starting,
    Running(u32),
    Stopping,
    Exited(i32),
    Failed(String),
}

impl ProcessState {
    /// Whether the slot holds (or is about to hold) a live handle.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting | Self::Running(_) | Self::Stopping)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running(pid) => write!(f, "running (pid {pid})"),
            Self::Stopping => write!(f, "stopping"),
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Which output stream a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// A unit of output text, not necessarily a full line.
///
/// `classification` is only set when the core already knows what the text is
/// (e.g. a read error); otherwise the sink classifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub source: StreamSource,
    pub text: String,
    pub classification: Option<Classification>,
}

impl OutputChunk {
    pub fn new(source: StreamSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            classification: None,
        }
    }

    pub fn error(source: StreamSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            classification: Some(Classification::Error),
        }
    }
}

/// Why a pump emitted its buffered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Newline,
    Delimiter,
    LengthCap,
    PromptKeyword,
    EndOfStream,
    ReadError,
}

/// Progress markers published alongside state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Launching { command_line: String },
    StopRequested,
    InterruptSent,
    TerminatedGracefully,
    Escalating,
    ForceKilled,
    TreeKilled,
    StopCompleted,
    NoActiveProcess,
    SignalFailed { reason: String },
    InputEcho { line: String },
    InputSent,
    InputNotDelivered { reason: String },
}

/// Everything the controller publishes to the sink side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    State(ProcessState),
    Output(OutputChunk),
    Notice(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line_quotes_arguments() {
        let spec = CommandSpec::new("yt-dlp", ["-o", "%(title)s.%(ext)s", "my video"]);
        assert_eq!(spec.display_line(), "yt-dlp -o '%(title)s.%(ext)s' 'my video'");
    }

    #[test]
    fn test_live_states() {
        assert!(!ProcessState::Idle.is_live());
        assert!(ProcessState::Starting.is_live());
        assert!(ProcessState::Running(42).is_live());
        assert!(ProcessState::Stopping.is_live());
        assert!(!ProcessState::Exited(0).is_live());
        assert!(!ProcessState::Failed("gone".into()).is_live());
    }
}
