use std::io;

use thiserror::Error;

/// Failures surfaced by [`ProcessController`](super::ProcessController) operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no program path configured")]
    Configuration,

    #[error("a process is already running (pid {pid})")]
    Busy { pid: u32 },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{}", not_running_message(*.exit_code))]
    NotRunning { exit_code: Option<i32> },

    #[error("process closed its input stream")]
    BrokenPipe,

    #[error("failed to write input: {0}")]
    Io(#[from] io::Error),

    #[error("failed to deliver termination signal: {0}")]
    Signal(String),

    #[error("process controller requires a tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

fn not_running_message(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("process has exited with code: {code}"),
        None => "no active process to send input to".to_string(),
    }
}

impl ControlError {
    /// Maps a write failure on the child's stdin.
    pub(crate) fn from_write(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::BrokenPipe {
            Self::BrokenPipe
        } else {
            Self::Io(err)
        }
    }
}
