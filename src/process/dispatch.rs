//! The consumer side of the chunk channel.
//!
//! Chunks are forwarded in arrival order while the process runs. Once it has
//! exited the loop keeps draining until the channel has been quiet for the
//! configured window, then publishes the final state.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, info};

use super::controller::{Liveness, Shared};
use super::types::{OutputChunk, ProcessEvent, StreamSource};
use crate::sink::AnsiStripper;

/// Per-stream escape stripping, since a sequence may straddle two chunks.
#[derive(Default)]
struct Strippers {
    stdout: AnsiStripper,
    stderr: AnsiStripper,
}

impl Strippers {
    fn clean(&mut self, chunk: OutputChunk) -> Option<OutputChunk> {
        let stripper = match chunk.source {
            StreamSource::Stdout => &mut self.stdout,
            StreamSource::Stderr => &mut self.stderr,
        };
        let text = stripper.strip(&chunk.text);
        if text.is_empty() {
            None
        } else {
            Some(OutputChunk { text, ..chunk })
        }
    }
}

pub(super) async fn run(shared: Arc<Shared>, id: u64, mut chunks: UnboundedReceiver<OutputChunk>) {
    let poll = shared.config.poll_interval;
    let mut strippers = Strippers::default();
    let mut forward = |chunk: OutputChunk| {
        if let Some(chunk) = strippers.clean(chunk) {
            shared.emit(ProcessEvent::Output(chunk));
        }
    };
    // both pumps finished and dropped their senders
    let mut closed = false;

    let outcome = loop {
        if closed {
            tokio::time::sleep(poll).await;
        } else {
            match timeout(poll, chunks.recv()).await {
                Ok(Some(chunk)) => forward(chunk),
                Ok(None) => {
                    debug!("Output streams closed");
                    closed = true;
                }
                Err(_) => {}
            }
        }

        match shared.poll_exit(id) {
            Liveness::Running => continue,
            Liveness::Gone => {
                // a stop that could not confirm termination already released the slot
                info!("Process slot released elsewhere, dispatch loop ending");
                return;
            }
            outcome => break outcome,
        }
    };

    let quiet_limit = shared.config.drain_polls();
    let mut quiet = 0;
    while !closed && quiet < quiet_limit {
        match timeout(poll, chunks.recv()).await {
            Ok(Some(chunk)) => {
                forward(chunk);
                quiet = 0;
            }
            Ok(None) => closed = true,
            Err(_) => quiet += 1,
        }
    }

    debug!("Finished reading process output");
    shared.finish(id, outcome);
}
