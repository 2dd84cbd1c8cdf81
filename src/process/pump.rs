//! Stream pumping with a low-latency partial-line flush heuristic.
//!
//! Interactive programs often print prompts such as `Enter filename: ` without
//! a trailing newline. Reading line-by-line would hold those back until the
//! user answers, so each pump reads one byte at a time and hands the buffered
//! text to the dispatch loop as soon as it looks like a complete unit.

use std::io::{self, BufReader, Read};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::types::{FlushTrigger, OutputChunk, StreamSource};

/// Buffered characters after which a chunk is emitted regardless of content.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Characters that usually terminate an interactive prompt.
pub const PROMPT_DELIMITERS: [u8; 2] = [b':', b'>'];

/// Words that mark a prompt; checked whenever a space is read.
pub const PROMPT_KEYWORDS: [&str; 7] = [
    "continue", "name", "input", "enter", "press", "choose", "select",
];

/// Text released by the scanner together with the reason it was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub text: String,
    pub trigger: FlushTrigger,
}

/// Accumulates bytes from one stream and decides when to flush them.
///
/// Triggers only ever fire on a complete UTF-8 character, so a multi-byte
/// character is never split across two chunks. Invalid sequences are replaced
/// with U+FFFD when the chunk is decoded.
#[derive(Debug, Default)]
pub struct FlushScanner {
    buffer: Vec<u8>,
    chars: usize,
    // continuation bytes still expected for the current character
    remaining: u8,
}

impl FlushScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte, returning a chunk if a flush trigger fired.
    pub fn scan(&mut self, byte: u8) -> Option<Flush> {
        self.buffer.push(byte);

        match byte {
            0x00..=0x7F => {
                self.remaining = 0;
                self.chars += 1;
            }
            0x80..=0xBF if self.remaining > 0 => {
                self.remaining -= 1;
            }
            0xC0..=0xDF => self.begin_sequence(1),
            0xE0..=0xEF => self.begin_sequence(2),
            0xF0..=0xF7 => self.begin_sequence(3),
            // stray continuation or invalid lead byte, decodes to U+FFFD
            _ => {
                self.remaining = 0;
                self.chars += 1;
            }
        }

        if self.remaining > 0 {
            return None;
        }

        let trigger = if byte == b'\n' {
            Some(FlushTrigger::Newline)
        } else if PROMPT_DELIMITERS.contains(&byte) {
            Some(FlushTrigger::Delimiter)
        } else if self.chars >= MAX_CHUNK_CHARS {
            Some(FlushTrigger::LengthCap)
        } else if byte == b' ' && self.contains_prompt_keyword() {
            Some(FlushTrigger::PromptKeyword)
        } else {
            None
        };

        trigger.map(|trigger| self.take(trigger))
    }

    /// Releases whatever is still buffered once the stream has ended.
    pub fn finish(&mut self, trigger: FlushTrigger) -> Option<Flush> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take(trigger))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn begin_sequence(&mut self, continuation: u8) {
        self.remaining = continuation;
        self.chars += 1;
    }

    fn contains_prompt_keyword(&self) -> bool {
        let lower = String::from_utf8_lossy(&self.buffer).to_lowercase();
        PROMPT_KEYWORDS.iter().any(|word| lower.contains(word))
    }

    fn take(&mut self, trigger: FlushTrigger) -> Flush {
        let bytes = std::mem::take(&mut self.buffer);
        self.chars = 0;
        self.remaining = 0;
        Flush {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            trigger,
        }
    }
}

/// Spawns a named thread that pumps `reader` into `tx`.
pub fn spawn_pump<R>(
    reader: R,
    source: StreamSource,
    tx: UnboundedSender<OutputChunk>,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("argrun-{}", source.name()))
        .spawn(move || pump(reader, source, &tx))
}

/// Reads `reader` until end-of-stream or error, emitting chunks onto `tx`.
///
/// A read error flushes the partial buffer and then emits an error-classified
/// chunk describing the failure.
pub fn pump<R: Read>(reader: R, source: StreamSource, tx: &UnboundedSender<OutputChunk>) {
    let mut reader = BufReader::new(reader);
    let mut scanner = FlushScanner::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                if let Some(flush) = scanner.finish(FlushTrigger::EndOfStream) {
                    send(tx, source, flush);
                }
                debug!("{} reached end of stream", source.name());
                break;
            }
            Ok(_) => {
                if let Some(flush) = scanner.scan(byte[0]) {
                    if !send(tx, source, flush) {
                        // dispatch loop is gone, nobody is listening
                        break;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading {}: {}", source.name(), e);
                if let Some(flush) = scanner.finish(FlushTrigger::ReadError) {
                    send(tx, source, flush);
                }
                let chunk = OutputChunk::error(source, format!("Error reading {}: {}\n", source.name(), e));
                if tx.send(chunk).is_err() {
                    debug!("{} error chunk dropped, receiver closed", source.name());
                }
                break;
            }
        }
    }
}

fn send(tx: &UnboundedSender<OutputChunk>, source: StreamSource, flush: Flush) -> bool {
    debug!("{} flush ({:?}): {:?}", source.name(), flush.trigger, flush.text);
    tx.send(OutputChunk::new(source, flush.text)).is_ok()
}
