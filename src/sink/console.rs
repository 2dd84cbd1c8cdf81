//! Terminal sink that colours transcript text by classification.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use tracing::error;

use super::{Classification, OutputSink};

pub struct ConsoleSink<W: Write> {
    writer: W,
    colored: bool,
    // the terminal already shows what the user typed
    echo_input: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(colored: bool) -> Self {
        Self::new(io::stdout(), colored, false)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W, colored: bool, echo_input: bool) -> Self {
        Self {
            writer,
            colored,
            echo_input,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, text: &str, classification: Option<Classification>) -> io::Result<()> {
        let style = classification.filter(|_| self.colored).map(color_for);
        match style {
            Some((color, dim)) => {
                queue!(self.writer, SetForegroundColor(color))?;
                if dim {
                    queue!(self.writer, SetAttribute(Attribute::Dim))?;
                }
                queue!(self.writer, Print(text), SetAttribute(Attribute::Reset), ResetColor)?;
            }
            None => queue!(self.writer, Print(text))?,
        }
        self.writer.flush()
    }
}

fn color_for(classification: Classification) -> (Color, bool) {
    match classification {
        Classification::Error => (Color::Red, false),
        Classification::Warning => (Color::Yellow, false),
        Classification::Download => (Color::Cyan, false),
        Classification::Progress => (Color::Blue, false),
        Classification::UserInput => (Color::Green, false),
        Classification::Marker => (Color::Grey, true),
    }
}

impl<W: Write> OutputSink for ConsoleSink<W> {
    fn append(&mut self, text: &str, classification: Option<Classification>) {
        if classification == Some(Classification::UserInput) && !self.echo_input {
            return;
        }
        if let Err(e) = self.write(text, classification) {
            error!("Failed to write to console: {}", e);
        }
    }
}
