//! Terminal escape sequence removal.
//!
//! Chunks are cut at arbitrary points (a `:` inside an SGR parameter list is a
//! flush delimiter), so the stripper keeps its parser state between calls and
//! one instance is used per output stream.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Ground,
    Escape,
    Intermediate,
    Csi,
    Osc,
    OscEscape,
}

/// Incremental remover of ANSI/VT escape sequences.
#[derive(Debug, Default)]
pub struct AnsiStripper {
    state: State,
}

impl AnsiStripper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every escape sequence from `text`, leaving all other characters
    /// intact. A sequence left open at the end is continued on the next call.
    pub fn strip(&mut self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        for ch in text.chars() {
            self.step(ch, &mut result);
        }
        result
    }

    fn step(&mut self, ch: char, out: &mut String) {
        self.state = match self.state {
            State::Ground => {
                if ch == '\x1b' {
                    State::Escape
                } else {
                    out.push(ch);
                    State::Ground
                }
            }
            State::Escape => match ch {
                '[' => State::Csi,
                ']' => State::Osc,
                '\x1b' => State::Escape,
                // nF sequences such as ESC ( B
                ' '..='/' => State::Intermediate,
                // two-character sequences (ESC 7, ESC M, ESC c, ...)
                '0'..='~' => State::Ground,
                _ => {
                    out.push(ch);
                    State::Ground
                }
            },
            State::Intermediate => match ch {
                ' '..='/' => State::Intermediate,
                '0'..='~' => State::Ground,
                _ => {
                    out.push(ch);
                    State::Ground
                }
            },
            State::Csi => match ch {
                // parameter and intermediate bytes
                '0'..='?' | ' '..='/' => State::Csi,
                '@'..='~' => State::Ground,
                _ => {
                    out.push(ch);
                    State::Ground
                }
            },
            State::Osc => match ch {
                '\x07' => State::Ground,
                '\x1b' => State::OscEscape,
                _ => State::Osc,
            },
            State::OscEscape => {
                if ch == '\\' {
                    State::Ground
                } else {
                    // unterminated OSC interrupted by a new escape sequence
                    self.state = State::Escape;
                    self.step(ch, out);
                    return;
                }
            }
        };
    }
}

/// Strips escape sequences from a self-contained piece of text.
pub fn strip_escapes(text: &str) -> String {
    AnsiStripper::new().strip(text)
}
