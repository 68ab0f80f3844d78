//! Input handling for terminal connections.
//!
//! Byte-wise line editing for clients that send raw keystrokes (SSH
//! shells) as well as clients that send whole lines (Telnet in line mode,
//! netcat).

/// Control characters recognized by the line buffer.
pub mod control {
    /// Null.
    pub const NUL: u8 = 0x00;
    /// End of text (Ctrl+C).
    pub const ETX: u8 = 0x03;
    /// End of transmission (Ctrl+D).
    pub const EOT: u8 = 0x04;
    /// Bell.
    pub const BEL: u8 = 0x07;
    /// Backspace.
    pub const BS: u8 = 0x08;
    /// Line feed.
    pub const LF: u8 = 0x0A;
    /// Carriage return.
    pub const CR: u8 = 0x0D;
    /// Escape.
    pub const ESC: u8 = 0x1B;
    /// Delete.
    pub const DEL: u8 = 0x7F;
}

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// Result of processing input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
    /// A complete line was entered.
    Line(String),
    /// Input is still being buffered.
    Buffering,
    /// User pressed Ctrl+C (cancel).
    Cancel,
    /// User pressed Ctrl+D (EOF/logout).
    Eof,
    /// The line reached the size limit. Reported once per line; the rest of
    /// the line is discarded.
    Overflow,
}

/// Echo mode for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Characters are echoed back (the client has no local echo).
    Normal,
    /// Nothing is echoed (the client echoes locally).
    #[default]
    Off,
}

/// A line buffer for input processing.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    max_size: usize,
    echo_mode: EchoMode,
    overflowed: bool,
}

impl LineBuffer {
    /// Create a new line buffer with the given maximum size and echo mode.
    pub fn new(max_size: usize, echo_mode: EchoMode) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size.min(1024)),
            max_size,
            echo_mode,
            overflowed: false,
        }
    }

    /// Create a new line buffer with default settings (no echo).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES, EchoMode::Off)
    }

    /// Get the current echo mode.
    pub fn echo_mode(&self) -> EchoMode {
        self.echo_mode
    }

    /// Get the current buffer contents.
    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Process a single byte of input.
    ///
    /// Returns the input result and any bytes that should be echoed back.
    pub fn process_byte(&mut self, byte: u8) -> (InputResult, Vec<u8>) {
        let echo_on = self.echo_mode == EchoMode::Normal;
        match byte {
            control::CR | control::LF => {
                let line = self.take_line();
                let echo = if echo_on {
                    vec![control::CR, control::LF]
                } else {
                    vec![]
                };
                (InputResult::Line(line), echo)
            }
            control::BS | control::DEL => {
                if self.pop_char() && echo_on {
                    (InputResult::Buffering, vec![control::BS, b' ', control::BS])
                } else {
                    (InputResult::Buffering, vec![])
                }
            }
            control::ETX => {
                self.clear();
                let echo = if echo_on {
                    vec![b'^', b'C', control::CR, control::LF]
                } else {
                    vec![]
                };
                (InputResult::Cancel, echo)
            }
            control::EOT => (InputResult::Eof, vec![]),
            control::NUL | control::ESC => (InputResult::Buffering, vec![]),
            _ if byte < 32 => (InputResult::Buffering, vec![]),
            _ if self.overflowed => (InputResult::Buffering, vec![]),
            _ => {
                if self.buffer.len() < self.max_size {
                    self.buffer.push(byte);
                    let echo = if echo_on { vec![byte] } else { vec![] };
                    (InputResult::Buffering, echo)
                } else {
                    self.overflowed = true;
                    let cut = self.drop_partial_char();
                    let mut echo = Vec::new();
                    if echo_on {
                        for _ in 0..cut {
                            echo.extend_from_slice(&[control::BS, b' ', control::BS]);
                        }
                    }
                    echo.push(control::BEL);
                    (InputResult::Overflow, echo)
                }
            }
        }
    }

    /// Process multiple bytes of input.
    ///
    /// Returns the completed results in order, plus all echo bytes.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> (Vec<InputResult>, Vec<u8>) {
        let mut results = Vec::new();
        let mut echo = Vec::new();
        for &byte in bytes {
            let (result, echoed) = self.process_byte(byte);
            echo.extend_from_slice(&echoed);
            if result != InputResult::Buffering {
                results.push(result);
            }
        }
        (results, echo)
    }

    /// Remove the last UTF-8 character. Returns false if the buffer was empty.
    fn pop_char(&mut self) -> bool {
        while let Some(byte) = self.buffer.pop() {
            // Stop once a lead byte (or ASCII) has been removed.
            if byte & 0xC0 != 0x80 {
                return true;
            }
        }
        false
    }

    /// Drop a trailing UTF-8 sequence that the size limit cut short.
    ///
    /// Returns the number of echoed cells to erase (0 or 1).
    fn drop_partial_char(&mut self) -> usize {
        let Some(start) = self.buffer.iter().rposition(|b| b & 0xC0 != 0x80) else {
            return 0;
        };
        let expected = match self.buffer[start] {
            b if b & 0x80 == 0 => 1,
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => return 0,
        };
        if self.buffer.len() - start < expected {
            self.buffer.truncate(start);
            1
        } else {
            0
        }
    }

    fn take_line(&mut self) -> String {
        self.overflowed = false;
        let bytes = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}
