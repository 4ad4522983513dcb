//! Command line collector
//!
//! Turns arbitrary chunks of bytes read from the control connection into
//! complete command lines. CRLF, lone CR and lone LF all terminate a line.
//! A CR terminates immediately; an LF arriving right after it (in the same
//! or a later chunk) is swallowed so no empty command is produced.

use crate::protocol::Command;

/// Text encoding used to decode command lines. Switched by `OPTS UTF8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Collects command lines across reads. One instance per control connection.
#[derive(Debug, Default)]
pub struct CommandCollector {
    buffer: Vec<u8>,
    skip_lf: bool,
    discarding: bool,
}

impl CommandCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every command completed by it.
    /// Unterminated trailing bytes stay buffered for the next call.
    pub fn collect(&mut self, data: &[u8], encoding: TextEncoding) -> Vec<Command> {
        let mut commands = Vec::new();

        for &byte in data {
            if std::mem::take(&mut self.skip_lf) && byte == b'\n' {
                continue;
            }

            match byte {
                b'\r' => {
                    self.skip_lf = true;
                    self.complete_line(encoding, &mut commands);
                }
                b'\n' => self.complete_line(encoding, &mut commands),
                _ => self.buffer.push(byte),
            }
        }

        commands
    }

    /// Bytes received but not yet terminated.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drops the unterminated bytes and everything up to the next terminator.
    /// Used when a line grows past the command length limit.
    pub fn discard_pending(&mut self) {
        self.buffer.clear();
        self.discarding = true;
    }

    fn complete_line(&mut self, encoding: TextEncoding, commands: &mut Vec<Command>) {
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
            return;
        }
        if self.buffer.is_empty() {
            return;
        }
        let line = encoding.decode(&self.buffer);
        self.buffer.clear();
        commands.push(Command::parse(&line));
    }
}
