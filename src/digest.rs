use crate::urc::FrameHeader;
use heapless::Vec;

/// Staging capacity for one textual line. Sized for the longest reply the
/// firmware produces (scan result lines).
pub(crate) const LINE_CAPACITY: usize = 256;

/// One classified unit of the inbound stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    /// Completed textual line, CRLF stripped
    Line(Vec<u8, LINE_CAPACITY>),
    /// Readiness prompt of the raw-payload handshake
    Prompt,
    /// Frame marker, exactly `length` raw payload bytes follow
    Frame(FrameHeader),
}

/// Line-based tokenizer for everything outside binary frames.
///
/// Textual lines complete on LF with CR stripped. The frame marker completes
/// on its `:` separator instead, since the payload behind it may contain any
/// byte value and must not be line-matched. A line exceeding the staging
/// capacity is discarded up to the next terminator and counted.
pub(crate) struct Digester {
    line: Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
    discarded_lines: u32,
}

impl Digester {
    pub(crate) const fn new() -> Self {
        Self {
            line: Vec::new(),
            overflowed: false,
            discarded_lines: 0,
        }
    }

    /// Consumes one byte and returns a token once one completes.
    ///
    /// The prompt is only matched while `expect_prompt` is set, mirroring the
    /// send handshake. Outside of it a `> ` sequence stays ordinary text.
    pub(crate) fn push(&mut self, byte: u8, expect_prompt: bool) -> Option<Token> {
        if self.overflowed {
            if byte == b'\n' {
                self.overflowed = false;
            }
            return None;
        }

        match byte {
            b'\r' => None,
            b'\n' => {
                if self.line.is_empty() {
                    return None;
                }
                Some(Token::Line(core::mem::take(&mut self.line)))
            }
            b':' if self.line.starts_with(b"+IPD,") => {
                if let Some(header) = FrameHeader::parse(&self.line) {
                    self.line.clear();
                    return Some(Token::Frame(header));
                }
                // Malformed header, keep matching it as text
                self.stage(byte, expect_prompt)
            }
            _ => self.stage(byte, expect_prompt),
        }
    }

    fn stage(&mut self, byte: u8, expect_prompt: bool) -> Option<Token> {
        if self.line.push(byte).is_err() {
            self.overflowed = true;
            self.discarded_lines = self.discarded_lines.wrapping_add(1);
            self.line.clear();
            return None;
        }

        if expect_prompt && self.line.as_slice() == b"> " {
            self.line.clear();
            return Some(Token::Prompt);
        }

        None
    }

    /// Currently staged partial line.
    pub(crate) fn staged(&self) -> &[u8] {
        &self.line
    }

    /// Drops any staged bytes and leaves discard mode.
    pub(crate) fn clear(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }

    /// Number of oversized lines dropped so far.
    pub(crate) fn discarded_lines(&self) -> u32 {
        self.discarded_lines
    }
}

/// Progress of an in-flight binary frame extraction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameCursor {
    pub(crate) link_id: usize,
    pub(crate) offset: usize,
    pub(crate) total: usize,
}

impl FrameCursor {
    pub(crate) fn new(header: &FrameHeader) -> Self {
        Self {
            link_id: header.link_id,
            offset: 0,
            total: header.length,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.total - self.offset
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.offset >= self.total
    }
}
