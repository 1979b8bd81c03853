//! Newline-delimited framing over raw bytes.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// One decoded unit of input.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A line without its `\n` or `\r\n` terminator. Not checked for UTF-8.
    Line(BytesMut),
    /// A line longer than the limit. Its bytes are dropped.
    Oversized,
}

/// Splits a byte stream on `\n`.
///
/// Content problems never fail the stream: oversized lines come out as
/// [`Frame::Oversized`] and decoding resumes at the next newline. Only I/O
/// errors end it.
#[derive(Debug)]
pub struct FrameCodec {
    max_len: usize,
    scanned: usize,
    discarding: bool,
}

impl FrameCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            scanned: 0,
            discarding: false,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, std::io::Error> {
        loop {
            let newline = buf[self.scanned..].iter().position(|b| *b == b'\n');
            match newline {
                Some(offset) => {
                    let end = self.scanned + offset;
                    self.scanned = 0;
                    let mut line = buf.split_to(end + 1);
                    if self.discarding {
                        // Tail of a line already reported as oversized
                        self.discarding = false;
                        continue;
                    }
                    line.truncate(end);
                    if line.last() == Some(&b'\r') {
                        line.truncate(end - 1);
                    }
                    if line.len() > self.max_len {
                        return Ok(Some(Frame::Oversized));
                    }
                    return Ok(Some(Frame::Line(line)));
                }
                None if buf.len() > self.max_len || self.discarding => {
                    buf.clear();
                    self.scanned = 0;
                    if self.discarding {
                        return Ok(None);
                    }
                    self.discarding = true;
                    return Ok(Some(Frame::Oversized));
                }
                None => {
                    self.scanned = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, std::io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.scanned = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        // Unterminated last line
        Ok(Some(Frame::Line(buf.split())))
    }
}
