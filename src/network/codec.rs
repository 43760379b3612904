use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

/// Default upper bound for one wire line.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Thin wrapper over `LinesCodec`: one message per line, surrounding whitespace
/// trimmed and blank lines skipped.
///
/// Lines longer than the limit, and lines that are not valid UTF-8, are dropped
/// here instead of surfacing as a stream error, so neither tears down the
/// connection.
#[derive(Debug, Clone)]
pub struct LineCodec {
    inner: LinesCodec,
    oversized: u64,
    malformed: u64,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LEN)
    }

    pub fn with_max_length(max: usize) -> Self {
        Self { inner: LinesCodec::new_with_max_length(max), oversized: 0, malformed: 0 }
    }

    /// Number of lines dropped for exceeding the length limit.
    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    /// Number of lines dropped for not being valid UTF-8.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    fn next_line(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<String>, LinesCodecError> {
        loop {
            let decoded = if eof { self.inner.decode_eof(src) } else { self.inner.decode(src) };
            match decoded {
                Ok(Some(line)) => {
                    if let Some(line) = non_blank(line) {
                        return Ok(Some(line));
                    }
                }
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.oversized += 1;
                    warn!("dropping line over {} bytes", self.inner.max_length());
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    // The bad line is already split off; start the scan state afresh.
                    self.malformed += 1;
                    self.inner = LinesCodec::new_with_max_length(self.inner.max_length());
                    warn!("dropping line that is not valid UTF-8");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank(line: String) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == line.len() {
        Some(line)
    } else {
        Some(trimmed.to_string())
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.next_line(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.next_line(src, true)
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_lines_and_trims() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\n  \r\n  hello \r\nworld\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("hello".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("world".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn partial_line_waits_then_flushes_at_eof() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("tail");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("tail".to_string()));
    }

    #[test]
    fn overlong_line_is_dropped() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from("toolong\nok\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("ok".to_string()));
        assert_eq!(codec.oversized(), 1);
    }

    #[test]
    fn invalid_utf8_line_is_dropped() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe\nok\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("ok".to_string()));
        assert_eq!(codec.malformed(), 1);
    }

    #[test]
    fn invalid_utf8_tail_at_eof_ends_cleanly() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"ok\n\xc3"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("ok".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert_eq!(codec.malformed(), 1);
    }

    #[test]
    fn encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("abc", &mut buf).unwrap();
        assert_eq!(&buf[..], b"abc\n");
    }
}
