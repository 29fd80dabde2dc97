//! Framing codecs for the stream transport.
//!
//! Two disciplines exist. Length-prefixed framing (the default) puts a
//! big-endian `u32` byte count ahead of every payload. Delimited framing is
//! the legacy discipline: messages run until an end-of-message byte sequence
//! and any bytes read past it are carried over to the next frame. A server
//! picks one discipline at construction and keeps it for every connection.

use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};

/// Network reads are pulled through a scratch buffer of this size.
pub const READ_CHUNK: usize = 128;

/// Default end-of-message marker for delimited framing.
pub const DEFAULT_EOM: &[u8] = b"\n\n";

/// Errors produced while reading a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the connection at a frame boundary.
    #[error("connection closed")]
    Eof,
    /// The peer closed the connection mid-frame.
    #[error("short read: connection closed inside a frame")]
    ShortRead,
    /// The frame is larger than the configured request limit.
    #[error("frame of {0} bytes exceeds the request limit")]
    TooLong(usize),
    /// The underlying transport failed (includes read timeouts).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FrameError {
    /// True if the error is a read deadline expiring rather than a peer
    /// or framing problem.
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Io(e) => {
                matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
            }
            _ => false,
        }
    }
}

/// Per-connection framing state.
///
/// Length-prefixed framing is stateless; delimited framing owns the carry
/// buffer holding bytes read past the last end-of-message marker.
#[derive(Debug)]
pub enum Codec {
    /// `BE_UINT32(len) || payload`.
    Length,
    /// Payload terminated by `eom`; `carry` retains the unconsumed suffix.
    Delimited { eom: Vec<u8>, carry: BytesMut },
}

impl Codec {
    /// Length-prefixed framing.
    pub fn length_prefixed() -> Self {
        Codec::Length
    }

    /// Delimited framing with the given end-of-message marker.
    pub fn delimited(eom: impl Into<Vec<u8>>) -> Self {
        Codec::Delimited {
            eom: eom.into(),
            carry: BytesMut::new(),
        }
    }

    /// Read one complete frame.
    ///
    /// `max_len` bounds the payload size; zero means unlimited. A clean
    /// close at a frame boundary reads as [`FrameError::Eof`]; a close
    /// anywhere else is [`FrameError::ShortRead`].
    pub fn read_frame<R: Read>(
        &mut self,
        reader: &mut R,
        max_len: usize,
    ) -> Result<Vec<u8>, FrameError> {
        match self {
            Codec::Length => read_length_frame(reader, max_len),
            Codec::Delimited { eom, carry } => read_delimited_frame(reader, eom, carry, max_len),
        }
    }

    /// Frame and write one payload.
    ///
    /// The length-prefixed writer assembles header and payload into a single
    /// write; the delimited writer appends the end-of-message marker.
    pub fn write_frame<W: Write>(&self, writer: &mut W, payload: &[u8]) -> io::Result<()> {
        match self {
            Codec::Length => {
                debug_assert!(payload.len() <= u32::MAX as usize);
                let mut buf = Vec::with_capacity(4 + payload.len());
                buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                buf.extend_from_slice(payload);
                writer.write_all(&buf)
            }
            Codec::Delimited { eom, .. } => {
                writer.write_all(payload)?;
                writer.write_all(eom)
            }
        }
    }
}

fn read_length_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError> {
    // Header: exactly 4 bytes. EOF before the first byte is a clean close;
    // EOF after it is a framing error.
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            return Err(if filled == 0 {
                FrameError::Eof
            } else {
                FrameError::ShortRead
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if max_len != 0 && len > max_len {
        return Err(FrameError::TooLong(len));
    }

    // Payload: pulled through the scratch buffer, shrinking the final read
    // so it never crosses into the next message.
    let mut payload = Vec::with_capacity(len);
    let mut chunk = [0u8; READ_CHUNK];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(READ_CHUNK);
        let n = reader.read(&mut chunk[..want])?;
        if n == 0 {
            return Err(FrameError::ShortRead);
        }
        payload.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }
    Ok(payload)
}

fn read_delimited_frame<R: Read>(
    reader: &mut R,
    eom: &[u8],
    carry: &mut BytesMut,
    max_len: usize,
) -> Result<Vec<u8>, FrameError> {
    loop {
        if let Some(pos) = find(carry, eom) {
            let frame = carry.split_to(pos);
            carry.advance(eom.len());
            return Ok(frame.to_vec());
        }
        if max_len != 0 && carry.len() > max_len {
            return Err(FrameError::TooLong(carry.len()));
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(if carry.is_empty() {
                FrameError::Eof
            } else {
                FrameError::ShortRead
            });
        }
        carry.extend_from_slice(&chunk[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn length_round_trip() {
        let mut wire = Vec::new();
        let codec = Codec::length_prefixed();
        codec.write_frame(&mut wire, b"echo it works!").unwrap();
        assert_eq!(&wire[..4], &14u32.to_be_bytes());

        let mut codec = Codec::length_prefixed();
        let frame = codec.read_frame(&mut Cursor::new(wire), 0).unwrap();
        assert_eq!(frame, b"echo it works!");
    }

    #[test]
    fn length_empty_payload() {
        let mut wire = Vec::new();
        Codec::length_prefixed().write_frame(&mut wire, b"").unwrap();
        assert_eq!(wire, 0u32.to_be_bytes());

        let frame = Codec::length_prefixed()
            .read_frame(&mut Cursor::new(wire), 0)
            .unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn length_payload_larger_than_chunk() {
        // Exercises the shrink-on-final-read path across the 128-byte
        // scratch buffer, with a second message queued right behind.
        let payload = vec![0xabu8; READ_CHUNK * 3 + 17];
        let mut wire = Vec::new();
        let codec = Codec::length_prefixed();
        codec.write_frame(&mut wire, &payload).unwrap();
        codec.write_frame(&mut wire, b"next").unwrap();

        let mut cursor = Cursor::new(wire);
        let mut codec = Codec::length_prefixed();
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), payload);
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), b"next");
    }

    #[test]
    fn length_eof_at_boundary() {
        let err = Codec::length_prefixed()
            .read_frame(&mut Cursor::new(Vec::new()), 0)
            .unwrap_err();
        assert!(matches!(err, FrameError::Eof));
    }

    #[test]
    fn length_short_header() {
        let err = Codec::length_prefixed()
            .read_frame(&mut Cursor::new(vec![0, 0]), 0)
            .unwrap_err();
        assert!(matches!(err, FrameError::ShortRead));
    }

    #[test]
    fn length_truncated_payload() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&10u32.to_be_bytes());
        wire.extend_from_slice(b"only5");
        let err = Codec::length_prefixed()
            .read_frame(&mut Cursor::new(wire), 0)
            .unwrap_err();
        assert!(matches!(err, FrameError::ShortRead));
    }

    #[test]
    fn length_over_limit() {
        let mut wire = Vec::new();
        Codec::length_prefixed()
            .write_frame(&mut wire, b"this is far too long")
            .unwrap();
        let err = Codec::length_prefixed()
            .read_frame(&mut Cursor::new(wire), 10)
            .unwrap_err();
        assert!(matches!(err, FrameError::TooLong(20)));
    }

    #[test]
    fn delimited_round_trip() {
        let mut wire = Vec::new();
        let codec = Codec::delimited(DEFAULT_EOM);
        codec.write_frame(&mut wire, b"first").unwrap();
        codec.write_frame(&mut wire, b"second").unwrap();

        let mut cursor = Cursor::new(wire);
        let mut codec = Codec::delimited(DEFAULT_EOM);
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), b"first");
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), b"second");
    }

    #[test]
    fn delimited_carry_across_reads() {
        // Two messages in one buffer: the second must come out of the
        // carry without touching the reader again.
        let mut codec = Codec::delimited(DEFAULT_EOM);
        let mut cursor = Cursor::new(b"one\n\ntwo\n\n".to_vec());
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), b"one");
        let pos = cursor.position();
        assert_eq!(codec.read_frame(&mut cursor, 0).unwrap(), b"two");
        assert_eq!(cursor.position(), pos);
    }

    #[test]
    fn delimited_over_limit() {
        let mut codec = Codec::delimited(DEFAULT_EOM);
        let body = vec![b'x'; 600];
        let err = codec.read_frame(&mut Cursor::new(body), 64).unwrap_err();
        assert!(matches!(err, FrameError::TooLong(_)));
    }

    #[test]
    fn timeout_classification() {
        let timeout: FrameError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert!(timeout.is_timeout());
        assert!(!FrameError::Eof.is_timeout());
    }
}
