use std::convert::TryFrom;
use std::fmt;

use bytes::{Buf, Bytes};

// Frame layout
//
// | 0..2    | 2       | 3      | 4    | 5            | 6..n-2  | n-2      | n-1  |
// | EA D1   | address | length | 0xFF | message type | payload | checksum | 0xF5 |
//
// length counts the bytes that follow the 4 byte prefix, so a frame is always
// `length + 4` bytes long.
pub const START: [u8; 2] = [0xea, 0xd1];
pub const ADDRESS: u8 = 0x01;
pub const END: u8 = 0xf5;
pub const PREFIX_BYTES: usize = 4;
pub const MIN_FRAME_BYTES: usize = 8;
pub const MAX_FRAME_BYTES: usize = u8::MAX as usize + PREFIX_BYTES;

pub(crate) const LENGTH_INDEX: usize = 3;
pub(crate) const MESSAGE_TYPE_INDEX: usize = 5;
pub(crate) const PAYLOAD_INDEX: usize = 6;

#[derive(Debug)]
pub enum FrameError {
    /// Not enough data is available to decode a frame from buffer.
    Incomplete,
    Invalid(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameError::Incomplete => write!(f, "incomplete frame"),
            FrameError::Invalid(description) => write!(f, "invalid frame. {}", description),
        }
    }
}

impl std::error::Error for FrameError {}

type ByteCursor<'a> = std::io::Cursor<&'a [u8]>;

/// One complete BMS response.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// Check that `src` starts with a complete frame and advance past it.
    pub fn check(src: &mut ByteCursor) -> Result<(), FrameError> {
        let start = [cursor::get_u8(src)?, cursor::get_u8(src)?];
        if start != START {
            return Err(FrameError::Invalid(format!(
                "start marker expected, got {:02x} {:02x}",
                start[0], start[1]
            )));
        }
        // address
        cursor::skip(src, 1)?;

        let frame_bytes = cursor::get_u8(src)? as usize + PREFIX_BYTES;
        if frame_bytes < MIN_FRAME_BYTES {
            return Err(FrameError::Invalid(format!(
                "declared frame length {} below minimum {}",
                frame_bytes, MIN_FRAME_BYTES
            )));
        }

        // skip everything up to the end marker.
        cursor::skip(src, frame_bytes - PREFIX_BYTES - 1)?;

        match cursor::get_u8(src)? {
            END => Ok(()),
            got => Err(FrameError::Invalid(format!(
                "end marker expected, got {:02x}",
                got
            ))),
        }
    }

    pub fn parse(src: &mut ByteCursor) -> Result<Frame, FrameError> {
        let start = src.position() as usize;
        Frame::check(src)?;
        let end = src.position() as usize;

        Ok(Frame(Bytes::copy_from_slice(&src.get_ref()[start..end])))
    }

    /// Build a frame around `payload`, filling in length and checksum.
    ///
    /// # Panics
    ///
    /// Panics if the payload does not fit in a single frame.
    pub fn new(message_type: u8, payload: &[u8]) -> Frame {
        let frame_bytes = PAYLOAD_INDEX + payload.len() + 2;
        assert!(
            frame_bytes <= MAX_FRAME_BYTES,
            "payload of {} bytes exceeds frame capacity",
            payload.len()
        );

        let mut buf = Vec::with_capacity(frame_bytes);
        buf.extend_from_slice(&START);
        buf.push(ADDRESS);
        buf.push((frame_bytes - PREFIX_BYTES) as u8);
        buf.push(0xff);
        buf.push(message_type);
        buf.extend_from_slice(payload);
        buf.push(0);
        buf.push(END);

        let checksum_index = buf.len() - 2;
        buf[checksum_index] = checksum(&buf);

        Frame(Bytes::from(buf))
    }

    pub fn message_type_code(&self) -> u8 {
        self.0[MESSAGE_TYPE_INDEX]
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[PAYLOAD_INDEX..self.0.len() - 2]
    }

    pub fn checksum(&self) -> u8 {
        self.0[self.0.len() - 2]
    }

    pub fn checksum_matches(&self) -> bool {
        checksum(&self.0) == self.checksum()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = FrameError;

    fn try_from(src: &[u8]) -> Result<Self, Self::Error> {
        let mut buf = std::io::Cursor::new(src);
        let frame = Frame::parse(&mut buf)?;
        if buf.has_remaining() {
            return Err(FrameError::Invalid(format!(
                "{} trailing bytes after frame",
                buf.remaining()
            )));
        }
        Ok(frame)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Frame[")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        write!(f, "]")
    }
}

/// XOR of the length byte through the last payload byte.
pub(crate) fn checksum(frame: &[u8]) -> u8 {
    if frame.len() < MIN_FRAME_BYTES {
        return 0;
    }
    frame[LENGTH_INDEX..frame.len() - 2]
        .iter()
        .fold(0, |acc, b| acc ^ b)
}

// cursor utilities.
mod cursor {
    use super::*;

    pub(super) fn get_u8(src: &mut ByteCursor) -> Result<u8, FrameError> {
        if !src.has_remaining() {
            return Err(FrameError::Incomplete);
        }
        Ok(src.get_u8())
    }

    pub(super) fn skip(src: &mut ByteCursor, n: usize) -> Result<(), FrameError> {
        if src.remaining() < n {
            return Err(FrameError::Incomplete);
        }
        src.advance(n);
        Ok(())
    }
}
