use std::convert::TryFrom;

use bytes::BytesMut;

use crate::common::{debug, trace};
use crate::protocol::frame::{self, Frame, LENGTH_INDEX, MAX_FRAME_BYTES, MIN_FRAME_BYTES};

/// Reassembles notification fragments into frames.
///
/// The battery splits responses longer than the negotiated MTU across several
/// notifications. Only the first fragment carries the start marker, so
/// continuation fragments are appended to whatever frame is in progress.
#[derive(Debug, Default)]
pub struct Assembler {
    // The buffer for the frame in progress.
    buffer: BytesMut,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_BYTES),
        }
    }

    /// Feed one notification payload. Returns a frame once it is complete.
    pub fn push(&mut self, fragment: &[u8]) -> Option<Frame> {
        let is_start_of_frame = fragment.len() > 2 && fragment[..2] == frame::START;

        if is_start_of_frame {
            if !self.buffer.is_empty() {
                debug!(
                    "Discard {} buffered bytes of an unfinished frame",
                    self.buffer.len()
                );
            }
            self.buffer.clear();
            self.buffer.extend_from_slice(fragment);
        } else if !self.buffer.is_empty() {
            self.buffer.extend_from_slice(fragment);
        } else {
            trace!("Drop {} byte fragment outside of a frame", fragment.len());
            return None;
        }

        if self.buffer.len() < MIN_FRAME_BYTES {
            return None;
        }

        let declared = self.buffer[LENGTH_INDEX] as usize + frame::PREFIX_BYTES;
        let buffered = self.buffer.len();

        if buffered > declared || buffered > MAX_FRAME_BYTES {
            debug!(
                "Discard frame, {} bytes buffered but {} declared",
                buffered, declared
            );
            self.buffer.clear();
            return None;
        }
        if buffered < declared {
            return None;
        }

        let result = Frame::try_from(&self.buffer[..]);
        self.buffer.clear();

        match result {
            Ok(frame) => Some(frame),
            Err(err) => {
                debug!("Discard frame: {}", err);
                None
            }
        }
    }

    /// Whether no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0x02 response carrying four cell voltages.
    fn cell_voltage_frame() -> Vec<u8> {
        let mut raw = vec![0xea, 0xd1, 0x01, 0x00, 0xff, 0x02, 0, 0, 0];
        raw.extend_from_slice(&[0x0c, 0xe4, 0x0c, 0xe5, 0x0c, 0xe6, 0x0c, 0xe7]);
        raw.extend_from_slice(&[0x00, 0xf5]);
        raw[3] = (raw.len() - 4) as u8;
        let len = raw.len();
        raw[len - 2] = frame::checksum(&raw);
        raw
    }

    #[test]
    fn single_fragment() {
        let raw = cell_voltage_frame();
        let mut assembler = Assembler::new();

        let frame = assembler.push(&raw).unwrap();
        assert_eq!(frame.as_bytes(), raw.as_slice());
        assert!(assembler.is_idle());
    }

    #[test]
    fn split_fragments() {
        let raw = cell_voltage_frame();
        let mut assembler = Assembler::new();

        assert!(assembler.push(&raw[..5]).is_none());
        assert!(assembler.push(&raw[5..12]).is_none());
        let frame = assembler.push(&raw[12..]).unwrap();

        assert_eq!(frame, Frame::try_from(raw.as_slice()).unwrap());
    }

    #[test]
    fn stray_fragment_is_dropped() {
        let raw = cell_voltage_frame();
        let mut assembler = Assembler::new();

        assert!(assembler.push(&raw[5..]).is_none());
        assert!(assembler.is_idle());

        assert!(assembler.push(&raw).is_some());
    }

    #[test]
    fn new_start_discards_partial_frame() {
        let raw = cell_voltage_frame();
        let mut assembler = Assembler::new();

        assert!(assembler.push(&raw[..10]).is_none());
        assert!(assembler.push(&raw).is_some());
    }

    #[test]
    fn wrong_length_is_discarded() {
        let mut raw = cell_voltage_frame();
        // declare one byte less than actually sent.
        raw[3] -= 1;
        let mut assembler = Assembler::new();

        assert!(assembler.push(&raw).is_none());
        assert!(assembler.is_idle());
    }
}
