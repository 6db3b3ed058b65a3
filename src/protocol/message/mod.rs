mod capacity;
mod cell_voltages;
mod pack_status;

pub use capacity::CapacityInfo;
pub use cell_voltages::CellVoltages;
pub use pack_status::{ChargeState, PackStatus, Temperature};

use std::convert::TryFrom;
use std::fmt;

use crate::common::{Error, ErrorKind, Result};
use crate::protocol::frame::Frame;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    CellVoltages = 0x02,
    PackStatus = 0x03,
    Capacity = 0x04,
}

impl MessageType {
    pub const ALL: [MessageType; 3] = [
        MessageType::CellVoltages,
        MessageType::PackStatus,
        MessageType::Capacity,
    ];
}

impl TryFrom<u8> for MessageType {
    type Error = Error;
    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            0x02 => Ok(MessageType::CellVoltages),
            0x03 => Ok(MessageType::PackStatus),
            0x04 => Ok(MessageType::Capacity),
            _ => Err(Error::from(ErrorKind::UnknownMessageType { message_type: n })),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(mt: MessageType) -> Self {
        mt as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MessageType::CellVoltages => "cell_voltages",
            MessageType::PackStatus => "pack_status",
            MessageType::Capacity => "capacity",
        };
        f.write_str(name)
    }
}

/// Decoded BMS response.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CellVoltages(CellVoltages),
    PackStatus(PackStatus),
    Capacity(CapacityInfo),
}

impl Message {
    pub fn from_frame(frame: &Frame) -> Result<Message> {
        let message_type = MessageType::try_from(frame.message_type_code())?;
        let reader = FrameReader::new(frame, message_type);

        let message = match message_type {
            MessageType::CellVoltages => Message::CellVoltages(CellVoltages::decode(&reader)?),
            MessageType::PackStatus => Message::PackStatus(PackStatus::decode(&reader)?),
            MessageType::Capacity => Message::Capacity(CapacityInfo::decode(&reader)?),
        };

        Ok(message)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::CellVoltages(_) => MessageType::CellVoltages,
            Message::PackStatus(_) => MessageType::PackStatus,
            Message::Capacity(_) => MessageType::Capacity,
        }
    }
}

// Read big endian values at absolute frame offsets.
pub(crate) struct FrameReader<'a> {
    bytes: &'a [u8],
    message_type: MessageType,
}

impl<'a> FrameReader<'a> {
    fn new(frame: &'a Frame, message_type: MessageType) -> Self {
        Self {
            bytes: frame.as_bytes(),
            message_type,
        }
    }

    // Fail unless the frame holds at least `min_bytes`.
    pub(crate) fn ensure_len(&self, min_bytes: usize) -> Result<()> {
        if self.bytes.len() < min_bytes {
            return Err(ErrorKind::Frame {
                description: format!(
                    "{} frame needs {} bytes, got {}",
                    self.message_type,
                    min_bytes,
                    self.bytes.len()
                ),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn u8_at(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    pub(crate) fn u16_at(&self, index: usize) -> u16 {
        u16::from_be_bytes([self.bytes[index], self.bytes[index + 1]])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_message_type() {
        let frame = Frame::new(0x09, &[0; 16]);
        let err = Message::from_frame(&frame).unwrap_err();

        assert!(matches!(
            err.kind(),
            ErrorKind::UnknownMessageType { message_type: 0x09 }
        ));
    }

    #[test]
    fn message_type_round_trip() {
        for mt in MessageType::ALL {
            assert_eq!(MessageType::try_from(u8::from(mt)).unwrap(), mt);
        }
    }
}
