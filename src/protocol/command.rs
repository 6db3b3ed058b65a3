use std::fmt;

use crate::protocol::frame::{self, checksum};
use crate::protocol::message::MessageType;

// Requests understood by the BMS. Each one is answered by a single frame of the
// matching message type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    RequestCellVoltages,
    RequestPackStatus,
    RequestCapacity,
}

impl Command {
    pub const ENCODED_BYTES: usize = 8;

    // Order in which a poll issues the requests.
    pub const SEQUENCE: [Command; 3] = [
        Command::RequestCellVoltages,
        Command::RequestPackStatus,
        Command::RequestCapacity,
    ];

    pub fn expected_response(self) -> MessageType {
        match self {
            Command::RequestCellVoltages => MessageType::CellVoltages,
            Command::RequestPackStatus => MessageType::PackStatus,
            Command::RequestCapacity => MessageType::Capacity,
        }
    }

    pub fn encode(self) -> [u8; Command::ENCODED_BYTES] {
        let mut buf = [
            frame::START[0],
            frame::START[1],
            frame::ADDRESS,
            // length counts everything after the 4 byte prefix.
            (Command::ENCODED_BYTES - frame::PREFIX_BYTES) as u8,
            0xff,
            self.expected_response().into(),
            0,
            frame::END,
        ];
        buf[6] = checksum(&buf);
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Command::RequestCellVoltages => "request_cell_voltages",
            Command::RequestPackStatus => "request_pack_status",
            Command::RequestCapacity => "request_capacity",
        };
        f.write_str(name)
    }
}
