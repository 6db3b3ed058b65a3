//! UT1300 BMS wire protocol.
//!
//! The battery exposes a single characteristic used both for requests (write)
//! and responses (notify). Responses arrive as one or more notification
//! fragments that have to be reassembled into a [`Frame`].

pub mod assembler;
pub mod command;
pub mod frame;
pub mod message;

pub use assembler::Assembler;
pub use command::Command;
pub use frame::{Frame, FrameError};
pub use message::{CapacityInfo, CellVoltages, Message, MessageType, PackStatus};

use uuid::Uuid;

// Local names advertised by supported batteries. Matched as substrings.
pub const DEVICE_LOCAL_NAMES: &[&str] = &["R1300SJ", "UT1300 BT"];

// 16-bit service uuids advertised by supported batteries.
pub const DEVICE_SERVICE_UUIDS: &[u16] = &[0xfee7, 0xffe0];

// Characteristic used for both command writes and response notifications.
pub const CHARACTERISTIC_UUID: u16 = 0xffe1;

// Bluetooth base uuid: 0000xxxx-0000-1000-8000-00805f9b34fb
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit assigned number onto the Bluetooth base uuid.
pub fn normalize_uuid_16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

pub fn service_uuids() -> Vec<Uuid> {
    DEVICE_SERVICE_UUIDS
        .iter()
        .copied()
        .map(normalize_uuid_16)
        .collect()
}

pub fn characteristic_uuid() -> Uuid {
    normalize_uuid_16(CHARACTERISTIC_UUID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_short_uuid() {
        assert_eq!(
            normalize_uuid_16(0xffe1).to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            service_uuids()[0].to_string(),
            "0000fee7-0000-1000-8000-00805f9b34fb"
        );
    }
}
