use crate::common::Result;
use crate::protocol::message::FrameReader;

/// Pack level capacity and voltage summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityInfo {
    pub cycle_count: u8,
    // Percent.
    pub state_of_charge: u8,
    // Ampere hours.
    pub full_capacity: f64,
    pub remaining_capacity: f64,
    // Minutes as reported by the device.
    pub discharge_time_left: u16,
    pub charge_time_left: u16,
    // Volts.
    pub total_voltage: f64,
    pub max_cell_voltage: f64,
    pub min_cell_voltage: f64,
}

impl CapacityInfo {
    const CYCLE_COUNT_INDEX: usize = 6;
    const STATE_OF_CHARGE_INDEX: usize = 7;
    const FULL_CAPACITY_INDEX: usize = 21;
    const REMAINING_CAPACITY_INDEX: usize = 27;
    const DISCHARGE_TIME_LEFT_INDEX: usize = 30;
    const CHARGE_TIME_LEFT_INDEX: usize = 33;
    const TOTAL_VOLTAGE_INDEX: usize = 47;
    const MAX_CELL_VOLTAGE_INDEX: usize = 49;
    const MIN_CELL_VOLTAGE_INDEX: usize = 51;
    const MIN_FRAME_BYTES: usize = 55;

    // Full capacity only carries the low 16 bits, the device always sets bit 16.
    const FULL_CAPACITY_HIGH_BITS: u32 = 0x01 << 16;

    pub(crate) fn decode(reader: &FrameReader) -> Result<Self> {
        reader.ensure_len(CapacityInfo::MIN_FRAME_BYTES)?;

        let full_capacity = CapacityInfo::FULL_CAPACITY_HIGH_BITS
            + u32::from(reader.u16_at(CapacityInfo::FULL_CAPACITY_INDEX));

        Ok(Self {
            cycle_count: reader.u8_at(CapacityInfo::CYCLE_COUNT_INDEX),
            state_of_charge: reader.u8_at(CapacityInfo::STATE_OF_CHARGE_INDEX),
            full_capacity: f64::from(full_capacity) / 1000.0,
            remaining_capacity: f64::from(reader.u16_at(CapacityInfo::REMAINING_CAPACITY_INDEX))
                / 1000.0,
            discharge_time_left: reader.u16_at(CapacityInfo::DISCHARGE_TIME_LEFT_INDEX),
            charge_time_left: reader.u16_at(CapacityInfo::CHARGE_TIME_LEFT_INDEX),
            total_voltage: f64::from(reader.u16_at(CapacityInfo::TOTAL_VOLTAGE_INDEX)) / 100.0,
            max_cell_voltage: f64::from(reader.u16_at(CapacityInfo::MAX_CELL_VOLTAGE_INDEX))
                / 1000.0,
            min_cell_voltage: f64::from(reader.u16_at(CapacityInfo::MIN_CELL_VOLTAGE_INDEX))
                / 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::message::testing::frame_with;
    use crate::protocol::{CapacityInfo, Message};

    #[test]
    fn decode_capacity() {
        let frame = frame_with(
            0x04,
            55,
            &[
                (6, 12),
                (7, 87),
                // 0x1_86a0 = 100000mAh
                (21, 0x86),
                (22, 0xa0),
                // 50000mAh
                (27, 0xc3),
                (28, 0x50),
                // 600 minutes
                (30, 0x02),
                (31, 0x58),
                // 90 minutes
                (33, 0x00),
                (34, 0x5a),
                // 13.25V
                (47, 0x05),
                (48, 0x2d),
                // 3.32V, 3.30V
                (49, 0x0c),
                (50, 0xf8),
                (51, 0x0c),
                (52, 0xe4),
            ],
        );

        let message = Message::from_frame(&frame).unwrap();
        assert_eq!(
            message,
            Message::Capacity(CapacityInfo {
                cycle_count: 12,
                state_of_charge: 87,
                full_capacity: 100.0,
                remaining_capacity: 50.0,
                discharge_time_left: 600,
                charge_time_left: 90,
                total_voltage: 13.25,
                max_cell_voltage: 3.32,
                min_cell_voltage: 3.3,
            })
        );
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = frame_with(0x04, 40, &[]);
        assert!(Message::from_frame(&frame).is_err());
    }
}
