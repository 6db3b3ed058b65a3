use crate::common::Result;
use crate::protocol::message::FrameReader;

/// Per-cell voltages of the 4S pack, in volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellVoltages {
    pub cells: [f64; 4],
}

impl CellVoltages {
    const FIRST_CELL_INDEX: usize = 9;
    const MIN_FRAME_BYTES: usize = 19;

    pub(crate) fn decode(reader: &FrameReader) -> Result<Self> {
        reader.ensure_len(CellVoltages::MIN_FRAME_BYTES)?;

        let mut cells = [0.0; 4];
        for (i, cell) in cells.iter_mut().enumerate() {
            let millivolts = reader.u16_at(CellVoltages::FIRST_CELL_INDEX + i * 2);
            *cell = f64::from(millivolts) / 1000.0;
        }

        Ok(Self { cells })
    }
}
