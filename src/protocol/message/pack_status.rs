use std::fmt;

use crate::common::Result;
use crate::protocol::message::FrameReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeState {
    Charging,
    Discharging,
    #[default]
    Unknown,
}

impl ChargeState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0x31 => ChargeState::Discharging,
            0x32 => ChargeState::Charging,
            _ => ChargeState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeState::Charging => "charging",
            ChargeState::Discharging => "discharging",
            ChargeState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor temperature. The BMS reports whole degrees Celsius offset by 40.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Temperature(i16);

impl Temperature {
    const OFFSET: i16 = 40;

    pub fn from_raw(raw: u8) -> Self {
        Temperature(i16::from(raw) - Temperature::OFFSET)
    }

    pub fn from_celsius(celsius: i16) -> Self {
        Temperature(celsius)
    }

    pub fn celsius(&self) -> i16 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        f64::from(self.0) * 9.0 / 5.0 + 32.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackStatus {
    pub state: ChargeState,
    // Amperes. Direction is given by `state`.
    pub current: f64,
    pub temperature1: Temperature,
    pub temperature2: Temperature,
    pub mosfet_temperature: Temperature,
    pub ambient_temperature: Temperature,
}

impl PackStatus {
    const STATE_INDEX: usize = 6;
    const CURRENT_INDEX: usize = 7;
    const TEMPERATURE1_INDEX: usize = 14;
    const TEMPERATURE2_INDEX: usize = 15;
    const MOSFET_TEMPERATURE_INDEX: usize = 16;
    const AMBIENT_TEMPERATURE_INDEX: usize = 17;
    const MIN_FRAME_BYTES: usize = 20;

    pub(crate) fn decode(reader: &FrameReader) -> Result<Self> {
        reader.ensure_len(PackStatus::MIN_FRAME_BYTES)?;

        Ok(Self {
            state: ChargeState::from_raw(reader.u8_at(PackStatus::STATE_INDEX)),
            current: f64::from(reader.u16_at(PackStatus::CURRENT_INDEX)) / 100.0,
            temperature1: Temperature::from_raw(reader.u8_at(PackStatus::TEMPERATURE1_INDEX)),
            temperature2: Temperature::from_raw(reader.u8_at(PackStatus::TEMPERATURE2_INDEX)),
            mosfet_temperature: Temperature::from_raw(
                reader.u8_at(PackStatus::MOSFET_TEMPERATURE_INDEX),
            ),
            ambient_temperature: Temperature::from_raw(
                reader.u8_at(PackStatus::AMBIENT_TEMPERATURE_INDEX),
            ),
        })
    }
}
