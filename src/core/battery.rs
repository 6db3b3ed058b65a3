use crate::common::{debug, info};
use crate::protocol::message::{
    CapacityInfo, CellVoltages, ChargeState, Message, MessageType, PackStatus, Temperature,
};
use crate::sink::Point;

pub const DEFAULT_MEASUREMENT: &str = "ut1300";

/// Latest decoded values of a battery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    pub cell1_voltage: f64,
    pub cell2_voltage: f64,
    pub cell3_voltage: f64,
    pub cell4_voltage: f64,
    pub battery_state: ChargeState,
    pub current: f64,
    pub temperature1: Temperature,
    pub temperature2: Temperature,
    pub mosfet_temperature: Temperature,
    pub ambient_temperature: Temperature,
    pub cycle_count: u8,
    pub state_of_charge: u8,
    pub full_capacity: f64,
    pub remaining_capacity: f64,
    pub discharge_time_left: u16,
    pub charge_time_left: u16,
    pub total_voltage: f64,
    pub max_cell_voltage: f64,
    pub min_cell_voltage: f64,
}

// Number of successfully decoded responses per message type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Successes {
    pub cell_voltages: u64,
    pub pack_status: u64,
    pub capacity: u64,
}

impl Successes {
    pub fn get(&self, message_type: MessageType) -> u64 {
        match message_type {
            MessageType::CellVoltages => self.cell_voltages,
            MessageType::PackStatus => self.pack_status,
            MessageType::Capacity => self.capacity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Battery {
    name: String,
    address: String,
    measurement: String,
    readings: Readings,
    successes: Successes,
}

impl Battery {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            measurement: DEFAULT_MEASUREMENT.to_owned(),
            readings: Readings::default(),
            successes: Successes::default(),
        }
    }

    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn successes(&self) -> Successes {
        self.successes
    }

    /// Update readings from `message` and return the point carrying the
    /// fields it touched.
    pub fn apply(&mut self, message: &Message) -> Point {
        let point = Point::new(self.measurement.as_str())
            .tag("name", self.name.as_str())
            .tag("address", self.address.as_str());

        match message {
            Message::CellVoltages(m) => self.apply_cell_voltages(m, point),
            Message::PackStatus(m) => self.apply_pack_status(m, point),
            Message::Capacity(m) => self.apply_capacity(m, point),
        }
    }

    fn apply_cell_voltages(&mut self, m: &CellVoltages, point: Point) -> Point {
        let r = &mut self.readings;
        [
            r.cell1_voltage,
            r.cell2_voltage,
            r.cell3_voltage,
            r.cell4_voltage,
        ] = m.cells;

        self.successes.cell_voltages += 1;
        debug!("{}: Updated cell voltages", self.name);

        point
            .field("cell1_voltage", r.cell1_voltage)
            .field("cell2_voltage", r.cell2_voltage)
            .field("cell3_voltage", r.cell3_voltage)
            .field("cell4_voltage", r.cell4_voltage)
    }

    fn apply_pack_status(&mut self, m: &PackStatus, point: Point) -> Point {
        let r = &mut self.readings;
        r.battery_state = m.state;
        r.current = m.current;
        r.temperature1 = m.temperature1;
        r.temperature2 = m.temperature2;
        r.mosfet_temperature = m.mosfet_temperature;
        r.ambient_temperature = m.ambient_temperature;

        self.successes.pack_status += 1;
        debug!("{}: Updated pack status", self.name);

        point
            .field("current", r.current)
            .field("temperature1", r.temperature1.fahrenheit())
            .field("temperature2", r.temperature2.fahrenheit())
            .field("mosfet_temperature", r.mosfet_temperature.fahrenheit())
            .field("ambient_temperature", r.ambient_temperature.fahrenheit())
            .field("state", r.battery_state.as_str())
    }

    fn apply_capacity(&mut self, m: &CapacityInfo, point: Point) -> Point {
        let r = &mut self.readings;
        r.cycle_count = m.cycle_count;
        r.state_of_charge = m.state_of_charge;
        r.full_capacity = m.full_capacity;
        r.remaining_capacity = m.remaining_capacity;
        r.discharge_time_left = m.discharge_time_left;
        r.charge_time_left = m.charge_time_left;
        r.total_voltage = m.total_voltage;
        r.max_cell_voltage = m.max_cell_voltage;
        r.min_cell_voltage = m.min_cell_voltage;

        self.successes.capacity += 1;
        debug!("{}: Updated capacity", self.name);

        point
            .field("cycle_count", r.cycle_count)
            .field("state_of_charge", r.state_of_charge)
            .field("full_capacity", r.full_capacity)
            .field("remaining_capacity", r.remaining_capacity)
            .field("discharge_time_left", f64::from(r.discharge_time_left))
            .field("charge_time_left", f64::from(r.charge_time_left))
            .field("total_voltage", r.total_voltage)
            .field("max_cell_voltage", r.max_cell_voltage)
            .field("min_cell_voltage", r.min_cell_voltage)
    }

    pub fn report_successes(&self) {
        info!(
            battery = %self.name,
            cell_voltages = self.successes.cell_voltages,
            pack_status = self.successes.pack_status,
            capacity = self.successes.capacity,
            "Success counters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FieldValue;

    #[test]
    fn apply_cell_voltages() {
        let mut battery = Battery::new("UT1300 BT", "AA:BB:CC:DD:EE:FF");
        let point = battery.apply(&Message::CellVoltages(CellVoltages {
            cells: [3.3, 3.31, 3.32, 3.33],
        }));

        assert_eq!(point.measurement(), DEFAULT_MEASUREMENT);
        assert_eq!(point.tags()["address"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(point.fields().len(), 4);
        assert_eq!(
            point.get_field("cell3_voltage"),
            Some(&FieldValue::Float(3.32))
        );
        assert_eq!(battery.readings().cell4_voltage, 3.33);
        assert_eq!(battery.successes().get(MessageType::CellVoltages), 1);
        assert_eq!(battery.successes().get(MessageType::Capacity), 0);
    }

    #[test]
    fn apply_pack_status_reports_fahrenheit() {
        let mut battery = Battery::new("R1300SJ", "11:22").with_measurement("battery");
        let point = battery.apply(&Message::PackStatus(PackStatus {
            state: ChargeState::Discharging,
            current: 4.5,
            temperature1: Temperature::from_celsius(25),
            temperature2: Temperature::from_celsius(20),
            mosfet_temperature: Temperature::from_celsius(30),
            ambient_temperature: Temperature::from_celsius(-5),
        }));

        assert_eq!(point.measurement(), "battery");
        assert_eq!(point.get_field("temperature1"), Some(&FieldValue::Float(77.0)));
        assert_eq!(point.get_field("ambient_temperature"), Some(&FieldValue::Float(23.0)));
        assert_eq!(
            point.get_field("state"),
            Some(&FieldValue::String("discharging".into()))
        );
        assert_eq!(battery.readings().battery_state, ChargeState::Discharging);
    }

    #[test]
    fn apply_capacity_types_counters_as_integers() {
        let mut battery = Battery::new("UT1300 BT", "AA");
        let point = battery.apply(&Message::Capacity(CapacityInfo {
            cycle_count: 7,
            state_of_charge: 99,
            full_capacity: 100.0,
            remaining_capacity: 99.0,
            discharge_time_left: 120,
            charge_time_left: 0,
            total_voltage: 13.3,
            max_cell_voltage: 3.33,
            min_cell_voltage: 3.32,
        }));

        assert_eq!(point.get_field("cycle_count"), Some(&FieldValue::Integer(7)));
        assert_eq!(point.get_field("state_of_charge"), Some(&FieldValue::Integer(99)));
        assert_eq!(
            point.get_field("discharge_time_left"),
            Some(&FieldValue::Float(120.0))
        );
        assert_eq!(battery.successes().capacity, 1);
    }
}
