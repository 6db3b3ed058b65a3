use serde::Deserialize;

use crate::core::{discovery, monitor, poller};
use crate::sink::influx;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub ble: discovery::Config,
    pub poll: poller::Config,
    pub monitor: monitor::Config,
    pub influxdb: influx::Config,
}

impl Config {
    // Values set in `other` take precedence.
    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.ble.override_merge(&mut other.ble);
        self.poll.override_merge(&mut other.poll);
        self.monitor.override_merge(&mut other.monitor);
        self.influxdb.override_merge(&mut other.influxdb);
    }
}
