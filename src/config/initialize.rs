use std::future::Future;
use std::path::Path;

use tokio::fs;

use crate::common::{debug, Result};
use crate::config::Config;
use crate::core::{Monitor, Settings};
use crate::sink::influx::InfluxDb;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct Initializer {
    pub config: Config,
}

impl Initializer {
    pub async fn load_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let f = fs::File::open(path).await?;
        let config = serde_yaml::from_reader::<_, Config>(f.into_std().await)?;

        Ok(Self { config })
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // Apply command line and environment values on top of the loaded file.
    pub fn override_merge(&mut self, other: &mut Config) {
        self.config.override_merge(other);
    }

    pub fn settings(&self) -> Settings {
        Settings {
            discovery: self.config.ble.clone(),
            poll: self.config.poll.clone(),
            monitor: self.config.monitor.clone(),
            measurement: Some(self.config.influxdb.measurement().to_owned()),
        }
    }

    pub async fn run_monitor<T>(self, transport: T, shutdown: impl Future) -> crate::Result<()>
    where
        T: Transport,
    {
        debug!("{:?}", self);

        let sink = InfluxDb::new(&self.config.influxdb)?;
        let monitor = Monitor::new(transport, Box::new(sink), self.settings());

        monitor.run(shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_and_override() {
        tokio_test::block_on(async move {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(
                file,
                r#"
ble:
  max_batteries: 2
  local_names: ["UT1300"]
poll:
  settle_milliseconds: 3000
influxdb:
  url: http://influx:8086
  bucket: home
  measurement: battery
"#
            )
            .unwrap();

            let mut initializer = Initializer::load_config_file(file.path()).await.unwrap();

            let mut overrides = Config::default();
            overrides.ble.set_max_batteries(Some(3));
            overrides.monitor.set_interval_seconds(Some(30));
            initializer.override_merge(&mut overrides);

            let settings = initializer.settings();
            assert_eq!(settings.discovery.max_batteries(), 3);
            assert_eq!(settings.measurement.as_deref(), Some("battery"));
            assert_eq!(
                settings.poll.max_poll_duration(),
                std::time::Duration::from_millis(2 * 1000 + 3000)
            );
        })
    }

    #[test]
    fn empty_file_uses_defaults() {
        tokio_test::block_on(async move {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "{{}}").unwrap();

            let initializer = Initializer::load_config_file(file.path()).await.unwrap();

            assert_eq!(initializer.config.ble.max_batteries(), 4);
            assert_eq!(initializer.config.influxdb.measurement(), "ut1300");
        })
    }
}
