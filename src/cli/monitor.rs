use clap::{ArgAction, Args};

use crate::cli::{PollOptions, ScanOptions};
use crate::common::info;
use crate::config::{Config, Initializer};
use crate::core::Monitor;
use crate::sink::stdout::Stdout;
use crate::transport::ble::BleTransport;
use crate::Result;

/// Poll batteries periodically and write the readings to InfluxDB
#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub(crate) scan: ScanOptions,
    #[command(flatten)]
    pub(crate) poll: PollOptions,
    /// Pause between two rounds in seconds
    #[arg(long, env = "BATMON_INTERVAL_SECS")]
    pub(crate) interval_seconds: Option<u64>,
    /// Abort a round after this many seconds
    #[arg(long, env = "BATMON_ROUND_TIMEOUT_SECONDS")]
    pub(crate) round_timeout_seconds: Option<u64>,
    /// InfluxDB base url
    #[arg(long, env = "INFLUXDB_URL")]
    pub(crate) influxdb_url: Option<String>,
    /// InfluxDB API token
    #[arg(long, env = "INFLUXDB_TOKEN", hide_env_values = true)]
    pub(crate) influxdb_token: Option<String>,
    /// InfluxDB organization
    #[arg(long, env = "INFLUXDB_ORG")]
    pub(crate) influxdb_org: Option<String>,
    /// InfluxDB bucket
    #[arg(long, env = "INFLUXDB_BUCKET")]
    pub(crate) influxdb_bucket: Option<String>,
    /// Measurement name of written points
    #[arg(long, env = "INFLUXDB_MEASUREMENT")]
    pub(crate) measurement: Option<String>,
    /// Print points to stdout instead of writing them to InfluxDB
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) dry_run: bool,
}

impl MonitorCommand {
    pub async fn run(self, mut initializer: Initializer) -> Result<()> {
        let dry_run = self.dry_run;
        let mut overrides = self.into_config();
        initializer.override_merge(&mut overrides);

        let transport = BleTransport::new().await?;
        let shutdown = tokio::signal::ctrl_c();

        if dry_run {
            info!("Dry run, points are printed to stdout");
            let monitor = Monitor::new(transport, Box::new(Stdout), initializer.settings());
            monitor.run(shutdown).await
        } else {
            initializer.run_monitor(transport, shutdown).await
        }
    }

    fn into_config(self) -> Config {
        let MonitorCommand {
            scan,
            poll,
            interval_seconds,
            round_timeout_seconds,
            mut influxdb_url,
            mut influxdb_token,
            mut influxdb_org,
            mut influxdb_bucket,
            mut measurement,
            dry_run: _,
        } = self;

        let mut config = Config::default();
        scan.apply(&mut config);
        poll.apply(&mut config);

        config.monitor.set_interval_seconds(interval_seconds);
        config
            .monitor
            .set_round_timeout_seconds(round_timeout_seconds);

        config.influxdb.set_url(&mut influxdb_url);
        config.influxdb.set_token(&mut influxdb_token);
        config.influxdb.set_org(&mut influxdb_org);
        config.influxdb.set_bucket(&mut influxdb_bucket);
        config.influxdb.set_measurement(&mut measurement);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{BatmonCommand, Command};
    use clap::Parser;

    #[test]
    fn flags_become_overrides() {
        let command = BatmonCommand::try_parse_from([
            "batmon",
            "monitor",
            "--interval-seconds",
            "30",
            "--influxdb-bucket",
            "garage",
            "--measurement",
            "house_bank",
        ])
        .unwrap();

        let Command::Monitor(monitor) = command.command else {
            panic!("monitor expected");
        };
        let mut overrides = monitor.into_config();
        let mut initializer = Initializer::default();
        initializer.override_merge(&mut overrides);

        let settings = initializer.settings();
        assert_eq!(settings.measurement.as_deref(), Some("house_bank"));
        assert_eq!(
            settings.monitor.interval(),
            std::time::Duration::from_secs(30)
        );
    }
}
