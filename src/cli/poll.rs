use clap::{ArgAction, Args};
use serde_json::{Map, Value};

use crate::cli::{PollOptions, ScanOptions};
use crate::common::{debug, ErrorKind};
use crate::config::{Config, Initializer};
use crate::core::{discovery, Battery, Poller, Settings};
use crate::sink::stdout::Stdout;
use crate::sink::{FieldValue, Point, Sink};
use crate::transport::ble::BleTransport;
use crate::transport::Transport;
use crate::{BatmonError, Result};

/// Poll a battery once and print the readings
#[derive(Args, Debug)]
pub struct PollCommand {
    #[command(flatten)]
    pub(crate) scan: ScanOptions,
    #[command(flatten)]
    pub(crate) poll: PollOptions,
    /// Only poll the battery with this address
    #[arg(long)]
    pub(crate) address: Option<String>,
    /// Print a JSON object instead of line protocol
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) json: bool,
}

impl PollCommand {
    pub async fn run(self, mut initializer: Initializer) -> Result<()> {
        let mut overrides = Config::default();
        self.scan.apply(&mut overrides);
        self.poll.apply(&mut overrides);
        initializer.override_merge(&mut overrides);

        let settings = initializer.settings();
        let mut transport = BleTransport::new().await?;
        let (battery, points) =
            poll_once(&mut transport, &settings, self.address.as_deref()).await?;

        if self.json {
            println!("{}", to_json(&battery, &points));
        } else {
            Stdout.write(&points).await?;
        }

        Ok(())
    }
}

/// Discover and poll a single battery once.
///
/// Polls the battery with `address` when given, the first discovered one
/// otherwise.
pub async fn poll_once<T>(
    transport: &mut T,
    settings: &Settings,
    address: Option<&str>,
) -> Result<(Battery, Vec<Point>)>
where
    T: Transport + ?Sized,
{
    let found = discovery::discover(transport, &settings.discovery).await?;
    let advertisement = match address {
        Some(address) => found
            .into_iter()
            .find(|ad| ad.address.eq_ignore_ascii_case(address))
            .ok_or_else(|| ErrorKind::DeviceNotFound {
                address: address.to_owned(),
            })?,
        None => found.into_iter().next().ok_or(BatmonError::NoBatteries)?,
    };

    let mut battery = Battery::new(advertisement.name(), advertisement.address.as_str());
    if let Some(measurement) = settings.measurement.as_deref() {
        battery = battery.with_measurement(measurement);
    }

    let mut link = transport.connect(&advertisement).await?;
    let result = Poller::new(settings.poll.clone())
        .poll(link.as_mut(), &mut battery)
        .await;
    if let Err(err) = link.disconnect().await {
        debug!("Disconnect: {}", err);
    }
    battery.report_successes();

    Ok((battery, result?))
}

/// Merge the fields of every point into one object keyed by field name.
pub fn to_json(battery: &Battery, points: &[Point]) -> Value {
    let mut object = Map::new();
    object.insert("name".into(), Value::from(battery.name()));
    object.insert("address".into(), Value::from(battery.address()));

    for point in points {
        for (key, value) in point.fields() {
            object.insert(key.clone(), field_to_json(value));
        }
    }

    Value::Object(object)
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Float(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Integer(v) => Value::from(*v),
        FieldValue::Boolean(v) => Value::from(*v),
        FieldValue::String(v) => Value::from(v.as_str()),
    }
}
