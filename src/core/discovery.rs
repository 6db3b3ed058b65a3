use std::collections::HashSet;

use serde::Deserialize;
use tokio::time::{timeout_at, Duration, Instant};

use crate::common::{debug, info, warn};
use crate::protocol;
use crate::transport::{Advertisement, Transport};
use crate::Result;

// Discovery configuration.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    // Accepted local names, matched as substrings.
    local_names: Option<Vec<String>>,
    // Stop scanning once this many batteries are found.
    max_batteries: Option<usize>,
    // Upper bound of a single scan.
    scan_timeout_milliseconds: Option<u64>,
}

impl Config {
    const DEFAULT_MAX_BATTERIES: usize = 4;
    const DEFAULT_SCAN_TIMEOUT_MILLISECONDS: u64 = 10_000;

    pub fn set_local_names(&mut self, val: &mut Option<Vec<String>>) {
        if let Some(val) = val.take() {
            if !val.is_empty() {
                self.local_names = Some(val)
            }
        }
    }
    pub fn set_max_batteries(&mut self, val: Option<usize>) {
        if let Some(val) = val {
            self.max_batteries = Some(std::cmp::max(val, 1));
        }
    }
    pub fn set_scan_timeout_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.scan_timeout_milliseconds = Some(std::cmp::max(val, 100));
        }
    }
    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_local_names(&mut other.local_names);
        self.set_max_batteries(other.max_batteries);
        self.set_scan_timeout_milliseconds(other.scan_timeout_milliseconds);
    }

    pub fn max_batteries(&self) -> usize {
        self.max_batteries.unwrap_or(Config::DEFAULT_MAX_BATTERIES)
    }

    fn scan_timeout(&self) -> Duration {
        Duration::from_millis(
            self.scan_timeout_milliseconds
                .unwrap_or(Config::DEFAULT_SCAN_TIMEOUT_MILLISECONDS),
        )
    }

    fn matches(&self, local_name: &str) -> bool {
        match &self.local_names {
            Some(names) => names.iter().any(|name| local_name.contains(name.as_str())),
            None => protocol::DEVICE_LOCAL_NAMES
                .iter()
                .any(|name| local_name.contains(name)),
        }
    }
}

/// Scan for supported batteries.
///
/// Returns once `max_batteries` distinct batteries were seen, the scan timed
/// out or the transport stopped reporting advertisements. The scan is stopped
/// before returning in every case.
pub async fn discover<T>(transport: &mut T, config: &Config) -> Result<Vec<Advertisement>>
where
    T: Transport + ?Sized,
{
    let mut advertisements = transport.start_scan(&protocol::service_uuids()).await?;

    let deadline = Instant::now() + config.scan_timeout();
    let mut seen = HashSet::new();
    let mut found: Vec<Advertisement> = Vec::new();

    while found.len() < config.max_batteries() {
        let advertisement = match timeout_at(deadline, advertisements.recv()).await {
            Ok(Some(advertisement)) => advertisement,
            Ok(None) => {
                debug!("Advertisement stream closed");
                break;
            }
            Err(_) => {
                debug!("Scan timed out after {:?}", config.scan_timeout());
                break;
            }
        };

        let Some(local_name) = advertisement.local_name.as_deref() else {
            continue;
        };
        // Dedup after filtering, a shortened name may be completed later.
        if !config.matches(local_name) {
            info!("Discovered {} ({})", local_name, advertisement.address);
            continue;
        }
        if !seen.insert(advertisement.address.clone()) {
            continue;
        }

        info!("Discovered {} ({})", local_name, advertisement.address);
        found.push(advertisement);
    }

    if let Err(err) = transport.stop_scan().await {
        warn!("Stop scan: {}", err);
    }

    Ok(found)
}
