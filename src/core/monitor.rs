use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Duration, Instant};
use tracing_futures::Instrument;

use crate::common::{debug, error, info, warn, ErrorKind};
use crate::core::{discovery, poller, Battery, Poller, SharedCounter};
use crate::sink::{Point, Sink};
use crate::transport::{Advertisement, Transport};
use crate::{BatmonError, Result};

// Monitor loop configuration.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    // Pause between two rounds.
    interval_seconds: Option<u64>,
    // Upper bound of a round once every battery is connected.
    round_timeout_seconds: Option<u64>,
}

impl Config {
    const DEFAULT_INTERVAL_SECONDS: u64 = 60;

    pub fn set_interval_seconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.interval_seconds = Some(std::cmp::max(val, 1));
        }
    }
    pub fn set_round_timeout_seconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.round_timeout_seconds = Some(std::cmp::max(val, 1));
        }
    }
    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_interval_seconds(other.interval_seconds);
        self.set_round_timeout_seconds(other.round_timeout_seconds);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(
            self.interval_seconds
                .unwrap_or(Config::DEFAULT_INTERVAL_SECONDS),
        )
    }

    // Defaults to twice the length of a full poll.
    fn round_timeout(&self, poll: &poller::Config) -> Duration {
        match self.round_timeout_seconds {
            Some(secs) => Duration::from_secs(secs),
            None => poll.max_poll_duration() * 2,
        }
    }
}

/// Everything the monitor needs besides the transport and the sink.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub discovery: discovery::Config,
    pub poll: poller::Config,
    pub monitor: Config,
    pub measurement: Option<String>,
}

#[derive(Debug, Clone)]
struct Tracked {
    advertisement: Advertisement,
    battery: Arc<Mutex<Battery>>,
}

/// Outcome of a single round.
#[derive(Debug, Default)]
pub struct RoundReport {
    pub points: Vec<Point>,
    pub polled: Vec<String>,
    pub failed: Vec<String>,
}

/// Periodically polls every known battery and forwards the points to a sink.
pub struct Monitor<T> {
    transport: T,
    sink: Box<dyn Sink>,
    settings: Settings,
    poller: Poller,
    batteries: Vec<Tracked>,
    needs_discovery: bool,
    // Poll tasks of the current round.
    in_flight: Vec<JoinHandle<()>>,
    // Asks in flight polls to unsubscribe and disconnect early.
    cancel: broadcast::Sender<()>,
}

// Time granted to a poll task to unsubscribe and disconnect once its poll
// was cut short.
const RELEASE_GRACE: Duration = Duration::from_secs(5);

impl<T> Monitor<T>
where
    T: Transport,
{
    pub fn new(transport: T, sink: Box<dyn Sink>, settings: Settings) -> Self {
        let poller = Poller::new(settings.poll.clone());
        let (cancel, _) = broadcast::channel(1);
        Self {
            transport,
            sink,
            settings,
            poller,
            batteries: Vec::new(),
            needs_discovery: true,
            in_flight: Vec::new(),
            cancel,
        }
    }

    /// Run rounds until `shutdown` resolves.
    ///
    /// Polls still running when shutdown arrives are cancelled and given
    /// time to release their connection before returning.
    pub async fn run(mut self, shutdown: impl Future) -> Result<()> {
        tokio::pin!(shutdown);
        let interval = self.settings.monitor.interval();

        info!("Monitor running, interval {:?}", interval);

        loop {
            let interrupted = tokio::select! {
                _ = &mut shutdown => true,
                result = self.run_once() => {
                    log_round(result);
                    false
                }
            };
            if interrupted {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Shutdown signal received");
        self.release_in_flight().await;
        Ok(())
    }

    /// Poll every known battery once and write the points to the sink.
    pub async fn run_once(&mut self) -> Result<RoundReport> {
        if self.needs_discovery || self.batteries.is_empty() {
            self.rediscover().await?;
        }
        if self.batteries.is_empty() {
            return Err(BatmonError::NoBatteries);
        }

        let mut report = self.poll_all().await;

        if !report.failed.is_empty() {
            let failed: HashSet<&String> = report.failed.iter().collect();
            self.batteries
                .retain(|t| !failed.contains(&t.advertisement.address));
            self.needs_discovery = true;
        }

        if let Err(err) = self.sink.write(&report.points).await {
            error!("Write {} points: {}", report.points.len(), err);
        }

        report.polled.sort();
        Ok(report)
    }

    pub fn batteries(&self) -> usize {
        self.batteries.len()
    }

    async fn rediscover(&mut self) -> Result<()> {
        let found = discovery::discover(&mut self.transport, &self.settings.discovery).await?;

        for advertisement in found {
            if self
                .batteries
                .iter()
                .any(|t| t.advertisement.address == advertisement.address)
            {
                continue;
            }

            let mut battery = Battery::new(advertisement.name(), advertisement.address.as_str());
            if let Some(measurement) = self.settings.measurement.as_deref() {
                battery = battery.with_measurement(measurement);
            }
            self.batteries.push(Tracked {
                advertisement,
                battery: Arc::new(Mutex::new(battery)),
            });
        }

        self.needs_discovery = false;
        debug!("Tracking {} batteries", self.batteries.len());
        Ok(())
    }

    async fn poll_all(&mut self) -> RoundReport {
        let mut report = RoundReport::default();

        // Bluetooth stacks handle concurrent connection setup poorly, so
        // connect one by one and only run the polls concurrently.
        let mut links = Vec::with_capacity(self.batteries.len());
        for tracked in &self.batteries {
            match self.transport.connect(&tracked.advertisement).await {
                Ok(link) => links.push((tracked.clone(), link)),
                Err(err) => {
                    warn!("Connect {}: {}", tracked.advertisement.address, err);
                    report.failed.push(tracked.advertisement.address.clone());
                }
            }
        }

        let round_timeout = self.settings.monitor.round_timeout(&self.settings.poll);
        let counter = Arc::new(SharedCounter::new(links.len()));
        let (tx, mut rx) = mpsc::channel(links.len().max(1));
        let mut pending: HashSet<String> = HashSet::new();

        for (tracked, mut link) in links {
            let address = tracked.advertisement.address.clone();
            pending.insert(address.clone());

            let counter = counter.clone();
            let tx = tx.clone();
            let poller = self.poller.clone();
            let mut cancel = self.cancel.subscribe();
            let span = tracing::info_span!("poll", address = %address);

            self.in_flight.push(tokio::spawn(
                async move {
                    let result = {
                        let mut battery = tracked.battery.lock().await;
                        // Set when the poll future is dropped before it could unsubscribe.
                        let mut interrupted = true;
                        let poll = timeout(round_timeout, poller.poll(link.as_mut(), &mut battery));
                        let result = tokio::select! {
                            result = poll => match result {
                                Ok(result) => {
                                    interrupted = false;
                                    result
                                }
                                Err(elapsed) => Err(ErrorKind::Timeout(elapsed).into()),
                            },
                            _ = cancel.recv() => Err(ErrorKind::Cancelled.into()),
                        };
                        if interrupted {
                            if let Err(err) = link.unsubscribe().await {
                                debug!("Unsubscribe: {}", err);
                            }
                        }
                        battery.report_successes();
                        result
                    };
                    if let Err(err) = link.disconnect().await {
                        debug!("Disconnect: {}", err);
                    }

                    let _ = tx.send((address, result)).await;
                    counter.increment();
                }
                .instrument(span),
            ));
        }
        drop(tx);

        // Polls bound themselves by the round timeout, so waiting longer only
        // covers their release of the connection.
        let deadline = round_timeout + RELEASE_GRACE;
        if timeout(deadline, counter.wait()).await.is_err() {
            warn!(
                finished = counter.count(),
                total = self.in_flight.len(),
                "Round timed out after {:?}",
                deadline
            );
            for handle in &self.in_flight {
                handle.abort();
            }
        }
        self.in_flight.clear();

        while let Some((address, result)) = rx.recv().await {
            pending.remove(&address);
            match result {
                Ok(points) => {
                    report.points.extend(points);
                    report.polled.push(address);
                }
                Err(err) => {
                    warn!("Poll {}: {}", address, err);
                    report.failed.push(address);
                }
            }
        }
        // Aborted polls never reported back.
        report.failed.extend(pending);

        report
    }

    // Cancel polls left behind by an interrupted round and wait for them to
    // disconnect.
    async fn release_in_flight(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        debug!("Cancel {} in flight polls", self.in_flight.len());
        let _ = self.cancel.send(());

        let deadline = Instant::now() + RELEASE_GRACE;
        for mut handle in std::mem::take(&mut self.in_flight) {
            if timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }
}

fn log_round(result: Result<RoundReport>) {
    match result {
        Ok(report) => info!(
            polled = report.polled.len(),
            failed = report.failed.len(),
            points = report.points.len(),
            "Round finished"
        ),
        Err(BatmonError::NoBatteries) => warn!("No batteries discovered"),
        Err(err) => error!("Round failed: {}", err),
    }
}
