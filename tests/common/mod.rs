#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

use batmon::core::{discovery, monitor, poller, Settings};
use batmon::error::ErrorKind;
use batmon::protocol::Frame;
use batmon::sink::Sink;
use batmon::transport::{Advertisement, Link, Transport};
use batmon::Point;

// Notifications are split like a 20 byte ATT MTU would.
const FRAGMENT_BYTES: usize = 20;

/// Response frame for `command` where every cell reads 3.300V.
pub fn response(command: u8) -> Frame {
    let frame_bytes = match command {
        0x02 => 19,
        0x03 => 20,
        _ => 55,
    };
    let mut payload = vec![0u8; frame_bytes - 8];
    if command == 0x02 {
        for cell in 0..4 {
            payload[3 + cell * 2] = 0x0c;
            payload[4 + cell * 2] = 0xe4;
        }
    }
    Frame::new(command, &payload)
}

#[derive(Debug, Default)]
pub struct State {
    pub advertisements: Vec<Advertisement>,
    // Remaining connect failures per address.
    pub connect_failures: HashMap<String, usize>,
    // Devices that never answer a request.
    pub silent: HashSet<String>,
    pub scans: usize,
    pub connects: Vec<String>,
    pub subscribes: Vec<String>,
    pub unsubscribes: Vec<String>,
    pub disconnects: Vec<String>,
}

/// In-memory transport whose devices answer every request.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn with_batteries(addresses: &[&str]) -> Self {
        let transport = MockTransport::default();
        {
            let mut state = transport.state.lock().unwrap();
            state.advertisements = addresses
                .iter()
                .map(|address| Advertisement::new(*address, Some("UT1300 BT".to_owned())))
                .collect();
        }
        transport
    }

    pub fn fail_connect(&self, address: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .connect_failures
            .insert(address.to_owned(), times);
    }

    pub fn silence(&self, address: &str) {
        self.state.lock().unwrap().silent.insert(address.to_owned());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_scan(&mut self, _services: &[Uuid]) -> batmon::Result<Receiver<Advertisement>> {
        let advertisements = {
            let mut state = self.state.lock().unwrap();
            state.scans += 1;
            state.advertisements.clone()
        };

        // Sender is dropped once every advertisement is queued, ending the scan.
        let (tx, rx) = mpsc::channel(advertisements.len().max(1));
        for advertisement in advertisements {
            tx.send(advertisement).await.unwrap();
        }
        Ok(rx)
    }

    async fn stop_scan(&mut self) -> batmon::Result<()> {
        Ok(())
    }

    async fn connect(&mut self, device: &Advertisement) -> batmon::Result<Box<dyn Link>> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.connect_failures.get_mut(&device.address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ErrorKind::DeviceNotFound {
                    address: device.address.clone(),
                }
                .into());
            }
        }
        state.connects.push(device.address.clone());

        Ok(Box::new(MockLink {
            address: device.address.clone(),
            silent: state.silent.contains(&device.address),
            tx: None,
            state: self.state.clone(),
        }))
    }
}

pub struct MockLink {
    address: String,
    silent: bool,
    tx: Option<Sender<Vec<u8>>>,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Link for MockLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn subscribe(&mut self) -> batmon::Result<Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(64);
        self.tx = Some(tx);
        self.state
            .lock()
            .unwrap()
            .subscribes
            .push(self.address.clone());
        Ok(rx)
    }

    async fn write(&mut self, payload: &[u8]) -> batmon::Result<()> {
        if self.silent {
            return Ok(());
        }
        let tx = self.tx.as_ref().unwrap();
        for chunk in response(payload[5]).as_bytes().chunks(FRAGMENT_BYTES) {
            tx.send(chunk.to_vec()).await.unwrap();
        }
        Ok(())
    }

    async fn unsubscribe(&mut self) -> batmon::Result<()> {
        self.tx = None;
        self.state
            .lock()
            .unwrap()
            .unsubscribes
            .push(self.address.clone());
        Ok(())
    }

    async fn disconnect(&mut self) -> batmon::Result<()> {
        self.state
            .lock()
            .unwrap()
            .disconnects
            .push(self.address.clone());
        Ok(())
    }
}

/// Sink keeping every written point.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub points: Arc<Mutex<Vec<Point>>>,
}

#[async_trait]
impl Sink for CollectingSink {
    async fn write(&self, points: &[Point]) -> batmon::Result<()> {
        self.points.lock().unwrap().extend_from_slice(points);
        Ok(())
    }
}

/// Sink rejecting every write.
#[derive(Debug, Clone, Default)]
pub struct FailingSink {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Sink for FailingSink {
    async fn write(&self, _points: &[Point]) -> batmon::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ErrorKind::InfluxWrite {
            status: 500,
            body: "internal error".to_owned(),
        }
        .into())
    }
}

/// Settings with short windows so a round finishes quickly.
pub fn fast_settings() -> Settings {
    let mut discovery = discovery::Config::default();
    discovery.set_scan_timeout_milliseconds(Some(500));

    let mut poll = poller::Config::default();
    poll.set_command_interval_milliseconds(Some(20));
    poll.set_settle_milliseconds(Some(2_000));

    let mut monitor = monitor::Config::default();
    monitor.set_interval_seconds(Some(1));
    monitor.set_round_timeout_seconds(Some(10));

    Settings {
        discovery,
        poll,
        monitor,
        measurement: Some("ut1300".to_owned()),
    }
}
