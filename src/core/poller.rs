use std::collections::HashSet;

use serde::Deserialize;
use tokio::sync::mpsc::Receiver;
use tokio::time::{timeout_at, Duration, Instant};

use crate::common::{debug, trace, warn, ErrorKind};
use crate::core::Battery;
use crate::protocol::{Assembler, Command, Frame, Message, MessageType};
use crate::sink::Point;
use crate::transport::Link;
use crate::Result;

// Request schedule configuration.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    // Time to collect responses after each request but the last.
    command_interval_milliseconds: Option<u64>,
    // Time to collect responses after the last request.
    settle_milliseconds: Option<u64>,
}

impl Config {
    const DEFAULT_COMMAND_INTERVAL_MILLISECONDS: u64 = 1000;
    const DEFAULT_SETTLE_MILLISECONDS: u64 = 5000;

    pub fn set_command_interval_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.command_interval_milliseconds = Some(val);
        }
    }
    pub fn set_settle_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.settle_milliseconds = Some(val);
        }
    }
    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_command_interval_milliseconds(other.command_interval_milliseconds);
        self.set_settle_milliseconds(other.settle_milliseconds);
    }

    fn command_interval(&self) -> Duration {
        Duration::from_millis(
            self.command_interval_milliseconds
                .unwrap_or(Config::DEFAULT_COMMAND_INTERVAL_MILLISECONDS),
        )
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(
            self.settle_milliseconds
                .unwrap_or(Config::DEFAULT_SETTLE_MILLISECONDS),
        )
    }

    /// Upper bound of one poll, excluding connection setup.
    pub fn max_poll_duration(&self) -> Duration {
        self.command_interval() * (Command::SEQUENCE.len() as u32 - 1) + self.settle()
    }
}

/// Runs the request sequence against one battery.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: Config,
}

impl Poller {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Request every message type once and apply the responses to `battery`.
    ///
    /// The link is unsubscribed before returning, also on error.
    pub async fn poll(&self, link: &mut dyn Link, battery: &mut Battery) -> Result<Vec<Point>> {
        let mut notifications = link.subscribe().await?;

        let result = self.request_all(link, &mut notifications, battery).await;

        if let Err(err) = link.unsubscribe().await {
            warn!("{}: unsubscribe: {}", battery.name(), err);
        }

        result
    }

    async fn request_all(
        &self,
        link: &mut dyn Link,
        notifications: &mut Receiver<Vec<u8>>,
        battery: &mut Battery,
    ) -> Result<Vec<Point>> {
        let mut collector = Collector::new(battery);
        let last = Command::SEQUENCE.len() - 1;

        for (i, command) in Command::SEQUENCE.iter().enumerate() {
            trace!(%command, "Write");
            link.write(&command.encode()).await?;

            let window = if i == last {
                self.config.settle()
            } else {
                self.config.command_interval()
            };
            collector
                .collect_until(notifications, Instant::now() + window)
                .await?;
        }

        let (points, received) = collector.finish();
        for message_type in MessageType::ALL {
            if !received.contains(&message_type) {
                warn!("{}: no {} response", battery.name(), message_type);
            }
        }

        Ok(points)
    }
}

struct Collector<'a> {
    battery: &'a mut Battery,
    assembler: Assembler,
    received: HashSet<MessageType>,
    points: Vec<Point>,
}

impl<'a> Collector<'a> {
    fn new(battery: &'a mut Battery) -> Self {
        Self {
            battery,
            assembler: Assembler::new(),
            received: HashSet::new(),
            points: Vec::new(),
        }
    }

    fn finish(self) -> (Vec<Point>, HashSet<MessageType>) {
        (self.points, self.received)
    }

    fn is_complete(&self) -> bool {
        self.received.len() == MessageType::ALL.len()
    }

    // Consume notifications until the deadline passes or every message type
    // has been received.
    async fn collect_until(
        &mut self,
        notifications: &mut Receiver<Vec<u8>>,
        deadline: Instant,
    ) -> Result<()> {
        while !self.is_complete() {
            match timeout_at(deadline, notifications.recv()).await {
                Ok(Some(fragment)) => {
                    if let Some(frame) = self.assembler.push(&fragment) {
                        self.handle(frame);
                    }
                }
                Ok(None) => return Err(ErrorKind::NotificationsClosed.into()),
                Err(_) => break,
            }
        }
        Ok(())
    }

    fn handle(&mut self, frame: Frame) {
        if !frame.checksum_matches() {
            debug!("{}: checksum mismatch {:?}", self.battery.name(), frame);
        }

        match Message::from_frame(&frame) {
            Ok(message) => {
                self.received.insert(message.message_type());
                self.points.push(self.battery.apply(&message));
            }
            Err(err) => warn!("{}: {}", self.battery.name(), err),
        }
    }
}
