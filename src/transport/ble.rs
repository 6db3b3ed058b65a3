use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::common::{debug, info, trace, ErrorKind};
use crate::protocol;
use crate::transport::{Advertisement, Link, Transport};
use crate::Result;

const CHANNEL_BUFFER: usize = 64;

/// Transport backed by the first Bluetooth adapter of the host.
pub struct BleTransport {
    adapter: Adapter,
    scan_task: Option<JoinHandle<()>>,
}

impl BleTransport {
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(ErrorKind::NoAdapter)?;

        info!(
            "Using bluetooth adapter {}",
            adapter.adapter_info().await.unwrap_or_default()
        );

        Ok(Self {
            adapter,
            scan_task: None,
        })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.address().to_string() == address)
            .ok_or_else(|| {
                ErrorKind::DeviceNotFound {
                    address: address.to_owned(),
                }
                .into()
            })
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn start_scan(&mut self, services: &[Uuid]) -> Result<Receiver<Advertisement>> {
        let mut events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: services.to_vec(),
            })
            .await?;

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let adapter = self.adapter.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let peripheral = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral,
                    Err(err) => {
                        debug!("Lookup peripheral {:?}: {}", id, err);
                        continue;
                    }
                };
                let local_name = match peripheral.properties().await {
                    Ok(Some(properties)) => properties.local_name,
                    _ => None,
                };

                let advertisement =
                    Advertisement::new(peripheral.address().to_string(), local_name);
                if tx.send(advertisement).await.is_err() {
                    break;
                }
            }
            trace!("Scan event stream finished");
        });

        if let Some(previous) = self.scan_task.replace(task) {
            previous.abort();
        }

        Ok(rx)
    }

    async fn stop_scan(&mut self) -> Result<()> {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&mut self, device: &Advertisement) -> Result<Box<dyn Link>> {
        let peripheral = self.find_peripheral(&device.address).await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let uuid = protocol::characteristic_uuid();
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(ErrorKind::CharacteristicNotFound { uuid })?;

        debug!("Connected {} ({})", device.address, device.name());

        Ok(Box::new(BleLink {
            address: device.address.clone(),
            peripheral,
            characteristic,
            forward_task: None,
        }))
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
    }
}

struct BleLink {
    address: String,
    peripheral: Peripheral,
    characteristic: Characteristic,
    // Forwards notifications of the BMS characteristic onto the subscriber channel.
    forward_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for BleLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn subscribe(&mut self) -> Result<Receiver<Vec<u8>>> {
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&self.characteristic).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let uuid = self.characteristic.uuid;

        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.forward_task.replace(task) {
            previous.abort();
        }

        Ok(rx)
    }

    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        self.peripheral.unsubscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Drop for BleLink {
    fn drop(&mut self) {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
    }
}
