//! Bluetooth LE seam.
//!
//! Everything above this module talks to batteries through [`Transport`] and
//! [`Link`], so the protocol and polling logic can run against in-memory
//! links in tests.

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

use crate::Result;

pub mod ble;

/// Advertising device seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Advertisement {
    pub address: String,
    pub local_name: Option<String>,
}

impl Advertisement {
    pub fn new(address: impl Into<String>, local_name: Option<String>) -> Self {
        Self {
            address: address.into(),
            local_name,
        }
    }

    pub fn name(&self) -> &str {
        self.local_name.as_deref().unwrap_or("")
    }
}

#[async_trait]
pub trait Transport: Send {
    /// Start scanning for devices advertising any of `services`.
    async fn start_scan(&mut self, services: &[Uuid]) -> Result<Receiver<Advertisement>>;
    async fn stop_scan(&mut self) -> Result<()>;
    /// Connect to a device and resolve the BMS characteristic.
    async fn connect(&mut self, device: &Advertisement) -> Result<Box<dyn Link>>;
}

/// Connection to a single battery's BMS characteristic.
#[async_trait]
pub trait Link: Send {
    fn address(&self) -> &str;
    /// Enable notifications. Each received item is one notification payload.
    async fn subscribe(&mut self) -> Result<Receiver<Vec<u8>>>;
    /// Write with response.
    async fn write(&mut self, payload: &[u8]) -> Result<()>;
    async fn unsubscribe(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
}
