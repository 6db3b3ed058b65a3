use clap::Args;

use crate::cli::ScanOptions;
use crate::config::{Config, Initializer};
use crate::core::discovery;
use crate::transport::ble::BleTransport;
use crate::{BatmonError, Result};

/// Discover batteries in range
#[derive(Args, Debug)]
pub struct ScanCommand {
    #[command(flatten)]
    pub(crate) scan: ScanOptions,
}

impl ScanCommand {
    pub async fn run(self, mut initializer: Initializer) -> Result<()> {
        let mut overrides = Config::default();
        self.scan.apply(&mut overrides);
        initializer.override_merge(&mut overrides);

        let mut transport = BleTransport::new().await?;
        let found = discovery::discover(&mut transport, &initializer.config.ble).await?;

        if found.is_empty() {
            return Err(BatmonError::NoBatteries);
        }
        for advertisement in found {
            println!("{}\t{}", advertisement.address, advertisement.name());
        }

        Ok(())
    }
}
