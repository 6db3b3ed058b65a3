#![allow(clippy::module_inception)]

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod launch;
pub mod protocol;
pub mod sink;
pub mod transport;

pub use crate::error::BatmonError;
pub type Result<T, E = crate::error::BatmonError> = std::result::Result<T, E>;

pub use crate::core::{Battery, ChargeState, Readings};
pub use crate::sink::{FieldValue, Point};

pub(crate) mod common {
    pub(crate) type Result<T, E = crate::error::internal::Error> = std::result::Result<T, E>;

    pub(crate) type Error = crate::error::internal::Error;
    pub(crate) type ErrorKind = crate::error::internal::ErrorKind;

    pub(crate) type Time = chrono::DateTime<chrono::Utc>;

    pub use tracing::{debug, error, info, trace, warn};
}
