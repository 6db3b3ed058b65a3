mod battery;
pub use self::battery::{Battery, Readings, Successes, DEFAULT_MEASUREMENT};

mod counter;
pub use self::counter::SharedCounter;

pub mod discovery;

pub mod monitor;
pub use self::monitor::{Monitor, RoundReport, Settings};

pub mod poller;
pub use self::poller::Poller;

pub use crate::protocol::message::{ChargeState, Temperature};
