use std::error;
use std::fmt;
use std::io;

use backtrace::Backtrace;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum ErrorKind {
    Io(io::Error),
    Ble(btleplug::Error),
    Http(reqwest::Error),
    Yaml(serde_yaml::Error),
    EnvFile(dotenvy::Error),
    Json(serde_json::Error),
    Timeout(tokio::time::error::Elapsed),
    // Frame is syntactically valid but its payload cannot be decoded.
    Frame { description: String },
    UnknownMessageType { message_type: u8 },
    NoAdapter,
    CharacteristicNotFound { uuid: uuid::Uuid },
    DeviceNotFound { address: String },
    NotificationsClosed,
    // Poll interrupted by shutdown.
    Cancelled,
    InfluxWrite { status: u16, body: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ErrorKind::Io(err) => err.fmt(f),
            ErrorKind::Ble(err) => write!(f, "bluetooth: {}", err),
            ErrorKind::Http(err) => write!(f, "http: {}", err),
            ErrorKind::Yaml(err) => write!(f, "config: {}", err),
            ErrorKind::EnvFile(err) => write!(f, "env file: {}", err),
            ErrorKind::Json(err) => err.fmt(f),
            ErrorKind::Timeout(err) => err.fmt(f),
            ErrorKind::Frame { description } => {
                write!(f, "frame decode error. {}", description)
            }
            ErrorKind::UnknownMessageType { message_type } => {
                write!(f, "unknown message type 0x{:02x}", message_type)
            }
            ErrorKind::NoAdapter => write!(f, "no bluetooth adapter available"),
            ErrorKind::CharacteristicNotFound { uuid } => {
                write!(f, "characteristic {} not found", uuid)
            }
            ErrorKind::DeviceNotFound { address } => {
                write!(f, "device {} not found", address)
            }
            ErrorKind::NotificationsClosed => write!(f, "notification stream closed"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::InfluxWrite { status, body } => {
                write!(f, "influxdb write failed. status: {} body: {:.200}", status, body)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from(ErrorKind::Io(err))
    }
}

impl From<btleplug::Error> for Error {
    fn from(err: btleplug::Error) -> Self {
        Error::from(ErrorKind::Ble(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::from(ErrorKind::Http(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::from(ErrorKind::Yaml(err))
    }
}

impl From<dotenvy::Error> for Error {
    fn from(err: dotenvy::Error) -> Self {
        Error::from(ErrorKind::EnvFile(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::from(ErrorKind::Json(err))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::from(ErrorKind::Timeout(err))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::with_backtrace(kind)
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        match self.kind() {
            ErrorKind::Io(err) => err.kind() == io::ErrorKind::NotFound,
            ErrorKind::EnvFile(dotenvy::Error::Io(err)) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    fn with_backtrace(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Backtrace::new()),
        }
    }
}

impl error::Error for Error {}
