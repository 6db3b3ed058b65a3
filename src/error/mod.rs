pub(crate) mod internal;

pub use internal::{Error, ErrorKind};

use std::fmt;

#[derive(Debug)]
pub enum BatmonError {
    // Discovery finished without a single matching battery.
    NoBatteries,
    // Child process launched by `exec` exited unsuccessfully.
    ChildExited { code: i32 },
    Internal(Error),
}

impl fmt::Display for BatmonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BatmonError::NoBatteries => write!(f, "no batteries discovered"),
            BatmonError::ChildExited { code } => write!(f, "child exited with status {}", code),
            BatmonError::Internal(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BatmonError {}

impl BatmonError {
    /// Process exit code the cli reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatmonError::NoBatteries => 2,
            BatmonError::ChildExited { code } => *code,
            BatmonError::Internal(_) => 1,
        }
    }
}

impl From<Error> for BatmonError {
    fn from(err: Error) -> Self {
        BatmonError::Internal(err)
    }
}

impl From<ErrorKind> for BatmonError {
    fn from(kind: ErrorKind) -> Self {
        BatmonError::Internal(Error::from(kind))
    }
}

impl From<std::io::Error> for BatmonError {
    fn from(err: std::io::Error) -> Self {
        BatmonError::Internal(Error::from(err))
    }
}

impl From<btleplug::Error> for BatmonError {
    fn from(err: btleplug::Error) -> Self {
        BatmonError::Internal(Error::from(err))
    }
}

impl From<reqwest::Error> for BatmonError {
    fn from(err: reqwest::Error) -> Self {
        BatmonError::Internal(Error::from(err))
    }
}

impl From<serde_json::Error> for BatmonError {
    fn from(err: serde_json::Error) -> Self {
        BatmonError::Internal(Error::from(err))
    }
}
