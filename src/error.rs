use std::fmt;

use crate::types::ModeField;

#[derive(Debug)]
pub enum Error {
    Auth(String),
    Http(reqwest::Error),
    Protocol(String),
    SessionExpired,
    Rejected { unit_id: String, reason: String },
    UnsupportedMode { field: ModeField, value: String },
    InvalidRange(f64),
    UnknownDevice(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::SessionExpired => write!(f, "session expired"),
            Error::Rejected { unit_id, reason } => {
                write!(f, "command rejected for unit {unit_id}: {reason}")
            }
            Error::UnsupportedMode { field, value } => {
                write!(f, "unsupported {field} value: {value}")
            }
            Error::InvalidRange(value) => {
                write!(f, "target temperature out of range: {value}")
            }
            Error::UnknownDevice(key) => write!(f, "unknown device: {key}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
