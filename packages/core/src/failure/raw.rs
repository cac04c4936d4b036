//! Boundary representation of a failure before classification.
//!
//! Every failure source gets an adapter into [`RawFailure`], and the
//! classifier only ever looks at this shape.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::failure::types::ErrorCode;

/// Connection-level failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFault {
    Connect,
    Timeout,
    Reset,
    Offline,
    Other(String),
}

/// Typed failure category assigned by the layer that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Storage,
    Decode,
    Other(String),
}

/// A failure as observed at the edge of the subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFailure {
    pub message: Option<String>,
    pub transport: Option<TransportFault>,
    pub transport_status: Option<u16>,
    pub kind: Option<FailureKind>,
    pub code: Option<ErrorCode>,
    pub details: Option<serde_json::Value>,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn transport(fault: TransportFault, message: impl Into<String>) -> Self {
        Self {
            transport: Some(fault),
            ..Self::new(message)
        }
    }

    /// Failure carrying an HTTP-like status code.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            transport_status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: Some(FailureKind::Validation),
            ..Self::new(message)
        }
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Diagnostic text, or a placeholder when the source supplied none.
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Unknown failure".to_string())
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.transport_status) {
            (Some(message), _) => f.write_str(message),
            (None, Some(status)) => write!(f, "HTTP {}", status),
            (None, None) => f.write_str("Unknown failure"),
        }
    }
}

impl std::error::Error for RawFailure {}

/// Conversion from a concrete error type into the boundary shape.
pub trait AsRawFailure {
    fn as_raw_failure(&self) -> RawFailure;
}

impl AsRawFailure for RawFailure {
    fn as_raw_failure(&self) -> RawFailure {
        self.clone()
    }
}

impl From<&reqwest::Error> for RawFailure {
    fn from(err: &reqwest::Error) -> Self {
        let message = err.to_string();

        if err.is_connect() {
            return RawFailure::transport(TransportFault::Connect, message);
        }
        if err.is_timeout() {
            return RawFailure::transport(TransportFault::Timeout, message);
        }
        if let Some(status) = err.status() {
            return RawFailure::http_status(status.as_u16(), message);
        }
        if err.is_decode() || err.is_body() {
            return RawFailure::new(message).with_kind(FailureKind::Decode);
        }
        if err.is_request() {
            return RawFailure::transport(TransportFault::Other("request".to_string()), message);
        }

        RawFailure::new(message)
    }
}

impl AsRawFailure for reqwest::Error {
    fn as_raw_failure(&self) -> RawFailure {
        RawFailure::from(self)
    }
}

impl From<&io::Error> for RawFailure {
    fn from(err: &io::Error) -> Self {
        let message = err.to_string();
        let fault = match err.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected => {
                Some(TransportFault::Connect)
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Some(TransportFault::Reset),
            io::ErrorKind::TimedOut => Some(TransportFault::Timeout),
            io::ErrorKind::AddrNotAvailable => Some(TransportFault::Offline),
            _ => None,
        };

        match fault {
            Some(fault) => RawFailure::transport(fault, message),
            None => RawFailure::new(message).with_kind(FailureKind::Storage),
        }
    }
}

impl AsRawFailure for io::Error {
    fn as_raw_failure(&self) -> RawFailure {
        RawFailure::from(self)
    }
}

impl AsRawFailure for serde_json::Error {
    fn as_raw_failure(&self) -> RawFailure {
        RawFailure::new(self.to_string()).with_kind(FailureKind::Decode)
    }
}

impl AsRawFailure for CoreError {
    fn as_raw_failure(&self) -> RawFailure {
        match self {
            CoreError::Storage(err) => err.as_raw_failure(),
            CoreError::Serialize(err) => err.as_raw_failure(),
            CoreError::Remote(err) => err.as_raw_failure(),
            CoreError::RemoteStatus { status } => {
                RawFailure::http_status(*status, self.to_string())
            }
            CoreError::Config(_) => RawFailure::new(self.to_string())
                .with_kind(FailureKind::Other("config".to_string())),
        }
    }
}

impl<T: AsRawFailure + ?Sized> AsRawFailure for &T {
    fn as_raw_failure(&self) -> RawFailure {
        (**self).as_raw_failure()
    }
}
