//! Wrapper around Reqwest's error type to facilitate exclusive matching

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub(crate) enum ErrorKind {
    /// TCP/TLS connection to the service could not be established.
    ConnectFailed,
    /// The request or response body could not be transferred.
    BodyFailed,
    /// The response body could not be decoded.
    DecodeFailed,
    /// The request timed out.
    TimedOut,
    /// Anything reqwest reports that the above do not cover.
    Other,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() {
            ErrorKind::ConnectFailed
        } else if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_decode() {
            ErrorKind::DecodeFailed
        } else if err.is_body() {
            ErrorKind::BodyFailed
        } else {
            ErrorKind::Other
        };

        Error { kind, source: err }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ConnectFailed => write!(f, "connection failed"),
            ErrorKind::BodyFailed => write!(f, "request body failed"),
            ErrorKind::DecodeFailed => write!(f, "response decoding failed"),
            ErrorKind::TimedOut => write!(f, "timed out"),
            ErrorKind::Other => write!(f, "request failed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source as &(dyn StdError + 'static))
    }
}
