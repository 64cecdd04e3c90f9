//! Shared plumbing for issuing API requests over reqwest.

mod error;

pub(crate) use error::Error as HttpError;
pub(crate) use reqwest::Url;

use crate::backends::{Error, ErrorKind};

impl From<HttpError> for Error {
    fn from(value: HttpError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            error::ErrorKind::ConnectFailed => ErrorKind::Connection,
            error::ErrorKind::TimedOut => ErrorKind::TimedOut,
            error::ErrorKind::BodyFailed | error::ErrorKind::DecodeFailed => {
                ErrorKind::UnexpectedResponse
            }
            error::ErrorKind::Other => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}
