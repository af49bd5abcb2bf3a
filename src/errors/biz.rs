//! Business errors.
//!
//! A [`BizError`] carries an application error code (issued from a
//! [`Zone`](super::Zone)) plus the HTTP status the application wants clients
//! to see. Crossing the RPC boundary it becomes a [`Status`] whose code is the
//! application code and whose details carry the HTTP status and the cause.

use std::fmt;
use std::sync::Arc;

use super::status::{Detail, Status};

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// An application error with both an application code and an HTTP status.
///
/// Equality is by code only; message and cause are informational.
#[derive(Clone)]
pub struct BizError {
    code: u32,
    status: u16,
    message: String,
    cause: Option<Cause>,
}

impl BizError {
    pub fn new(code: u32, status: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            cause: None,
        }
    }

    /// Business error code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// A copy of this error wrapping `cause`.
    pub fn with<E>(&self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code: self.code,
            status: self.status,
            message: self.message.clone(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// True when `status` carries the same code as this error.
    pub fn equals(&self, status: &Status) -> bool {
        status.code() == self.code
    }

    /// Translate into a transport status.
    pub fn to_status(&self) -> Status {
        let mut status = Status::new(self.code, self.message.clone()).with_detail(
            Detail::WithHttpStatus {
                http_code: u32::from(self.status),
            },
        );
        if let Some(cause) = &self.cause {
            status = status.with_detail(Detail::WithCause {
                cause_error: cause.to_string(),
            });
        }
        status
    }

    /// Rebuild a business error from a transport status.
    ///
    /// Returns `None` unless the status carries an HTTP status detail: a
    /// status without one was never a business error.
    pub fn from_status(status: &Status) -> Option<Self> {
        let mut http_status = None;
        let mut cause = None;
        for detail in status.details() {
            match detail {
                Detail::WithHttpStatus { http_code } => http_status = u16::try_from(*http_code).ok(),
                Detail::WithCause { cause_error } => {
                    cause = Some(Arc::new(CauseMessage(cause_error.clone())) as Cause)
                }
            }
        }

        let http_status = http_status.filter(|s| *s != 0)?;
        Some(Self {
            code: status.code(),
            status: http_status,
            message: status.message().to_string(),
            cause,
        })
    }
}

impl PartialEq for BizError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for BizError {}

impl fmt::Debug for BizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BizError")
            .field("code", &self.code)
            .field("status", &self.status)
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for BizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BizError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<BizError> for Status {
    fn from(err: BizError) -> Self {
        err.to_status()
    }
}

impl From<&BizError> for Status {
    fn from(err: &BizError) -> Self {
        err.to_status()
    }
}

/// A cause reconstructed from its message on the far side of the wire.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CauseMessage(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Code;

    #[test]
    fn round_trips_through_status() {
        let err = BizError::new(10_000, 400, "bad user");
        let back = BizError::from_status(&err.to_status()).expect("biz error");

        assert_eq!(back.code(), 10_000);
        assert_eq!(back.status(), 400);
        assert_eq!(back.message(), "bad user");
        assert!(back.cause().is_none());
    }

    #[test]
    fn cause_survives_as_message() {
        let err = BizError::new(10_000, 500, "storage failed")
            .with(CauseMessage("disk full".into()));
        let status = err.to_status();
        assert_eq!(status.details().len(), 2);

        let back = BizError::from_status(&status).expect("biz error");
        assert_eq!(back.cause().map(|c| c.to_string()).as_deref(), Some("disk full"));
    }

    #[test]
    fn plain_status_is_not_a_biz_error() {
        assert!(BizError::from_status(&Status::invalid_argument("invalid argument")).is_none());
        assert!(BizError::from_status(&Status::from(Code::Internal)).is_none());
    }

    #[test]
    fn equality_is_by_code() {
        let a = BizError::new(10_001, 400, "bad request");
        let b = BizError::new(10_001, 404, "something else");
        let c = BizError::new(10_002, 400, "bad request");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, c.with(CauseMessage("another error".into())));
        assert!(a.equals(&b.to_status()));
        assert!(!a.equals(&Status::invalid_argument("nope")));
    }
}
