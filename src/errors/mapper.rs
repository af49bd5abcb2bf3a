//! Status to HTTP mapping.

use axum::http::StatusCode;

use super::biz::BizError;
use super::status::{Code, Status};

/// Message used for server-side failures that were not raised as business errors.
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal server error";

/// Minimal body written when a status cannot be serialized.
pub const FALLBACK_BODY: &[u8] = br#"{"code": 13, "message": "internal server error"}"#;

/// The HTTP rendering of a status: response code and the body status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub body: Status,
}

/// Map a status onto the HTTP boundary.
///
/// - business errors surface their carried HTTP status with the full body;
/// - canonical client-side codes map through [`Code::http_status`];
/// - unavailable, deadline and unimplemented keep their code, named by the code alone;
/// - everything else becomes a 500 whose body hides the original message.
pub fn to_http(status: &Status) -> HttpError {
    if let Some(biz) = BizError::from_status(status) {
        if let Ok(code) = StatusCode::from_u16(biz.status()) {
            return HttpError {
                status: code,
                body: status.clone(),
            };
        }
    }

    match status.canonical() {
        Some(code) if code.http_status().is_client_error() => HttpError {
            status: code.http_status(),
            body: status.clone(),
        },
        Some(code @ (Code::Unavailable | Code::DeadlineExceeded | Code::Unimplemented)) => HttpError {
            status: code.http_status(),
            body: Status::new(code, code.as_str()),
        },
        _ => HttpError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Status::internal(GENERIC_INTERNAL_MESSAGE),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biz_error_uses_carried_status() {
        let status = BizError::new(10_000, 409, "duplicate order").to_status();
        let mapped = to_http(&status);

        assert_eq!(mapped.status, StatusCode::CONFLICT);
        assert_eq!(mapped.body, status);
    }

    #[test]
    fn client_errors_keep_their_message() {
        let mapped = to_http(&Status::invalid_argument("missing path parameter id"));
        assert_eq!(mapped.status, StatusCode::BAD_REQUEST);
        assert_eq!(mapped.body.message(), "missing path parameter id");
    }

    #[test]
    fn internal_errors_are_hidden() {
        let mapped = to_http(&Status::unknown("connection to db-7.internal refused"));
        assert_eq!(mapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapped.body.code(), Code::Internal.as_u32());
        assert_eq!(mapped.body.message(), GENERIC_INTERNAL_MESSAGE);
    }

    #[test]
    fn server_side_codes_keep_status_but_not_message() {
        let mapped = to_http(&Status::unavailable("dial tcp 10.0.3.7:5432: connection refused"));
        assert_eq!(mapped.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(mapped.body.code(), Code::Unavailable.as_u32());
        assert_eq!(mapped.body.message(), "UNAVAILABLE");

        let mapped = to_http(&Status::new(Code::DeadlineExceeded, "backend orders-db timed out"));
        assert_eq!(mapped.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(mapped.body.message(), "DEADLINE_EXCEEDED");
    }

    #[test]
    fn errors_module_exposes_fallback_bodies() {
        assert_eq!(crate::errors::FALLBACK_BODY, FALLBACK_BODY);
        assert_eq!(crate::errors::GENERIC_INTERNAL_MESSAGE, GENERIC_INTERNAL_MESSAGE);
    }

    #[test]
    fn application_code_without_detail_is_internal() {
        let mapped = to_http(&Status::new(10_000u32, "leaky"));
        assert_eq!(mapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapped.body.message(), GENERIC_INTERNAL_MESSAGE);
    }
}
