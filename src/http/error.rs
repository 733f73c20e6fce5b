//! Mapping of ledger errors onto HTTP responses

use actix_web::http::StatusCode;
use actix_web::error::{InternalError, JsonPayloadError, PathError};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use log::{error, warn};

use super::dto::ErrorBody;
use crate::types::LedgerError;

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::VersionConflict { .. } => StatusCode::CONFLICT,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            err if err.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected with {}: {}", status.as_u16(), self);
        }

        HttpResponse::build(status).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}

/// Turn malformed JSON bodies into `400 {detail}` responses
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let detail = err.to_string();
    warn!("Rejected malformed body: {}", detail);
    InternalError::from_response(err, HttpResponse::BadRequest().json(ErrorBody { detail }))
        .into()
}

/// Turn unparseable path segments into `400 {detail}` responses
pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    let detail = err.to_string();
    warn!("Rejected malformed path: {}", detail);
    InternalError::from_response(err, HttpResponse::BadRequest().json(ErrorBody { detail }))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::SplitError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LedgerError::Split(SplitError::SelfPayment).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LedgerError::UnsupportedCurrency("USD".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LedgerError::GroupNotFound("g".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LedgerError::VersionConflict {
                transaction_id: "t".to_string(),
                expected: 1,
                actual: 2,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LedgerError::Storage("down".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
