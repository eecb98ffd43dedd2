use std::fmt;

use hyper::StatusCode;
use serde_json::json;

use crate::gate;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Execution(String),
    // mappable to classical HTTP responses
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::BadRequest(err) => write!(f, "Bad Request: {err}"),
            Error::Unauthorized(err) => write!(f, "Unauthorized: {err}"),
            Error::NotFound(err) => write!(f, "Not Found: {err}"),
            Error::ServiceUnavailable(err) => write!(f, "Service Unavailable: {err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl From<gate::Error> for Error {
    fn from(error: gate::Error) -> Self {
        Error::Internal(error.to_string())
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Initialization(_) | Error::Execution(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Error::Initialization(_) | Error::Execution(_) | Error::Internal(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            Error::Initialization(msg)
            | Error::Execution(msg)
            | Error::BadRequest(msg)
            | Error::Unauthorized(msg)
            | Error::NotFound(msg)
            | Error::ServiceUnavailable(msg)
            | Error::Internal(msg) => msg,
        }
    }

    pub fn as_json(&self, trace_id: Option<&String>) -> serde_json::Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.message(),
        });

        if let Some(trace_id) = trace_id {
            error["trace_id"] = json!(trace_id);
        }

        json!({ "errors": [error] })
    }
}
