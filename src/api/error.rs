use serde::Serialize;

use crate::Error;

/// JSON-RPC 2.0 error codes used by this server.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A JSON-RPC error object. Rides inside an HTTP 200 response like any
/// other JSON-RPC result.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "parse error".to_string(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

/// Map crate errors onto the JSON-RPC taxonomy: malformed input is the
/// caller's fault (invalid params), range and semantic failures are
/// invalid requests, everything else is internal.
impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        match &err {
            Error::Xdr(_) | Error::Json(_) | Error::BadCursor(_) => {
                Self::invalid_params(err.to_string())
            }
            Error::StartBeforeOldest { .. } | Error::StartAfterNewest { .. } => {
                Self::invalid_request(err.to_string())
            }
            _ => Self::internal(err.to_string()),
        }
    }
}
