//! HTTP error mapping.
//!
//! Every component error surfaces to the browser as a JSON body of the
//! stable shape `{"error":"<human message>"}` with the matching status
//! code. In the streaming path this mapping only applies before headers are
//! sent; later failures are reported in-band by the relay's terminal frame.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use porta_core::compiler::CompileError;
use porta_core::invoke::CallError;
use porta_core::registry::RegistryError;

#[derive(Debug)]
pub enum ApiError {
    BadInput(String),
    NotFound(String),
    Compile(String),
    Transport(String),
    DeadlineExceeded,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Compile(_)
            | ApiError::Transport(_)
            | ApiError::DeadlineExceeded
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadInput(m)
            | ApiError::NotFound(m)
            | ApiError::Compile(m)
            | ApiError::Transport(m)
            | ApiError::Internal(m) => m,
            ApiError::DeadlineExceeded => "Deadline exceeded".to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EmptyImportPath => ApiError::BadInput(err.to_string()),
            RegistryError::ServiceNotFound(_) | RegistryError::MethodNotFound(_) => {
                ApiError::NotFound("Service or Method not found".to_string())
            }
            RegistryError::InvalidDescriptor(_) => ApiError::Compile(err.to_string()),
        }
    }
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        ApiError::Compile(err.to_string())
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        match &err {
            CallError::InvalidTimeout | CallError::BadPayload(_) => {
                ApiError::BadInput(err.to_string())
            }
            CallError::NotUnary(_) | CallError::NotServerStreaming(_) => {
                ApiError::NotFound("Service or Method not found".to_string())
            }
            CallError::InvalidTarget(..)
            | CallError::ConnectFailed(..)
            | CallError::Request(_)
            | CallError::Rpc(_) => ApiError::Transport(err.to_string()),
            CallError::DeadlineExceeded => ApiError::DeadlineExceeded,
        }
    }
}
