use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::ErrorBody;

pub const GENERIC_ERROR: &str = "Something went wrong on the server.";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("API_KEY environment variable not set on the server")]
    MissingApiKey,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("stream {0} not found or already claimed")]
    StreamNotFound(String),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode upstream stream: {0}")]
    Decode(String),

    #[error("bad upstream endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) | RelayError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            // reading the body failed, e.g. it hit the size limit
            RelayError::Body(JsonRejection::BytesRejection(rejection)) => rejection.status(),
            RelayError::Body(_) => StatusCode::BAD_REQUEST,
            RelayError::StreamNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("relay error: {self}");
        } else {
            log::warn!("rejected relay request: {self}");
        }
        let body = ErrorBody {
            error: GENERIC_ERROR.to_string(),
            details: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
