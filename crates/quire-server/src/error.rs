use axum::{Json, http::StatusCode, response::IntoResponse};
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

/// Top-level error type for the quire server binary
#[derive(Debug, Error, Diagnostic)]
pub enum QuireServerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] quire_common::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Server(#[from] ServerError),
}

/// HTTP server errors
#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("failed to bind to {addr}")]
    #[diagnostic(code(server::bind), help("is another process listening on this address?"))]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server terminated unexpectedly")]
    #[diagnostic(code(server::serve))]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

/// Error response for the document API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("document {0} not found")]
    NotFound(i64),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "error": "NotFound",
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
