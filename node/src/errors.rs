// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Replay error: {0}")]
    Replay(#[from] chainlog_kernel::ProcessorError),
    #[error("Block log codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("Invalid table pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Notice bus closed")]
    BusClosed,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, NodeError>;

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            NodeError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            NodeError::Database(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
