use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{embedding::EmbedError, images::ImageDirError, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing multipart field `file`")]
    MissingFile,
    #[error("uploaded file has no filename")]
    MissingFilename,
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Images(#[from] ImageDirError),
    #[error("embedding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFile
            | AppError::MissingFilename
            | AppError::Embed(EmbedError::Decode(_))
            | AppError::Images(ImageDirError::InvalidFilename(_)) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
