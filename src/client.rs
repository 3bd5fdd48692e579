use std::path::Path;

use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::{
    error::ErrorResponse,
    server::UploadResponse,
    store::SearchHit,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path} has no usable filename")]
    Filename { path: String },
    #[error("server returned {status}: {message}")]
    Server {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// Talks to a running image search server.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            std::env::var("IMAGE_SEARCH_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    async fn file_form(path: &Path) -> Result<Form, ClientError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ClientError::Filename {
                path: path.display().to_string(),
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        Ok(Form::new().part("file", Part::bytes(bytes).file_name(filename)))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Server { status, message });
        }
        Ok(response.json().await?)
    }

    pub async fn upload(&self, path: &Path) -> Result<UploadResponse, ClientError> {
        let form = Self::file_form(path).await?;
        let url = format!("{}/upload", self.base_url);

        tracing::info!("Uploading {}", path.display());

        self.send(self.http.post(url).multipart(form)).await
    }

    pub async fn search(&self, path: &Path, k: usize) -> Result<Vec<SearchHit>, ClientError> {
        let form = Self::file_form(path).await?;
        let url = format!("{}/search", self.base_url);

        tracing::info!("Searching for the {} images closest to {}", k, path.display());

        self.send(self.http.post(url).query(&[("k", k)]).multipart(form))
            .await
    }
}
