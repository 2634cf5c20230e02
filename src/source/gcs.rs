use crate::config::StorageConfig;
use crate::error::LoadError;
use crate::source::SourceStream;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::{debug, info};

/// Fetches one object through the Cloud Storage JSON API.
pub struct GcsObjectSource {
    client: reqwest::Client,
    url: Url,
    bucket: String,
    path: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GcsObjectSource {
    pub fn new(config: &StorageConfig, bucket: &str, path: &str) -> Result<Self, LoadError> {
        let mut url = Url::parse(&config.endpoint).map_err(|e| {
            LoadError::config(format!("invalid storage endpoint {}: {}", config.endpoint, e))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                LoadError::config(format!("invalid storage endpoint {}", config.endpoint))
            })?;
            // The object name is one segment, so its slashes get percent-encoded.
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "b", bucket, "o", path]);
        }
        url.query_pairs_mut().append_pair("alt", "media");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LoadError::config(format!("failed to build storage client: {}", e)))?;

        Ok(Self {
            client,
            url,
            bucket: bucket.to_string(),
            path: path.to_string(),
            access_token: config.access_token.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn acquisition_error(&self, reason: impl Into<String>) -> LoadError {
        LoadError::StreamAcquisition {
            location: self.describe(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SourceStream for GcsObjectSource {
    async fn open(&self) -> Result<Box<dyn Read + Send>, LoadError> {
        info!("Fetching {}", self.describe());

        let mut request = self.client.get(self.url.clone());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.acquisition_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api) => format!("storage responded with status {}: {}", status, api.error.message),
                Err(_) => format!("storage responded with status {}", status),
            };
            return Err(self.acquisition_error(reason));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::StreamRead(std::io::Error::other(e)))?;
        debug!("Fetched {} bytes from {}", body.len(), self.describe());

        Ok(Box::new(Cursor::new(body)))
    }

    fn stage(&self) -> &'static str {
        "error: open gcs object"
    }

    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.path)
    }
}
