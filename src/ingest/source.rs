//! Weather sources

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Status and body of one upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Bytes,
}

impl FetchResponse {
    /// Whether the call succeeded with 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, lossily decoded
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that returns the current observations for one location
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Make exactly one call to the upstream service
    ///
    /// Any HTTP status is a successful fetch; only transport failures
    /// (DNS, connect, timeout, a body cut off mid-read) are errors.
    async fn fetch(&self) -> Result<FetchResponse>;
}

/// The wttr.in JSON endpoint
#[derive(Debug)]
pub struct WttrSource {
    client: HttpClient,
    location: String,
    format: String,
}

impl WttrSource {
    /// Create a source from the ingest settings
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = HttpClient::new(
            &HttpClientConfig::new()
                .with_base_url(&config.endpoint)
                .with_timeout(Duration::from_secs(config.timeout_secs))
                .with_user_agent(&config.user_agent),
        )?;

        Ok(Self {
            client,
            location: config.location.clone(),
            format: config.format.clone(),
        })
    }

    /// Location path segment queried
    pub fn location(&self) -> &str {
        &self.location
    }
}

#[async_trait]
impl WeatherSource for WttrSource {
    async fn fetch(&self) -> Result<FetchResponse> {
        let options = RequestOptions::new().with_query("format", &self.format);
        let response = self.client.get(&self.location, &options).await?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::ResponseBody {
                status,
                message: e.to_string(),
            })?;
        Ok(FetchResponse { status, body })
    }
}
