//! The ingest step: one fetch, one landed object

use super::source::{WeatherSource, WttrSource};
use crate::config::IngestConfig;
use crate::error::Result;
use crate::storage::Storage;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Content type recorded on raw objects
pub const RAW_CONTENT_TYPE: &str = "application/json";

/// What happened to the fetched payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IngestBody {
    /// Body written to storage
    Uploaded {
        /// Bucket, container or local root
        bucket: String,
        /// Key within the bucket
        path: String,
    },
    /// Nothing written
    Failed {
        /// Upstream body or transport error
        error: String,
    },
}

/// Result of one ingest invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Upstream status, absent when the call never got a status line
    pub status_code: Option<u16>,
    /// Where the payload went, or why it did not
    pub body: IngestBody,
}

impl IngestOutcome {
    /// Whether the payload was landed
    pub fn is_uploaded(&self) -> bool {
        matches!(self.body, IngestBody::Uploaded { .. })
    }

    /// Render the invocation payload: `statusCode` plus a JSON-encoded `body`
    pub fn to_response(&self) -> Value {
        let body = match &self.body {
            IngestBody::Uploaded { bucket, path } => json!({
                "uploaded": "true",
                "bucket": bucket,
                "path": path,
            }),
            IngestBody::Failed { error } => json!({
                "uploaded": "false",
                "error": error,
            }),
        };

        json!({
            "statusCode": self.status_code,
            "body": body.to_string(),
        })
    }
}

/// Object key for an event time, relative to the raw prefix
pub fn raw_key(event_time: DateTime<Utc>) -> String {
    format!(
        "{}.json",
        event_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Fetches current observations and lands them unchanged in raw storage
pub struct Ingestor {
    source: Arc<dyn WeatherSource>,
    storage: Storage,
    prefix: String,
}

impl Ingestor {
    /// Create an ingestor writing under `config.raw_prefix` in `storage`
    pub fn new(config: &IngestConfig, source: Arc<dyn WeatherSource>, storage: Storage) -> Self {
        Self {
            source,
            storage,
            prefix: config.raw_prefix.trim_matches('/').to_string(),
        }
    }

    /// Create an ingestor for wttr.in landing in `config.raw_bucket`
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let source = WttrSource::new(config)?;
        let storage = Storage::parse(&config.raw_bucket)?;
        Ok(Self::new(config, Arc::new(source), storage))
    }

    /// Key written for `event_time`
    pub fn object_key(&self, event_time: DateTime<Utc>) -> String {
        let key = raw_key(event_time);
        if self.prefix.is_empty() {
            key
        } else {
            format!("{}/{key}", self.prefix)
        }
    }

    /// Run one invocation
    ///
    /// Upstream failures are reported in the outcome and nothing is written.
    /// A failed storage write is returned as an error.
    pub async fn run(&self, event_time: DateTime<Utc>) -> Result<IngestOutcome> {
        info!("Fetching weather data for {event_time}");
        let response = match self.source.fetch().await {
            Ok(response) => response,
            Err(e) if e.is_transport() => {
                error!("Weather request failed: {e}");
                return Ok(IngestOutcome {
                    status_code: e.received_status(),
                    body: IngestBody::Failed {
                        error: e.to_string(),
                    },
                });
            }
            Err(e) => return Err(e),
        };

        if !response.is_ok() {
            let error = response.body_text();
            error!("Weather request returned {}: {error}", response.status);
            return Ok(IngestOutcome {
                status_code: Some(response.status),
                body: IngestBody::Failed { error },
            });
        }

        let key = self.object_key(event_time);
        let path = self
            .storage
            .put(&key, response.body, Some(RAW_CONTENT_TYPE))
            .await?;

        info!(
            "Landed raw observation at {}://{}/{path}",
            self.storage.scheme(),
            self.storage.bucket()
        );
        Ok(IngestOutcome {
            status_code: Some(response.status),
            body: IngestBody::Uploaded {
                bucket: self.storage.bucket().to_string(),
                path,
            },
        })
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("storage", &self.storage)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
