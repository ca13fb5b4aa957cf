//! HTTP client
//!
//! Wraps `reqwest` with a parsed base URL, a user agent, default headers and
//! a timeout. Every call is a single attempt and the response is handed back
//! whatever its status.

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client settings
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Relative targets resolve against this URL
    pub base_url: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(10),
            user_agent: format!("wttr-etl/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        }
    }
}

impl HttpClientConfig {
    /// Default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative targets against `url`
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Send `name: value` with every request
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Query parameters, headers and timeout for one request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Overrides the client timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Single-attempt HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Option<Url>,
}

impl HttpClient {
    /// Build a client; fails on an unparseable base URL or header
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let base_url = config.base_url.as_deref().map(parse_base_url).transpose()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(header_map(&config.headers)?)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL relative targets resolve against
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Turn a target into an absolute URL
    ///
    /// Absolute `http(s)` targets are used as given; anything else is joined
    /// onto the base URL.
    pub fn resolve(&self, target: &str) -> Result<Url> {
        if let Ok(absolute) = Url::parse(target) {
            if matches!(absolute.scheme(), "http" | "https") {
                return Ok(absolute);
            }
        }

        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| Error::config(format!("Relative URL '{target}' needs a base URL")))?;
        base.join(target.trim_start_matches('/'))
            .map_err(|e| Error::config(format!("Cannot resolve '{target}' against {base}: {e}")))
    }

    /// GET `target`, returning the response for any status
    ///
    /// Only failures to get a response at all (DNS, connect, timeout) are
    /// errors; they surface as [`Error::Http`].
    pub async fn get(&self, target: &str, options: &RequestOptions) -> Result<Response> {
        let url = self.resolve(target)?;

        let mut request = self.client.get(url.clone());
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        debug!("GET {url} -> {}", response.status().as_u16());
        Ok(response)
    }
}

/// Parse a base URL so that joining appends to its path
fn parse_base_url(base: &str) -> Result<Url> {
    Url::parse(&format!("{}/", base.trim_end_matches('/')))
        .map_err(|e| Error::invalid_value("base_url", format!("'{base}': {e}")))
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_value("headers", format!("'{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_value("headers", format!("'{name}': {e}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
