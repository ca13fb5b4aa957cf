//! Errors raised by the ingest and flatten pipelines

use thiserror::Error;

/// Result type alias for wttr-etl
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop an ingest or flatten run
#[derive(Error, Debug)]
pub enum Error {
    /// Settings that cannot be loaded or do not make sense
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Invalid YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// No response from the weather service (DNS, connect, timeout)
    #[error("Weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Status line arrived but the body did not
    #[error("Weather response {status} cut off: {message}")]
    ResponseBody { status: u16, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("No object at {path}")]
    ObjectNotFound { path: String },

    /// A raw object that is neither a JSON document nor JSON lines
    #[error("Cannot decode '{source_path}': {message}")]
    Decode {
        source_path: String,
        message: String,
    },

    #[error("Bad timestamp pattern '{pattern}': {message}")]
    TimestampPattern { pattern: String, message: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Another error with a note on what was being done
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn decode(source_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            source_path: source_path.into(),
            message: message.into(),
        }
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether the exchange with the weather service broke down
    ///
    /// Looks through any context wrapping.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Http(_) | Error::ResponseBody { .. } => true,
            Error::Context { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// Upstream status received before a transport failure, if any
    pub fn received_status(&self) -> Option<u16> {
        match self {
            Error::ResponseBody { status, .. } => Some(*status),
            Error::Context { source, .. } => source.received_status(),
            _ => None,
        }
    }
}

/// Attach a note to the error of a `Result`
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], building the note only on failure
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.with_context(|| message.into())
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}
