//! Ingest module
//!
//! Fetches the current observations for one location and lands the raw
//! response body in blob storage, keyed by the invocation's event time.

mod ingestor;
mod source;

pub use ingestor::{raw_key, IngestBody, IngestOutcome, Ingestor, RAW_CONTENT_TYPE};
pub use source::{FetchResponse, WeatherSource, WttrSource};
