//! Raw observation documents and how they are read from storage

use crate::config::RawFormat;
use crate::error::{Error, Result};
use crate::storage::Storage;
use serde_json::Value;
use tracing::debug;

/// Object key suffixes treated as raw documents
const RAW_EXTENSIONS: &[&str] = &[".json", ".jsonl", ".ndjson"];

/// One raw observation as landed by the ingestor
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Where the document came from (object key, plus `#line` for JSON lines)
    pub source: String,
    /// The parsed document
    pub value: Value,
}

impl RawDocument {
    /// Create a raw document
    pub fn new(source: impl Into<String>, value: Value) -> Self {
        Self {
            source: source.into(),
            value,
        }
    }
}

/// Decode one object body into documents
///
/// A single JSON value holding an array yields one document per element.
pub fn decode_documents(source: &str, body: &[u8], format: RawFormat) -> Result<Vec<RawDocument>> {
    match format {
        RawFormat::Json => decode_json(source, body),
        RawFormat::Jsonl => decode_jsonl(source, body),
        RawFormat::Auto => decode_json(source, body).or_else(|_| decode_jsonl(source, body)),
    }
}

fn decode_json(source: &str, body: &[u8]) -> Result<Vec<RawDocument>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::decode(source, format!("Failed to parse JSON: {e}")))?;

    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| RawDocument::new(format!("{source}#{}", i + 1), item))
            .collect(),
        other => vec![RawDocument::new(source, other)],
    })
}

fn decode_jsonl(source: &str, body: &[u8]) -> Result<Vec<RawDocument>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::decode(source, format!("Body is not UTF-8: {e}")))?;

    let mut documents = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|e| {
            Error::decode(
                source,
                format!("Failed to parse JSONL at line {}: {e}", line_num + 1),
            )
        })?;
        documents.push(RawDocument::new(format!("{source}#{}", line_num + 1), value));
    }

    if documents.is_empty() {
        return Err(Error::decode(source, "No documents found"));
    }
    Ok(documents)
}

/// An object that could not be decoded
#[derive(Debug)]
pub struct Undecodable {
    /// Object key
    pub source: String,
    /// Decode failure
    pub error: Error,
}

/// Reads every raw document under a storage location
#[derive(Debug, Clone)]
pub struct RawReader {
    storage: Storage,
    format: RawFormat,
}

impl RawReader {
    /// Create a reader over `storage`
    pub fn new(storage: Storage, format: RawFormat) -> Self {
        Self { storage, format }
    }

    /// Read all documents, in key order
    ///
    /// Objects that fail to decode are returned separately so one bad file
    /// does not stop the batch. Storage failures are fatal.
    pub async fn read_all(&self) -> Result<(Vec<RawDocument>, Vec<Undecodable>)> {
        let keys = self.storage.list("").await?;
        let mut documents = Vec::new();
        let mut undecodable = Vec::new();

        for key in keys {
            if !RAW_EXTENSIONS.iter().any(|ext| key.ends_with(ext)) {
                debug!("Skipping non-JSON object {key}");
                continue;
            }

            let body = self.storage.get(&key).await?;
            match decode_documents(&key, &body, self.format) {
                Ok(mut docs) => documents.append(&mut docs),
                Err(error) => undecodable.push(Undecodable { source: key, error }),
            }
        }

        debug!(
            "Read {} documents ({} undecodable objects)",
            documents.len(),
            undecodable.len()
        );
        Ok((documents, undecodable))
    }
}
