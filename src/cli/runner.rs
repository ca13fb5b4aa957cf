//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, WriteModeArg};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::flatten::Flattener;
use crate::ingest::Ingestor;
use crate::output::output_schema;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

/// Parse an RFC 3339 event time into UTC
pub fn parse_event_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| Error::invalid_value("time", format!("'{value}' is not RFC 3339: {e}")))
}

/// The curated schema as JSON (`name`, `type`, `nullable` per column)
pub fn schema_json() -> Value {
    let columns: Vec<Value> = output_schema()
        .fields()
        .iter()
        .map(|field| {
            json!({
                "name": field.name(),
                "type": field.data_type().to_string(),
                "nullable": field.is_nullable(),
            })
        })
        .collect();

    json!({ "partitionedBy": [crate::output::PARTITION_COLUMN], "columns": columns })
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Ingest { time } => self.ingest(time.as_deref()).await,
            Commands::Flatten {
                source,
                output,
                temp_dir,
                write_mode,
            } => {
                self.flatten(
                    source.as_deref(),
                    output.as_deref(),
                    temp_dir.as_ref(),
                    *write_mode,
                )
                .await
            }
            Commands::Schema => {
                self.output_message(&schema_json());
                Ok(())
            }
            Commands::Validate => self.validate(),
            Commands::Serve { port } => {
                let config = self.load_config()?;
                crate::cli::serve(config, *port).await
            }
        }
    }

    /// Load the pipeline configuration, falling back to defaults
    fn load_config(&self) -> Result<PipelineConfig> {
        match &self.cli.config {
            Some(path) => PipelineConfig::load(path),
            None => Ok(PipelineConfig::default()),
        }
    }

    /// Run one ingest invocation and print its payload
    ///
    /// Upstream failures are part of the payload, not an error exit.
    async fn ingest(&self, time: Option<&str>) -> Result<()> {
        let config = self.load_config()?;
        let event_time = match time {
            Some(value) => parse_event_time(value)?,
            None => Utc::now(),
        };

        let ingestor = Ingestor::from_config(&config.ingest)?;
        let outcome = ingestor.run(event_time).await?;
        self.output_message(&outcome.to_response());
        Ok(())
    }

    /// Run one flattening job and print its report
    async fn flatten(
        &self,
        source: Option<&str>,
        output: Option<&str>,
        temp_dir: Option<&PathBuf>,
        write_mode: Option<WriteModeArg>,
    ) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(source) = source {
            config.flatten.source = source.to_string();
        }
        if let Some(output) = output {
            config.flatten.output = output.to_string();
        }
        if let Some(temp_dir) = temp_dir {
            config.flatten.temp_dir.clone_from(temp_dir);
        }
        if let Some(mode) = write_mode {
            config.flatten.write_mode = mode.into();
        }
        config.validate()?;

        info!(
            "Flattening {} into {}",
            config.flatten.source, config.flatten.output
        );
        let flattener = Flattener::new(&config)?;
        let report = flattener.run().await?;
        self.output_message(&serde_json::to_value(&report)?);
        Ok(())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;
        config.validate()?;

        self.output_message(&json!({
            "valid": true,
            "config": serde_json::to_value(&config)?,
        }));
        Ok(())
    }

    /// Output a JSON message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_time() {
        let time = parse_event_time("2024-01-01T20:00:00+10:00").unwrap();
        assert_eq!(time.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        assert!(parse_event_time("yesterday").is_err());
    }

    #[test]
    fn test_schema_json() {
        let schema = schema_json();
        let columns = schema["columns"].as_array().unwrap();
        assert_eq!(columns.len(), 24);
        assert_eq!(columns[0]["name"], "id");
        assert_eq!(columns[0]["type"], "Int64");
        assert_eq!(schema["partitionedBy"][0], "areaName");
    }
}
