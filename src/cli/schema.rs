//! Schema command implementation for configuration validation and JSON schema generation

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use schemars::schema_for;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::Config;

const SCHEMA_TITLE: &str = "aime configuration";
const SCHEMA_DESCRIPTION: &str = "Personas, model, retrieval, speech and transcription settings for aime";

/// Generate and validate configuration schemas
#[derive(Debug, Args)]
pub struct SchemaCommand {
    /// Output format for schema generation
    #[arg(short, long, default_value = "json")]
    pub format: SchemaFormat,

    /// Output file path (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Subcommands for schema operations
    #[command(subcommand)]
    pub command: Option<SchemaSubcommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum SchemaSubcommand {
    /// Validate a configuration file against the schema
    Validate {
        /// Configuration file to validate (YAML or JSON)
        config_file: PathBuf,
    },
}

impl SchemaCommand {
    /// Execute the schema command
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Some(SchemaSubcommand::Validate { config_file }) => {
                let report = validate_config_file(config_file)?;
                for line in report {
                    println!("{}", line);
                }
                Ok(())
            }
            None => {
                let output = self.render_schema()?;
                match &self.output {
                    Some(path) => {
                        fs::write(path, output)
                            .with_context(|| format!("Failed to write schema to: {}", path.display()))?;
                        println!("Schema written to: {}", path.display());
                    }
                    None => println!("{}", output),
                }
                Ok(())
            }
        }
    }

    fn render_schema(&self) -> Result<String> {
        let schema = schema_value()?;
        match self.format {
            SchemaFormat::Json => Ok(serde_json::to_string_pretty(&schema)?),
            SchemaFormat::Yaml => {
                serde_yaml::to_string(&schema).context("Failed to convert schema to YAML")
            }
        }
    }
}

/// JSON schema of [`Config`] with title and description
pub fn schema_value() -> Result<Value> {
    let schema = schema_for!(Config);
    let mut schema_value =
        serde_json::to_value(schema).context("Failed to convert schema to JSON value")?;

    if let Some(obj) = schema_value.as_object_mut() {
        obj.insert("title".to_string(), Value::String(SCHEMA_TITLE.to_string()));
        obj.insert(
            "description".to_string(),
            Value::String(SCHEMA_DESCRIPTION.to_string()),
        );
    }

    Ok(schema_value)
}

/// Check a configuration file against the schema and the semantic rules of
/// [`Config::validate`]. Returns the report lines on success.
pub fn validate_config_file(config_file: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    let is_json = config_file.extension().and_then(|ext| ext.to_str()) == Some("json");
    let config_value: Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", config_file.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", config_file.display()))?
    };

    let schema = schema_value()?;
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .map_err(|e| anyhow!("Failed to compile JSON schema: {}", e))?;

    if let Err(errors) = compiled.validate(&config_value) {
        let details: Vec<String> = errors
            .map(|error| format!("  - {}: {}", error.instance_path, error))
            .collect();
        return Err(anyhow!(
            "Configuration does not match the schema:\n{}",
            details.join("\n")
        ));
    }

    let config: Config = serde_json::from_value(config_value)
        .context("Configuration matches the schema but cannot be loaded")?;
    config.validate()?;

    let mut report = vec![format!("{} is valid", config_file.display())];
    report.push(format!(
        "{} persona(s): {}",
        config.personas.len(),
        config.persona_names().join(", ")
    ));
    Ok(report)
}
