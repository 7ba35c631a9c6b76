use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translation settings
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Push predicates on nested attributes into SQL as `EXISTS` subqueries.
    /// When off, every nested predicate is left to the post filter.
    pub encode_nested_filters: bool,

    /// Schema qualifying every table name in generated SQL
    #[validate(custom(function = "validate_schema_name"))]
    pub database_schema: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            encode_nested_filters: true,
            database_schema: None,
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_schema = env::var("FEATURECHAIN_DB_SCHEMA")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let config = Self {
            encode_nested_filters: parse_env_var("FEATURECHAIN_ENCODE_NESTED_FILTERS", "true")?,
            database_schema,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            encode_nested_filters: !cli.no_nested_filters,
            database_schema: cli.database_schema,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with another configuration (CLI overrides environment).
    /// Nested encoding can only be switched off by the override.
    pub fn merge(&mut self, other: Self) {
        self.encode_nested_filters &= other.encode_nested_filters;
        if other.database_schema.is_some() {
            self.database_schema = other.database_schema;
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub no_nested_filters: bool,
    pub database_schema: Option<String>,
}

fn validate_schema_name(schema: &str) -> Result<(), ValidationError> {
    let mut chars = schema.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        let mut err = ValidationError::new("schema_name");
        err.message = Some("Database schema must be a plain SQL identifier".into());
        Err(err)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
