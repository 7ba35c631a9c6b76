//! # Mapping Error Types
//!
//! Errors raised while loading a mapping file or navigating the mapping graph.
//!
//! When returning mapping errors, attach what was being done:
//!
//! ```ignore
//! MappingError::unknown_type_with_context(
//!     "st:Sensor",
//!     "Resolving nested attribute st:sensors of st:Station",
//! )
//! ```

use thiserror::Error;

use crate::xpath::XPathError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("No feature type mapping found for `{name}`")]
    UnknownFeatureType { name: String },

    #[error("Invalid attribute mapping '{target}' in `{feature_type}`: {message}")]
    InvalidAttribute {
        feature_type: String,
        target: String,
        message: String,
    },

    #[error("Invalid source expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    #[error("Invalid path in mapping: {0}")]
    XPath(#[from] XPathError),

    #[error("Failed to read mapping file: {error}")]
    ConfigReadError { error: String },

    #[error("Failed to parse mapping file: {error}")]
    ConfigParseError { error: String },
}

impl MappingError {
    pub fn unknown_type_with_context(name: impl Into<String>, context: impl Into<String>) -> Self {
        MappingError::UnknownFeatureType {
            name: format!("{}\n  Context: {}", name.into(), context.into()),
        }
    }

    pub fn invalid_attribute(
        feature_type: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MappingError::InvalidAttribute {
            feature_type: feature_type.into(),
            target: target.into(),
            message: message.into(),
        }
    }
}
