use thiserror::Error;

use crate::filter::UnmappingError;

/// Failures looking up table metadata in the backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No metadata for table '{0}'")]
    UnknownTable(String),

    #[error("Metadata lookup failed for '{table}': {message}")]
    Lookup { table: String, message: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlEncodeError {
    #[error("Filter not encodable by this backend: {0}")]
    Unsupported(String),

    #[error("Function '{0}' has no SQL mapping")]
    UnsupportedFunction(String),

    #[error("Could not resolve nested type for '{property}': {message}")]
    NestedTypeResolution { property: String, message: String },

    #[error("Nested attribute '{property}' can't be joined: {reason}")]
    NestedNotJoinable { property: String, reason: String },

    #[error("No join columns between {parent} and {nested}")]
    MissingJoinColumns { parent: String, nested: String },

    #[error(transparent)]
    Unmapping(#[from] UnmappingError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl SqlEncodeError {
    pub fn nested_type_resolution_with_context(
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SqlEncodeError::NestedTypeResolution {
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn not_joinable_with_context(property: impl Into<String>, reason: impl Into<String>) -> Self {
        SqlEncodeError::NestedNotJoinable {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// The predicate just can't be pushed down; evaluating it after the query
    /// still gives correct results. Everything else is a configuration or
    /// backend failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SqlEncodeError::NestedTypeResolution { .. } | SqlEncodeError::NestedNotJoinable { .. }
        )
    }
}
