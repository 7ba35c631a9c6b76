use thiserror::Error;

use crate::xpath::XPathError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterParseError {
    #[error("Empty filter expression")]
    Empty,

    #[error("Syntax error near '{near}'")]
    Syntax { near: String },

    #[error("Unexpected trailing content: '{0}'")]
    TrailingInput(String),
}

/// Failures while substituting attribute XPaths with their source expressions.
///
/// These indicate a mapping configuration that cannot serve the filter, never a
/// transient condition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnmappingError {
    #[error("Can't find source expression for: {0}")]
    NoSourceExpression(String),

    #[error("Attribute '{0}' is backed by another table and cannot be unrolled here")]
    ForeignSource(String),

    #[error("Invalid attribute path: {0}")]
    XPath(#[from] XPathError),
}
