use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum XPathError {
    #[error("Empty XPath expression")]
    Empty,

    #[error("Malformed XPath '{xpath}': {message}")]
    Malformed { xpath: String, message: String },

    #[error("Unbound namespace prefix '{prefix}' in XPath '{xpath}'")]
    UnboundPrefix { prefix: String, xpath: String },

    #[error("XML attribute step '@{step}' must be the last step of '{xpath}'")]
    AttributeNotLast { step: String, xpath: String },

    #[error("Invalid index predicate [{index}] in '{xpath}' (XPath indexes start at 1)")]
    InvalidIndex { index: String, xpath: String },
}

impl XPathError {
    pub fn malformed(xpath: impl Into<String>, message: impl Into<String>) -> Self {
        XPathError::Malformed {
            xpath: xpath.into(),
            message: message.into(),
        }
    }
}
