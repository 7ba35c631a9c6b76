//! # XPath step decomposition
//!
//! Splits a slashed XPath (as used in mapping targets and filter property names)
//! into ordered, namespace-resolved [`Step`]s.
//!
//! ```ignore
//! let ns = NamespaceContext::new().with("st", "urn:station");
//! let steps = steps(None, "st:measurements[1]/st:Sensor/@xlink:href", &ns)?;
//! assert!(steps.contains_predicate());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod errors;
mod parser;

pub use errors::XPathError;
use parser::RawStep;

pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";

/// Prefix to namespace URI bindings. The empty prefix is the default namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.declare(prefix, uri);
        self
    }

    pub fn declare(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.uri("")
    }

    /// First prefix bound to `uri` (alphabetical, so the answer is stable)
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(prefix, bound)| bound.as_str() == uri && !prefix.is_empty())
            .map(|(prefix, _)| prefix.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One location step of an attribute path.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Prefix as written (kept for display only, matching uses the URI)
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
    pub is_xml_attribute: bool,
    /// Positional predicate, e.g. `[2]`
    pub index: Option<u32>,
    /// Any other predicate text, e.g. `[@codeSpace='x']`
    pub predicate: Option<String>,
}

impl Step {
    pub fn element(
        prefix: Option<&str>,
        namespace_uri: Option<&str>,
        local_name: impl Into<String>,
    ) -> Self {
        Step {
            prefix: prefix.map(str::to_string),
            local_name: local_name.into(),
            namespace_uri: namespace_uri.map(str::to_string),
            is_xml_attribute: false,
            index: None,
            predicate: None,
        }
    }

    pub fn attribute(
        prefix: Option<&str>,
        namespace_uri: Option<&str>,
        local_name: impl Into<String>,
    ) -> Self {
        Step {
            is_xml_attribute: true,
            ..Step::element(prefix, namespace_uri, local_name)
        }
    }

    pub fn has_predicate(&self) -> bool {
        self.index.is_some() || self.predicate.is_some()
    }

    /// Same qualified name and kind, predicates ignored
    pub fn same_name(&self, other: &Step) -> bool {
        self.is_xml_attribute == other.is_xml_attribute
            && self.local_name == other.local_name
            && self.namespace_uri == other.namespace_uri
    }

    pub fn is_xlink_href(&self) -> bool {
        self.is_xml_attribute
            && self.local_name == "href"
            && self.namespace_uri.as_deref() == Some(XLINK_NAMESPACE)
    }

    pub fn is_gml_id(&self) -> bool {
        self.is_xml_attribute
            && self.local_name == "id"
            && self.namespace_uri.as_deref() == Some(GML_NAMESPACE)
    }

    /// `prefix:local` without predicates or `@`
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

// An absent index means the first occurrence
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.same_name(other)
            && self.index.unwrap_or(1) == other.index.unwrap_or(1)
            && self.predicate == other.predicate
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_xml_attribute {
            write!(f, "@")?;
        }
        write!(f, "{}", self.qualified_name())?;
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, "[{}]", predicate)?;
        }
        Ok(())
    }
}

/// Ordered steps of one attribute path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList(Vec<Step>);

impl StepList {
    pub fn new(steps: Vec<Step>) -> Self {
        StepList(steps)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Step> {
        self.0.get(idx)
    }

    pub fn first(&self) -> Option<&Step> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.0.last()
    }

    pub fn push(&mut self, step: Step) {
        self.0.push(step);
    }

    pub fn sub_list(&self, range: std::ops::Range<usize>) -> StepList {
        StepList(self.0[range].to_vec())
    }

    /// All steps but the last; `None` for a single-step path
    pub fn parent(&self) -> Option<StepList> {
        if self.0.len() < 2 {
            return None;
        }
        Some(self.sub_list(0..self.0.len() - 1))
    }

    pub fn starts_with(&self, prefix: &StepList) -> bool {
        prefix.len() <= self.len() && self.0.iter().zip(prefix.iter()).all(|(a, b)| a == b)
    }

    /// Remaining steps after `prefix`, if `prefix` matches
    pub fn strip_prefix(&self, prefix: &StepList) -> Option<StepList> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(self.sub_list(prefix.len()..self.len()))
    }

    pub fn contains_predicate(&self) -> bool {
        self.0.iter().any(Step::has_predicate)
    }

    /// Last step is an XML attribute (a "client property" of its parent)
    pub fn is_client_property(&self) -> bool {
        self.last().is_some_and(|s| s.is_xml_attribute)
    }

    pub fn is_xlink_href(&self) -> bool {
        self.last().is_some_and(Step::is_xlink_href)
    }
}

impl fmt::Display for StepList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Split `xpath` into namespace-resolved steps.
///
/// A leading step naming `root` (the feature type element) is stripped, so
/// `st:Station/st:name` and `st:name` decompose identically against a
/// `st:Station` root.
pub fn steps(
    root: Option<&Step>,
    xpath: &str,
    namespaces: &NamespaceContext,
) -> Result<StepList, XPathError> {
    let trimmed = xpath.trim();
    if trimmed.is_empty() {
        return Err(XPathError::Empty);
    }

    let (_, raw_steps) = parser::parse_path(trimmed)
        .map_err(|e| XPathError::malformed(trimmed, format!("{:?}", e)))?;

    let mut resolved = Vec::with_capacity(raw_steps.len());
    let named_count = raw_steps
        .iter()
        .filter(|s| matches!(s, RawStep::Named { .. }))
        .count();

    for raw in raw_steps {
        let RawStep::Named {
            is_attribute,
            prefix,
            local_name,
            predicates,
        } = raw
        else {
            continue;
        };

        if is_attribute && resolved.len() + 1 != named_count {
            return Err(XPathError::AttributeNotLast {
                step: local_name.to_string(),
                xpath: trimmed.to_string(),
            });
        }

        let namespace_uri = match prefix {
            Some(p) => Some(
                namespaces
                    .uri(p)
                    .ok_or_else(|| XPathError::UnboundPrefix {
                        prefix: p.to_string(),
                        xpath: trimmed.to_string(),
                    })?
                    .to_string(),
            ),
            // Unprefixed attributes are never in the default namespace
            None if is_attribute => None,
            None => namespaces.default_namespace().map(str::to_string),
        };

        let mut step = Step {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace_uri,
            is_xml_attribute: is_attribute,
            index: None,
            predicate: None,
        };

        for predicate in predicates {
            if !predicate.is_empty() && predicate.chars().all(|c| c.is_ascii_digit()) {
                let index: u32 = predicate.parse().map_err(|_| XPathError::InvalidIndex {
                    index: predicate.to_string(),
                    xpath: trimmed.to_string(),
                })?;
                if index == 0 {
                    return Err(XPathError::InvalidIndex {
                        index: predicate.to_string(),
                        xpath: trimmed.to_string(),
                    });
                }
                step.index = Some(index);
            } else {
                step.predicate = Some(match step.predicate.take() {
                    Some(existing) => format!("{}][{}", existing, predicate),
                    None => predicate.to_string(),
                });
            }
        }

        resolved.push(step);
    }

    if let (Some(root), Some(first)) = (root, resolved.first()) {
        if resolved.len() > 1 && first.same_name(root) && !first.has_predicate() {
            resolved.remove(0);
        }
    }

    if resolved.is_empty() {
        return Err(XPathError::malformed(trimmed, "path has no named steps"));
    }

    log::trace!("XPath '{}' decomposed into {} step(s)", trimmed, resolved.len());
    Ok(StepList(resolved))
}
