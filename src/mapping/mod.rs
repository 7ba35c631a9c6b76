//! Schema mapping model.
//!
//! A [`FeatureTypeMapping`] maps one (possibly virtual) nested feature type onto a
//! single relational table. Attributes whose value is another feature type carry a
//! [`NestedAttributeMapping`]; following those from the root type down to a leaf
//! table is what [`crate::chain`] does.
//!
//! Mappings are immutable once loaded. Nested types are referenced by name and
//! resolved through the [`MappingRegistry`] when needed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::filter::{Expr, PropertyName};
use crate::xpath::{self, NamespaceContext, Step, StepList, XPathError};

pub mod config;
pub mod errors;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::MappingConfig;
pub use errors::MappingError;
pub use registry::MappingRegistry;

/// How a nested attribute is fetched when features are assembled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingKind {
    /// Parent and nested rows come from one joined query; can be pushed into SQL
    #[default]
    Joining,
    /// One query per parent row
    Iterative,
}

/// Which feature type a nested attribute points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedTypeRef {
    Fixed(String),
    /// Chosen per feature from the value of `property`
    Conditional {
        property: String,
        cases: BTreeMap<String, String>,
        #[serde(default)]
        default: Option<String>,
    },
}

/// Property values of one concrete feature, used to pick conditional nested types
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleFeature {
    values: BTreeMap<String, String>,
}

impl SampleFeature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    pub fn value(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedAttributeMapping {
    pub nested_type: NestedTypeRef,
    /// Attribute of the nested type holding the nested-side join column
    pub link_field: StepList,
    pub kind: NestingKind,
}

impl NestedAttributeMapping {
    pub fn is_conditional(&self) -> bool {
        matches!(self.nested_type, NestedTypeRef::Conditional { .. })
    }

    pub fn is_joining(&self) -> bool {
        self.kind == NestingKind::Joining
    }

    /// Concrete nested type.
    ///
    /// `Ok(None)` when the type depends on a feature that wasn't supplied, or the
    /// sample matches no case and there is no default.
    pub fn feature_type_mapping<'r>(
        &self,
        registry: &'r MappingRegistry,
        sample: Option<&SampleFeature>,
    ) -> Result<Option<&'r FeatureTypeMapping>, MappingError> {
        match &self.nested_type {
            NestedTypeRef::Fixed(name) => registry.get(name).map(Some),
            NestedTypeRef::Conditional {
                property,
                cases,
                default,
            } => {
                let Some(sample) = sample else {
                    return Ok(None);
                };
                let chosen = sample
                    .value(property)
                    .and_then(|value| cases.get(value))
                    .or(default.as_ref());
                match chosen {
                    Some(name) => registry.get(name).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    /// Source expression of the link field on the nested side of the join
    pub fn nested_source_expression(&self, nested_type: &FeatureTypeMapping) -> Option<Expr> {
        nested_type
            .find_mappings_for(&self.link_field)
            .into_iter()
            .flatten()
            .next()
    }
}

/// XML attribute attached to a mapped element, e.g. `xlink:href`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientProperty {
    pub name: Step,
    pub source: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    pub target: StepList,
    /// `None` when the value lives in another table that cannot be joined here
    pub source: Option<Expr>,
    pub client_properties: Vec<ClientProperty>,
    pub nested: Option<NestedAttributeMapping>,
}

impl AttributeMapping {
    pub fn simple(target: StepList, source: Expr) -> Self {
        AttributeMapping {
            target,
            source: Some(source),
            client_properties: Vec::new(),
            nested: None,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.nested.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeMapping {
    /// Element name of the target feature type
    pub name: Step,
    pub table: String,
    pub namespaces: Arc<NamespaceContext>,
    pub id_expression: Option<Expr>,
    pub attributes: Vec<AttributeMapping>,
}

impl FeatureTypeMapping {
    /// Decompose an XPath against this type (a leading step naming the type is dropped)
    pub fn steps_for(&self, xpath: &str) -> Result<StepList, XPathError> {
        xpath::steps(Some(&self.name), xpath, &self.namespaces)
    }

    /// Decompose a filter property, preferring the namespaces it was written with
    pub fn property_steps(&self, property: &PropertyName) -> Result<StepList, XPathError> {
        let namespaces = property.namespaces.as_deref().unwrap_or(&self.namespaces);
        xpath::steps(Some(&self.name), &property.path, namespaces)
    }

    pub fn attribute_for(&self, target: &StepList) -> Option<&AttributeMapping> {
        self.attributes.iter().find(|a| &a.target == target)
    }

    pub fn nested_attributes(
        &self,
    ) -> impl Iterator<Item = (&AttributeMapping, &NestedAttributeMapping)> {
        self.attributes
            .iter()
            .filter_map(|a| a.nested.as_ref().map(|nested| (a, nested)))
    }

    /// Source expressions backing `steps`.
    ///
    /// `None` entries mean the attribute is mapped but its value lives in another,
    /// non-joinable table. An empty result means the path is not mapped at all.
    pub fn find_mappings_for(&self, steps: &StepList) -> Vec<Option<Expr>> {
        if steps.len() == 1 && steps.first().is_some_and(Step::is_gml_id) {
            return self.id_expression.iter().cloned().map(Some).collect();
        }

        if steps.is_client_property() {
            let (Some(parent), Some(attribute)) = (steps.parent(), steps.last()) else {
                return Vec::new();
            };
            return self
                .attributes
                .iter()
                .filter(|a| a.target == parent)
                .flat_map(|a| a.client_properties.iter())
                .filter(|cp| cp.name.same_name(attribute))
                .map(|cp| Some(cp.source.clone()))
                .collect();
        }

        self.attributes
            .iter()
            .filter(|a| &a.target == steps)
            .map(|a| a.source.clone())
            .collect()
    }
}

impl fmt::Display for FeatureTypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name.qualified_name(), self.table)
    }
}
