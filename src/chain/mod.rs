//! # Feature chains
//!
//! A filter property such as `st:measurements/st:Measurement/st:sensor/st:Sensor/st:name`
//! crosses two nested attributes before reaching a column. Resolving it against the
//! root mapping yields a [`FeatureChain`]:
//!
//! ```text
//! link 0  st:Station      _chain_root    nested attribute st:measurements
//! link 1  st:Measurement  _chain_link_1  nested attribute st:sensor
//! link 2  st:Sensor       _chain_link_2  own attribute    st:name
//! ```
//!
//! Links live in one `Vec`; neighbours are found by index.

use crate::filter::{Expr, PropertyName};
use crate::mapping::{
    AttributeMapping, FeatureTypeMapping, MappingError, MappingRegistry, NestedAttributeMapping,
    SampleFeature,
};
use crate::xpath::StepList;

pub mod resolver;

pub use resolver::{resolve, resolve_all};

pub const ROOT_ALIAS: &str = "_chain_root";

/// Alias of the link at `position` in a chain
pub fn link_alias(position: usize) -> String {
    if position == 0 {
        ROOT_ALIAS.to_string()
    } else {
        format!("_chain_link_{}", position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink<'r> {
    pub mapping: &'r FeatureTypeMapping,
    /// Attribute leading to the next link; absent only on the last link
    pub nested_attribute: Option<&'r AttributeMapping>,
    /// Path of the filtered attribute, relative to the owning type; last link only
    pub attribute_path: Option<StepList>,
    pub chaining_by_reference: bool,
    pub alias: String,
}

impl<'r> ChainLink<'r> {
    pub fn nested_mapping(&self) -> Option<&'r NestedAttributeMapping> {
        self.nested_attribute.and_then(|a| a.nested.as_ref())
    }

    pub fn has_nested_feature(&self) -> bool {
        self.nested_mapping().is_some()
    }
}

/// Join columns between a link and the one after it
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub parent: Expr,
    pub nested: Expr,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureChain<'r> {
    links: Vec<ChainLink<'r>>,
}

impl<'r> FeatureChain<'r> {
    pub fn new() -> Self {
        FeatureChain { links: Vec::new() }
    }

    fn push(
        &mut self,
        mapping: &'r FeatureTypeMapping,
        nested_attribute: Option<&'r AttributeMapping>,
        attribute_path: Option<StepList>,
        chaining_by_reference: bool,
    ) {
        let alias = link_alias(self.links.len());
        self.links.push(ChainLink {
            mapping,
            nested_attribute,
            attribute_path,
            chaining_by_reference,
            alias,
        });
    }

    /// Append a link that leads further down through `nested_attribute`
    pub fn push_nested(&mut self, mapping: &'r FeatureTypeMapping, nested_attribute: &'r AttributeMapping) {
        self.push(mapping, Some(nested_attribute), None, false);
    }

    /// Append the final link
    pub fn close(
        &mut self,
        mapping: &'r FeatureTypeMapping,
        attribute_path: Option<StepList>,
        chaining_by_reference: bool,
    ) {
        self.push(mapping, None, attribute_path, chaining_by_reference);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// More than one link: the attribute lives below the root type
    pub fn is_nested(&self) -> bool {
        self.links.len() > 1
    }

    pub fn links(&self) -> &[ChainLink<'r>] {
        &self.links
    }

    pub fn link(&self, idx: usize) -> Option<&ChainLink<'r>> {
        self.links.get(idx)
    }

    pub fn first(&self) -> Option<&ChainLink<'r>> {
        self.links.first()
    }

    pub fn last(&self) -> Option<&ChainLink<'r>> {
        self.links.last()
    }

    pub fn next(&self, idx: usize) -> Option<&ChainLink<'r>> {
        self.links.get(idx + 1)
    }

    pub fn previous(&self, idx: usize) -> Option<&ChainLink<'r>> {
        idx.checked_sub(1).and_then(|i| self.links.get(i))
    }

    /// Every link that has a nested attribute joins it (rather than iterating)
    pub fn is_joining_enabled(&self) -> bool {
        self.links
            .iter()
            .filter_map(ChainLink::nested_mapping)
            .all(NestedAttributeMapping::is_joining)
    }

    pub fn attribute_path(&self) -> Option<&StepList> {
        self.last().and_then(|l| l.attribute_path.as_ref())
    }

    /// Mapping the own attribute path must be unrolled against.
    ///
    /// With chaining by reference the `xlink:href` is declared on the parent type.
    pub fn feature_type_owning_attribute(&self) -> Option<&'r FeatureTypeMapping> {
        let last = self.links.len().checked_sub(1)?;
        let link = &self.links[last];
        if link.chaining_by_reference {
            self.previous(last).map(|l| l.mapping)
        } else {
            Some(link.mapping)
        }
    }

    /// Source expressions joining link `idx` to link `idx + 1`
    pub fn join_condition(&self, idx: usize) -> Option<JoinCondition> {
        let parent_link = self.link(idx)?;
        let nested_link = self.next(idx)?;
        let parent = parent_link.nested_attribute?.source.clone()?;
        let nested = parent_link
            .nested_mapping()?
            .nested_source_expression(nested_link.mapping)?;
        Some(JoinCondition { parent, nested })
    }

    /// Source expressions of the own attribute, against the owning mapping.
    ///
    /// Returns the raw lookup, `None` sentinels included.
    pub fn attribute_sources(&self) -> Vec<Option<Expr>> {
        match (self.feature_type_owning_attribute(), self.attribute_path()) {
            (Some(owner), Some(path)) => owner.find_mappings_for(path),
            _ => Vec::new(),
        }
    }
}

/// Resolve the chain a property navigates, using the namespaces it carries
pub fn resolve_property<'r>(
    registry: &'r MappingRegistry,
    root: &'r FeatureTypeMapping,
    property: &PropertyName,
    sample: Option<&SampleFeature>,
) -> Result<Vec<FeatureChain<'r>>, MappingError> {
    let steps = root.property_steps(property)?;
    resolver::resolve_steps(registry, root, steps, sample)
}
