use std::sync::Arc;

use super::errors::MappingError;
use super::FeatureTypeMapping;
use crate::xpath::{self, NamespaceContext, Step};

/// All feature type mappings of one data source, looked up by element name.
///
/// Read-only after construction; shared by reference during translation.
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    namespaces: Arc<NamespaceContext>,
    types: Vec<FeatureTypeMapping>,
    root: usize,
}

impl MappingRegistry {
    pub fn new(
        namespaces: Arc<NamespaceContext>,
        root: &str,
        types: Vec<FeatureTypeMapping>,
    ) -> Result<Self, MappingError> {
        let root_step = single_step(root, &namespaces)?;
        let root = types
            .iter()
            .position(|t| t.name.same_name(&root_step))
            .ok_or_else(|| {
                MappingError::unknown_type_with_context(root, "Looking up the root feature type")
            })?;

        log::debug!(
            "Mapping registry built with {} feature type(s), root {}",
            types.len(),
            types[root]
        );
        Ok(MappingRegistry {
            namespaces,
            types,
            root,
        })
    }

    pub fn namespaces(&self) -> &Arc<NamespaceContext> {
        &self.namespaces
    }

    pub fn root(&self) -> &FeatureTypeMapping {
        &self.types[self.root]
    }

    pub fn feature_types(&self) -> impl Iterator<Item = &FeatureTypeMapping> {
        self.types.iter()
    }

    pub fn by_step(&self, name: &Step) -> Option<&FeatureTypeMapping> {
        self.types.iter().find(|t| t.name.same_name(name))
    }

    /// Look up a mapping by its prefixed name, e.g. `st:Sensor`
    pub fn get(&self, name: &str) -> Result<&FeatureTypeMapping, MappingError> {
        let step = single_step(name, &self.namespaces)?;
        self.by_step(&step)
            .ok_or_else(|| MappingError::UnknownFeatureType {
                name: name.to_string(),
            })
    }
}

fn single_step(name: &str, namespaces: &NamespaceContext) -> Result<Step, MappingError> {
    let steps = xpath::steps(None, name, namespaces)?;
    match (steps.len(), steps.first()) {
        (1, Some(step)) => Ok(step.clone()),
        _ => Err(MappingError::UnknownFeatureType {
            name: name.to_string(),
        }),
    }
}
