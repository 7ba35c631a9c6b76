/// Mapping file loading.
///
/// Mappings are defined in YAML:
///
/// ```yaml
/// namespaces:                  # prefix -> namespace URI
///   st: urn:example:station
///   xlink: http://www.w3.org/1999/xlink
/// root: st:Station             # feature type the filters are written against
/// tables:                      # primary keys, used for EXISTS projections
///   sensors:
///     primary_key: [id]
/// feature_types:
///   - name: st:Station
///     table: stations
///     id: id                   # feature id source expression
///     attributes:
///       - target: st:name
///         source: name
///       - target: st:owner
///         foreign: true        # value lives in a table that can't be joined
///       - target: st:sensors
///         source: id           # parent-side join column
///         nested:
///           type: st:Sensor    # or { property, cases, default } for conditional types
///           link_field: st:stationId
///           kind: joining      # or iterative
/// ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::errors::MappingError;
use super::registry::MappingRegistry;
use super::{
    AttributeMapping, ClientProperty, FeatureTypeMapping, NestedAttributeMapping, NestedTypeRef,
    NestingKind,
};
use crate::filter::{parse_expression, Expr};
use crate::xpath::{self, NamespaceContext, Step};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingConfig {
    #[serde(default)]
    pub namespaces: NamespaceContext,
    pub root: String,
    pub feature_types: Vec<FeatureTypeConfig>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureTypeConfig {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeConfig {
    pub target: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub foreign: bool,
    #[serde(default)]
    pub client_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub nested: Option<NestedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedConfig {
    #[serde(rename = "type")]
    pub nested_type: NestedTypeRef,
    pub link_field: String,
    #[serde(default)]
    pub kind: NestingKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableConfig {
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl MappingConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MappingError> {
        let contents = fs::read_to_string(path).map_err(|e| MappingError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingError> {
        serde_yaml::from_str(yaml).map_err(|e| MappingError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Primary key columns per table
    pub fn primary_keys(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|(table, config)| (table.clone(), config.primary_key.clone()))
            .collect()
    }

    /// Validate the configuration and build the mapping graph
    pub fn build(&self) -> Result<MappingRegistry, MappingError> {
        if self.feature_types.is_empty() {
            return Err(MappingError::ConfigParseError {
                error: "Mapping must contain at least one feature type".to_string(),
            });
        }

        let namespaces = Arc::new(self.namespaces.clone());
        let mut types = Vec::with_capacity(self.feature_types.len());
        for feature_type in &self.feature_types {
            types.push(build_feature_type(feature_type, &namespaces)?);
        }

        MappingRegistry::new(namespaces, &self.root, types)
    }
}

fn build_feature_type(
    config: &FeatureTypeConfig,
    namespaces: &Arc<NamespaceContext>,
) -> Result<FeatureTypeMapping, MappingError> {
    let name_steps = xpath::steps(None, &config.name, namespaces)?;
    let name = match (name_steps.len(), name_steps.first()) {
        (1, Some(step)) if !step.is_xml_attribute => step.clone(),
        _ => {
            return Err(MappingError::ConfigParseError {
                error: format!("Feature type name '{}' must be a single element", config.name),
            })
        }
    };

    let id_expression = config
        .id
        .as_deref()
        .map(parse_source_expression)
        .transpose()?;

    let mut attributes = Vec::with_capacity(config.attributes.len());
    for attribute in &config.attributes {
        attributes.push(build_attribute(&config.name, &name, attribute, namespaces)?);
    }

    Ok(FeatureTypeMapping {
        name,
        table: config.table.clone(),
        namespaces: namespaces.clone(),
        id_expression,
        attributes,
    })
}

fn build_attribute(
    type_name: &str,
    type_step: &Step,
    config: &AttributeConfig,
    namespaces: &NamespaceContext,
) -> Result<AttributeMapping, MappingError> {
    let target = xpath::steps(Some(type_step), &config.target, namespaces)?;

    let source = match (&config.source, config.foreign) {
        (Some(_), true) => {
            return Err(MappingError::invalid_attribute(
                type_name,
                &config.target,
                "an attribute can't have both a source and `foreign: true`",
            ))
        }
        (Some(source), false) => Some(parse_source_expression(source)?),
        (None, true) => None,
        (None, false) => {
            return Err(MappingError::invalid_attribute(
                type_name,
                &config.target,
                "missing source expression",
            ))
        }
    };

    let nested = match &config.nested {
        Some(nested) => {
            if source.is_none() {
                return Err(MappingError::invalid_attribute(
                    type_name,
                    &config.target,
                    "nested attributes need a source expression to join on",
                ));
            }
            Some(NestedAttributeMapping {
                nested_type: nested.nested_type.clone(),
                link_field: xpath::steps(None, &nested.link_field, namespaces)?,
                kind: nested.kind,
            })
        }
        None => None,
    };

    let mut client_properties = Vec::with_capacity(config.client_properties.len());
    for (name, source) in &config.client_properties {
        let steps = xpath::steps(None, &format!("@{}", name), namespaces)?;
        let Some(step) = steps.first() else {
            continue;
        };
        client_properties.push(ClientProperty {
            name: step.clone(),
            source: parse_source_expression(source)?,
        });
    }

    Ok(AttributeMapping {
        target,
        source,
        client_properties,
        nested,
    })
}

fn parse_source_expression(text: &str) -> Result<Expr, MappingError> {
    parse_expression(text).map_err(|e| MappingError::InvalidExpression {
        expression: text.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::testing::STATION_MAPPING;

    #[test]
    fn test_parse_station_mapping() {
        let config = MappingConfig::from_yaml_str(STATION_MAPPING).unwrap();
        assert_eq!(config.root, "st:Station");
        assert_eq!(config.tables["sensors"].primary_key, vec!["id", "revision"]);

        let registry = config.build().unwrap();
        let station = registry.root();
        assert_eq!(station.nested_attributes().count(), 7);
    }

    #[test]
    fn test_source_and_foreign_conflict() {
        let yaml = r#"
namespaces:
  st: urn:example:station
root: st:Station
feature_types:
  - name: st:Station
    table: stations
    attributes:
      - target: st:name
        source: name
        foreign: true
"#;
        let err = MappingConfig::from_yaml_str(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, MappingError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_nested_without_source() {
        let yaml = r#"
namespaces:
  st: urn:example:station
root: st:Station
feature_types:
  - name: st:Station
    table: stations
    attributes:
      - target: st:sensors
        foreign: true
        nested:
          type: st:Sensor
          link_field: st:stationId
"#;
        let err = MappingConfig::from_yaml_str(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, MappingError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_bad_source_expression() {
        let yaml = r#"
namespaces:
  st: urn:example:station
root: st:Station
feature_types:
  - name: st:Station
    table: stations
    attributes:
      - target: st:name
        source: "concat(a,"
"#;
        let err = MappingConfig::from_yaml_str(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, MappingError::InvalidExpression { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            MappingConfig::from_yaml_str("feature_types: [[["),
            Err(MappingError::ConfigParseError { .. })
        ));
    }
}
