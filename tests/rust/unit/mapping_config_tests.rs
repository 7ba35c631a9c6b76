//! Unit tests for mapping file loading and validation
//!
//! These tests build mapping registries from YAML without any database.

#[cfg(test)]
mod mapping_config_tests {
    use std::io::Write;

    use featurechain::mapping::{MappingConfig, MappingError, NestingKind};

    const MINIMAL: &str = r#"
namespaces:
  st: urn:example:station
root: st:Station
tables:
  stations:
    primary_key: [id]
feature_types:
  - name: st:Station
    table: stations
    id: id
    attributes:
      - target: st:name
        source: name
      - target: st:sensors
        source: id
        nested:
          type: st:Sensor
          link_field: st:stationId
  - name: st:Sensor
    table: sensors
    attributes:
      - target: st:stationId
        source: station_id
"#;

    #[test]
    fn test_minimal_mapping_builds() {
        let config = MappingConfig::from_yaml_str(MINIMAL).unwrap();
        let registry = config.build().unwrap();

        assert_eq!(registry.root().table, "stations");
        assert_eq!(registry.feature_types().count(), 2);
        let (_, nested) = registry.root().nested_attributes().next().unwrap();
        assert_eq!(nested.kind, NestingKind::Joining);
        assert!(registry.get("st:Sensor").is_ok());
    }

    #[test]
    fn test_mapping_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", MINIMAL).unwrap();

        let config = MappingConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.primary_keys()["stations"], vec!["id".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MappingConfig::from_yaml_file("/definitely/not/here.yaml"),
            Err(MappingError::ConfigReadError { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            MappingConfig::from_yaml_str("feature_types: [this is: not valid"),
            Err(MappingError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn test_unknown_root_type() {
        let yaml = MINIMAL.replace("root: st:Station", "root: st:Nowhere");
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            config.build(),
            Err(MappingError::UnknownFeatureType { .. })
        ));
    }

    #[test]
    fn test_attribute_without_source_is_rejected() {
        let yaml = MINIMAL.replace("        source: name\n", "");
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            config.build(),
            Err(MappingError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_unbound_prefix_is_rejected() {
        let yaml = MINIMAL.replace("target: st:name", "target: zz:name");
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(config.build(), Err(MappingError::XPath(_))));
    }
}
