//! Shared station fixture for in-crate tests

use super::{MappingConfig, MappingRegistry};

pub(crate) const STATION_MAPPING: &str =
    include_str!("../../tests/fixtures/station_mapping.yaml");

pub(crate) fn station_config() -> MappingConfig {
    MappingConfig::from_yaml_str(STATION_MAPPING).expect("station fixture parses")
}

pub(crate) fn station_registry() -> MappingRegistry {
    station_config().build().expect("station fixture builds")
}
