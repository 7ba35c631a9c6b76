//! Shared fixtures: the station mapping and backends built from it

use featurechain::config::TranslatorConfig;
use featurechain::mapping::{MappingConfig, MappingRegistry};
use featurechain::sql_query_generator::{AnsiDialect, Backend, StaticCatalog};

pub const STATION_MAPPING: &str = include_str!("../../fixtures/station_mapping.yaml");

pub fn config_from(yaml: &str) -> MappingConfig {
    MappingConfig::from_yaml_str(yaml).expect("fixture mapping should parse")
}

pub fn registry_from(yaml: &str) -> MappingRegistry {
    config_from(yaml).build().expect("fixture mapping should build")
}

pub fn station_registry() -> MappingRegistry {
    registry_from(STATION_MAPPING)
}

/// The station mapping with `st:measurements` fetched per parent row
pub fn iterative_measurements_mapping() -> String {
    let joining = "type: st:Measurement\n          link_field: st:stationId\n";
    let iterative = format!("{}          kind: iterative\n", joining);
    let yaml = STATION_MAPPING.replacen(joining, &iterative, 1);
    assert_ne!(yaml, STATION_MAPPING, "fixture layout changed");
    yaml
}

/// The station mapping with `target` also mapped to `column` of the station table
pub fn root_column_mapping(target: &str, column: &str) -> String {
    let anchor = "      - target: st:elevation\n        source: elevation\n";
    let extended = format!("{}      - target: {}\n        source: {}\n", anchor, target, column);
    let yaml = STATION_MAPPING.replacen(anchor, &extended, 1);
    assert_ne!(yaml, STATION_MAPPING, "fixture layout changed");
    yaml
}

/// The station mapping without `st:stationId` on `st:Sensor`, the link field of `st:sensors`
pub fn unlinked_sensors_mapping() -> String {
    let yaml = STATION_MAPPING.replacen(
        "      - target: st:stationId\n        source: station_id\n      - target: st:deviceId",
        "      - target: st:deviceId",
        1,
    );
    assert_ne!(yaml, STATION_MAPPING, "fixture layout changed");
    yaml
}

pub fn backend_for(yaml: &str) -> Backend {
    Backend::new(
        AnsiDialect::new(),
        StaticCatalog::new(config_from(yaml).primary_keys()),
    )
}

pub fn default_config() -> TranslatorConfig {
    TranslatorConfig::default()
}
