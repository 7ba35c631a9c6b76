//! End-to-end translation of filters on nested attributes
//!
//! Filter text in, pre/post split and SQL out, through the public translator.

#[cfg(test)]
mod nested_filter_tests {
    use featurechain::config::TranslatorConfig;
    use featurechain::filter::{parse_filter, Filter};
    use featurechain::sql_query_generator::{
        AnsiDialect, Backend, BackendCatalog, CatalogError, NestedFilterToSql, SqlEncodeError,
    };
    use featurechain::translator::{QueryTranslator, TranslateError, Translation};

    use crate::fixtures::{
        backend_for, default_config, iterative_measurements_mapping, registry_from,
        root_column_mapping, station_registry, unlinked_sensors_mapping, STATION_MAPPING,
    };

    fn translate(filter: &str) -> Translation {
        translate_with(STATION_MAPPING, filter)
    }

    fn translate_with(yaml: &str, filter: &str) -> Translation {
        let registry = registry_from(yaml);
        let backend = backend_for(yaml);
        QueryTranslator::new(&registry, &backend, default_config())
            .translate(&parse_filter(filter).unwrap())
            .unwrap()
    }

    /// Station -> measurements -> Measurement -> sensor -> Sensor, joining at both levels
    #[test]
    fn test_scenario_a_two_level_join() {
        let translation =
            translate("st:measurements/st:Measurement/st:sensor/st:Sensor/st:name = 'X'");

        assert!(translation.post.is_include());
        assert_eq!(
            translation.select_sql(),
            "SELECT * FROM stations WHERE EXISTS (\
             SELECT _chain_link_2.id, _chain_link_2.revision FROM sensors AS _chain_link_2 \
             INNER JOIN measurements AS _chain_link_1 ON _chain_link_1.sensor_id = _chain_link_2.id \
             WHERE _chain_link_2.name = 'X' AND stations.id = _chain_link_1.station_id)"
        );
    }

    #[test]
    fn test_single_level_join() {
        let translation = translate("st:measurements/st:Measurement/st:value > 30");
        assert_eq!(
            translation.where_sql.as_deref(),
            Some(
                "EXISTS (SELECT _chain_link_1.id FROM measurements AS _chain_link_1 \
                 WHERE _chain_link_1.value > 30 AND stations.id = _chain_link_1.station_id)"
            )
        );
    }

    /// Same schema with iterative measurements: nothing is pushed down
    #[test]
    fn test_scenario_b_iterative_nesting_stays_post() {
        let yaml = iterative_measurements_mapping();
        let translation = translate_with(
            &yaml,
            "st:measurements/st:Measurement/st:sensor/st:Sensor/st:name = 'X'",
        );

        assert_eq!(translation.pre, Filter::Include);
        assert_eq!(translation.where_sql, None);
        assert!(!translation.select_sql().contains("EXISTS"));
    }

    #[test]
    fn test_scenario_c_index_predicate_stays_post() {
        let translation = translate("st:measurements[1]/st:Measurement/st:value = 1");
        assert_eq!(translation.pre, Filter::Include);
        assert_eq!(translation.where_sql, None);
    }

    #[test]
    fn test_scenario_d_conditional_type_without_sample_stays_post() {
        let translation = translate("st:device/st:Sensor/st:name = 'X'");
        assert_eq!(translation.pre, Filter::Include);
        assert_eq!(translation.post.property_names(), vec!["st:device/st:Sensor/st:name"]);
    }

    #[test]
    fn test_chaining_by_reference() {
        let translation = translate("st:observer/@xlink:href = 'o-7'");
        assert_eq!(
            translation.where_sql.as_deref(),
            Some(
                "EXISTS (SELECT * FROM observers AS _chain_link_1 \
                 WHERE _chain_link_1.observer_id = 'o-7' \
                 AND stations.observer_id = _chain_link_1.observer_id)"
            )
        );
    }

    #[test]
    fn test_mixed_filter_pushes_what_it_can() {
        let translation = translate(
            "st:name = 'Hobart' AND st:sensors/st:Sensor/st:kind = 'wind' AND st:owner = 'bom'",
        );
        assert_eq!(translation.post.property_names(), vec!["st:owner"]);
        let sql = translation.where_sql.unwrap();
        assert!(sql.starts_with("(stations.name = 'Hobart') AND (EXISTS ("));
        assert!(sql.contains("FROM sensors AS _chain_link_1"));
    }

    #[test]
    fn test_ilike_on_nested_attribute() {
        let translation = translate("st:sensors/st:Sensor/st:name ILIKE 'an%'");
        assert!(translation
            .where_sql
            .unwrap()
            .contains("WHERE LOWER(_chain_link_1.name) LIKE LOWER('an%') AND"));
    }

    #[test]
    fn test_schema_qualified_sql() {
        let registry = station_registry();
        let backend = backend_for(STATION_MAPPING).with_schema(Some("weather".to_string()));
        let translation = QueryTranslator::new(&registry, &backend, default_config())
            .translate(&parse_filter("st:sensors/st:Sensor/st:kind = 'wind'").unwrap())
            .unwrap();
        assert_eq!(
            translation.select_sql(),
            "SELECT * FROM weather.stations WHERE EXISTS (\
             SELECT _chain_link_1.id, _chain_link_1.revision FROM weather.sensors AS _chain_link_1 \
             WHERE _chain_link_1.kind = 'wind' AND weather.stations.id = _chain_link_1.station_id)"
        );
    }

    struct UnreachableCatalog;

    impl BackendCatalog for UnreachableCatalog {
        fn primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError> {
            Err(CatalogError::Lookup {
                table: table.to_string(),
                message: "connection reset".to_string(),
            })
        }
    }

    #[test]
    fn test_catalog_failure_fails_translation() {
        let registry = station_registry();
        let backend = Backend::new(AnsiDialect::new(), UnreachableCatalog);
        let result = QueryTranslator::new(&registry, &backend, default_config())
            .translate(&parse_filter("st:sensors/st:Sensor/st:name = 'X'").unwrap());

        assert!(matches!(
            result,
            Err(TranslateError::Encode(SqlEncodeError::Catalog(_)))
        ));
    }

    #[test]
    fn test_root_only_filters_need_no_catalog() {
        let registry = station_registry();
        let backend = Backend::new(AnsiDialect::new(), UnreachableCatalog);
        let translation = QueryTranslator::new(&registry, &backend, default_config())
            .translate(&parse_filter("st:name = 'Hobart' OR IN ('s-1')").unwrap())
            .unwrap();
        assert_eq!(
            translation.where_sql.as_deref(),
            Some("(stations.name = 'Hobart') OR (stations.id = 's-1')")
        );
    }

    #[test]
    fn test_translation_serializes_to_json() {
        let translation = translate("st:sensors/st:Sensor/st:name = 'X' AND st:owner = 'bom'");
        let json = serde_json::to_value(&translation).unwrap();
        assert!(json["where_sql"].as_str().unwrap().starts_with("EXISTS"));
        assert_eq!(json["from"], "stations");
        assert!(json["post"].is_object());
    }

    /// An ambiguous nested path that the station table maps itself
    #[test]
    fn test_ambiguous_path_falls_back_to_root_column() {
        let yaml = root_column_mapping("st:instruments/st:Sensor/st:name", "instrument_name");
        let translation = translate_with(
            &yaml,
            "st:name = 'Hobart' AND st:instruments/st:Sensor/st:name = 'X'",
        );

        assert!(translation.post.is_include());
        assert_eq!(
            translation.where_sql.as_deref(),
            Some("(stations.name = 'Hobart') AND (stations.instrument_name = 'X')")
        );
    }

    #[test]
    fn test_disabled_nested_filters_read_root_column() {
        let yaml = root_column_mapping("st:sensors/st:Sensor/st:name", "sensor_name");
        let registry = registry_from(&yaml);
        let backend = backend_for(&yaml);
        let config = TranslatorConfig {
            encode_nested_filters: false,
            ..Default::default()
        };
        let translation = QueryTranslator::new(&registry, &backend, config)
            .translate(&parse_filter("st:sensors/st:Sensor/st:name = 'X'").unwrap())
            .unwrap();

        assert!(translation.post.is_include());
        assert_eq!(translation.where_sql.as_deref(), Some("stations.sensor_name = 'X'"));
    }

    /// A conjunct that can't be joined is left for the post filter, its siblings stay in SQL
    #[test]
    fn test_unjoinable_conjunct_is_demoted_alone() {
        let registry = station_registry();
        let backend = backend_for(STATION_MAPPING);
        let encoder = NestedFilterToSql::new(&backend, &registry, registry.root());
        let pre = parse_filter("st:name = 'Hobart' AND st:instruments/st:Sensor/st:name = 'X'")
            .unwrap()
            .with_namespaces(registry.namespaces().clone());

        let encoding = encoder.encode_conjuncts(&pre).unwrap();
        assert_eq!(encoding.sql.as_deref(), Some("stations.name = 'Hobart'"));
        assert_eq!(encoding.encoded.property_names(), vec!["st:name"]);
        assert_eq!(
            encoding.demoted.property_names(),
            vec!["st:instruments/st:Sensor/st:name"]
        );

        // Through the translator the ambiguous conjunct never reaches SQL either
        let translation = translate("st:name = 'Hobart' AND st:instruments/st:Sensor/st:name = 'X'");
        assert_eq!(translation.where_sql.as_deref(), Some("stations.name = 'Hobart'"));
        assert_eq!(
            translation.post.property_names(),
            vec!["st:instruments/st:Sensor/st:name"]
        );
    }

    #[test]
    fn test_unmapped_link_field_stays_post() {
        let yaml = unlinked_sensors_mapping();
        let translation =
            translate_with(&yaml, "st:name = 'Hobart' AND st:sensors/st:Sensor/st:name = 'X'");

        assert_eq!(translation.where_sql.as_deref(), Some("stations.name = 'Hobart'"));
        assert_eq!(translation.post.property_names(), vec!["st:sensors/st:Sensor/st:name"]);
    }
}
