//! Properties of pre/post splitting and chain resolution over the station mapping

#[cfg(test)]
mod splitter_properties_tests {
    use std::collections::HashSet;

    use featurechain::capabilities::{ComplexFilterSplitter, FilterSplit};
    use featurechain::chain::{self, ROOT_ALIAS};
    use featurechain::config::TranslatorConfig;
    use featurechain::filter::rewriter::rewrite;
    use featurechain::filter::unmapping::unroll;
    use featurechain::filter::{parse_filter, Expr, Filter};
    use featurechain::mapping::MappingRegistry;
    use featurechain::sql_query_generator::{AnsiDialect, SqlDialect};
    use featurechain::translator::QueryTranslator;

    use crate::fixtures::{backend_for, station_registry, STATION_MAPPING};

    fn split(registry: &MappingRegistry, filter: &str, encode_nested_filters: bool) -> FilterSplit {
        let capabilities = AnsiDialect::new().capabilities();
        let config = TranslatorConfig {
            encode_nested_filters,
            ..Default::default()
        };
        let filter = parse_filter(filter)
            .unwrap()
            .with_namespaces(registry.namespaces().clone());
        ComplexFilterSplitter::new(&capabilities, registry, registry.root(), &config).split(&filter)
    }

    /// Filters without nested attributes split the same with nested encoding on or off
    #[test]
    fn test_nested_free_filters_match_baseline() {
        let registry = station_registry();
        let filters = [
            "st:name = 'Hobart'",
            "st:elevation BETWEEN 0 AND 100 AND st:owner = 'bom'",
            "st:name LIKE 'Ho%' OR st:elevation IS NULL",
            "NOT st:owner = 'bom'",
            "st:code = 'HBA' AND strToLowerCase(st:name) = 'hobart'",
            "st:elevation * 2 > 50",
            "IN ('s-1', 's-2')",
        ];

        for filter in filters {
            assert_eq!(
                split(&registry, filter, true),
                split(&registry, filter, false),
                "Split differs for: {}",
                filter
            );
        }
    }

    /// One nested joining attribute with an encodable predicate goes fully pre
    #[test]
    fn test_single_nested_attribute_is_fully_pre() {
        let registry = station_registry();
        let filters = [
            "st:sensors/st:Sensor/st:name = 'X'",
            "st:sensors/st:Sensor/st:name LIKE 'an%'",
            "st:measurements/st:Measurement/st:value BETWEEN 1 AND 3",
            "st:measurements/st:Measurement/st:value IS NULL",
            "NOT st:sensors/st:Sensor/st:kind = 'wind'",
            "st:measurements/st:Measurement/st:value * 2 > 10",
            "st:measurements/st:Measurement/st:sensor/st:Sensor/st:kind = 'wind'",
        ];

        for filter in filters {
            let result = split(&registry, filter, true);
            assert!(result.is_fully_pre(), "Expected pre for: {}", filter);
        }
    }

    /// Two nested attributes in one predicate never get partially pushed
    #[test]
    fn test_two_nested_attributes_are_fully_post() {
        let registry = station_registry();
        let filters = [
            "st:sensors/st:Sensor/st:name = st:measurements/st:Measurement/st:value",
            "st:measurements/st:Measurement/st:value + st:sensors/st:Sensor/st:kind > 1",
            "st:measurements/st:Measurement/st:value BETWEEN st:sensors/st:Sensor/st:kind AND 3",
        ];

        for filter in filters {
            let result = split(&registry, filter, true);
            assert_eq!(result.pre, Filter::Include, "Expected post for: {}", filter);
        }
    }

    #[test]
    fn test_nested_attribute_inside_function_is_post() {
        let registry = station_registry();
        let result = split(&registry, "strToLowerCase(st:sensors/st:Sensor/st:name) = 'x'", true);
        assert_eq!(result.pre, Filter::Include);
    }

    #[test]
    fn test_ambiguous_chain_is_post() {
        let registry = station_registry();
        let result = split(&registry, "st:instruments/st:Sensor/st:name = 'X'", true);
        assert_eq!(result.pre, Filter::Include);
    }

    /// A nested attribute compared with a root attribute stays pushable, and the
    /// root attribute is read from the outer query.
    #[test]
    fn test_nested_against_root_attribute_stays_pre() {
        let registry = station_registry();
        let filter = "st:sensors/st:Sensor/st:name = st:name";
        assert!(split(&registry, filter, true).is_fully_pre());

        let backend = backend_for(STATION_MAPPING);
        let translation = QueryTranslator::new(&registry, &backend, TranslatorConfig::default())
            .translate(&parse_filter(filter).unwrap())
            .unwrap();
        assert!(translation
            .where_sql
            .unwrap()
            .contains("WHERE _chain_link_1.name = stations.name AND"));
    }

    #[test]
    fn test_chain_resolution_is_idempotent() {
        let registry = station_registry();
        let xpath = "st:measurements/st:Measurement/st:sensor/st:Sensor/st:name";
        let first = chain::resolve(&registry, registry.root(), xpath, None).unwrap();
        let second = chain::resolve(&registry, registry.root(), xpath, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_aliases_are_positional_and_distinct() {
        let registry = station_registry();
        let xpath = "st:measurements/st:Measurement/st:sensor/st:Sensor/st:name";
        let chain = chain::resolve(&registry, registry.root(), xpath, None).unwrap();

        let aliases: Vec<&str> = chain.links().iter().map(|l| l.alias.as_str()).collect();
        assert_eq!(aliases, vec![ROOT_ALIAS, "_chain_link_1", "_chain_link_2"]);
        let distinct: HashSet<&str> = aliases.iter().copied().collect();
        assert_eq!(distinct.len(), aliases.len());
    }

    /// Rewriting to the leaf-local path and unrolling against the owning mapping
    /// yields the leaf table's column
    #[test]
    fn test_rewrite_then_unroll_targets_leaf_column() {
        let registry = station_registry();
        let nested = "st:observer/st:Observer/st:name";
        let chain = chain::resolve(&registry, registry.root(), nested, None).unwrap();
        let owner = chain.feature_type_owning_attribute().unwrap();
        let local = chain.attribute_path().unwrap().to_string();
        assert_eq!(local, "st:name");

        let filter = parse_filter(&format!("{} = 'Ann'", nested))
            .unwrap()
            .with_namespaces(registry.namespaces().clone());
        let unrolled = unroll(&rewrite(&filter, nested, &local), owner).unwrap();

        // Station maps st:name to `name`; the observer table calls it `observer_name`
        assert_eq!(
            unrolled,
            Filter::equal(Expr::property("observer_name"), Expr::string("Ann"))
        );
    }
}
