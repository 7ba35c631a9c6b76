use super::FeatureChain;
use crate::mapping::{
    FeatureTypeMapping, MappingError, MappingRegistry, NestedAttributeMapping, SampleFeature,
};
use crate::xpath::StepList;

enum Walk {
    Continue,
    /// A nested type could not be determined; the whole resolution is void
    Abort,
}

/// Resolve `xpath` into its single chain.
///
/// Returns an empty chain when the path can't be resolved, or when it resolves
/// into more than one chain.
pub fn resolve<'r>(
    registry: &'r MappingRegistry,
    root: &'r FeatureTypeMapping,
    xpath: &str,
    sample: Option<&SampleFeature>,
) -> Result<FeatureChain<'r>, MappingError> {
    let mut chains = resolve_all(registry, root, xpath, sample)?;
    match chains.len() {
        1 => Ok(chains.remove(0)),
        0 => Ok(FeatureChain::new()),
        n => {
            log::debug!("'{}' resolves into {} chains, treating it as ambiguous", xpath, n);
            Ok(FeatureChain::new())
        }
    }
}

/// Every chain `xpath` can be resolved into, following all matching nested attributes
pub fn resolve_all<'r>(
    registry: &'r MappingRegistry,
    root: &'r FeatureTypeMapping,
    xpath: &str,
    sample: Option<&SampleFeature>,
) -> Result<Vec<FeatureChain<'r>>, MappingError> {
    let steps = root.steps_for(xpath)?;
    resolve_steps(registry, root, steps, sample)
}

pub(crate) fn resolve_steps<'r>(
    registry: &'r MappingRegistry,
    root: &'r FeatureTypeMapping,
    steps: StepList,
    sample: Option<&SampleFeature>,
) -> Result<Vec<FeatureChain<'r>>, MappingError> {
    let path = steps.to_string();
    let mut chains = Vec::new();
    match walk(registry, root, steps, FeatureChain::new(), sample, &mut chains)? {
        Walk::Abort => {
            log::debug!("Chain resolution of '{}' aborted", path);
            Ok(Vec::new())
        }
        Walk::Continue => {
            log::trace!("'{}' resolved into {} chain(s)", path, chains.len());
            Ok(chains)
        }
    }
}

fn nested_type_of<'r>(
    registry: &'r MappingRegistry,
    nested: &NestedAttributeMapping,
    sample: Option<&SampleFeature>,
) -> Result<Option<&'r FeatureTypeMapping>, MappingError> {
    if nested.is_conditional() && sample.is_none() {
        log::debug!(
            "Conditional nested mapping found but no feature to evaluate it against: nested type cannot be determined"
        );
        return Ok(None);
    }
    let resolved = nested.feature_type_mapping(registry, sample)?;
    if resolved.is_none() {
        log::debug!("Nested feature type could not be determined");
    }
    Ok(resolved)
}

fn walk<'r>(
    registry: &'r MappingRegistry,
    current: &'r FeatureTypeMapping,
    remaining: StepList,
    chain: FeatureChain<'r>,
    sample: Option<&SampleFeature>,
    out: &mut Vec<FeatureChain<'r>>,
) -> Result<Walk, MappingError> {
    let mut descended = false;

    if remaining.len() > 1 {
        for (attribute, nested) in current.nested_attributes() {
            let consumed = attribute.target.len();
            if remaining.len() <= consumed || !remaining.starts_with(&attribute.target) {
                continue;
            }

            let Some(nested_type) = nested_type_of(registry, nested, sample)? else {
                return Ok(Walk::Abort);
            };
            let Some(next) = remaining.get(consumed) else {
                continue;
            };
            if !nested_type.name.same_name(next) {
                continue;
            }

            log::trace!(
                "Nested feature type {} found under {}/{}",
                nested_type,
                current.name.qualified_name(),
                attribute.target
            );
            descended = true;

            let mut extended = chain.clone();
            extended.push_nested(current, attribute);
            let rest = remaining.sub_list(consumed + 1..remaining.len());
            if rest.is_empty() {
                extended.close(nested_type, None, false);
                out.push(extended);
            } else if let Walk::Abort = walk(registry, nested_type, rest, extended, sample, out)? {
                return Ok(Walk::Abort);
            }
        }
    }

    if descended {
        return Ok(Walk::Continue);
    }
    close_chain(registry, current, remaining, chain, sample, out)
}

/// The remainder is an attribute of `current`, possibly an `xlink:href` pointing
/// at another feature type.
fn close_chain<'r>(
    registry: &'r MappingRegistry,
    current: &'r FeatureTypeMapping,
    remaining: StepList,
    mut chain: FeatureChain<'r>,
    sample: Option<&SampleFeature>,
    out: &mut Vec<FeatureChain<'r>>,
) -> Result<Walk, MappingError> {
    if current.find_mappings_for(&remaining).is_empty() {
        log::trace!("'{}' is not mapped on {}", remaining, current);
        return Ok(Walk::Continue);
    }

    if remaining.is_xlink_href() {
        let parent_attribute = remaining
            .parent()
            .and_then(|parent| current.attribute_for(&parent));
        if let Some(parent_attribute) = parent_attribute {
            if let Some(nested) = &parent_attribute.nested {
                let Some(nested_type) = nested_type_of(registry, nested, sample)? else {
                    return Ok(Walk::Abort);
                };
                log::trace!("'{}' chains {} by reference", remaining, nested_type);
                chain.push_nested(current, parent_attribute);
                chain.close(nested_type, Some(remaining), true);
                out.push(chain);
                return Ok(Walk::Continue);
            }
        }
    }

    chain.close(current, Some(remaining), false);
    out.push(chain);
    Ok(Walk::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::JoinCondition;
    use crate::filter::Expr;
    use crate::mapping::{MappingConfig, NestingKind};
    use crate::mapping::testing::station_registry;

    #[test]
    fn test_single_level_chain() {
        let registry = station_registry();
        let chain = resolve(&registry, registry.root(), "st:sensors/st:Sensor/st:name", None).unwrap();

        assert_eq!(chain.len(), 2);
        assert!(chain.is_joining_enabled());
        assert_eq!(chain.link(0).unwrap().alias, "_chain_root");
        assert_eq!(chain.link(1).unwrap().alias, "_chain_link_1");
        assert_eq!(chain.last().unwrap().mapping.table, "sensors");
        assert_eq!(chain.attribute_path().unwrap().to_string(), "st:name");
        assert_eq!(chain.feature_type_owning_attribute().unwrap().table, "sensors");
        assert_eq!(
            chain.join_condition(0),
            Some(JoinCondition {
                parent: Expr::property("id"),
                nested: Expr::property("station_id"),
            })
        );
        assert_eq!(chain.attribute_sources(), vec![Some(Expr::property("name"))]);
    }

    #[test]
    fn test_two_level_chain() {
        let registry = station_registry();
        let chain = resolve(
            &registry,
            registry.root(),
            "st:measurements/st:Measurement/st:sensor/st:Sensor/st:name",
            None,
        )
        .unwrap();

        let tables: Vec<&str> = chain.links().iter().map(|l| l.mapping.table.as_str()).collect();
        assert_eq!(tables, vec!["stations", "measurements", "sensors"]);
        assert_eq!(chain.link(2).unwrap().alias, "_chain_link_2");
        assert_eq!(chain.previous(2).unwrap().alias, "_chain_link_1");
        assert!(chain.next(2).is_none());
        assert!(chain.previous(0).is_none());
        assert_eq!(
            chain.join_condition(1),
            Some(JoinCondition {
                parent: Expr::property("sensor_id"),
                nested: Expr::property("id"),
            })
        );
        assert!(chain.join_condition(2).is_none());
    }

    #[test]
    fn test_root_attribute_is_a_single_link() {
        let registry = station_registry();
        let chain = resolve(&registry, registry.root(), "st:Station/st:name", None).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(!chain.is_nested());
        assert_eq!(chain.attribute_path().unwrap().to_string(), "st:name");
    }

    #[test]
    fn test_iterative_nesting_disables_joining() {
        let registry = station_registry();
        let chain = resolve(&registry, registry.root(), "st:logs/st:Log/st:message", None).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.first().unwrap().nested_mapping().unwrap().kind,
            NestingKind::Iterative
        );
        assert!(!chain.is_joining_enabled());
    }

    #[test]
    fn test_conditional_nesting_needs_a_sample() {
        let registry = station_registry();
        let xpath = "st:device/st:Sensor/st:name";

        assert!(resolve_all(&registry, registry.root(), xpath, None).unwrap().is_empty());

        let fixed = SampleFeature::new().with("st:deviceKind", "fixed");
        let chain = resolve(&registry, registry.root(), xpath, Some(&fixed)).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last().unwrap().mapping.table, "sensors");

        // The sample picks Observer, which the path doesn't name
        let mobile = SampleFeature::new().with("st:deviceKind", "mobile");
        assert!(resolve_all(&registry, registry.root(), xpath, Some(&mobile))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_chaining_by_reference() {
        let registry = station_registry();
        let chain = resolve(&registry, registry.root(), "st:observer/@xlink:href", None).unwrap();

        assert_eq!(chain.len(), 2);
        let last = chain.last().unwrap();
        assert!(last.chaining_by_reference);
        assert_eq!(last.mapping.table, "observers");
        assert_eq!(
            chain.attribute_path().unwrap().to_string(),
            "st:observer/@xlink:href"
        );
        assert_eq!(chain.feature_type_owning_attribute().unwrap().table, "stations");
        assert_eq!(
            chain.attribute_sources(),
            vec![Some(Expr::property("observer_id"))]
        );
    }

    #[test]
    fn test_ambiguous_paths() {
        let registry = station_registry();
        let xpath = "st:instruments/st:Sensor/st:name";
        assert_eq!(resolve_all(&registry, registry.root(), xpath, None).unwrap().len(), 2);
        assert!(resolve(&registry, registry.root(), xpath, None).unwrap().is_empty());
    }

    #[test]
    fn test_path_ending_at_nested_type() {
        let registry = station_registry();
        let chain = resolve(&registry, registry.root(), "st:sensors/st:Sensor", None).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.attribute_path().is_none());
        assert!(chain.attribute_sources().is_empty());
    }

    #[test]
    fn test_unmapped_remainder_yields_nothing() {
        let registry = station_registry();
        let chains =
            resolve_all(&registry, registry.root(), "st:sensors/st:Sensor/st:nothing", None).unwrap();
        assert!(chains.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = station_registry();
        let xpath = "st:measurements/st:Measurement/st:sensor/st:Sensor/st:kind";
        let first = resolve(&registry, registry.root(), xpath, None).unwrap();
        let second = resolve(&registry, registry.root(), xpath, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_nested_type_is_an_error() {
        let yaml = r#"
namespaces:
  st: urn:example:station
root: st:Station
feature_types:
  - name: st:Station
    table: stations
    attributes:
      - target: st:sensors
        source: id
        nested:
          type: st:Missing
          link_field: st:stationId
"#;
        let registry = MappingConfig::from_yaml_str(yaml).unwrap().build().unwrap();
        let err = resolve(&registry, registry.root(), "st:sensors/st:Missing/st:name", None)
            .unwrap_err();
        assert!(matches!(err, MappingError::UnknownFeatureType { .. }));
    }
}
