//! Unrolling: replacing attribute XPaths with the source expressions backing them.
//!
//! A predicate whose property is mapped more than once expands into an `OR` over
//! every combination of source expressions. Identifier filters turn into
//! comparisons against the feature id expression.

use super::errors::UnmappingError;
use super::{Expr, Filter, PropertyName};
use crate::mapping::FeatureTypeMapping;

/// Rewrite `filter` so it references columns of `mapping`'s table instead of
/// attribute paths of its feature type.
pub fn unroll(filter: &Filter, mapping: &FeatureTypeMapping) -> Result<Filter, UnmappingError> {
    unroll_with(filter, mapping.id_expression.as_ref(), &mut |property: &PropertyName| {
        source_expressions(property, mapping)
    })
}

/// Unroll with a caller-supplied resolver, for filters whose properties don't
/// all belong to one mapping. `id_expression` backs identifier filters.
pub fn unroll_with<F>(
    filter: &Filter,
    id_expression: Option<&Expr>,
    resolve: &mut F,
) -> Result<Filter, UnmappingError>
where
    F: FnMut(&PropertyName) -> Result<Vec<Expr>, UnmappingError>,
{
    match filter {
        Filter::Include | Filter::Exclude => Ok(filter.clone()),
        Filter::And(children) => Ok(Filter::And(
            children
                .iter()
                .map(|c| unroll_with(c, id_expression, resolve))
                .collect::<Result<_, _>>()?,
        )),
        Filter::Or(children) => Ok(Filter::Or(
            children
                .iter()
                .map(|c| unroll_with(c, id_expression, resolve))
                .collect::<Result<_, _>>()?,
        )),
        Filter::Not(inner) => Ok(Filter::Not(Box::new(unroll_with(
            inner,
            id_expression,
            resolve,
        )?))),
        Filter::Id(ids) => {
            let id_expression = id_expression
                .ok_or_else(|| UnmappingError::NoSourceExpression("@gml:id".to_string()))?;
            Ok(Filter::or(
                ids.iter()
                    .map(|id| Filter::equal(id_expression.clone(), Expr::string(id.clone())))
                    .collect(),
            ))
        }
        _ => unroll_predicate(filter, resolve),
    }
}

/// Source expressions for one property; errors when nothing usable backs it
pub fn source_expressions(
    property: &PropertyName,
    mapping: &FeatureTypeMapping,
) -> Result<Vec<Expr>, UnmappingError> {
    let steps = mapping.property_steps(property)?;
    let found = mapping.find_mappings_for(&steps);
    if found.is_empty() {
        return Err(UnmappingError::NoSourceExpression(property.path.clone()));
    }
    found
        .into_iter()
        .map(|source| source.ok_or_else(|| UnmappingError::ForeignSource(property.path.clone())))
        .collect()
}

pub(crate) fn collect_properties<'a>(expr: &'a Expr, out: &mut Vec<&'a PropertyName>) {
    match expr {
        Expr::Property(p) => out.push(p),
        Expr::Math { left, right, .. } => {
            collect_properties(left, out);
            collect_properties(right, out);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                collect_properties(arg, out);
            }
        }
        Expr::Literal(_) | Expr::Nil => {}
    }
}

fn unroll_predicate<F>(filter: &Filter, resolve: &mut F) -> Result<Filter, UnmappingError>
where
    F: FnMut(&PropertyName) -> Result<Vec<Expr>, UnmappingError>,
{
    let mut properties = Vec::new();
    for expr in filter.expressions() {
        collect_properties(expr, &mut properties);
    }

    let mut resolved: Vec<(&str, Vec<Expr>)> = Vec::new();
    for property in properties {
        if resolved.iter().any(|(path, _)| *path == property.path) {
            continue;
        }
        resolved.push((&property.path, resolve(property)?));
    }

    let combinations: usize = resolved.iter().map(|(_, sources)| sources.len()).product();
    if combinations > 1 {
        log::debug!(
            "Unrolling '{}' expands into {} alternatives",
            filter,
            combinations
        );
    }

    let mut alternatives = Vec::with_capacity(combinations);
    for combination in 0..combinations {
        let mut remainder = combination;
        let chosen: Vec<(&str, &Expr)> = resolved
            .iter()
            .map(|(path, sources)| {
                let pick = &sources[remainder % sources.len()];
                remainder /= sources.len();
                (*path, pick)
            })
            .collect();

        alternatives.push(filter.map_expressions(&mut |expr: &Expr| {
            expr.map_properties(&mut |p: &PropertyName| {
                chosen
                    .iter()
                    .find(|(path, _)| *path == p.path)
                    .map(|(_, source)| (*source).clone())
                    .unwrap_or_else(|| Expr::Property(p.clone()))
            })
        }));
    }

    Ok(Filter::or(alternatives))
}
