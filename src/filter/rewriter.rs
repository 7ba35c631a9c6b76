//! Property path substitution.
//!
//! Used when a nested predicate is pushed into an `EXISTS` subquery: the nested
//! path (`st:measurements/st:Sensor/st:name`) is replaced with the path local to
//! the leaf feature type (`st:name`) before the predicate is unrolled against the
//! leaf mapping.

use super::{Expr, Filter, PropertyName};

/// Copy `filter`, replacing every property whose path is exactly `target`
/// with `replacement`. Namespace contexts travel with the replaced properties.
pub fn rewrite(filter: &Filter, target: &str, replacement: &str) -> Filter {
    filter.map_expressions(&mut |expr: &Expr| rewrite_expression(expr, target, replacement))
}

pub fn rewrite_expression(expr: &Expr, target: &str, replacement: &str) -> Expr {
    expr.map_properties(&mut |property: &PropertyName| {
        if property.path == target {
            Expr::Property(PropertyName::with_namespaces(
                replacement,
                property.namespaces.clone(),
            ))
        } else {
            Expr::Property(property.clone())
        }
    })
}
