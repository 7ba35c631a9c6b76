//! Backend filter capabilities and pre/post filter splitting.
//!
//! [`FilterCapabilities`] declares what a backend can evaluate in SQL. The
//! [`splitter::ComplexFilterSplitter`] uses it, plus the mapping graph, to decide
//! which parts of a filter can be pushed into the query.

use std::collections::{BTreeSet, HashSet};

use crate::filter::visitors::{walk_expression, walk_filter, ExpressionVisitor};
use crate::filter::{Expr, Filter, MathOp, SpatialOp};

pub mod splitter;

pub use splitter::{ComplexFilterSplitter, FilterSplit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCapabilities {
    pub logical: bool,
    pub comparisons: bool,
    pub between: bool,
    pub like: bool,
    pub null_check: bool,
    pub id: bool,
    pub math: bool,
    spatial: HashSet<SpatialOp>,
    /// Lowercased function names
    functions: BTreeSet<String>,
}

impl FilterCapabilities {
    /// Nothing can be encoded; everything goes to the post filter
    pub fn none() -> Self {
        FilterCapabilities {
            logical: false,
            comparisons: false,
            between: false,
            like: false,
            null_check: false,
            id: false,
            math: false,
            spatial: HashSet::new(),
            functions: BTreeSet::new(),
        }
    }

    /// Plain SQL-92: comparisons, logic, math, LIKE, BETWEEN, IS NULL, ids
    pub fn sql92() -> Self {
        FilterCapabilities {
            logical: true,
            comparisons: true,
            between: true,
            like: true,
            null_check: true,
            id: true,
            math: true,
            ..Self::none()
        }
    }

    pub fn with_spatial(mut self, ops: impl IntoIterator<Item = SpatialOp>) -> Self {
        self.spatial.extend(ops);
        self
    }

    pub fn with_functions<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.functions
            .extend(names.into_iter().map(|n| n.to_lowercase()));
        self
    }

    pub fn supports_spatial(&self, op: SpatialOp) -> bool {
        self.spatial.contains(&op)
    }

    pub fn supports_function(&self, name: &str) -> bool {
        self.functions.contains(&name.to_lowercase())
    }

    /// Whether this node kind is supported (children not inspected)
    pub fn supports(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Include | Filter::Exclude => true,
            Filter::And(_) | Filter::Or(_) | Filter::Not(_) => self.logical,
            Filter::Comparison { .. } => self.comparisons,
            Filter::Between { .. } => self.between,
            Filter::Like { .. } => self.like,
            Filter::IsNull(_) => self.null_check,
            Filter::Spatial { op, .. } => self.supports_spatial(*op),
            Filter::Id(_) => self.id,
        }
    }

    /// Whether every math operator and function in `expr` is supported
    pub fn supports_expression(&self, expr: &Expr) -> bool {
        let mut check = SupportCheck {
            capabilities: self,
            supported: true,
        };
        walk_expression(expr, &mut check);
        check.supported
    }

    /// Whether the whole tree, expressions included, can be encoded
    pub fn fully_supports(&self, filter: &Filter) -> bool {
        let mut supported = true;
        walk_filter(filter, &mut |node: &Filter| {
            supported = supported
                && self.supports(node)
                && node.expressions().into_iter().all(|e| self.supports_expression(e));
        });
        supported
    }
}

struct SupportCheck<'a> {
    capabilities: &'a FilterCapabilities,
    supported: bool,
}

impl ExpressionVisitor for SupportCheck<'_> {
    type Output = ();

    fn visit_math(&mut self, _op: MathOp, _left: &Expr, _right: &Expr) {
        self.supported &= self.capabilities.math;
    }

    fn visit_function(&mut self, name: &str, _args: &[Expr]) {
        self.supported &= self.capabilities.supports_function(name);
    }
}

/// Result of classifying one expression: whether it can be encoded and how many
/// nested attributes it reaches into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprCapability {
    pub capable: bool,
    pub nested_attributes: usize,
}

impl Default for ExprCapability {
    fn default() -> Self {
        ExprCapability {
            capable: true,
            nested_attributes: 0,
        }
    }
}

impl ExprCapability {
    pub fn incapable() -> Self {
        ExprCapability {
            capable: false,
            nested_attributes: 0,
        }
    }

    pub fn nested() -> Self {
        ExprCapability {
            capable: true,
            nested_attributes: 1,
        }
    }

    /// Fold children results; more than `max_nested` nested attributes makes the
    /// combination incapable.
    pub fn combine(children: impl IntoIterator<Item = ExprCapability>, max_nested: usize) -> Self {
        let combined = children
            .into_iter()
            .fold(ExprCapability::default(), |acc, child| ExprCapability {
                capable: acc.capable && child.capable,
                nested_attributes: acc.nested_attributes + child.nested_attributes,
            });
        ExprCapability {
            capable: combined.capable && combined.nested_attributes <= max_nested,
            nested_attributes: combined.nested_attributes,
        }
    }
}
