//! Expression and filter traversal
//!
//! Separates the traversal of [`Expr`]/[`Filter`] trees from what is done at each
//! node, so capability checks and collectors don't each reimplement recursion.
//!
//! ```ignore
//! struct FunctionCounter(usize);
//!
//! impl ExpressionVisitor for FunctionCounter {
//!     type Output = ();
//!     fn visit_function(&mut self, _name: &str, _args: &[Expr]) {
//!         self.0 += 1;
//!     }
//! }
//!
//! let mut counter = FunctionCounter(0);
//! walk_expression(&expr, &mut counter);
//! ```

use super::{Expr, Filter, Literal, MathOp, PropertyName};

/// Trait for visiting expression nodes.
///
/// Default implementations do nothing, so visitors only override what they need.
pub trait ExpressionVisitor {
    type Output: Default;

    /// Dispatch on the node kind. Children are not visited; visitors that need
    /// their results recurse through `visit` themselves.
    fn visit(&mut self, expr: &Expr) -> Self::Output {
        match expr {
            Expr::Property(property) => self.visit_property(property),
            Expr::Literal(literal) => self.visit_literal(literal),
            Expr::Math { op, left, right } => self.visit_math(*op, left, right),
            Expr::Function { name, args } => self.visit_function(name, args),
            Expr::Nil => self.visit_nil(),
        }
    }

    fn visit_property(&mut self, _property: &PropertyName) -> Self::Output {
        Self::Output::default()
    }

    fn visit_literal(&mut self, _literal: &Literal) -> Self::Output {
        Self::Output::default()
    }

    fn visit_math(&mut self, _op: MathOp, _left: &Expr, _right: &Expr) -> Self::Output {
        Self::Output::default()
    }

    fn visit_function(&mut self, _name: &str, _args: &[Expr]) -> Self::Output {
        Self::Output::default()
    }

    fn visit_nil(&mut self) -> Self::Output {
        Self::Output::default()
    }
}

/// Walk an expression tree: the node itself first, then its children.
pub fn walk_expression<V: ExpressionVisitor>(expr: &Expr, visitor: &mut V) -> V::Output {
    let result = visitor.visit(expr);
    match expr {
        Expr::Math { left, right, .. } => {
            walk_expression(left, visitor);
            walk_expression(right, visitor);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                walk_expression(arg, visitor);
            }
        }
        Expr::Property(_) | Expr::Literal(_) | Expr::Nil => {}
    }
    result
}

/// Pre-order walk over every filter node (logical operators included).
pub fn walk_filter<'a, F>(filter: &'a Filter, f: &mut F)
where
    F: FnMut(&'a Filter),
{
    f(filter);
    match filter {
        Filter::And(children) | Filter::Or(children) => {
            for child in children {
                walk_filter(child, f);
            }
        }
        Filter::Not(inner) => walk_filter(inner, f),
        _ => {}
    }
}
