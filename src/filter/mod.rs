//! Filter and expression model.
//!
//! Filters are a closed set of variants dispatched with `match`. Property names
//! carry XPaths against the complex (mapped) schema until they are unrolled into
//! source expressions by [`unmapping`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::xpath::NamespaceContext;

pub mod errors;
pub mod parser;
pub mod rewriter;
pub mod unmapping;
pub mod visitors;

pub use errors::{FilterParseError, UnmappingError};
pub use parser::{parse_expression, parse_filter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Well-known text, e.g. `POINT (1 2)`
    Geometry(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Geometry(wkt) => write!(f, "{}", wkt),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

/// Reference to an attribute by XPath, optionally with the namespace context
/// its prefixes were written against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyName {
    pub path: String,
    #[serde(skip)]
    pub namespaces: Option<Arc<NamespaceContext>>,
    /// Encoded table or alias an unrolled column belongs to, overriding the
    /// encoder's own qualification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl PropertyName {
    pub fn new(path: impl Into<String>) -> Self {
        PropertyName {
            path: path.into(),
            namespaces: None,
            qualifier: None,
        }
    }

    /// Column `column` of the already encoded table reference `qualifier`
    pub fn qualified(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        PropertyName {
            path: column.into(),
            namespaces: None,
            qualifier: Some(qualifier.into()),
        }
    }

    pub fn with_namespaces(path: impl Into<String>, namespaces: Option<Arc<NamespaceContext>>) -> Self {
        PropertyName {
            path: path.into(),
            namespaces,
            qualifier: None,
        }
    }

    /// Paths with more than one step may cross into nested feature types
    pub fn is_multi_step(&self) -> bool {
        self.path.contains('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Property(PropertyName),
    Literal(Literal),
    Math {
        op: MathOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Nil,
}

impl Expr {
    pub fn property(path: impl Into<String>) -> Self {
        Expr::Property(PropertyName::new(path))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn geometry(wkt: impl Into<String>) -> Self {
        Expr::Literal(Literal::Geometry(wkt.into()))
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn math(op: MathOp, left: Expr, right: Expr) -> Self {
        Expr::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn as_property(&self) -> Option<&PropertyName> {
        match self {
            Expr::Property(p) => Some(p),
            _ => None,
        }
    }

    /// Collect every property path referenced by this expression
    pub fn property_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_property_names(&mut names);
        names
    }

    fn collect_property_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Property(p) => {
                if !names.contains(&p.path.as_str()) {
                    names.push(p.path.as_str());
                }
            }
            Expr::Math { left, right, .. } => {
                left.collect_property_names(names);
                right.collect_property_names(names);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_property_names(names);
                }
            }
            Expr::Literal(_) | Expr::Nil => {}
        }
    }

    /// Rebuild the expression, replacing every property through `f`
    pub fn map_properties<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&PropertyName) -> Expr,
    {
        match self {
            Expr::Property(p) => f(p),
            Expr::Math { op, left, right } => Expr::Math {
                op: *op,
                left: Box::new(left.map_properties(f)),
                right: Box::new(right.map_properties(f)),
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.map_properties(f)).collect(),
            },
            Expr::Literal(_) | Expr::Nil => self.clone(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Property(p) => match &p.qualifier {
                Some(qualifier) => write!(f, "{}.{}", qualifier, p.path),
                None => write!(f, "{}", p.path),
            },
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Math { op, left, right } => write!(f, "({} {} {})", left, op.to_sql(), right),
            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expr::Nil => write!(f, "NIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialOp {
    Intersects,
    Disjoint,
    Contains,
    Within,
    Touches,
    Crosses,
    Overlaps,
    Equals,
}

impl SpatialOp {
    pub const ALL: [SpatialOp; 8] = [
        SpatialOp::Intersects,
        SpatialOp::Disjoint,
        SpatialOp::Contains,
        SpatialOp::Within,
        SpatialOp::Touches,
        SpatialOp::Crosses,
        SpatialOp::Overlaps,
        SpatialOp::Equals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpatialOp::Intersects => "Intersects",
            SpatialOp::Disjoint => "Disjoint",
            SpatialOp::Contains => "Contains",
            SpatialOp::Within => "Within",
            SpatialOp::Touches => "Touches",
            SpatialOp::Crosses => "Crosses",
            SpatialOp::Overlaps => "Overlaps",
            SpatialOp::Equals => "Equals",
        }
    }

    pub fn from_name(name: &str) -> Option<SpatialOp> {
        SpatialOp::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Include,
    Exclude,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Comparison {
        op: ComparisonOp,
        left: Expr,
        right: Expr,
        #[serde(default = "default_match_case")]
        match_case: bool,
    },
    Between {
        expr: Expr,
        lower: Expr,
        upper: Expr,
    },
    /// SQL-style pattern: `%` any run, `_` one character
    Like {
        expr: Expr,
        pattern: String,
        #[serde(default = "default_match_case")]
        match_case: bool,
    },
    IsNull(Expr),
    Spatial {
        op: SpatialOp,
        left: Expr,
        right: Expr,
    },
    /// Feature identifiers
    Id(Vec<String>),
}

fn default_match_case() -> bool {
    true
}

impl Filter {
    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Filter::Comparison {
            op,
            left,
            right,
            match_case: true,
        }
    }

    pub fn equal(left: Expr, right: Expr) -> Self {
        Filter::compare(ComparisonOp::Equal, left, right)
    }

    /// Conjunction that drops `Include` members and collapses trivial cases
    pub fn and(filters: Vec<Filter>) -> Self {
        let mut members: Vec<Filter> = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter {
                Filter::Include => {}
                Filter::Exclude => return Filter::Exclude,
                Filter::And(inner) => members.extend(inner),
                other => members.push(other),
            }
        }
        match members.len() {
            0 => Filter::Include,
            1 => members.remove(0),
            _ => Filter::And(members),
        }
    }

    /// Disjunction that drops `Exclude` members and collapses trivial cases
    pub fn or(filters: Vec<Filter>) -> Self {
        let mut members: Vec<Filter> = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter {
                Filter::Exclude => {}
                Filter::Include => return Filter::Include,
                Filter::Or(inner) => members.extend(inner),
                other => members.push(other),
            }
        }
        match members.len() {
            0 => Filter::Exclude,
            1 => members.remove(0),
            _ => Filter::Or(members),
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, Filter::Include)
    }

    /// Expressions directly under this node (children filters excluded)
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Filter::Comparison { left, right, .. } | Filter::Spatial { left, right, .. } => {
                vec![left, right]
            }
            Filter::Between { expr, lower, upper } => vec![expr, lower, upper],
            Filter::Like { expr, .. } | Filter::IsNull(expr) => vec![expr],
            Filter::Include
            | Filter::Exclude
            | Filter::And(_)
            | Filter::Or(_)
            | Filter::Not(_)
            | Filter::Id(_) => vec![],
        }
    }

    /// Every distinct property path referenced anywhere in the tree
    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.collect_property_names(&mut names);
        names
    }

    fn collect_property_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for expr in self.expressions() {
            for name in expr.property_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_property_names(names);
                }
            }
            Filter::Not(inner) => inner.collect_property_names(names),
            _ => {}
        }
    }

    /// Rebuild the tree, applying `f` to every expression of every predicate
    pub fn map_expressions<F>(&self, f: &mut F) -> Filter
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self {
            Filter::Include | Filter::Exclude | Filter::Id(_) => self.clone(),
            Filter::And(children) => {
                Filter::And(children.iter().map(|c| c.map_expressions(f)).collect())
            }
            Filter::Or(children) => {
                Filter::Or(children.iter().map(|c| c.map_expressions(f)).collect())
            }
            Filter::Not(inner) => Filter::Not(Box::new(inner.map_expressions(f))),
            Filter::Comparison {
                op,
                left,
                right,
                match_case,
            } => Filter::Comparison {
                op: *op,
                left: f(left),
                right: f(right),
                match_case: *match_case,
            },
            Filter::Between { expr, lower, upper } => Filter::Between {
                expr: f(expr),
                lower: f(lower),
                upper: f(upper),
            },
            Filter::Like {
                expr,
                pattern,
                match_case,
            } => Filter::Like {
                expr: f(expr),
                pattern: pattern.clone(),
                match_case: *match_case,
            },
            Filter::IsNull(expr) => Filter::IsNull(f(expr)),
            Filter::Spatial { op, left, right } => Filter::Spatial {
                op: *op,
                left: f(left),
                right: f(right),
            },
        }
    }

    /// Attach a namespace context to every property name that has none
    pub fn with_namespaces(&self, namespaces: Arc<NamespaceContext>) -> Filter {
        self.map_expressions(&mut |expr: &Expr| {
            expr.map_properties(&mut |p: &PropertyName| {
                Expr::Property(PropertyName {
                    path: p.path.clone(),
                    namespaces: p.namespaces.clone().or_else(|| Some(namespaces.clone())),
                    qualifier: p.qualifier.clone(),
                })
            })
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Include => write!(f, "INCLUDE"),
            Filter::Exclude => write!(f, "EXCLUDE"),
            Filter::And(children) | Filter::Or(children) => {
                let joiner = if matches!(self, Filter::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                let parts: Vec<String> = children.iter().map(|c| format!("({})", c)).collect();
                write!(f, "{}", parts.join(joiner))
            }
            Filter::Not(inner) => write!(f, "NOT ({})", inner),
            Filter::Comparison {
                op, left, right, ..
            } => write!(f, "{} {} {}", left, op.to_sql(), right),
            Filter::Between { expr, lower, upper } => {
                write!(f, "{} BETWEEN {} AND {}", expr, lower, upper)
            }
            Filter::Like {
                expr,
                pattern,
                match_case,
            } => {
                let keyword = if *match_case { "LIKE" } else { "ILIKE" };
                write!(f, "{} {} '{}'", expr, keyword, pattern.replace('\'', "''"))
            }
            Filter::IsNull(expr) => write!(f, "{} IS NULL", expr),
            Filter::Spatial { op, left, right } => {
                write!(f, "{}({}, {})", op.name().to_uppercase(), left, right)
            }
            Filter::Id(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| format!("'{}'", id)).collect();
                write!(f, "IN ({})", ids.join(", "))
            }
        }
    }
}
