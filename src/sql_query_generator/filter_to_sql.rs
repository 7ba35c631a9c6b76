//! Plain filter to SQL encoding.
//!
//! Works on unrolled filters only: every property is a column of the backend
//! table, or of the table its qualifier names.

use crate::capabilities::FilterCapabilities;
use crate::filter::{Expr, Filter, Literal, PropertyName};

use super::dialect::SqlDialect;
use super::errors::SqlEncodeError;
use super::function_registry::get_function_mapping;
use super::Backend;

/// How column references are written
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEncoder {
    Unqualified,
    /// Prefix bare columns with an already encoded table name or alias
    Qualified(String),
}

impl FieldEncoder {
    pub fn encode(&self, dialect: &dyn SqlDialect, column: &PropertyName, sql: &mut String) {
        let prefix = match (&column.qualifier, self) {
            (Some(qualifier), _) => Some(qualifier.as_str()),
            (None, FieldEncoder::Qualified(prefix)) => Some(prefix.as_str()),
            (None, FieldEncoder::Unqualified) => None,
        };
        if let Some(prefix) = prefix {
            sql.push_str(prefix);
            sql.push('.');
        }
        dialect.encode_column_name(&column.path, sql);
    }
}

/// Encode AND/OR/NOT around children produced by `encode_child`.
///
/// Children of AND/OR are always parenthesised: an unrolled leaf may have
/// turned into a disjunction.
pub(crate) fn encode_logical<F>(
    filter: &Filter,
    sql: &mut String,
    encode_child: &mut F,
) -> Result<(), SqlEncodeError>
where
    F: FnMut(&Filter, &mut String) -> Result<(), SqlEncodeError>,
{
    match filter {
        Filter::And(children) | Filter::Or(children) => {
            let (joiner, empty) = if matches!(filter, Filter::And(_)) {
                (" AND ", "1 = 1")
            } else {
                (" OR ", "1 = 0")
            };
            if children.is_empty() {
                sql.push_str(empty);
                return Ok(());
            }
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                sql.push('(');
                encode_child(child, sql)?;
                sql.push(')');
            }
            Ok(())
        }
        Filter::Not(inner) => {
            sql.push_str("NOT (");
            encode_child(inner, sql)?;
            sql.push(')');
            Ok(())
        }
        _ => Err(SqlEncodeError::Unsupported(format!(
            "'{}' is not a logical operator",
            filter
        ))),
    }
}

pub struct FilterToSql<'b> {
    backend: &'b Backend,
    capabilities: FilterCapabilities,
    field_encoder: FieldEncoder,
}

impl<'b> FilterToSql<'b> {
    pub fn new(backend: &'b Backend) -> Self {
        FilterToSql {
            backend,
            capabilities: backend.capabilities(),
            field_encoder: FieldEncoder::Unqualified,
        }
    }

    pub fn with_field_encoder(mut self, field_encoder: FieldEncoder) -> Self {
        self.field_encoder = field_encoder;
        self
    }

    pub fn capabilities(&self) -> &FilterCapabilities {
        &self.capabilities
    }

    /// Encode a whole filter into a WHERE clause body
    pub fn encode(&self, filter: &Filter) -> Result<String, SqlEncodeError> {
        if !self.capabilities.fully_supports(filter) {
            return Err(SqlEncodeError::Unsupported(filter.to_string()));
        }
        let mut sql = String::new();
        self.encode_filter(filter, &mut sql)?;
        log::trace!("Encoded '{}' as: {}", filter, sql);
        Ok(sql)
    }

    pub fn encode_filter(&self, filter: &Filter, sql: &mut String) -> Result<(), SqlEncodeError> {
        let dialect = self.backend.dialect();
        match filter {
            Filter::Include => sql.push_str("1 = 1"),
            Filter::Exclude => sql.push_str("1 = 0"),
            Filter::And(_) | Filter::Or(_) | Filter::Not(_) => {
                encode_logical(filter, sql, &mut |child: &Filter, sql: &mut String| {
                    self.encode_filter(child, sql)
                })?
            }
            Filter::Comparison {
                op,
                left,
                right,
                match_case,
            } => {
                self.encode_case_folded(left, *match_case, sql)?;
                sql.push(' ');
                sql.push_str(op.to_sql());
                sql.push(' ');
                self.encode_case_folded(right, *match_case, sql)?;
            }
            Filter::Between { expr, lower, upper } => {
                self.encode_expression(expr, sql)?;
                sql.push_str(" BETWEEN ");
                self.encode_expression(lower, sql)?;
                sql.push_str(" AND ");
                self.encode_expression(upper, sql)?;
            }
            Filter::Like {
                expr,
                pattern,
                match_case,
            } => {
                if *match_case {
                    self.encode_expression(expr, sql)?;
                    sql.push_str(" LIKE ");
                    dialect.encode_string_literal(pattern, sql);
                } else {
                    sql.push_str("LOWER(");
                    self.encode_expression(expr, sql)?;
                    sql.push_str(") LIKE LOWER(");
                    dialect.encode_string_literal(pattern, sql);
                    sql.push(')');
                }
            }
            Filter::IsNull(expr) => {
                self.encode_expression(expr, sql)?;
                sql.push_str(" IS NULL");
            }
            Filter::Spatial { op, left, right } => {
                let mut left_sql = String::new();
                self.encode_expression(left, &mut left_sql)?;
                let mut right_sql = String::new();
                self.encode_expression(right, &mut right_sql)?;
                dialect.encode_spatial(*op, &left_sql, &right_sql, sql);
            }
            Filter::Id(_) => {
                return Err(SqlEncodeError::Unsupported(format!(
                    "{} (identifier filters must be unrolled first)",
                    filter
                )))
            }
        }
        Ok(())
    }

    fn encode_case_folded(
        &self,
        expr: &Expr,
        match_case: bool,
        sql: &mut String,
    ) -> Result<(), SqlEncodeError> {
        if match_case {
            return self.encode_expression(expr, sql);
        }
        sql.push_str("LOWER(");
        self.encode_expression(expr, sql)?;
        sql.push(')');
        Ok(())
    }

    pub fn encode_expression(&self, expr: &Expr, sql: &mut String) -> Result<(), SqlEncodeError> {
        let dialect = self.backend.dialect();
        match expr {
            Expr::Property(property) => self.field_encoder.encode(dialect, property, sql),
            Expr::Literal(literal) => match literal {
                Literal::String(value) => dialect.encode_string_literal(value, sql),
                Literal::Integer(value) => sql.push_str(&value.to_string()),
                Literal::Float(value) => sql.push_str(&value.to_string()),
                Literal::Boolean(value) => sql.push_str(if *value { "TRUE" } else { "FALSE" }),
                Literal::Geometry(wkt) => dialect.encode_geometry(wkt, sql),
                Literal::Null => sql.push_str("NULL"),
            },
            Expr::Math { op, left, right } => {
                sql.push('(');
                self.encode_expression(left, sql)?;
                sql.push(' ');
                sql.push_str(op.to_sql());
                sql.push(' ');
                self.encode_expression(right, sql)?;
                sql.push(')');
            }
            Expr::Function { name, args } => {
                let mapping = get_function_mapping(name)
                    .ok_or_else(|| SqlEncodeError::UnsupportedFunction(name.clone()))?;
                let mut encoded = Vec::with_capacity(args.len());
                for arg in args {
                    let mut arg_sql = String::new();
                    self.encode_expression(arg, &mut arg_sql)?;
                    encoded.push(arg_sql);
                }
                if let Some(transform) = mapping.arg_transform {
                    encoded = transform(&encoded);
                }
                sql.push_str(mapping.sql_name);
                sql.push('(');
                sql.push_str(&encoded.join(", "));
                sql.push(')');
            }
            Expr::Nil => sql.push_str("NULL"),
        }
        Ok(())
    }
}
