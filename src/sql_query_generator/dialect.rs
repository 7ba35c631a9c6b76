//! SQL dialects: identifier quoting, literals and declared capabilities.

use crate::capabilities::FilterCapabilities;
use crate::filter::SpatialOp;

use super::function_registry;

/// Words that must be quoted when used as identifiers
const RESERVED: &[&str] = &[
    "all", "and", "as", "between", "by", "case", "check", "column", "create", "default",
    "delete", "distinct", "else", "end", "exists", "from", "group", "having", "in", "inner",
    "insert", "into", "is", "join", "left", "like", "limit", "not", "null", "on", "or",
    "order", "outer", "select", "table", "then", "to", "union", "update", "user", "values",
    "when", "where",
];

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &str;

    fn encode_table_name(&self, name: &str, sql: &mut String);

    fn encode_column_name(&self, name: &str, sql: &mut String);

    fn encode_string_literal(&self, value: &str, sql: &mut String) {
        sql.push('\'');
        sql.push_str(&value.replace('\'', "''"));
        sql.push('\'');
    }

    fn encode_geometry(&self, wkt: &str, sql: &mut String) {
        sql.push_str("ST_GeomFromText(");
        self.encode_string_literal(wkt, sql);
        sql.push(')');
    }

    /// `left` and `right` are already encoded
    fn encode_spatial(&self, op: SpatialOp, left: &str, right: &str, sql: &mut String) {
        sql.push_str(&format!("ST_{}({}, {})", op.name(), left, right));
    }

    fn capabilities(&self) -> FilterCapabilities;
}

/// Lowercase identifiers that aren't keywords go out bare
pub fn needs_quoting(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    let plain_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    !(plain_start && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
        || RESERVED.contains(&identifier)
}

fn encode_identifier(identifier: &str, sql: &mut String) {
    if needs_quoting(identifier) {
        sql.push('"');
        sql.push_str(&identifier.replace('"', "\"\""));
        sql.push('"');
    } else {
        sql.push_str(identifier);
    }
}

/// ANSI SQL with the OGC `ST_*` functions available on request
#[derive(Debug, Clone, Default)]
pub struct AnsiDialect {
    spatial: bool,
}

impl AnsiDialect {
    pub fn new() -> Self {
        AnsiDialect { spatial: false }
    }

    pub fn with_spatial(mut self, spatial: bool) -> Self {
        self.spatial = spatial;
        self
    }
}

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &str {
        "ansi"
    }

    fn encode_table_name(&self, name: &str, sql: &mut String) {
        encode_identifier(name, sql);
    }

    fn encode_column_name(&self, name: &str, sql: &mut String) {
        encode_identifier(name, sql);
    }

    fn capabilities(&self) -> FilterCapabilities {
        let caps = FilterCapabilities::sql92().with_functions(function_registry::supported_functions());
        if self.spatial {
            caps.with_spatial(SpatialOp::ALL)
        } else {
            caps
        }
    }
}
