use crate::capabilities::FilterCapabilities;

pub mod catalog;
pub mod dialect;
pub mod errors;
pub mod filter_to_sql;
pub mod function_registry;
pub mod nested_filter_to_sql;

pub use catalog::{BackendCatalog, StaticCatalog};
pub use dialect::{AnsiDialect, SqlDialect};
pub use errors::{CatalogError, SqlEncodeError};
pub use filter_to_sql::{FieldEncoder, FilterToSql};
pub use nested_filter_to_sql::{ConjunctEncoding, NestedFilterToSql};

/// Everything the encoders need to know about the target database
pub struct Backend {
    dialect: Box<dyn SqlDialect>,
    catalog: Box<dyn BackendCatalog>,
    schema: Option<String>,
}

impl Backend {
    pub fn new(
        dialect: impl SqlDialect + 'static,
        catalog: impl BackendCatalog + 'static,
    ) -> Self {
        Backend {
            dialect: Box::new(dialect),
            catalog: Box::new(catalog),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn catalog(&self) -> &dyn BackendCatalog {
        self.catalog.as_ref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn capabilities(&self) -> FilterCapabilities {
        self.dialect.capabilities()
    }

    /// `schema.table`, each part encoded by the dialect
    pub fn encode_qualified_table(&self, table: &str, sql: &mut String) {
        if let Some(schema) = &self.schema {
            self.dialect.encode_table_name(schema, sql);
            sql.push('.');
        }
        self.dialect.encode_table_name(table, sql);
    }

    pub fn qualified_table(&self, table: &str) -> String {
        let mut sql = String::new();
        self.encode_qualified_table(table, &mut sql);
        sql
    }
}
