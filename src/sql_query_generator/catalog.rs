//! Table metadata needed while encoding: primary keys of joined tables.

use std::collections::BTreeMap;

use super::errors::CatalogError;

#[cfg_attr(test, mockall::automock)]
pub trait BackendCatalog: Send + Sync {
    /// Primary key columns of `table`, in key order. Empty when the table has none.
    fn primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError>;
}

/// Catalog backed by metadata declared up front (the mapping file's `tables:`)
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    primary_keys: BTreeMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn new(primary_keys: BTreeMap<String, Vec<String>>) -> Self {
        StaticCatalog { primary_keys }
    }

    pub fn with_table(mut self, table: impl Into<String>, primary_key: Vec<String>) -> Self {
        self.primary_keys.insert(table.into(), primary_key);
        self
    }
}

impl BackendCatalog for StaticCatalog {
    fn primary_key(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        self.primary_keys
            .get(table)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::default()
            .with_table("sensors", vec!["id".to_string(), "revision".to_string()])
            .with_table("observers", vec![]);
        assert_eq!(
            catalog.primary_key("sensors").unwrap(),
            vec!["id".to_string(), "revision".to_string()]
        );
        assert!(catalog.primary_key("observers").unwrap().is_empty());
        assert_eq!(
            catalog.primary_key("missing"),
            Err(CatalogError::UnknownTable("missing".to_string()))
        );
    }
}
