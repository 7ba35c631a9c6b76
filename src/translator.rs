//! Filter translation: split into pre/post filters and encode the pre filter.

use serde::Serialize;
use thiserror::Error;

use crate::capabilities::ComplexFilterSplitter;
use crate::config::TranslatorConfig;
use crate::filter::Filter;
use crate::mapping::MappingRegistry;
use crate::sql_query_generator::{Backend, NestedFilterToSql, SqlEncodeError};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("SQL encoding failed: {0}")]
    Encode(#[from] SqlEncodeError),
}

/// Outcome of translating one filter against the root feature type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    /// Part evaluated by the database
    pub pre: Filter,
    /// Part evaluated on assembled features
    pub post: Filter,
    /// Encoded `pre`; absent when nothing is pushed down
    pub where_sql: Option<String>,
    /// Encoded root table
    pub from: String,
}

impl Translation {
    pub fn select_sql(&self) -> String {
        match &self.where_sql {
            Some(where_sql) => format!("SELECT * FROM {} WHERE {}", self.from, where_sql),
            None => format!("SELECT * FROM {}", self.from),
        }
    }
}

pub struct QueryTranslator<'a> {
    registry: &'a MappingRegistry,
    backend: &'a Backend,
    config: TranslatorConfig,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(registry: &'a MappingRegistry, backend: &'a Backend, config: TranslatorConfig) -> Self {
        QueryTranslator {
            registry,
            backend,
            config,
        }
    }

    pub fn translate(&self, filter: &Filter) -> Result<Translation, TranslateError> {
        let root = self.registry.root();
        let filter = filter.with_namespaces(self.registry.namespaces().clone());
        let capabilities = self.backend.capabilities();

        let split = ComplexFilterSplitter::new(&capabilities, self.registry, root, &self.config)
            .split(&filter);
        let from = self.backend.qualified_table(&root.table);

        if split.pre.is_include() {
            log::debug!("Nothing of '{}' can be pushed down", filter);
            return Ok(Translation {
                pre: split.pre,
                post: split.post,
                where_sql: None,
                from,
            });
        }

        let encoder = NestedFilterToSql::new(self.backend, self.registry, root)
            .with_nested_filters(self.config.encode_nested_filters);
        let encoding = encoder.encode_conjuncts(&split.pre)?;
        Ok(Translation {
            pre: encoding.encoded,
            post: Filter::and(vec![split.post, encoding.demoted]),
            where_sql: encoding.sql,
            from,
        })
    }
}
