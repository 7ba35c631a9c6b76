//! Encoding of predicates on nested attributes as correlated `EXISTS` subqueries.
//!
//! For `st:measurements/st:Measurement/st:sensor/st:Sensor/st:name = 'X'` against
//! a `st:Station` root:
//!
//! ```text
//! EXISTS (SELECT _chain_link_2.id FROM sensors AS _chain_link_2
//!     INNER JOIN measurements AS _chain_link_1 ON _chain_link_1.sensor_id = _chain_link_2.id
//!     WHERE _chain_link_2.name = 'X' AND stations.id = _chain_link_1.station_id)
//! ```
//!
//! Joins run from the leaf back towards the root; the last condition correlates
//! the subquery with the outer query on the root table.

use crate::capabilities::FilterCapabilities;
use crate::chain::{self, FeatureChain};
use crate::filter::rewriter::rewrite;
use crate::filter::unmapping::{collect_properties, source_expressions, unroll, unroll_with};
use crate::filter::{Expr, Filter, PropertyName};
use crate::mapping::{FeatureTypeMapping, MappingRegistry};

use super::errors::SqlEncodeError;
use super::filter_to_sql::{encode_logical, FieldEncoder, FilterToSql};
use super::Backend;

pub struct NestedFilterToSql<'a> {
    backend: &'a Backend,
    registry: &'a MappingRegistry,
    root: &'a FeatureTypeMapping,
    capabilities: FilterCapabilities,
    /// Encodes everything outside the subqueries, columns qualified by the root table
    root_encoder: FilterToSql<'a>,
    encode_nested_filters: bool,
}

/// Outcome of [`NestedFilterToSql::encode_conjuncts`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConjunctEncoding {
    /// Conjuncts written into `sql`
    pub encoded: Filter,
    /// Conjuncts whose nested attribute could not be joined, left for the post filter
    pub demoted: Filter,
    pub sql: Option<String>,
}

impl<'a> NestedFilterToSql<'a> {
    pub fn new(
        backend: &'a Backend,
        registry: &'a MappingRegistry,
        root: &'a FeatureTypeMapping,
    ) -> Self {
        let root_encoder = FilterToSql::new(backend)
            .with_field_encoder(FieldEncoder::Qualified(backend.qualified_table(&root.table)));
        NestedFilterToSql {
            backend,
            registry,
            root,
            capabilities: backend.capabilities(),
            root_encoder,
            encode_nested_filters: true,
        }
    }

    /// With nested filters disabled every property is unrolled against the root
    pub fn with_nested_filters(mut self, enabled: bool) -> Self {
        self.encode_nested_filters = enabled;
        self
    }

    /// Encode a pre filter (attribute paths, not yet unrolled) into a WHERE body
    pub fn encode(&self, filter: &Filter) -> Result<String, SqlEncodeError> {
        if !self.capabilities.fully_supports(filter) {
            return Err(SqlEncodeError::Unsupported(filter.to_string()));
        }
        let mut sql = String::new();
        self.encode_node(filter, &mut sql)?;
        log::debug!("Encoded '{}' against {} as: {}", filter, self.root, sql);
        Ok(sql)
    }

    /// Encode each top-level conjunct of `filter` on its own.
    ///
    /// A conjunct failing with a recoverable error is demoted instead of
    /// failing the rest; any other error is returned.
    pub fn encode_conjuncts(&self, filter: &Filter) -> Result<ConjunctEncoding, SqlEncodeError> {
        let conjuncts = match filter {
            Filter::And(children) => children.as_slice(),
            other => std::slice::from_ref(other),
        };

        let mut encoded = Vec::new();
        let mut demoted = Vec::new();
        let mut parts = Vec::new();
        for conjunct in conjuncts {
            match self.encode(conjunct) {
                Ok(sql) => {
                    parts.push(sql);
                    encoded.push(conjunct.clone());
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("'{}' moved to the post filter: {}", conjunct, e);
                    demoted.push(conjunct.clone());
                }
                Err(e) => return Err(e),
            }
        }

        let sql = match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(
                parts
                    .iter()
                    .map(|part| format!("({})", part))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        };
        Ok(ConjunctEncoding {
            encoded: Filter::and(encoded),
            demoted: Filter::and(demoted),
            sql,
        })
    }

    fn encode_node(&self, filter: &Filter, sql: &mut String) -> Result<(), SqlEncodeError> {
        match filter {
            Filter::And(_) | Filter::Or(_) | Filter::Not(_) => {
                encode_logical(filter, sql, &mut |child: &Filter, sql: &mut String| {
                    self.encode_node(child, sql)
                })
            }
            Filter::Include | Filter::Exclude => self.root_encoder.encode_filter(filter, sql),
            _ => match self.nested_chain(filter)? {
                Some((property, chain)) => self.encode_exists(filter, property, &chain, sql),
                None => {
                    let unrolled = unroll(filter, self.root)?;
                    self.root_encoder.encode_filter(&unrolled, sql)
                }
            },
        }
    }

    /// The nested attribute a leaf predicate reaches into, with its chain
    fn nested_chain<'f>(
        &self,
        filter: &'f Filter,
    ) -> Result<Option<(&'f PropertyName, FeatureChain<'a>)>, SqlEncodeError> {
        if !self.encode_nested_filters {
            return Ok(None);
        }
        let mut properties = Vec::new();
        for expr in filter.expressions() {
            collect_properties(expr, &mut properties);
        }

        for property in properties.into_iter().filter(|p| p.is_multi_step()) {
            let chains = chain::resolve_property(self.registry, self.root, property, None)
                .map_err(|e| {
                    SqlEncodeError::nested_type_resolution_with_context(&property.path, e.to_string())
                })?;

            let rejection = match chains.len() {
                0 => SqlEncodeError::nested_type_resolution_with_context(
                    &property.path,
                    "no feature chain resolves the path",
                ),
                1 => {
                    let Some(chain) = chains.into_iter().next() else {
                        continue;
                    };
                    if !chain.is_nested() {
                        continue;
                    }
                    if !chain.is_joining_enabled() {
                        SqlEncodeError::not_joinable_with_context(
                            &property.path,
                            "the chain contains iterative nesting",
                        )
                    } else if chain.attribute_path().is_none() {
                        SqlEncodeError::not_joinable_with_context(
                            &property.path,
                            "the path ends at a nested feature type",
                        )
                    } else {
                        log::trace!(
                            "'{}' crosses {} nested attribute(s)",
                            property.path,
                            chain.len() - 1
                        );
                        return Ok(Some((property, chain)));
                    }
                }
                n => SqlEncodeError::not_joinable_with_context(
                    &property.path,
                    format!("the path resolves to {} feature chains", n),
                ),
            };

            if !self.is_locally_mapped(property) {
                return Err(rejection);
            }
            log::debug!(
                "'{}' is mapped on {} itself, encoded without a subquery: {}",
                property.path,
                self.root,
                rejection
            );
        }
        Ok(None)
    }

    /// The root maps the path to columns of its own table
    fn is_locally_mapped(&self, property: &PropertyName) -> bool {
        self.root.property_steps(property).is_ok_and(|steps| {
            let sources = self.root.find_mappings_for(&steps);
            !sources.is_empty() && sources.iter().all(Option::is_some)
        })
    }

    fn encode_exists(
        &self,
        filter: &Filter,
        property: &PropertyName,
        chain: &FeatureChain<'a>,
        sql: &mut String,
    ) -> Result<(), SqlEncodeError> {
        let (Some(leaf), Some(owner), Some(attribute_path)) = (
            chain.last(),
            chain.feature_type_owning_attribute(),
            chain.attribute_path(),
        ) else {
            return Err(SqlEncodeError::not_joinable_with_context(
                &property.path,
                "incomplete feature chain",
            ));
        };
        let dialect = self.backend.dialect();

        let leaf_predicate = self.leaf_predicate(filter, property, owner, &attribute_path.to_string())?;

        let mut leaf_alias = String::new();
        dialect.encode_table_name(&leaf.alias, &mut leaf_alias);

        let primary_key = self.backend.catalog().primary_key(&leaf.mapping.table)?;
        sql.push_str("EXISTS (SELECT ");
        if primary_key.is_empty() {
            sql.push('*');
        } else {
            for (i, column) in primary_key.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&leaf_alias);
                sql.push('.');
                dialect.encode_column_name(column, sql);
            }
        }
        sql.push_str(" FROM ");
        self.backend.encode_qualified_table(&leaf.mapping.table, sql);
        sql.push_str(" AS ");
        sql.push_str(&leaf_alias);

        for idx in (1..chain.len() - 1).rev() {
            let link = &chain.links()[idx];
            let mut alias = String::new();
            dialect.encode_table_name(&link.alias, &mut alias);
            sql.push_str(" INNER JOIN ");
            self.backend.encode_qualified_table(&link.mapping.table, sql);
            sql.push_str(" AS ");
            sql.push_str(&alias);
            sql.push_str(" ON ");
            self.encode_join(chain, idx, alias, sql)?;
        }

        sql.push_str(" WHERE ");
        let leaf_encoder =
            FilterToSql::new(self.backend).with_field_encoder(FieldEncoder::Qualified(leaf_alias));
        if matches!(leaf_predicate, Filter::And(_) | Filter::Or(_)) {
            sql.push('(');
            leaf_encoder.encode_filter(&leaf_predicate, sql)?;
            sql.push(')');
        } else {
            leaf_encoder.encode_filter(&leaf_predicate, sql)?;
        }
        sql.push_str(" AND ");
        self.encode_join(chain, 0, self.backend.qualified_table(&self.root.table), sql)?;
        sql.push(')');
        Ok(())
    }

    /// The predicate as seen from inside the subquery: the nested attribute
    /// becomes a bare column of the owning mapping's table, other properties
    /// become columns of the root table.
    fn leaf_predicate(
        &self,
        filter: &Filter,
        property: &PropertyName,
        owner: &FeatureTypeMapping,
        attribute_path: &str,
    ) -> Result<Filter, SqlEncodeError> {
        let root_table = self.backend.qualified_table(&self.root.table);
        let correlated = unroll_with(filter, None, &mut |p: &PropertyName| {
            if p.path == property.path {
                return Ok(vec![Expr::Property(p.clone())]);
            }
            Ok(source_expressions(p, self.root)?
                .into_iter()
                .map(|source| qualify_columns(&source, &root_table))
                .collect())
        })?;

        let rewritten = rewrite(&correlated, &property.path, attribute_path);
        let unrolled = unroll_with(&rewritten, None, &mut |p: &PropertyName| {
            if p.path == attribute_path {
                source_expressions(p, owner)
            } else {
                Ok(vec![Expr::Property(p.clone())])
            }
        })?;
        Ok(unrolled)
    }

    /// `<parent>.<col> = <alias of idx + 1>.<col>` joining link `idx` to the next
    fn encode_join(
        &self,
        chain: &FeatureChain<'a>,
        idx: usize,
        parent_prefix: String,
        sql: &mut String,
    ) -> Result<(), SqlEncodeError> {
        let links = chain.links();
        let join = chain
            .join_condition(idx)
            .ok_or_else(|| SqlEncodeError::MissingJoinColumns {
                parent: links[idx].mapping.to_string(),
                nested: links[idx + 1].mapping.to_string(),
            })?;

        let mut nested_prefix = String::new();
        self.backend
            .dialect()
            .encode_table_name(&links[idx + 1].alias, &mut nested_prefix);

        FilterToSql::new(self.backend)
            .with_field_encoder(FieldEncoder::Qualified(parent_prefix))
            .encode_expression(&join.parent, sql)?;
        sql.push_str(" = ");
        FilterToSql::new(self.backend)
            .with_field_encoder(FieldEncoder::Qualified(nested_prefix))
            .encode_expression(&join.nested, sql)
    }
}

/// Attach `table` to every column of `expr` that has no qualifier yet
fn qualify_columns(expr: &Expr, table: &str) -> Expr {
    expr.map_properties(&mut |column: &PropertyName| {
        if column.qualifier.is_some() {
            Expr::Property(column.clone())
        } else {
            Expr::Property(PropertyName::qualified(table, column.path.clone()))
        }
    })
}
