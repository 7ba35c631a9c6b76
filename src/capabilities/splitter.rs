//! Pre/post filter splitting aware of nested attributes.
//!
//! Every leaf predicate lands in exactly one of the two outputs:
//!
//! - `pre`: encodable in SQL against the root table (possibly through `EXISTS`
//!   subqueries for nested attributes)
//! - `post`: evaluated on assembled features after the query
//!
//! A predicate can reach into at most one nested attribute; root attributes it
//! compares against don't count. Function arguments can't reach into any.

use super::{ExprCapability, FilterCapabilities};
use crate::chain;
use crate::config::TranslatorConfig;
use crate::filter::visitors::ExpressionVisitor;
use crate::filter::{Expr, Filter, MathOp, PropertyName};
use crate::mapping::{FeatureTypeMapping, MappingRegistry};

/// Nested attributes allowed in one comparison, spatial operator or math expression
const MAX_NESTED_PER_PREDICATE: usize = 1;
/// Nested attributes allowed among the arguments of a function
const MAX_NESTED_PER_FUNCTION: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSplit {
    pub pre: Filter,
    pub post: Filter,
}

impl FilterSplit {
    fn pre(filter: Filter) -> Self {
        FilterSplit {
            pre: filter,
            post: Filter::Include,
        }
    }

    fn post(filter: Filter) -> Self {
        FilterSplit {
            pre: Filter::Include,
            post: filter,
        }
    }

    /// Nothing is left for the post filter
    pub fn is_fully_pre(&self) -> bool {
        self.post.is_include()
    }
}

pub struct ComplexFilterSplitter<'r> {
    capabilities: &'r FilterCapabilities,
    registry: &'r MappingRegistry,
    root: &'r FeatureTypeMapping,
    encode_nested_filters: bool,
}

impl<'r> ComplexFilterSplitter<'r> {
    pub fn new(
        capabilities: &'r FilterCapabilities,
        registry: &'r MappingRegistry,
        root: &'r FeatureTypeMapping,
        config: &TranslatorConfig,
    ) -> Self {
        ComplexFilterSplitter {
            capabilities,
            registry,
            root,
            encode_nested_filters: config.encode_nested_filters,
        }
    }

    pub fn split(&self, filter: &Filter) -> FilterSplit {
        let split = self.split_node(filter);
        log::debug!("Split '{}' into pre '{}' and post '{}'", filter, split.pre, split.post);
        split
    }

    fn split_node(&self, filter: &Filter) -> FilterSplit {
        match filter {
            Filter::Include | Filter::Exclude => FilterSplit::pre(filter.clone()),
            Filter::And(children) => {
                if !self.capabilities.logical {
                    return FilterSplit::post(filter.clone());
                }
                let (pre, post): (Vec<Filter>, Vec<Filter>) = children
                    .iter()
                    .map(|c| {
                        let split = self.split_node(c);
                        (split.pre, split.post)
                    })
                    .unzip();
                FilterSplit {
                    pre: Filter::and(pre),
                    post: Filter::and(post),
                }
            }
            Filter::Or(children) => {
                let all_pre = self.capabilities.logical
                    && children.iter().all(|c| self.split_node(c).is_fully_pre());
                if all_pre {
                    FilterSplit::pre(filter.clone())
                } else {
                    FilterSplit::post(filter.clone())
                }
            }
            Filter::Not(inner) => {
                if self.capabilities.logical && self.split_node(inner).is_fully_pre() {
                    FilterSplit::pre(filter.clone())
                } else {
                    FilterSplit::post(filter.clone())
                }
            }
            Filter::Id(_) => {
                let capable = self.capabilities.id
                    && self
                        .root
                        .id_expression
                        .as_ref()
                        .is_some_and(|e| self.capabilities.supports_expression(e));
                if capable {
                    FilterSplit::pre(filter.clone())
                } else {
                    log::debug!("Feature id expression of {} is not encodable", self.root);
                    FilterSplit::post(filter.clone())
                }
            }
            _ => {
                if self.classify_predicate(filter).capable {
                    FilterSplit::pre(filter.clone())
                } else {
                    FilterSplit::post(filter.clone())
                }
            }
        }
    }

    /// Comparison-like leaf: its own kind must be supported and its operands,
    /// taken together, may touch at most one nested attribute.
    pub fn classify_predicate(&self, filter: &Filter) -> ExprCapability {
        if !self.capabilities.supports(filter) {
            return ExprCapability::incapable();
        }
        let mut classifier = ExpressionClassifier { splitter: self };
        ExprCapability::combine(
            filter.expressions().into_iter().map(|e| classifier.visit(e)),
            MAX_NESTED_PER_PREDICATE,
        )
    }

    pub fn classify_property(&self, property: &PropertyName) -> ExprCapability {
        let steps = match self.root.property_steps(property) {
            Ok(steps) => steps,
            Err(e) => {
                log::debug!("Property '{}' can't be decomposed: {}", property.path, e);
                return ExprCapability::incapable();
            }
        };
        if steps.contains_predicate() {
            log::debug!("Property '{}' has a predicate step, not encodable", property.path);
            return ExprCapability::incapable();
        }

        let mut required = self.root.find_mappings_for(&steps);
        let mut nested_attributes = 0;

        if self.encode_nested_filters {
            let chains = match chain::resolve_property(self.registry, self.root, property, None) {
                Ok(chains) => chains,
                Err(e) => {
                    log::warn!(
                        "Resolving nested attribute '{}' failed, it will be post-filtered: {}",
                        property.path,
                        e
                    );
                    return ExprCapability::incapable();
                }
            };

            match chains.as_slice() {
                [chain]
                    if chain.is_nested()
                        && chain.is_joining_enabled()
                        && chain.attribute_path().is_some() =>
                {
                    nested_attributes += 1;

                    let own = chain.attribute_sources();
                    if !own.is_empty() {
                        if required.len() == 1 && required[0].is_none() {
                            required.clear();
                        }
                        required.extend(own);
                    }

                    // Join columns of every link, the root correlation included, end up in the SQL too
                    for idx in 0..chain.len() - 1 {
                        match chain.join_condition(idx) {
                            Some(join) => {
                                required.push(Some(join.parent));
                                required.push(Some(join.nested));
                            }
                            None => {
                                log::debug!(
                                    "No join columns between {} and the next link of '{}'",
                                    chain.links()[idx].mapping,
                                    property.path
                                );
                                return ExprCapability::incapable();
                            }
                        }
                    }
                }
                [_, _, ..] => {
                    log::debug!(
                        "'{}' resolves into {} nested chains, not encodable",
                        property.path,
                        chains.len()
                    );
                }
                _ => {}
            }
        }

        if required.is_empty() {
            log::debug!("No source expression for '{}'", property.path);
            return ExprCapability::incapable();
        }
        for source in &required {
            match source {
                // Value comes from another, non-joinable table
                None => return ExprCapability::incapable(),
                Some(expr) if !self.capabilities.supports_expression(expr) => {
                    log::debug!("Source expression '{}' is not encodable", expr);
                    return ExprCapability::incapable();
                }
                Some(_) => {}
            }
        }

        ExprCapability {
            capable: true,
            nested_attributes,
        }
    }
}

struct ExpressionClassifier<'s, 'r> {
    splitter: &'s ComplexFilterSplitter<'r>,
}

impl ExpressionVisitor for ExpressionClassifier<'_, '_> {
    type Output = ExprCapability;

    fn visit_property(&mut self, property: &PropertyName) -> ExprCapability {
        self.splitter.classify_property(property)
    }

    fn visit_math(&mut self, _op: MathOp, left: &Expr, right: &Expr) -> ExprCapability {
        if !self.splitter.capabilities.math {
            return ExprCapability::incapable();
        }
        let children = [self.visit(left), self.visit(right)];
        ExprCapability::combine(children, MAX_NESTED_PER_PREDICATE)
    }

    fn visit_function(&mut self, name: &str, args: &[Expr]) -> ExprCapability {
        let children: Vec<ExprCapability> = args.iter().map(|a| self.visit(a)).collect();
        let combined = ExprCapability::combine(children, MAX_NESTED_PER_FUNCTION);
        ExprCapability {
            capable: combined.capable && self.splitter.capabilities.supports_function(name),
            ..combined
        }
    }
}
