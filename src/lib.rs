//! Featurechain - nested filter push-down for mapped complex features
//!
//! Translates filters written against a complex feature schema into SQL against
//! the tables backing it:
//! - XPath attribute paths resolved through nested feature types
//! - Pre/post filter splitting by backend capability
//! - Correlated `EXISTS` subqueries for predicates on nested attributes

pub mod capabilities;
pub mod chain;
pub mod config;
pub mod filter;
pub mod mapping;
pub mod sql_query_generator;
pub mod translator;
pub mod xpath;
