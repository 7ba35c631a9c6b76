//! Unit tests - fast tests of single components through the public API
//!
//! No database or external service is involved.

mod filter_parser_tests;
mod mapping_config_tests;
mod xpath_steps_tests;
